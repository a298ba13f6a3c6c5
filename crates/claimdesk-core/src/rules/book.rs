//! Rule book loading from YAML/JSON.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur when loading a rule book.
#[derive(Error, Debug)]
pub enum RuleBookError {
    #[error("Failed to read rule file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Rule validation failed: {0}")]
    ValidationError(String),
}

/// A versioned business-policy snippet with its matching keywords.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rule {
    /// Binder version or contract package name
    pub version: String,

    /// Policy text shown to the model
    pub text: String,

    /// Terms whose presence in a document marks the rule as relevant
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl Rule {
    pub fn new(
        version: impl Into<String>,
        text: impl Into<String>,
        keywords: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            version: version.into(),
            text: text.into(),
            keywords: keywords.into_iter().map(Into::into).collect(),
        }
    }
}

/// Base-warranty rule entry as stored in rule files.
#[derive(Debug, Clone, Deserialize)]
struct WarrantyRuleEntry {
    #[serde(alias = "rule_version")]
    version: String,

    #[serde(alias = "rule_text")]
    text: String,

    #[serde(default)]
    keywords: Vec<String>,

    #[serde(default = "default_active", alias = "is_active")]
    active: bool,
}

/// Extended contract package entry as stored in rule files.
#[derive(Debug, Clone, Deserialize)]
struct ContractPackageEntry {
    package_name: String,

    #[serde(default)]
    items: Vec<String>,

    #[serde(default)]
    keywords: Vec<String>,

    #[serde(default = "default_active", alias = "is_active")]
    active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Default)]
struct RuleFile {
    #[serde(default)]
    warranty: Vec<WarrantyRuleEntry>,

    #[serde(default)]
    contracts: Vec<ContractPackageEntry>,
}

impl From<ContractPackageEntry> for Rule {
    fn from(entry: ContractPackageEntry) -> Self {
        let text = if entry.items.is_empty() {
            "Covered items: (none listed)".to_string()
        } else {
            format!("Covered items: {}", entry.items.join(", "))
        };

        Rule {
            version: entry.package_name,
            text,
            keywords: entry.keywords,
        }
    }
}

/// Active rules handed to the analyzer, split by family.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleBook {
    /// Base-warranty binder rules
    pub warranty: Vec<Rule>,

    /// Extended contract packages
    pub contracts: Vec<Rule>,
}

impl RuleBook {
    pub fn new(warranty: Vec<Rule>, contracts: Vec<Rule>) -> Self {
        Self { warranty, contracts }
    }

    /// Parse a rule book from YAML. Inactive entries are dropped.
    pub fn from_yaml(yaml: &str) -> Result<Self, RuleBookError> {
        let file: RuleFile = serde_yaml::from_str(yaml)?;
        Self::from_file(file)
    }

    /// Parse a rule book from JSON. Inactive entries are dropped.
    pub fn from_json(json: &str) -> Result<Self, RuleBookError> {
        let file: RuleFile = serde_json::from_str(json)?;
        Self::from_file(file)
    }

    /// Load a rule book from disk, choosing the parser by extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RuleBookError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&contents),
            _ => Self::from_yaml(&contents),
        }
    }

    fn from_file(file: RuleFile) -> Result<Self, RuleBookError> {
        let warranty: Vec<Rule> = file
            .warranty
            .into_iter()
            .filter(|entry| entry.active)
            .map(|entry| Rule {
                version: entry.version,
                text: entry.text,
                keywords: entry.keywords,
            })
            .collect();

        let contracts: Vec<Rule> = file
            .contracts
            .into_iter()
            .filter(|entry| entry.active)
            .map(Rule::from)
            .collect();

        let book = Self { warranty, contracts };
        book.validate()?;
        Ok(book)
    }

    fn validate(&self) -> Result<(), RuleBookError> {
        for rule in self.warranty.iter().chain(self.contracts.iter()) {
            if rule.version.trim().is_empty() {
                return Err(RuleBookError::ValidationError(
                    "rule version / package name must not be empty".to_string(),
                ));
            }
        }
        if let Some(rule) = self.warranty.iter().find(|r| r.text.trim().is_empty()) {
            return Err(RuleBookError::ValidationError(format!(
                "warranty rule '{}' has no text",
                rule.version
            )));
        }
        Ok(())
    }

    /// Substitute the default warranty rules when none are active.
    pub fn or_default_warranty(mut self) -> Self {
        if self.warranty.is_empty() {
            tracing::warn!("No active warranty rules, using the default rule set");
            self.warranty = DefaultRuleSet::warranty_rules();
        }
        self
    }

    /// Version of the binder the analysis relies on.
    pub fn binder_version(&self) -> &str {
        self.warranty
            .first()
            .map(|r| r.version.as_str())
            .unwrap_or("default")
    }

    pub fn is_empty(&self) -> bool {
        self.warranty.is_empty() && self.contracts.is_empty()
    }
}

/// Fallback warranty policy for an empty rule repository.
pub struct DefaultRuleSet;

impl DefaultRuleSet {
    pub const VERSION: &'static str = "1.0";

    pub const TEXT: &'static str = "Vehicles within 2 years of delivery are covered by warranty. \
         Failures caused by manufacturing defects are covered by warranty.";

    pub const KEYWORDS: &'static [&'static str] =
        &["garanti", "warranty", "2 yıl", "üretim hatası"];

    pub fn warranty_rules() -> Vec<Rule> {
        vec![Rule::new(Self::VERSION, Self::TEXT, Self::KEYWORDS.iter().copied())]
    }
}
