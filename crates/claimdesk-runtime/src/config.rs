//! Runtime configuration.
//!
//! Loaded from YAML or JSON. Every field has a default, so an empty file
//! is a valid config:
//!
//! ```yaml
//! token_divisor: 3.2
//! max_input_tokens: 8000
//! min_document_chars: 50
//! temperature: 0.1
//! email_language: tr
//! budgets:
//!   - { rules_char_limit: 4000, document_char_limit: 12000, max_output_tokens: 4000, max_rules: 5 }
//!   - { rules_char_limit: 2500, document_char_limit: 7000, max_output_tokens: 3000, max_rules: 3 }
//!   - { rules_char_limit: 1200, document_char_limit: 3500, max_output_tokens: 2000, max_rules: 2 }
//! providers:
//!   - type: openai
//!     model: gpt-4o
//!     timeout: 60s
//!   - type: anthropic
//!     model: claude-sonnet-4-5
//! ```
//!
//! The token divisor and the budget levels were tuned against one
//! tokenizer; check them against the model actually in use.

use claimdesk_core::EmailLanguage;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::providers::CompletionConfig;
use crate::resilience::BudgetSchedule;

/// Errors that can occur when loading a runtime config.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Settings for one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Shrinking prompt limits, tried in order
    pub budgets: BudgetSchedule,

    /// Characters per token used for estimates
    pub token_divisor: f64,

    /// Hard ceiling on estimated input tokens per request
    pub max_input_tokens: u32,

    /// Shorter documents are rejected before any model call
    pub min_document_chars: usize,

    pub temperature: f32,

    /// Language of the rendered email draft
    pub email_language: EmailLanguage,

    /// Backends in priority order
    pub providers: Vec<ProviderEntry>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            budgets: BudgetSchedule::default(),
            token_divisor: 3.2,
            max_input_tokens: 8_000,
            min_document_chars: 50,
            temperature: 0.1,
            email_language: EmailLanguage::default(),
            providers: vec![ProviderEntry::new("openai"), ProviderEntry::new("anthropic")],
        }
    }
}

impl RuntimeConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from disk, choosing the parser by extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&contents),
            _ => Self::from_yaml(&contents),
        }
    }

    /// Check values the type system cannot.
    ///
    /// Budget levels are validated when they are deserialized.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.token_divisor > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "token_divisor must be positive, got {}",
                self.token_divisor
            )));
        }
        if self.max_input_tokens == 0 {
            return Err(ConfigError::Invalid(
                "max_input_tokens must be positive".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid(format!(
                "temperature must be within 0.0..=2.0, got {}",
                self.temperature
            )));
        }
        if self.providers.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one provider entry is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// One backend in the provider list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderEntry {
    /// Registered factory type, e.g. `openai`
    #[serde(rename = "type")]
    pub provider_type: String,

    /// Model name; the factory's default when absent
    #[serde(default)]
    pub model: Option<String>,

    /// Per-request timeout, e.g. `"45s"` or `"2m"`
    #[serde(default = "default_timeout", with = "duration_human")]
    pub timeout: Duration,

    #[serde(default = "default_prompt_caching")]
    pub prompt_caching: bool,

    /// Factory-specific settings (`api_key`, `base_url`, ...)
    #[serde(flatten)]
    pub settings: Map<String, JsonValue>,
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_prompt_caching() -> bool {
    true
}

impl ProviderEntry {
    pub fn new(provider_type: impl Into<String>) -> Self {
        Self {
            provider_type: provider_type.into(),
            model: None,
            timeout: default_timeout(),
            prompt_caching: default_prompt_caching(),
            settings: Map::new(),
        }
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// Settings as a JSON object for the provider factory.
    pub fn settings_json(&self) -> JsonValue {
        JsonValue::Object(self.settings.clone())
    }

    /// Request settings for this backend.
    pub fn completion_config(&self, default_model: &str, temperature: f32) -> CompletionConfig {
        CompletionConfig {
            model: self
                .model
                .clone()
                .unwrap_or_else(|| default_model.to_string()),
            temperature,
            timeout: self.timeout,
            prompt_caching: self.prompt_caching,
            ..CompletionConfig::default()
        }
    }
}

mod duration_human {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}
