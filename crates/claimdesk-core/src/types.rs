//! Shared data model for claim analysis.
//!
//! `AnalysisResult` is the record handed back to callers. It is built by the
//! response normalizer, completed by the email renderer and sealed by the
//! coverage policy.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::text::char_len;

/// Base warranty decision for a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarrantyDecision {
    Covered,
    OutOfCoverage,
    #[default]
    AdditionalInfoRequired,
}

impl WarrantyDecision {
    /// Parse a decision label, falling back to `AdditionalInfoRequired` for
    /// anything unrecognised.
    pub fn parse_lenient(label: &str) -> Self {
        match normalize_label(label).as_str() {
            "COVERED" => Self::Covered,
            "OUT_OF_COVERAGE" | "NOT_COVERED" => Self::OutOfCoverage,
            _ => Self::AdditionalInfoRequired,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Covered => "COVERED",
            Self::OutOfCoverage => "OUT_OF_COVERAGE",
            Self::AdditionalInfoRequired => "ADDITIONAL_INFO_REQUIRED",
        }
    }
}

/// Extended contract decision for a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContractDecision {
    /// An active contract package covers the failed parts
    ContractCovered,
    /// A contract exists but the failed parts are outside its items
    ContractNotCovered,
    /// No contract coverage applies
    #[default]
    NoContractCoverage,
}

impl ContractDecision {
    /// Parse a decision label, falling back to `NoContractCoverage` for
    /// anything unrecognised.
    pub fn parse_lenient(label: &str) -> Self {
        match normalize_label(label).as_str() {
            "CONTRACT_COVERED" => Self::ContractCovered,
            "CONTRACT_NOT_COVERED" => Self::ContractNotCovered,
            _ => Self::NoContractCoverage,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContractCovered => "CONTRACT_COVERED",
            Self::ContractNotCovered => "CONTRACT_NOT_COVERED",
            Self::NoContractCoverage => "NO_CONTRACT_COVERAGE",
        }
    }
}

fn normalize_label(label: &str) -> String {
    label
        .trim()
        .to_uppercase()
        .replace([' ', '-'], "_")
}

/// Narrative text carried in the document language plus an optional
/// translation for the reader.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BilingualText {
    /// Text as written in the source document
    pub original: String,

    /// Translation into the reader's language
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated: Option<String>,
}

impl BilingualText {
    pub fn new(original: impl Into<String>, translated: Option<String>) -> Self {
        Self {
            original: original.into(),
            translated,
        }
    }

    /// Text with no translation.
    pub fn plain(original: impl Into<String>) -> Self {
        Self::new(original, None)
    }

    /// The translation when present, otherwise the original.
    pub fn preferred(&self) -> &str {
        match self.translated.as_deref() {
            Some(t) if !t.trim().is_empty() => t,
            _ => &self.original,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.original.trim().is_empty()
            && self.translated.as_deref().map_or(true, |t| t.trim().is_empty())
    }

    /// Both language variants joined, for keyword matching.
    pub fn searchable(&self) -> String {
        match &self.translated {
            Some(t) => format!("{} {}", self.original, t),
            None => self.original.clone(),
        }
    }
}

/// A part replaced during the repair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartReplaced {
    pub part_name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default = "default_qty")]
    pub qty: u32,
}

fn default_qty() -> u32 {
    1
}

/// Structured decision record for one claim document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisResult {
    pub case_number: String,
    pub company: String,
    pub plate: String,
    pub vin: String,

    /// Delivery / registration date that starts the warranty clock
    pub warranty_start_date: Option<NaiveDate>,
    pub repair_date: Option<NaiveDate>,
    pub vehicle_age_months: u32,
    pub repair_km: u64,
    pub request_type: String,

    pub is_within_base_warranty: bool,
    pub warranty_decision: WarrantyDecision,
    pub decision_rationale: Vec<String>,

    pub has_active_contract: bool,
    pub contract_package_name: Option<String>,
    pub contract_decision: ContractDecision,
    pub contract_covered_parts: Vec<String>,

    pub failure_complaint: BilingualText,
    pub failure_cause: BilingualText,
    pub operations_performed: Vec<BilingualText>,
    pub parts_replaced: Vec<PartReplaced>,
    pub repair_process_summary: BilingualText,

    pub email_subject: String,
    pub email_body: String,
}

pub const DEFAULT_REQUEST_TYPE: &str = "WARRANTY SUPPORT";

impl Default for AnalysisResult {
    fn default() -> Self {
        Self {
            case_number: String::new(),
            company: String::new(),
            plate: String::new(),
            vin: String::new(),
            warranty_start_date: None,
            repair_date: None,
            vehicle_age_months: 0,
            repair_km: 0,
            request_type: DEFAULT_REQUEST_TYPE.to_string(),
            is_within_base_warranty: false,
            warranty_decision: WarrantyDecision::default(),
            decision_rationale: Vec::new(),
            has_active_contract: false,
            contract_package_name: None,
            contract_decision: ContractDecision::default(),
            contract_covered_parts: Vec::new(),
            failure_complaint: BilingualText::default(),
            failure_cause: BilingualText::default(),
            operations_performed: Vec::new(),
            parts_replaced: Vec::new(),
            repair_process_summary: BilingualText::default(),
            email_subject: String::new(),
            email_body: String::new(),
        }
    }
}

impl AnalysisResult {
    /// Text the coverage policy scans for external-damage vocabulary:
    /// failure cause and complaint in every language carried.
    pub fn failure_cause_text(&self) -> String {
        format!(
            "{}\n{}",
            self.failure_cause.searchable(),
            self.failure_complaint.searchable()
        )
    }

    /// Human-readable case title: `case - company - plate`.
    pub fn case_title(&self) -> String {
        format!(
            "{} - {} - {}",
            or_na(&self.case_number),
            or_na(&self.company),
            or_na(&self.plate)
        )
    }
}

pub(crate) fn or_na(value: &str) -> &str {
    if value.trim().is_empty() {
        "N/A"
    } else {
        value
    }
}

/// Instruction and context sent to a model for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPayload {
    pub system_instruction: String,
    pub user_prompt: String,
}

impl PromptPayload {
    /// Combined size in characters of both parts.
    pub fn total_chars(&self) -> usize {
        char_len(&self.system_instruction) + char_len(&self.user_prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_parsing_is_lenient() {
        assert_eq!(WarrantyDecision::parse_lenient("covered"), WarrantyDecision::Covered);
        assert_eq!(
            WarrantyDecision::parse_lenient("out of coverage"),
            WarrantyDecision::OutOfCoverage
        );
        assert_eq!(
            WarrantyDecision::parse_lenient("maybe"),
            WarrantyDecision::AdditionalInfoRequired
        );
        assert_eq!(
            ContractDecision::parse_lenient("CONTRACT_COVERED"),
            ContractDecision::ContractCovered
        );
        assert_eq!(
            ContractDecision::parse_lenient(""),
            ContractDecision::NoContractCoverage
        );
    }

    #[test]
    fn test_bilingual_preferred() {
        let text = BilingualText::new("Turbolader defekt", Some("Turbo arızalı".to_string()));
        assert_eq!(text.preferred(), "Turbo arızalı");

        let plain = BilingualText::plain("Injector leak");
        assert_eq!(plain.preferred(), "Injector leak");
        assert!(!plain.is_empty());
        assert!(BilingualText::default().is_empty());
    }

    #[test]
    fn test_result_serializes_camel_case() {
        let result = AnalysisResult {
            is_within_base_warranty: true,
            ..Default::default()
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["isWithinBaseWarranty"], true);
        assert_eq!(json["contractDecision"], "NO_CONTRACT_COVERAGE");
        assert_eq!(json["warrantyDecision"], "ADDITIONAL_INFO_REQUIRED");
    }

    #[test]
    fn test_case_title_fills_missing_fields() {
        let result = AnalysisResult {
            case_number: "IZE26006539".to_string(),
            ..Default::default()
        };
        assert_eq!(result.case_title(), "IZE26006539 - N/A - N/A");
    }
}
