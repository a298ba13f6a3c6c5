//! Response Normalizer: turns a model reply into an `AnalysisResult`.
//!
//! Models wrap JSON in code fences, mix camelCase with the older snake_case
//! keys, write numbers as `"123.456 km"` and dates in local formats. The
//! normalizer accepts all of that. What it does not accept is a reply that
//! is not a JSON object of the right shape; that is a `NormalizeError` and
//! is never retried.

mod schema;

pub use schema::validate_response_schema;

use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::patterns::{LEGACY_BILINGUAL_PATTERN, NUMBER_PATTERN};
use crate::types::{
    AnalysisResult, BilingualText, ContractDecision, PartReplaced, WarrantyDecision,
    DEFAULT_REQUEST_TYPE,
};

/// Date layouts seen in claim files, tried in order.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y", "%d-%m-%Y"];

/// Errors from normalizing a model reply.
#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("Model reply is empty")]
    Empty,

    #[error("Model reply is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Model reply is not a JSON object")]
    NotAnObject,

    #[error("Model reply failed schema validation: {}", .0.join("; "))]
    Schema(Vec<String>),
}

/// Reply fields as the model wrote them, before coercion.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawAnalysis {
    #[serde(alias = "case_number", alias = "ize_no", alias = "izeNo")]
    case_number: Option<Value>,
    company: Option<Value>,
    plate: Option<Value>,
    vin: Option<Value>,

    #[serde(alias = "warranty_start_date")]
    warranty_start_date: Option<Value>,
    #[serde(alias = "repair_date")]
    repair_date: Option<Value>,
    #[serde(alias = "vehicle_age_months")]
    vehicle_age_months: Option<Value>,
    #[serde(alias = "repair_km")]
    repair_km: Option<Value>,
    #[serde(alias = "request_type")]
    request_type: Option<Value>,

    #[serde(
        alias = "is_within_base_warranty",
        alias = "is_within_2_year_warranty",
        alias = "isWithin2YearWarranty"
    )]
    is_within_base_warranty: Option<Value>,
    #[serde(alias = "warranty_decision")]
    warranty_decision: Option<Value>,
    #[serde(alias = "decision_rationale")]
    decision_rationale: Option<Value>,

    #[serde(alias = "has_active_contract")]
    has_active_contract: Option<Value>,
    #[serde(alias = "contract_package_name")]
    contract_package_name: Option<Value>,
    #[serde(alias = "contract_decision")]
    contract_decision: Option<Value>,
    #[serde(alias = "contract_covered_parts")]
    contract_covered_parts: Option<Value>,

    #[serde(alias = "failure_complaint")]
    failure_complaint: Option<Value>,
    #[serde(alias = "failure_cause")]
    failure_cause: Option<Value>,
    #[serde(alias = "operations_performed")]
    operations_performed: Option<Value>,
    #[serde(alias = "parts_replaced")]
    parts_replaced: Option<Value>,
    #[serde(alias = "repair_process_summary")]
    repair_process_summary: Option<Value>,
}

/// Parse a raw model reply into an `AnalysisResult`.
///
/// Contract fields are taken as the model returned them; the coverage
/// policy has not run yet.
pub fn parse_response(raw: &str) -> Result<AnalysisResult, NormalizeError> {
    let body = strip_code_fences(raw);
    if body.is_empty() {
        return Err(NormalizeError::Empty);
    }

    let value: Value = serde_json::from_str(body)?;
    if !value.is_object() {
        return Err(NormalizeError::NotAnObject);
    }
    validate_response_schema(&value).map_err(NormalizeError::Schema)?;

    let fields: RawAnalysis = serde_json::from_value(value)?;
    Ok(fields.into_result())
}

/// Remove a surrounding ```` ```json ```` or ```` ``` ```` fence.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut body = raw.trim();
    if let Some(rest) = body
        .strip_prefix("```json")
        .or_else(|| body.strip_prefix("```JSON"))
        .or_else(|| body.strip_prefix("```"))
    {
        body = rest;
    }
    if let Some(rest) = body.strip_suffix("```") {
        body = rest;
    }
    body.trim()
}

impl RawAnalysis {
    fn into_result(self) -> AnalysisResult {
        let warranty_start_date = self.warranty_start_date.as_ref().and_then(date);
        let repair_date = self.repair_date.as_ref().and_then(date);

        let mut vehicle_age_months = self
            .vehicle_age_months
            .as_ref()
            .map_or(0, |v| u32::try_from(number(v)).unwrap_or(0));
        if vehicle_age_months == 0 {
            if let (Some(start), Some(repair)) = (warranty_start_date, repair_date) {
                vehicle_age_months = months_between(start, repair);
            }
        }

        let request_type = match self.request_type.as_ref().map(text) {
            Some(t) if !t.is_empty() => t,
            _ => DEFAULT_REQUEST_TYPE.to_string(),
        };

        AnalysisResult {
            case_number: opt_text(&self.case_number),
            company: opt_text(&self.company),
            plate: opt_text(&self.plate),
            vin: opt_text(&self.vin),
            warranty_start_date,
            repair_date,
            vehicle_age_months,
            repair_km: self.repair_km.as_ref().map_or(0, number),
            request_type,
            is_within_base_warranty: flag(&self.is_within_base_warranty),
            warranty_decision: self
                .warranty_decision
                .as_ref()
                .map(|v| WarrantyDecision::parse_lenient(&text(v)))
                .unwrap_or_default(),
            decision_rationale: text_list(&self.decision_rationale),
            has_active_contract: flag(&self.has_active_contract),
            contract_package_name: Some(opt_text(&self.contract_package_name))
                .filter(|name| !name.is_empty()),
            contract_decision: self
                .contract_decision
                .as_ref()
                .map(|v| ContractDecision::parse_lenient(&text(v)))
                .unwrap_or_default(),
            contract_covered_parts: text_list(&self.contract_covered_parts),
            failure_complaint: opt_bilingual(&self.failure_complaint),
            failure_cause: opt_bilingual(&self.failure_cause),
            operations_performed: items(&self.operations_performed)
                .map(bilingual)
                .filter(|op| !op.is_empty())
                .collect(),
            parts_replaced: items(&self.parts_replaced).filter_map(part).collect(),
            repair_process_summary: opt_bilingual(&self.repair_process_summary),
            email_subject: String::new(),
            email_body: String::new(),
        }
    }
}

/// Whole months from `start` to `end`, zero when `end` is earlier.
pub fn months_between(start: NaiveDate, end: NaiveDate) -> u32 {
    let mut months = (end.year() - start.year()) * 12 + end.month() as i32 - start.month() as i32;
    if end.day() < start.day() {
        months -= 1;
    }
    months.max(0) as u32
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

fn opt_text(value: &Option<Value>) -> String {
    value.as_ref().map(text).unwrap_or_default()
}

fn flag(value: &Option<Value>) -> bool {
    matches!(value, Some(Value::Bool(true)))
}

/// Non-negative integer from a number or the first number in a string.
fn number(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Value::String(s) => NUMBER_PATTERN
            .find(s)
            .map(|m| {
                m.as_str()
                    .chars()
                    .filter(char::is_ascii_digit)
                    .collect::<String>()
            })
            .and_then(|digits| digits.parse().ok())
            .unwrap_or(0),
        _ => 0,
    }
}

fn date(value: &Value) -> Option<NaiveDate> {
    let raw = value.as_str()?.trim();
    // ISO timestamps: keep the date part
    let candidates = [raw, raw.get(..10).unwrap_or(raw)];
    candidates.iter().find_map(|candidate| {
        DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(candidate, fmt).ok())
    })
}

fn items(value: &Option<Value>) -> impl Iterator<Item = &Value> {
    value
        .as_ref()
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn text_list(value: &Option<Value>) -> Vec<String> {
    items(value).map(text).filter(|s| !s.is_empty()).collect()
}

fn opt_bilingual(value: &Option<Value>) -> BilingualText {
    value.as_ref().map(bilingual).unwrap_or_default()
}

/// Bilingual text from an `{original, translated}` object or a string.
///
/// Strings in the legacy `Original: ... | TR: ...` form are split into both
/// parts.
fn bilingual(value: &Value) -> BilingualText {
    match value {
        Value::Object(map) => {
            let pick = |keys: &[&str]| {
                keys.iter()
                    .find_map(|k| map.get(*k).map(text))
                    .filter(|s| !s.is_empty())
            };
            BilingualText::new(
                pick(&["original", "text"]).unwrap_or_default(),
                pick(&["translated", "translation", "tr"]),
            )
        }
        Value::String(s) => match LEGACY_BILINGUAL_PATTERN.captures(s) {
            Some(caps) => {
                let translated = caps["translated"].trim();
                BilingualText::new(
                    caps["original"].trim(),
                    Some(translated.to_string()).filter(|t| !t.is_empty()),
                )
            }
            None => BilingualText::plain(s.trim()),
        },
        other => BilingualText::plain(text(other)),
    }
}

fn part(value: &Value) -> Option<PartReplaced> {
    let part = match value {
        Value::Object(map) => {
            let field = |keys: &[&str]| keys.iter().find_map(|k| map.get(*k));
            PartReplaced {
                part_name: field(&["partName", "part_name", "name"])
                    .map(text)
                    .unwrap_or_default(),
                description: field(&["description"]).map(text).unwrap_or_default(),
                qty: field(&["qty", "quantity"]).map_or(1, |v| number(v).max(1) as u32),
            }
        }
        Value::String(s) => PartReplaced {
            part_name: s.trim().to_string(),
            description: String::new(),
            qty: 1,
        },
        _ => return None,
    };

    Some(part).filter(|p| !p.part_name.is_empty())
}
