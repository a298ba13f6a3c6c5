//! # claimdesk-core
//!
//! Deterministic building blocks for warranty claim analysis.
//!
//! This crate turns a claim document and a rule book into a bounded model
//! prompt, and a model reply back into a trusted decision record:
//! - Which lines of the document matter most?
//! - Which rules apply to it?
//! - Does the model's contract decision survive the coverage policy?
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same input always produces same output
//! 2. **No LLM calls**: Provider access lives in `claimdesk-runtime`
//! 3. **Bounded**: Prompt sections never exceed their character limits
//! 4. **Policy last**: Every finished result has passed `policy::enforce`
//!
//! ## Example
//!
//! ```rust,ignore
//! use claimdesk_core::{compose_prompt, finalize_reply, EmailLanguage, RuleBook};
//!
//! let book = RuleBook::from_yaml(&rules_yaml)?.or_default_warranty();
//! let prompt = compose_prompt(&book, &document, 4_000, 12_000, 5);
//! // ... send `prompt` to a model ...
//! let result = finalize_reply(&reply, EmailLanguage::Turkish)?;
//! println!("{}: {}", result.case_title(), result.contract_decision.as_str());
//! ```

pub mod email;
pub mod normalizer;
pub mod patterns;
pub mod policy;
pub mod prioritizer;
pub mod prompt;
pub mod rules;
pub mod text;
pub mod types;

// Re-export main types at crate root
pub use email::{EmailDraft, EmailLanguage};
pub use normalizer::{parse_response, NormalizeError};
pub use policy::{enforce, enforce_with_outcome, PolicyOutcome};
pub use prioritizer::{prioritize, ScoredLine, TRUNCATION_MARKER};
pub use prompt::PromptBuilder;
pub use rules::{
    select_rules, DefaultRuleSet, Rule, RuleBook, RuleBookError, SelectedRule, SelectedRules,
};
pub use types::{
    AnalysisResult, BilingualText, ContractDecision, PartReplaced, PromptPayload,
    WarrantyDecision,
};

/// Build the prompt for one budget level.
///
/// Rules are selected against the full document; only the document copy
/// placed in the prompt is compacted.
pub fn compose_prompt(
    book: &RuleBook,
    raw_text: &str,
    rules_char_limit: usize,
    document_char_limit: usize,
    max_rules: usize,
) -> PromptPayload {
    let rules = SelectedRules::select(book, raw_text, rules_char_limit, max_rules);
    let compact = prioritize(raw_text, document_char_limit);
    PromptBuilder::build(&rules, &compact)
}

/// Turn a model reply into a finished result.
///
/// The reply is parsed, the coverage policy is enforced against the
/// failure cause and complaint, and the email draft is rendered from the
/// corrected fields.
pub fn finalize_reply(
    raw_reply: &str,
    language: EmailLanguage,
) -> Result<AnalysisResult, NormalizeError> {
    let parsed = parse_response(raw_reply)?;
    let cause = parsed.failure_cause_text();
    let mut result = enforce(parsed, &cause);
    EmailDraft::render(&result, language).apply(&mut result);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULES: &str = r#"
warranty:
  - version: "2024.1"
    text: "MHDV: 12 months base warranty. Powertrain components: +12 months."
    keywords: ["MHDV", "powertrain"]
contracts:
  - package_name: "PERFORMANCE REFERENCE"
    items: ["Turbo", "Injector"]
    keywords: ["turbo"]
"#;

    #[test]
    fn test_compose_prompt_respects_document_limit() {
        let book = RuleBook::from_yaml(RULES).unwrap();
        let mut document = String::from("IZE26006539\nVIN VF611A165KD000123\n");
        for i in 0..500 {
            document.push_str(&format!("narrative filler sentence number {}\n", i));
        }
        let small = compose_prompt(&book, &document, 1_200, 1_000, 2);
        let large = compose_prompt(&book, &document, 4_000, 12_000, 5);
        assert!(small.user_prompt.contains("VIN VF611A165KD000123"));
        assert!(small.user_prompt.contains("Package: PERFORMANCE REFERENCE"));
        assert!(small.total_chars() < large.total_chars());
    }

    #[test]
    fn test_finalize_reply_enforces_then_renders() {
        let reply = r#"{
            "caseNumber": "IZE26006539",
            "company": "Spedition Muster GmbH",
            "isWithinBaseWarranty": false,
            "hasActiveContract": true,
            "contractPackageName": "PERFORMANCE REFERENCE",
            "contractDecision": "CONTRACT_COVERED",
            "contractCoveredParts": ["Turbo"],
            "failureCause": {"original": "Unfallschaden am Turbolader", "translated": "Kaza sonrası turbo hasarı"},
            "emailSubject": "model wrote this"
        }"#;
        let result = finalize_reply(reply, EmailLanguage::Turkish).unwrap();
        assert_eq!(result.contract_decision, ContractDecision::NoContractCoverage);
        assert!(!result.has_active_contract);
        assert!(result.email_subject.ends_with("Spedition - Yurtdışı Dosyası Hk."));
    }

    #[test]
    fn test_finalize_reply_rejects_prose() {
        let err = finalize_reply("I could not read the file.", EmailLanguage::English);
        assert!(matches!(err, Err(NormalizeError::Json(_))));
    }
}
