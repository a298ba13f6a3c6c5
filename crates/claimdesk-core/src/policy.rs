//! Policy Enforcer: deterministic contract-coverage corrections.
//!
//! The model's contract fields are not trusted. Rules, in order:
//! 1. Claim inside base warranty → no contract coverage
//! 2. Failure caused by external damage → no contract coverage
//! 3. Otherwise the model's contract fields stand
//!
//! A `CONTRACT_COVERED` decision without an active contract is downgraded
//! in every case, so a covered contract decision always implies an active
//! contract, no base warranty and no external damage.

use crate::patterns::mentions_external_damage;
use crate::types::{AnalysisResult, ContractDecision};

/// Which policy rule decided the contract fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyOutcome {
    /// Model output kept as returned
    Unchanged,
    /// Cleared because the claim is inside base warranty
    WithinBaseWarranty,
    /// Cleared because the failure was externally caused
    ExternalDamage,
    /// Covered decision downgraded for lack of an active contract
    NoActiveContract,
}

impl PolicyOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unchanged => "unchanged",
            Self::WithinBaseWarranty => "within_base_warranty",
            Self::ExternalDamage => "external_damage",
            Self::NoActiveContract => "no_active_contract",
        }
    }
}

/// Apply the contract policy to a parsed result.
pub fn enforce(result: AnalysisResult, failure_cause_text: &str) -> AnalysisResult {
    enforce_with_outcome(result, failure_cause_text).0
}

/// Apply the contract policy and report which rule fired.
pub fn enforce_with_outcome(
    mut result: AnalysisResult,
    failure_cause_text: &str,
) -> (AnalysisResult, PolicyOutcome) {
    let outcome = if result.is_within_base_warranty {
        clear_contract(&mut result);
        PolicyOutcome::WithinBaseWarranty
    } else if mentions_external_damage(failure_cause_text) {
        clear_contract(&mut result);
        PolicyOutcome::ExternalDamage
    } else if result.contract_decision == ContractDecision::ContractCovered
        && !result.has_active_contract
    {
        result.contract_decision = ContractDecision::NoContractCoverage;
        PolicyOutcome::NoActiveContract
    } else {
        PolicyOutcome::Unchanged
    };

    if outcome != PolicyOutcome::Unchanged {
        tracing::debug!(
            case_number = %result.case_number,
            outcome = outcome.as_str(),
            "Contract policy applied"
        );
    }

    (result, outcome)
}

/// Reset every contract field to "no contract".
pub fn clear_contract(result: &mut AnalysisResult) {
    result.has_active_contract = false;
    result.contract_package_name = None;
    result.contract_decision = ContractDecision::NoContractCoverage;
    result.contract_covered_parts.clear();
}
