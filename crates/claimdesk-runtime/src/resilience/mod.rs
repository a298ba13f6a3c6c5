//! Resilience pieces for claimdesk-runtime.
//!
//! This module provides:
//! - Budget levels that shrink the prompt on every escalation
//! - Token estimation against an input ceiling
//! - Per-analysis usage accounting

mod budget;
mod usage;

pub use budget::{
    chars_for_tokens, estimate_tokens, BudgetError, BudgetLevel, BudgetSchedule, MAX_LEVELS,
    MIN_LEVELS,
};
pub use usage::LlmUsage;
