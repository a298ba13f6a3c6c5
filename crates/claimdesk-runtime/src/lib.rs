//! # claimdesk-runtime
//!
//! LLM-backed warranty claim analysis.
//!
//! This crate drives the deterministic pieces of `claimdesk-core` against
//! real model backends:
//! - Ordered provider failover (OpenAI first, Anthropic second by default)
//! - Budget escalation: every retry sends a strictly smaller prompt
//! - An estimated input-token ceiling per request
//! - Per-analysis usage and cost accounting
//!
//! ## Important
//!
//! Model output is never trusted as-is. Every reply passes through
//! `claimdesk_core::finalize_reply`, which validates the JSON, enforces the
//! coverage policy and renders the email draft before a result leaves this
//! crate.
//!
//! ## Example
//!
//! ```rust,ignore
//! use claimdesk_core::{DefaultRuleSet, RuleBook};
//! use claimdesk_runtime::{DocumentAnalyzer, ProviderRegistry, RuntimeConfig};
//!
//! let config = RuntimeConfig::from_path("claimdesk.yaml")?;
//! let analyzer = DocumentAnalyzer::from_config(config, &ProviderRegistry::with_defaults())?;
//!
//! let book = RuleBook::from_path("rules.yaml")?.or_default_warranty();
//! let result = analyzer.analyze(&document_text, &book).await?;
//! println!("{}", result.contract_decision.as_str());
//! ```

use claimdesk_core::NormalizeError;
use thiserror::Error;

pub mod analyzer;
pub mod config;
pub mod gateway;
pub mod providers;
pub mod resilience;

#[cfg(test)]
mod testing;

pub use analyzer::{level_prompt, AnalysisReport, DocumentAnalyzer, DocumentAnalyzerBuilder};
pub use config::{ConfigError, ProviderEntry, RuntimeConfig};
pub use gateway::{LevelFailure, ProviderGateway, ProviderReply, ProviderSlot};
pub use providers::{
    ApiCredential, CompletionConfig, LlmProvider, ProviderError, ProviderFactory,
    ProviderRegistry, TokenUsage,
};
pub use resilience::{BudgetLevel, BudgetSchedule, LlmUsage};

/// Errors from a document analysis.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// No usable provider or an invalid configuration. Raised before any
    /// network call.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Document too short to analyze: {chars} characters, need at least {min}")]
    InsufficientText { chars: usize, min: usize },

    /// The model answered, but not with a usable analysis. Never retried.
    #[error("Malformed model response: {0}")]
    MalformedResponse(#[from] NormalizeError),

    #[error("All {attempts} provider attempts failed, last error: {last}")]
    ResourceExhausted {
        attempts: u32,
        #[source]
        last: ProviderError,
    },
}

impl From<ConfigError> for AnalysisError {
    fn from(err: ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let short = AnalysisError::InsufficientText { chars: 12, min: 50 };
        assert_eq!(
            short.to_string(),
            "Document too short to analyze: 12 characters, need at least 50"
        );

        let exhausted = AnalysisError::ResourceExhausted {
            attempts: 6,
            last: ProviderError::RateLimited { retry_after: None },
        };
        assert!(exhausted.to_string().starts_with("All 6 provider attempts failed"));
        assert!(std::error::Error::source(&exhausted).is_some());
    }

    #[test]
    fn test_config_error_converts() {
        let err: AnalysisError = ConfigError::Invalid("providers: []".to_string()).into();
        assert!(matches!(err, AnalysisError::Configuration(_)));
    }
}
