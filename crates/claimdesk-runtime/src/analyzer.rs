//! Budget escalation over the provider gateway.
//!
//! The analyzer implements:
//! - A minimum-text guard before any model call
//! - One prompt per budget level, each smaller than the last
//! - An input-token ceiling enforced by re-compacting the document
//! - Parse, policy and email rendering on the first reply
//!
//! Attempts are strictly sequential: levels × providers at most.

use tracing::Instrument;

use claimdesk_core::text::char_len;
use claimdesk_core::{
    finalize_reply, prioritize, AnalysisResult, PromptBuilder, PromptPayload, RuleBook,
    SelectedRules,
};

use crate::config::RuntimeConfig;
use crate::gateway::{ProviderGateway, ProviderSlot};
use crate::providers::{ProviderError, ProviderRegistry};
use crate::resilience::{chars_for_tokens, estimate_tokens, BudgetLevel, LlmUsage};
use crate::AnalysisError;

/// A finished analysis with how it was obtained.
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub result: AnalysisResult,

    /// Index of the budget level that produced the reply (0 = most generous)
    pub level: usize,

    /// Backend that answered
    pub provider: String,

    /// Attempts across all levels, including the successful one
    pub attempts: u32,

    pub usage: LlmUsage,
}

/// Runs claim documents through the budget levels and the gateway.
///
/// Holds only immutable state; one analyzer can serve concurrent
/// `analyze` calls.
#[derive(Debug, Clone)]
pub struct DocumentAnalyzer {
    gateway: ProviderGateway,
    config: RuntimeConfig,
}

impl DocumentAnalyzer {
    pub fn new(gateway: ProviderGateway, config: RuntimeConfig) -> Self {
        Self { gateway, config }
    }

    /// Build the gateway from `config.providers` through `registry`.
    pub fn from_config(
        config: RuntimeConfig,
        registry: &ProviderRegistry,
    ) -> Result<Self, AnalysisError> {
        let gateway =
            ProviderGateway::from_config(registry, &config.providers, config.temperature)?;
        Ok(Self::new(gateway, config))
    }

    pub fn builder() -> DocumentAnalyzerBuilder {
        DocumentAnalyzerBuilder::new()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn gateway(&self) -> &ProviderGateway {
        &self.gateway
    }

    /// Analyze a document, returning only the result.
    pub async fn analyze(
        &self,
        raw_text: &str,
        book: &RuleBook,
    ) -> Result<AnalysisResult, AnalysisError> {
        self.analyze_with_report(raw_text, book)
            .await
            .map(|report| report.result)
    }

    /// Analyze a document and report the level, backend, attempts and usage.
    pub async fn analyze_with_report(
        &self,
        raw_text: &str,
        book: &RuleBook,
    ) -> Result<AnalysisReport, AnalysisError> {
        let chars = char_len(raw_text.trim());
        if chars < self.config.min_document_chars {
            return Err(AnalysisError::InsufficientText {
                chars,
                min: self.config.min_document_chars,
            });
        }

        let mut usage = LlmUsage::default();
        let mut attempts = 0u32;
        let mut last: Option<ProviderError> = None;

        for (index, level) in self.config.budgets.levels().iter().enumerate() {
            let span = tracing::info_span!("budget_level", level = index);
            let prompt = span.in_scope(|| self.prompt_for_level(raw_text, book, level));

            match self
                .gateway
                .invoke(&prompt, level.max_output_tokens)
                .instrument(span)
                .await
            {
                Ok(reply) => {
                    attempts += reply.attempts;
                    usage.add(&reply.usage, &reply.model);

                    let result = finalize_reply(&reply.content, self.config.email_language)
                        .inspect_err(|_| {
                            if reply.truncated {
                                tracing::error!(
                                    level = index,
                                    provider = %reply.provider,
                                    max_output_tokens = level.max_output_tokens,
                                    "Unusable reply was cut off at the output-token cap"
                                );
                            }
                        })?;

                    tracing::info!(
                        level = index,
                        provider = %reply.provider,
                        attempts,
                        case = %result.case_number,
                        "Analysis completed"
                    );
                    return Ok(AnalysisReport {
                        result,
                        level: index,
                        provider: reply.provider,
                        attempts,
                        usage,
                    });
                }
                Err(failure) => {
                    attempts += failure.attempts;
                    tracing::warn!(
                        level = index,
                        attempts,
                        error = %failure.last,
                        "Every provider failed at this budget level"
                    );
                    last = Some(failure.last);
                }
            }
        }

        Err(AnalysisError::ResourceExhausted {
            attempts,
            last: last.unwrap_or_else(|| {
                ProviderError::NotConfigured("budget schedule has no levels".to_string())
            }),
        })
    }

    /// The prompt sent at one budget level. See [`level_prompt`].
    pub fn prompt_for_level(
        &self,
        raw_text: &str,
        book: &RuleBook,
        level: &BudgetLevel,
    ) -> PromptPayload {
        level_prompt(&self.config, raw_text, book, level)
    }
}

/// Build the prompt for one budget level without any provider.
///
/// When the estimate exceeds `config.max_input_tokens`, the document is
/// compacted again into whatever the system instruction and rule text
/// leave over.
pub fn level_prompt(
    config: &RuntimeConfig,
    raw_text: &str,
    book: &RuleBook,
    level: &BudgetLevel,
) -> PromptPayload {
    let divisor = config.token_divisor;
    let rules = SelectedRules::select(book, raw_text, level.rules_char_limit, level.max_rules);
    let compact = prioritize(raw_text, level.document_char_limit);
    let payload = PromptBuilder::build(&rules, &compact);

    let estimated_tokens = estimate_tokens(payload.total_chars(), divisor);
    if estimated_tokens <= config.max_input_tokens {
        tracing::debug!(
            estimated_tokens,
            rule_chars = rules.total_chars(),
            document_chars = char_len(&compact),
            "Prompt built"
        );
        return payload;
    }

    let allowance = chars_for_tokens(config.max_input_tokens, divisor);
    let remaining = allowance
        .saturating_sub(PromptBuilder::overhead_chars(&rules))
        .min(level.document_char_limit);
    let compact = prioritize(raw_text, remaining);
    let payload = PromptBuilder::build(&rules, &compact);

    tracing::warn!(
        estimated_tokens,
        max_input_tokens = config.max_input_tokens,
        shrunk_tokens = estimate_tokens(payload.total_chars(), divisor),
        document_chars = char_len(&compact),
        "Prompt over input ceiling, document compacted further"
    );
    payload
}

/// Builder for DocumentAnalyzer.
pub struct DocumentAnalyzerBuilder {
    slots: Vec<ProviderSlot>,
    config: RuntimeConfig,
}

impl DocumentAnalyzerBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            config: RuntimeConfig::default(),
        }
    }

    /// Append a backend; earlier slots are tried first.
    pub fn slot(mut self, slot: ProviderSlot) -> Self {
        self.slots.push(slot);
        self
    }

    /// Set the configuration.
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the analyzer.
    pub fn build(self) -> Result<DocumentAnalyzer, AnalysisError> {
        let gateway = ProviderGateway::from_slots(self.slots)?;
        Ok(DocumentAnalyzer::new(gateway, self.config))
    }
}

impl Default for DocumentAnalyzerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::CompletionConfig;
    use crate::testing::{sample_document, ScriptedProvider, VALID_REPLY};
    use claimdesk_core::{ContractDecision, NormalizeError, Rule};
    use std::sync::Arc;

    fn slot(provider: &Arc<ScriptedProvider>) -> ProviderSlot {
        ProviderSlot::new(provider.clone(), CompletionConfig::default())
    }

    fn analyzer(providers: &[&Arc<ScriptedProvider>]) -> DocumentAnalyzer {
        providers
            .iter()
            .fold(DocumentAnalyzer::builder(), |b, p| b.slot(slot(p)))
            .build()
            .unwrap()
    }

    fn book() -> RuleBook {
        RuleBook::new(
            vec![Rule::new(
                "2.1",
                "Turbocharger failures within 2 years are covered.",
                ["turbo", "Turbolader"],
            )],
            vec![Rule::new(
                "PERFORMANCE REFERENCE",
                "Covered items: Turbo, Injector",
                ["turbo"],
            )],
        )
    }

    #[tokio::test]
    async fn test_primary_rate_limited_secondary_answers_at_first_level() {
        let primary = ScriptedProvider::rate_limited("openai");
        let secondary = ScriptedProvider::replying("anthropic", VALID_REPLY);
        let analyzer = analyzer(&[&primary, &secondary]);

        let report = analyzer
            .analyze_with_report(&sample_document(), &book())
            .await
            .unwrap();

        assert_eq!(report.level, 0);
        assert_eq!(report.provider, "anthropic");
        assert_eq!(report.attempts, 2);
        assert_eq!(primary.calls(), 1);
        assert_eq!(secondary.calls(), 1);
        assert_eq!(report.usage.llm_calls, 1);
        assert_eq!(report.result.case_number, "IZE26006539");
    }

    #[tokio::test]
    async fn test_all_failing_exhausts_every_level() {
        let primary = ScriptedProvider::rate_limited("openai");
        let secondary = ScriptedProvider::new("anthropic", |_| {
            Err(ProviderError::CapacityExceeded("prompt is too long".to_string()))
        });
        let analyzer = analyzer(&[&primary, &secondary]);
        let levels = analyzer.config().budgets.len() as u32;

        let err = analyzer.analyze(&sample_document(), &book()).await.unwrap_err();

        match err {
            AnalysisError::ResourceExhausted { attempts, last } => {
                assert_eq!(attempts, levels * 2);
                assert!(matches!(last, ProviderError::CapacityExceeded(_)));
            }
            other => panic!("Expected ResourceExhausted, got {other:?}"),
        }
        assert_eq!(primary.calls(), levels);
        assert_eq!(secondary.calls(), levels);
    }

    #[tokio::test]
    async fn test_levels_send_shrinking_requests() {
        let primary = ScriptedProvider::rate_limited("openai");
        let analyzer = analyzer(&[&primary]);

        let _ = analyzer.analyze(&sample_document(), &book()).await;

        let requests = primary.requests.lock().unwrap().clone();
        assert_eq!(requests.len(), 3);
        for pair in requests.windows(2) {
            assert!(pair[1].0 < pair[0].0, "max tokens must shrink");
            assert!(pair[1].1 < pair[0].1, "user prompt must shrink");
        }
    }

    #[tokio::test]
    async fn test_success_at_second_level() {
        let primary = ScriptedProvider::new("openai", |call| match call {
            0 => Err(ProviderError::RateLimited { retry_after: None }),
            _ => Ok(VALID_REPLY.to_string()),
        });
        let analyzer = analyzer(&[&primary]);

        let report = analyzer
            .analyze_with_report(&sample_document(), &book())
            .await
            .unwrap();
        assert_eq!(report.level, 1);
        assert_eq!(report.attempts, 2);
    }

    #[tokio::test]
    async fn test_short_document_rejected_before_any_call() {
        let primary = ScriptedProvider::replying("openai", VALID_REPLY);
        let analyzer = analyzer(&[&primary]);

        let err = analyzer.analyze("   IZE123   ", &book()).await.unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::InsufficientText { chars: 6, min: 50 }
        ));
        assert_eq!(primary.calls(), 0);
    }

    #[tokio::test]
    async fn test_malformed_reply_is_not_retried() {
        let primary = ScriptedProvider::replying("openai", "I could not read the document.");
        let secondary = ScriptedProvider::replying("anthropic", VALID_REPLY);
        let analyzer = analyzer(&[&primary, &secondary]);

        let err = analyzer.analyze(&sample_document(), &book()).await.unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::MalformedResponse(NormalizeError::Json(_))
        ));
        assert_eq!(primary.calls(), 1);
        assert_eq!(secondary.calls(), 0);
    }

    #[tokio::test]
    async fn test_cut_off_reply_is_malformed_and_not_retried() {
        let primary = ScriptedProvider::cut_off("openai", r#"{"caseNumber": "IZE26006539", "vin": "VF6"#);
        let secondary = ScriptedProvider::replying("anthropic", VALID_REPLY);
        let analyzer = analyzer(&[&primary, &secondary]);

        let err = analyzer.analyze(&sample_document(), &book()).await.unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::MalformedResponse(NormalizeError::Json(_))
        ));
        assert_eq!(primary.calls(), 1);
        assert_eq!(secondary.calls(), 0);
    }

    #[tokio::test]
    async fn test_policy_and_email_applied_to_reply() {
        let reply = VALID_REPLY.replace(
            r#""isWithinBaseWarranty": false"#,
            r#""isWithinBaseWarranty": true"#,
        );
        let primary = ScriptedProvider::replying("openai", &reply);
        let analyzer = analyzer(&[&primary]);

        let result = analyzer.analyze(&sample_document(), &book()).await.unwrap();
        assert_eq!(result.contract_decision, ContractDecision::NoContractCoverage);
        assert!(!result.has_active_contract);
        assert!(result.contract_covered_parts.is_empty());
        assert!(result.email_subject.starts_with("IZE26006539 - VF611A165KD000123"));
        assert!(!result.email_body.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_analyses_share_one_analyzer() {
        let primary = ScriptedProvider::replying("openai", VALID_REPLY);
        let analyzer = Arc::new(analyzer(&[&primary]));
        let book = Arc::new(book());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let analyzer = analyzer.clone();
                let book = book.clone();
                tokio::spawn(async move { analyzer.analyze(&sample_document(), &book).await })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
        assert_eq!(primary.calls(), 4);
    }

    #[test]
    fn test_prompt_respects_input_ceiling() {
        let primary = ScriptedProvider::replying("openai", VALID_REPLY);
        let config = RuntimeConfig {
            max_input_tokens: 3_000,
            ..RuntimeConfig::default()
        };
        let analyzer = DocumentAnalyzer::builder()
            .slot(slot(&primary))
            .config(config)
            .build()
            .unwrap();

        let level = analyzer.config().budgets.levels()[0];
        let prompt = analyzer.prompt_for_level(&sample_document(), &book(), &level);

        assert!(estimate_tokens(prompt.total_chars(), 3.2) <= 3_000);
        assert!(prompt.user_prompt.contains("IZE26006539"));
    }

    #[test]
    fn test_prompt_under_ceiling_is_untouched() {
        let primary = ScriptedProvider::replying("openai", VALID_REPLY);
        let analyzer = analyzer(&[&primary]);
        let level = analyzer.config().budgets.levels()[0];

        let doc = sample_document();
        let prompt = analyzer.prompt_for_level(&doc, &book(), &level);
        assert_eq!(
            prompt,
            claimdesk_core::compose_prompt(
                &book(),
                &doc,
                level.rules_char_limit,
                level.document_char_limit,
                level.max_rules
            )
        );
    }

    #[test]
    fn test_builder_without_slots_fails() {
        assert!(matches!(
            DocumentAnalyzer::builder().build(),
            Err(AnalysisError::Configuration(_))
        ));
    }
}
