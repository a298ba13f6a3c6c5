//! Ordered provider failover for a single prompt.
//!
//! The gateway owns the configured backends in priority order. One call to
//! [`ProviderGateway::invoke`] tries each backend once, in order, and
//! returns the first reply. It never retries a backend within a call;
//! escalation to a smaller prompt belongs to the analyzer.

use std::sync::Arc;

use claimdesk_core::PromptPayload;

use crate::config::ProviderEntry;
use crate::providers::{
    ChatMessage, CompletionConfig, LlmProvider, ProviderError, ProviderRegistry, TokenUsage,
};
use crate::AnalysisError;

/// A backend together with the request settings used for it.
#[derive(Clone)]
pub struct ProviderSlot {
    pub provider: Arc<dyn LlmProvider>,
    pub completion: CompletionConfig,
}

impl ProviderSlot {
    pub fn new(provider: Arc<dyn LlmProvider>, completion: CompletionConfig) -> Self {
        Self {
            provider,
            completion,
        }
    }
}

impl std::fmt::Debug for ProviderSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSlot")
            .field("provider", &self.provider.name())
            .field("model", &self.completion.model)
            .finish()
    }
}

/// The first successful reply of an [`ProviderGateway::invoke`] call.
#[derive(Debug, Clone)]
pub struct ProviderReply {
    /// Raw model output
    pub content: String,

    /// Name of the backend that answered
    pub provider: String,

    /// Model reported by the backend
    pub model: String,

    pub usage: TokenUsage,

    /// Generation stopped at the output-token cap, so the content is
    /// probably incomplete JSON
    pub truncated: bool,

    /// Attempts made in this call, including the successful one
    pub attempts: u32,
}

/// Every backend failed for one prompt.
#[derive(Debug)]
pub struct LevelFailure {
    pub attempts: u32,

    /// Error from the last backend tried
    pub last: ProviderError,
}

/// Configured backends in priority order.
#[derive(Debug, Clone)]
pub struct ProviderGateway {
    slots: Vec<ProviderSlot>,
}

impl ProviderGateway {
    /// Gateway over explicit slots.
    ///
    /// Fails with [`AnalysisError::Configuration`] when `slots` is empty.
    pub fn from_slots(slots: Vec<ProviderSlot>) -> Result<Self, AnalysisError> {
        if slots.is_empty() {
            return Err(AnalysisError::Configuration(
                "no LLM provider is configured".to_string(),
            ));
        }
        Ok(Self { slots })
    }

    /// Build slots from provider entries through the registry.
    ///
    /// An unknown provider type is a configuration error. An entry whose
    /// backend reports `NotConfigured` (usually a missing credential) is
    /// skipped with a warning.
    pub fn from_config(
        registry: &ProviderRegistry,
        entries: &[ProviderEntry],
        temperature: f32,
    ) -> Result<Self, AnalysisError> {
        let mut slots = Vec::with_capacity(entries.len());

        for entry in entries {
            let factory = registry
                .factory(&entry.provider_type)
                .map_err(|e| AnalysisError::Configuration(e.to_string()))?;

            match factory.create(&entry.settings_json()) {
                Ok(provider) => {
                    let completion = entry.completion_config(factory.default_model(), temperature);
                    tracing::debug!(
                        provider = provider.name(),
                        model = %completion.model,
                        "Provider configured"
                    );
                    slots.push(ProviderSlot::new(provider, completion));
                }
                Err(ProviderError::NotConfigured(reason)) => {
                    tracing::warn!(
                        provider = %entry.provider_type,
                        reason = %reason,
                        "Skipping provider"
                    );
                }
                Err(e) => return Err(AnalysisError::Configuration(e.to_string())),
            }
        }

        Self::from_slots(slots)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Send one prompt to each backend in order until one answers.
    ///
    /// Every backend is tried at most once, so a call makes at most
    /// [`len`](Self::len) attempts.
    pub async fn invoke(
        &self,
        prompt: &PromptPayload,
        max_output_tokens: u32,
    ) -> Result<ProviderReply, LevelFailure> {
        let mut attempts = 0u32;
        let mut last = None;

        for slot in &self.slots {
            attempts += 1;
            let provider = slot.provider.name();
            let config = slot.completion.with_max_tokens(max_output_tokens);
            let messages = vec![
                ChatMessage::system(prompt.system_instruction.as_str()),
                ChatMessage::user(prompt.user_prompt.as_str()),
            ];

            let outcome =
                match tokio::time::timeout(config.timeout, slot.provider.complete(messages, &config))
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(_) => Err(ProviderError::Timeout(config.timeout)),
                };

            match outcome {
                Ok(response) => {
                    tracing::info!(
                        provider,
                        attempt = attempts,
                        prompt_tokens = response.usage.prompt_tokens,
                        completion_tokens = response.usage.completion_tokens,
                        "Provider replied"
                    );
                    let truncated = response.hit_token_cap();
                    if truncated {
                        tracing::warn!(
                            provider,
                            max_output_tokens,
                            stop_reason = ?response.stop_reason,
                            "Reply cut off at the output-token cap"
                        );
                    }
                    return Ok(ProviderReply {
                        content: response.content,
                        provider: provider.to_string(),
                        model: response.model,
                        usage: response.usage,
                        truncated,
                        attempts,
                    });
                }
                Err(e) if e.is_capacity() => {
                    tracing::warn!(provider, attempt = attempts, error = %e, "Provider over capacity");
                    last = Some(e);
                }
                Err(e) => {
                    tracing::error!(provider, attempt = attempts, error = %e, "Provider call failed");
                    last = Some(e);
                }
            }
        }

        Err(LevelFailure {
            attempts,
            last: last.unwrap_or_else(|| {
                ProviderError::NotConfigured("no LLM provider is configured".to_string())
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedProvider, VALID_REPLY};
    use std::time::Duration;

    fn slot(provider: Arc<ScriptedProvider>) -> ProviderSlot {
        ProviderSlot::new(provider, CompletionConfig::default())
    }

    fn prompt() -> PromptPayload {
        PromptPayload {
            system_instruction: "system".to_string(),
            user_prompt: "CLAIM FILE ANALYSIS REQUEST".to_string(),
        }
    }

    #[test]
    fn test_empty_slots_is_configuration_error() {
        assert!(matches!(
            ProviderGateway::from_slots(Vec::new()),
            Err(AnalysisError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_primary_answers_first() {
        let primary = ScriptedProvider::replying("primary", VALID_REPLY);
        let secondary = ScriptedProvider::replying("secondary", VALID_REPLY);
        let gateway =
            ProviderGateway::from_slots(vec![slot(primary.clone()), slot(secondary.clone())])
                .unwrap();

        let reply = gateway.invoke(&prompt(), 3_000).await.unwrap();
        assert_eq!(reply.provider, "primary");
        assert_eq!(reply.attempts, 1);
        assert_eq!(secondary.calls(), 0);
        assert_eq!(primary.requests.lock().unwrap()[0].0, 3_000);
    }

    #[tokio::test]
    async fn test_falls_over_on_any_error() {
        let primary = ScriptedProvider::new("primary", |_| Err(ProviderError::AuthError));
        let secondary = ScriptedProvider::replying("secondary", VALID_REPLY);
        let gateway =
            ProviderGateway::from_slots(vec![slot(primary.clone()), slot(secondary.clone())])
                .unwrap();

        let reply = gateway.invoke(&prompt(), 4_000).await.unwrap();
        assert_eq!(reply.provider, "secondary");
        assert_eq!(reply.attempts, 2);
        assert_eq!(primary.calls(), 1);
    }

    #[tokio::test]
    async fn test_all_failing_reports_last_error() {
        let primary = ScriptedProvider::rate_limited("primary");
        let secondary = ScriptedProvider::new("secondary", |_| {
            Err(ProviderError::CapacityExceeded("overloaded".to_string()))
        });
        let gateway =
            ProviderGateway::from_slots(vec![slot(primary.clone()), slot(secondary.clone())])
                .unwrap();

        let failure = gateway.invoke(&prompt(), 4_000).await.unwrap_err();
        assert_eq!(failure.attempts, 2);
        assert!(matches!(failure.last, ProviderError::CapacityExceeded(_)));
        assert_eq!(primary.calls(), 1);
        assert_eq!(secondary.calls(), 1);
    }

    #[tokio::test]
    async fn test_cut_off_reply_is_flagged() {
        let capped = ScriptedProvider::cut_off("primary", r#"{"caseNumber": "IZE2600"#);
        let gateway = ProviderGateway::from_slots(vec![slot(capped)]).unwrap();
        let reply = gateway.invoke(&prompt(), 2_000).await.unwrap();
        assert!(reply.truncated);
        assert_eq!(reply.attempts, 1);

        let complete = ScriptedProvider::replying("primary", VALID_REPLY);
        let gateway = ProviderGateway::from_slots(vec![slot(complete)]).unwrap();
        assert!(!gateway.invoke(&prompt(), 2_000).await.unwrap().truncated);
    }

    struct StalledProvider;

    #[async_trait::async_trait]
    impl LlmProvider for StalledProvider {
        async fn complete(
            &self,
            _messages: Vec<ChatMessage>,
            _config: &CompletionConfig,
        ) -> Result<crate::providers::CompletionResponse, ProviderError> {
            tokio::time::sleep(Duration::from_secs(3_600)).await;
            Err(ProviderError::HttpError("unreachable".to_string()))
        }

        fn name(&self) -> &str {
            "stalled"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_timeout_moves_to_next_provider() {
        let stalled = ProviderSlot::new(
            Arc::new(StalledProvider),
            CompletionConfig {
                timeout: Duration::from_secs(5),
                ..Default::default()
            },
        );
        let secondary = ScriptedProvider::replying("secondary", VALID_REPLY);
        let gateway = ProviderGateway::from_slots(vec![stalled, slot(secondary)]).unwrap();

        let reply = gateway.invoke(&prompt(), 4_000).await.unwrap();
        assert_eq!(reply.provider, "secondary");
        assert_eq!(reply.attempts, 2);
    }

    struct KeyedFactory;

    impl crate::providers::ProviderFactory for KeyedFactory {
        fn provider_type(&self) -> &'static str {
            "keyed"
        }

        fn create(
            &self,
            settings: &serde_json::Value,
        ) -> Result<Arc<dyn LlmProvider>, ProviderError> {
            self.validate_config(settings)?;
            Ok(ScriptedProvider::replying("keyed", VALID_REPLY))
        }

        fn validate_config(&self, settings: &serde_json::Value) -> Result<(), ProviderError> {
            match settings.get("api_key") {
                Some(_) => Ok(()),
                None => Err(ProviderError::NotConfigured("api_key missing".to_string())),
            }
        }

        fn default_model(&self) -> &'static str {
            "keyed-1"
        }
    }

    #[test]
    fn test_entries_without_credentials_are_skipped() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(KeyedFactory));

        let entries = vec![
            ProviderEntry::new("keyed"),
            ProviderEntry::new("keyed").with_setting("api_key", "k-test"),
        ];
        let gateway = ProviderGateway::from_config(&registry, &entries, 0.1).unwrap();
        assert_eq!(gateway.len(), 1);
        assert_eq!(gateway.slots[0].completion.model, "keyed-1");

        let only_missing = vec![ProviderEntry::new("keyed")];
        assert!(matches!(
            ProviderGateway::from_config(&registry, &only_missing, 0.1),
            Err(AnalysisError::Configuration(_))
        ));
    }

    #[test]
    fn test_unknown_provider_type_is_fatal() {
        let registry = ProviderRegistry::new();
        let entries = vec![ProviderEntry::new("gemini")];
        assert!(matches!(
            ProviderGateway::from_config(&registry, &entries, 0.1),
            Err(AnalysisError::Configuration(_))
        ));
    }
}
