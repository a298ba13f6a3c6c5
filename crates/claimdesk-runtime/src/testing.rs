//! Scripted providers for unit tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::providers::{
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError, TokenUsage,
};

type Script = Box<dyn Fn(u32) -> Result<String, ProviderError> + Send + Sync>;

/// A provider whose reply to the n-th call (0-based) comes from a script.
pub struct ScriptedProvider {
    name: String,
    calls: AtomicU32,
    script: Script,
    stop_reason: String,
    /// `(max_tokens, user prompt chars)` per call
    pub requests: Mutex<Vec<(u32, usize)>>,
}

impl ScriptedProvider {
    pub fn new(
        name: &str,
        script: impl Fn(u32) -> Result<String, ProviderError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            calls: AtomicU32::new(0),
            script: Box::new(script),
            stop_reason: "stop".to_string(),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn replying(name: &str, reply: &str) -> Arc<Self> {
        let reply = reply.to_string();
        Self::new(name, move |_| Ok(reply.clone()))
    }

    /// Replies with `reply` but reports that the output-token cap was hit.
    pub fn cut_off(name: &str, reply: &str) -> Arc<Self> {
        let reply = reply.to_string();
        Arc::new(Self {
            name: name.to_string(),
            calls: AtomicU32::new(0),
            script: Box::new(move |_| Ok(reply.clone())),
            stop_reason: "length".to_string(),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn rate_limited(name: &str) -> Arc<Self> {
        Self::new(name, |_| Err(ProviderError::RateLimited { retry_after: None }))
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let user_chars = messages
            .iter()
            .filter(|m| m.role == "user")
            .map(|m| m.content.chars().count())
            .sum();
        if let Ok(mut requests) = self.requests.lock() {
            requests.push((config.max_tokens, user_chars));
        }

        (self.script)(call).map(|content| CompletionResponse {
            content,
            usage: TokenUsage {
                prompt_tokens: 1_000,
                completion_tokens: 200,
                ..Default::default()
            },
            model: config.model.clone(),
            stop_reason: Some(self.stop_reason.clone()),
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A minimal well-formed analysis reply.
pub const VALID_REPLY: &str = r#"{
  "caseNumber": "IZE26006539",
  "company": "Spedition Muster GmbH",
  "plate": "M-AB 1234",
  "vin": "VF611A165KD000123",
  "warrantyStartDate": "2023-12-22",
  "repairDate": "2025-03-10",
  "repairKm": 123456,
  "isWithinBaseWarranty": false,
  "warrantyDecision": "OUT_OF_COVERAGE",
  "hasActiveContract": true,
  "contractPackageName": "PERFORMANCE REFERENCE",
  "contractDecision": "CONTRACT_COVERED",
  "contractCoveredParts": ["Turbo"],
  "failureCause": {"original": "Turbolader Lagerschaden", "translated": "Turbo yatak hasarı"},
  "operationsPerformed": [{"original": "Turbolader ersetzen", "translated": "Turbo değişimi"}],
  "partsReplaced": [{"partName": "RT 7421000123", "description": "Turbolader", "qty": 1}]
}"#;

/// A claim document long enough to pass the minimum-text guard.
pub fn sample_document() -> String {
    let mut doc = String::from(
        "IZE26006539\n\
         Spedition Muster GmbH\n\
         Fahrgestell-Nr. VF611A165KD000123  Plate M-AB 1234\n\
         Zul. Datum 22.12.2023  Leistungsdatum 10.03.2025  KM 123.456\n\
         WERKSTATTRECHNUNG\n\
         Position 10  RT 7421000123  Turbolader ersetzen\n",
    );
    for i in 0..400 {
        doc.push_str(&format!("Seite {} Allgemeine Geschäftsbedingungen und Hinweise\n", i));
    }
    doc
}
