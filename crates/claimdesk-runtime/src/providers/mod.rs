//! LLM Provider abstractions for claimdesk-runtime.
//!
//! This module defines the trait every model backend implements, plus the
//! OpenAI (primary) and Anthropic (secondary) backends behind their cargo
//! features.
//!
//! ## Security
//!
//! All providers use the [`secrets`] module for credential handling.
//! Keys are read through [`ApiCredential`] and never logged.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

mod factory;
pub mod secrets;

#[cfg(feature = "anthropic")]
mod anthropic;
#[cfg(feature = "openai")]
mod openai;

pub use factory::{ProviderFactory, ProviderRegistry};
pub use secrets::ApiCredential;

#[cfg(feature = "anthropic")]
pub use anthropic::{AnthropicProvider, AnthropicProviderFactory};
#[cfg(feature = "openai")]
pub use openai::{OpenAiProvider, OpenAiProviderFactory};

/// Why a single model request failed.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Request to model backend failed: {0}")]
    HttpError(String),

    #[error("Rate limited by backend (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Provider capacity exceeded: {0}")]
    CapacityExceeded(String),

    #[error("Backend returned {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Unreadable backend response: {0}")]
    ParseError(String),

    #[error("Backend rejected the API key")]
    AuthError,

    #[error("No response within {0:?}")]
    Timeout(Duration),

    #[error("Provider unavailable: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    /// Rate-limit or capacity class: the request may succeed elsewhere or
    /// with a smaller prompt.
    pub fn is_capacity(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::CapacityExceeded(_))
    }
}

/// Per-backend request settings. The analyzer overrides `max_tokens`
/// for each budget level.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// Model to use
    pub model: String,

    /// Output-token cap for this request
    pub max_tokens: u32,

    /// Temperature (low for extraction)
    pub temperature: f32,

    /// Request timeout
    pub timeout: Duration,

    /// Ask for a JSON object reply where the backend supports it
    pub json_output: bool,

    /// Mark the system instruction cacheable where supported
    pub prompt_caching: bool,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            max_tokens: 4000,
            temperature: 0.1,
            timeout: Duration::from_secs(60),
            json_output: true,
            prompt_caching: true,
        }
    }
}

impl CompletionConfig {
    /// Same settings with a different output-token cap.
    pub fn with_max_tokens(&self, max_tokens: u32) -> Self {
        Self {
            max_tokens,
            ..self.clone()
        }
    }
}

/// One message of a two-message analysis request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `system` or `user`
    pub role: String,

    /// Message content
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// What a backend returned for one request.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Raw model text, expected to be a JSON object
    pub content: String,

    /// Token usage
    pub usage: TokenUsage,

    /// Model used
    pub model: String,

    /// Why generation stopped, in the backend's own terms
    pub stop_reason: Option<String>,
}

impl CompletionResponse {
    /// Generation ended at the output-token cap (`length` on OpenAI,
    /// `max_tokens` on Anthropic).
    pub fn hit_token_cap(&self) -> bool {
        matches!(self.stop_reason.as_deref(), Some("length" | "max_tokens"))
    }
}

/// Token counts reported by the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    /// Input tokens, cached ones included
    pub prompt_tokens: u32,

    /// Output tokens
    pub completion_tokens: u32,

    /// Input tokens served from a prompt cache
    pub cache_read_tokens: u32,

    /// Input tokens written to a prompt cache
    pub cache_creation_tokens: u32,
}

impl TokenUsage {
    /// Input plus output.
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// A model backend.
///
/// This is the ONLY place where model calls are made. A new backend
/// implements `complete` and registers a [`ProviderFactory`].
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send one request. Implementations must not retry internally; the
    /// gateway decides what happens after a failure.
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError>;

    /// Get provider name for logs and reports.
    fn name(&self) -> &str;
}
