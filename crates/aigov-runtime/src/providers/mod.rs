//! LLM provider abstractions.
//!
//! A provider is a chat-completion backend with usage accounting. The
//! analyzer and recommender never talk to providers directly: they go
//! through the [`Oracle`](crate::oracle::Oracle) capability, and
//! [`ProviderOracle`](crate::oracle::ProviderOracle) adapts a provider into
//! one.
//!
//! ## Security
//!
//! API keys are held in [`ApiCredential`] and never appear in Debug or
//! Display output.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

mod factory;
pub mod secrets;

#[cfg(feature = "anthropic")]
mod anthropic;

pub use factory::{ProviderFactory, ProviderRegistry};
pub use secrets::{ApiCredential, CredentialSource};

#[cfg(feature = "anthropic")]
pub use anthropic::{AnthropicProvider, AnthropicProviderFactory};

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider transport failed: {0}")]
    HttpError(String),

    #[error("Provider rate-limited the request (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Provider returned {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Unreadable provider response: {0}")]
    ParseError(String),

    #[error("Provider did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Provider misconfigured: {0}")]
    NotConfigured(String),
}

/// Settings for one completion request.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub model: String,
    pub max_tokens: u32,

    /// Sampling temperature; low values keep replies parseable
    pub temperature: f32,

    pub timeout: Duration,

    /// Mark prompt blocks cacheable (Anthropic-specific)
    pub prompt_caching: bool,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-5-20250514".to_string(),
            max_tokens: 300,
            temperature: 0.2,
            timeout: Duration::from_secs(15),
            prompt_caching: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// "system" or "user"; oracle prompts never send assistant turns
    pub role: String,
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

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub usage: TokenUsage,
    pub model: String,
    pub stop_reason: Option<String>,
}

/// Tokens billed for one completion.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// A chat-completion backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError>;

    /// Whether the provider has what it needs to make calls.
    async fn health_check(&self) -> bool;

    fn name(&self) -> &str;

    /// Rough token estimate, ~4 characters per token.
    fn estimate_tokens(&self, text: &str) -> u32 {
        (text.len() / 4) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_message_roles() {
        assert_eq!(ChatMessage::system("rules").role, "system");
        assert_eq!(ChatMessage::user("proposal").role, "user");
    }

    #[test]
    fn test_token_usage_total() {
        let usage = TokenUsage {
            prompt_tokens: 120,
            completion_tokens: 8,
        };
        assert_eq!(usage.total(), 128);
    }

    #[test]
    fn test_default_completion_config_is_short() {
        let config = CompletionConfig::default();
        assert!(config.max_tokens <= 500);
        assert_eq!(config.timeout, Duration::from_secs(15));
    }
}
