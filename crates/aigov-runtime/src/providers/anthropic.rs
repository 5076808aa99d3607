//! Anthropic Messages API provider.
//!
//! Compiled only with the `anthropic` feature.

use super::{
    factory::ProviderFactory,
    secrets::{ApiCredential, CredentialSource},
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError, TokenUsage,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;

pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";
const KEY_LABEL: &str = "Anthropic API key";

/// Transport timeout; each request also carries the completion timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

fn base_url_setting(settings: &JsonValue) -> Result<&str, ProviderError> {
    match settings.get("base_url").and_then(JsonValue::as_str) {
        None => Ok(DEFAULT_BASE_URL),
        Some(url) if url.starts_with("http://") || url.starts_with("https://") => Ok(url),
        Some(url) => Err(ProviderError::NotConfigured(format!(
            "base_url '{url}' is not an http(s) URL"
        ))),
    }
}

/// Claude models behind the Messages API.
pub struct AnthropicProvider {
    credential: ApiCredential,
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AnthropicProvider({} via {:?})", self.base_url, self.credential)
    }
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        let credential = ApiCredential::new(api_key, CredentialSource::Programmatic, KEY_LABEL);
        Self::connect(credential, DEFAULT_BASE_URL)
    }

    pub fn from_env() -> Result<Self, ProviderError> {
        Self::connect(ApiCredential::from_env(ANTHROPIC_API_KEY_ENV, KEY_LABEL)?, DEFAULT_BASE_URL)
    }

    /// Build from `provider_config` (`api_key`, `base_url`). The key falls
    /// back to `ANTHROPIC_API_KEY`.
    pub fn from_config(settings: &JsonValue) -> Result<Self, ProviderError> {
        let credential = ApiCredential::from_config_or_env(
            settings,
            "api_key",
            ANTHROPIC_API_KEY_ENV,
            KEY_LABEL,
        )?;
        Self::connect(credential, base_url_setting(settings)?)
    }

    fn connect(credential: ApiCredential, base_url: &str) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::HttpError(e.to_string()))?;

        tracing::debug!(base_url, credential = %credential, "Anthropic provider ready");
        Ok(Self {
            credential,
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<RequestMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct RequestMessage {
    role: String,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        cache_control: Option<CacheControl>,
    },
}

#[derive(Debug, Serialize)]
struct CacheControl {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
    model: String,
    stop_reason: Option<String>,
    usage: ResponseUsage,
}

#[derive(Debug, Deserialize)]
struct ResponseBlock {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

fn build_request(messages: Vec<ChatMessage>, config: &CompletionConfig) -> MessagesRequest {
    let mut system = None;
    let mut turns = Vec::new();

    for msg in messages {
        if msg.role == "system" {
            system = Some(msg.content);
            continue;
        }
        turns.push(RequestMessage {
            role: msg.role,
            content: vec![ContentBlock::Text {
                text: msg.content,
                cache_control: config
                    .prompt_caching
                    .then_some(CacheControl { kind: "ephemeral" }),
            }],
        });
    }

    MessagesRequest {
        model: config.model.clone(),
        max_tokens: config.max_tokens,
        system,
        messages: turns,
        temperature: (config.temperature != 0.0).then_some(config.temperature),
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let request = build_request(messages, config);

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", self.credential.expose())
            .header("anthropic-version", API_VERSION)
            .timeout(config.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(config.timeout)
                } else {
                    ProviderError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(ProviderError::RateLimited { retry_after });
        }

        if !status.is_success() {
            let body = response
                .json::<ErrorBody>()
                .await
                .map_err(|e| ProviderError::ParseError(e.to_string()))?;
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: body.error.message,
            });
        }

        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        let content = body
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<String>();

        Ok(CompletionResponse {
            content,
            usage: TokenUsage {
                prompt_tokens: body.usage.input_tokens,
                completion_tokens: body.usage.output_tokens,
            },
            model: body.model,
            stop_reason: body.stop_reason,
        })
    }

    async fn health_check(&self) -> bool {
        !self.credential.is_empty()
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

/// Factory for `oracle.provider: anthropic`.
///
/// ```json
/// { "api_key": "sk-ant-...", "base_url": "https://..." }
/// ```
pub struct AnthropicProviderFactory;

impl ProviderFactory for AnthropicProviderFactory {
    fn provider_type(&self) -> &'static str {
        "anthropic"
    }

    fn create(&self, settings: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        Ok(Arc::new(AnthropicProvider::from_config(settings)?))
    }

    fn validate_config(&self, settings: &JsonValue) -> Result<(), ProviderError> {
        ApiCredential::from_config_or_env(settings, "api_key", ANTHROPIC_API_KEY_ENV, KEY_LABEL)?;
        base_url_setting(settings).map(|_| ())
    }

    fn description(&self) -> &'static str {
        "Anthropic Claude provider"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_message_is_lifted_out_of_turns() {
        let request = build_request(
            vec![
                ChatMessage::system("Answer tersely."),
                ChatMessage::user("Summarize this."),
            ],
            &CompletionConfig::default(),
        );

        assert_eq!(request.system.as_deref(), Some("Answer tersely."));
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, "user");
    }

    #[test]
    fn test_zero_temperature_is_omitted() {
        let config = CompletionConfig {
            temperature: 0.0,
            ..CompletionConfig::default()
        };
        let request = build_request(vec![ChatMessage::user("hi")], &config);
        assert!(request.temperature.is_none());

        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("temperature").is_none());
    }

    #[test]
    fn test_prompt_caching_marks_blocks() {
        let config = CompletionConfig {
            prompt_caching: true,
            ..CompletionConfig::default()
        };
        let request = build_request(vec![ChatMessage::user("hi")], &config);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json["messages"][0]["content"][0]["cache_control"]["type"],
            "ephemeral"
        );
    }

    #[test]
    fn test_api_key_not_in_debug_output() {
        let secret = "sk-ant-REDACTED";
        let provider = AnthropicProvider::new(secret).unwrap();
        let debug = format!("{provider:?}");
        assert!(!debug.contains(secret));
        assert!(debug.contains("api.anthropic.com"));
    }

    #[tokio::test]
    async fn test_health_check_requires_key() {
        assert!(AnthropicProvider::new("key").unwrap().health_check().await);
        assert!(!AnthropicProvider::new("").unwrap().health_check().await);
    }

    #[test]
    fn test_from_config_reads_base_url() {
        let config = serde_json::json!({
            "api_key": "config-key",
            "base_url": "https://proxy.example.com/v1/"
        });
        let provider = AnthropicProvider::from_config(&config).unwrap();
        assert_eq!(provider.base_url, "https://proxy.example.com/v1");
        assert_eq!(provider.credential.source(), CredentialSource::Config);
    }

    #[test]
    fn test_factory_rejects_bad_base_url() {
        let settings = serde_json::json!({ "api_key": "k", "base_url": "ftp://nope" });
        assert!(matches!(
            AnthropicProviderFactory.validate_config(&settings),
            Err(ProviderError::NotConfigured(msg)) if msg.contains("ftp://nope")
        ));
        assert!(AnthropicProvider::from_config(&settings).is_err());
    }
}
