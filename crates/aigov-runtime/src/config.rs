//! Runtime configuration.
//!
//! Loaded once from YAML, then adjusted by environment variables:
//!
//! | Variable       | Effect                                   |
//! |----------------|------------------------------------------|
//! | `AIGOV_MODE`   | `mock` or `live`                         |
//! | `AIGOV_MODEL`  | oracle model name                        |
//! | `IPFS_API_URL` | switches content storage to that node    |
//! | `IPFS_GATEWAY` | gateway prefix for content URLs          |
//!
//! Durations are humantime strings such as `"15s"` or `"1h"`.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::cache::CacheConfig;
use crate::collaborators::DEFAULT_GATEWAY;
use crate::providers::{CompletionConfig, ProviderError};
use crate::resilience::CircuitBreakerConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Serde adapter for humantime duration strings.
pub(crate) mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

/// Where oracle answers come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Fixed scripted replies, no network
    #[default]
    Mock,

    /// A registered LLM provider
    Live,
}

impl std::str::FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(Mode::Mock),
            "live" => Ok(Mode::Live),
            other => Err(ConfigError::Invalid(format!(
                "mode must be 'mock' or 'live', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Registered provider type, e.g. "anthropic"
    pub provider: String,

    /// Provider-specific settings passed to its factory
    pub provider_config: JsonValue,

    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,

    #[serde(with = "duration_str")]
    pub timeout: Duration,

    /// Total tokens the oracle may spend over the process lifetime
    pub token_budget: u32,

    pub prompt_caching: bool,
}

impl Default for OracleConfig {
    fn default() -> Self {
        let completion = CompletionConfig::default();
        Self {
            provider: "anthropic".to_string(),
            provider_config: JsonValue::Object(Default::default()),
            model: completion.model,
            max_tokens: completion.max_tokens,
            temperature: completion.temperature,
            timeout: completion.timeout,
            token_budget: 2_000_000,
            prompt_caching: completion.prompt_caching,
        }
    }
}

impl OracleConfig {
    pub fn completion_config(&self) -> CompletionConfig {
        CompletionConfig {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            timeout: self.timeout,
            prompt_caching: self.prompt_caching,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentBackend {
    #[default]
    Memory,
    Ipfs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentStoreConfig {
    pub backend: ContentBackend,

    /// IPFS HTTP API, used by the `ipfs` backend
    pub api_url: String,

    /// Prefix for public content URLs
    pub gateway: String,

    #[serde(with = "duration_str")]
    pub timeout: Duration,
}

impl Default for ContentStoreConfig {
    fn default() -> Self {
        Self {
            backend: ContentBackend::Memory,
            api_url: "http://127.0.0.1:5001".to_string(),
            gateway: DEFAULT_GATEWAY.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainBackend {
    #[default]
    Memory,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub backend: ChainBackend,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub mode: Mode,
    pub oracle: OracleConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub cache: CacheConfig,
    pub content_store: ContentStoreConfig,
    pub chain: ChainConfig,
}

impl AppConfig {
    /// Read `path` (defaults when `None`), apply environment overrides and
    /// validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                serde_yaml::from_str(&yaml)?
            }
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        tracing::debug!(mode = ?config.mode, model = %config.oracle.model, "Configuration loaded");
        Ok(config)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(mode) = lookup("AIGOV_MODE") {
            self.mode = mode.parse()?;
        }
        if let Some(model) = lookup("AIGOV_MODEL") {
            self.oracle.model = model;
        }
        if let Some(api_url) = lookup("IPFS_API_URL") {
            self.content_store.backend = ContentBackend::Ipfs;
            self.content_store.api_url = api_url;
        }
        if let Some(gateway) = lookup("IPFS_GATEWAY") {
            self.content_store.gateway = gateway;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let oracle = &self.oracle;
        if oracle.max_tokens == 0 {
            return Err(ConfigError::Invalid("oracle.max_tokens must be positive".into()));
        }
        if oracle.token_budget < oracle.max_tokens {
            return Err(ConfigError::Invalid(
                "oracle.token_budget must cover at least one completion".into(),
            ));
        }
        if !(0.0..=1.0).contains(&oracle.temperature) {
            return Err(ConfigError::Invalid(
                "oracle.temperature must be between 0 and 1".into(),
            ));
        }
        if oracle.timeout.is_zero() {
            return Err(ConfigError::Invalid("oracle.timeout must be positive".into()));
        }
        if self.circuit_breaker.failure_threshold == 0 {
            return Err(ConfigError::Invalid(
                "circuit_breaker.failure_threshold must be positive".into(),
            ));
        }

        for (key, url) in [
            ("content_store.gateway", &self.content_store.gateway),
            ("content_store.api_url", &self.content_store.api_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::Invalid(format!(
                    "{key} must start with http:// or https://"
                )));
            }
        }

        Ok(())
    }
}
