//! Credential handling for oracle and content-store backends.
//!
//! Every API key the runtime loads is wrapped in an [`ApiCredential`]
//! immediately. The raw value is only reachable through
//! [`ApiCredential::expose`], which is called where a request header is
//! set and nowhere else.
//!
//! Lookups take the settings object first and the environment second. A
//! blank value in either place counts as missing.

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value as JsonValue;
use std::fmt;

use super::ProviderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// The provider's `provider_config` object
    Config,
    Environment,
    /// Passed in by the embedding program
    Programmatic,
}

impl CredentialSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialSource::Config => "config",
            CredentialSource::Environment => "environment",
            CredentialSource::Programmatic => "programmatic",
        }
    }
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An API key that never prints itself.
pub struct ApiCredential {
    secret: SecretString,
    source: CredentialSource,
    label: &'static str,
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl ApiCredential {
    pub fn new(value: impl Into<String>, source: CredentialSource, label: &'static str) -> Self {
        let value: String = value.into();
        Self {
            secret: SecretString::from(value),
            source,
            label,
        }
    }

    /// Look up `settings[key]`, then `env_var` through `lookup`.
    pub fn resolve<F>(
        settings: &JsonValue,
        key: &str,
        env_var: &str,
        label: &'static str,
        lookup: F,
    ) -> Result<Self, ProviderError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = non_blank(settings.get(key).and_then(JsonValue::as_str)) {
            return Ok(Self::new(value, CredentialSource::Config, label));
        }
        match non_blank(lookup(env_var).as_deref()) {
            Some(value) => Ok(Self::new(value, CredentialSource::Environment, label)),
            None => Err(ProviderError::NotConfigured(format!(
                "{label} missing: set '{key}' in provider_config or export {env_var}"
            ))),
        }
    }

    /// Look up `settings[key]`, then the process environment.
    pub fn from_config_or_env(
        settings: &JsonValue,
        key: &str,
        env_var: &str,
        label: &'static str,
    ) -> Result<Self, ProviderError> {
        Self::resolve(settings, key, env_var, label, |var| std::env::var(var).ok())
    }

    pub fn from_env(env_var: &str, label: &'static str) -> Result<Self, ProviderError> {
        Self::from_config_or_env(&JsonValue::Null, "api_key", env_var, label)
    }

    /// The raw key, for the request header only.
    pub fn expose(&self) -> &str {
        self.secret.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.expose().is_empty()
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }

    pub fn label(&self) -> &'static str {
        self.label
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiCredential({}, {}, [REDACTED])", self.label, self.source)
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) [REDACTED]", self.label, self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |var| {
            pairs
                .iter()
                .find(|(k, _)| *k == var)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_never_printed() {
        let secret = "sk-oracle-secret-98765";
        let cred = ApiCredential::new(secret, CredentialSource::Config, "Oracle API key");

        for shown in [format!("{cred:?}"), format!("{cred}")] {
            assert!(!shown.contains(secret));
            assert!(shown.contains("[REDACTED]"));
            assert!(shown.contains("Oracle API key"));
        }
        assert_eq!(cred.expose(), secret);
    }

    #[test]
    fn test_settings_win_over_environment() {
        let cred = ApiCredential::resolve(
            &json!({ "api_key": "from-settings" }),
            "api_key",
            "ORACLE_KEY",
            "Oracle API key",
            env(&[("ORACLE_KEY", "from-env")]),
        )
        .unwrap();

        assert_eq!(cred.expose(), "from-settings");
        assert_eq!(cred.source(), CredentialSource::Config);
    }

    #[test]
    fn test_blank_setting_falls_through_to_environment() {
        let cred = ApiCredential::resolve(
            &json!({ "api_key": "  " }),
            "api_key",
            "ORACLE_KEY",
            "Oracle API key",
            env(&[("ORACLE_KEY", "from-env")]),
        )
        .unwrap();

        assert_eq!(cred.expose(), "from-env");
        assert_eq!(cred.source(), CredentialSource::Environment);
    }

    #[test]
    fn test_missing_everywhere_names_both_places() {
        let err = ApiCredential::resolve(
            &json!({}),
            "api_key",
            "ORACLE_KEY",
            "Oracle API key",
            env(&[("ORACLE_KEY", "")]),
        )
        .unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("'api_key'"));
        assert!(msg.contains("ORACLE_KEY"));
    }
}
