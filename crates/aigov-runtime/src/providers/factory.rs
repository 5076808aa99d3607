//! Provider registration by name.
//!
//! The `oracle.provider` config key names a provider type; the registry
//! maps that name to a factory that builds the provider from its JSON
//! settings.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use super::{LlmProvider, ProviderError};

/// Builds one kind of provider from its `provider_config` settings.
pub trait ProviderFactory: Send + Sync {
    /// Value of `oracle.provider` that selects this factory.
    fn provider_type(&self) -> &'static str;

    fn create(&self, settings: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError>;

    /// Check settings without building anything.
    fn validate_config(&self, settings: &JsonValue) -> Result<(), ProviderError>;

    fn description(&self) -> &'static str {
        "Chat-completion provider"
    }
}

#[derive(Default)]
pub struct ProviderRegistry {
    factories: BTreeMap<&'static str, Arc<dyn ProviderFactory>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory, replacing any with the same type.
    pub fn register(&mut self, factory: Arc<dyn ProviderFactory>) {
        self.factories.insert(factory.provider_type(), factory);
    }

    fn factory(&self, provider_type: &str) -> Result<&dyn ProviderFactory, ProviderError> {
        match self.factories.get(provider_type) {
            Some(factory) => Ok(factory.as_ref()),
            None => Err(ProviderError::NotConfigured(format!(
                "no provider named '{provider_type}' in this build (have: {})",
                self.available_types().join(", ")
            ))),
        }
    }

    pub fn create(
        &self,
        provider_type: &str,
        settings: &JsonValue,
    ) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        let factory = self.factory(provider_type)?;
        factory.validate_config(settings)?;
        let provider = factory.create(settings)?;
        tracing::info!(provider = provider_type, "{}", factory.description());
        Ok(provider)
    }

    pub fn validate(&self, provider_type: &str, settings: &JsonValue) -> Result<(), ProviderError> {
        self.factory(provider_type)?.validate_config(settings)
    }

    pub fn available_types(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    pub fn has_provider(&self, provider_type: &str) -> bool {
        self.factories.contains_key(provider_type)
    }

    /// Registry with every provider compiled into this build.
    pub fn with_defaults() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();
        #[cfg(feature = "anthropic")]
        registry.register(Arc::new(super::AnthropicProviderFactory));
        registry
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.factories.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ChatMessage, CompletionConfig, CompletionResponse, TokenUsage};
    use async_trait::async_trait;

    struct EchoProvider {
        name: String,
    }

    #[async_trait]
    impl LlmProvider for EchoProvider {
        async fn complete(
            &self,
            messages: Vec<ChatMessage>,
            config: &CompletionConfig,
        ) -> Result<CompletionResponse, ProviderError> {
            let content = messages
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default();
            Ok(CompletionResponse {
                content,
                usage: TokenUsage::default(),
                model: config.model.clone(),
                stop_reason: Some("end_turn".to_string()),
            })
        }

        async fn health_check(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    struct EchoProviderFactory;

    impl ProviderFactory for EchoProviderFactory {
        fn provider_type(&self) -> &'static str {
            "echo"
        }

        fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
            let name = config["name"].as_str().unwrap_or("echo").to_string();
            Ok(Arc::new(EchoProvider { name }))
        }

        fn validate_config(&self, _config: &JsonValue) -> Result<(), ProviderError> {
            Ok(())
        }
    }

    #[test]
    fn test_register_and_create() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(EchoProviderFactory));

        assert!(registry.has_provider("echo"));
        let provider = registry
            .create("echo", &serde_json::json!({"name": "echo-test"}))
            .unwrap();
        assert_eq!(provider.name(), "echo-test");
    }

    #[test]
    fn test_unknown_provider_lists_available() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(EchoProviderFactory));

        match registry.create("openai", &serde_json::json!({})) {
            Err(ProviderError::NotConfigured(msg)) => {
                assert!(msg.contains("'openai'"));
                assert!(msg.contains("have: echo"));
            }
            _ => panic!("Expected NotConfigured error"),
        }
        assert!(registry.validate("openai", &serde_json::json!({})).is_err());
    }

    #[test]
    fn test_empty_registry() {
        let registry = ProviderRegistry::new();
        assert!(registry.available_types().is_empty());
        assert_eq!(format!("{registry:?}"), "{}");
    }

    #[cfg(not(feature = "anthropic"))]
    #[test]
    fn test_defaults_without_features_are_empty() {
        assert!(!ProviderRegistry::with_defaults().has_provider("anthropic"));
    }
}
