//! Provider registry: pick a model backend by name at startup.
//!
//! ```ignore
//! let registry = ProviderRegistry::with_defaults();
//! let provider = registry.create("gemini", &serde_json::json!({}))?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::debug;

use super::{LlmProvider, ProviderError};

/// Creates a provider from JSON configuration.
///
/// New backends implement this and register with a [`ProviderRegistry`];
/// nothing else in the runtime needs to know about them.
pub trait ProviderFactory: Send + Sync {
    /// Registry key, e.g. "anthropic" or "gemini".
    fn provider_type(&self) -> &'static str;

    /// Create a provider instance from JSON configuration.
    fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError>;

    /// Validate configuration without creating a provider.
    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError>;

    /// Defaults for optional fields.
    fn default_config(&self) -> JsonValue {
        serde_json::json!({})
    }

    fn description(&self) -> &'static str {
        "LLM Provider"
    }
}

/// Provider factories keyed by [`ProviderFactory::provider_type`].
#[derive(Default)]
pub struct ProviderRegistry {
    factories: BTreeMap<&'static str, Arc<dyn ProviderFactory>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later registrations replace earlier ones of the same type.
    pub fn register(&mut self, factory: Arc<dyn ProviderFactory>) {
        self.factories.insert(factory.provider_type(), factory);
    }

    fn factory(&self, provider_type: &str) -> Result<&dyn ProviderFactory, ProviderError> {
        self.factories
            .get(provider_type)
            .map(|f| f.as_ref())
            .ok_or_else(|| {
                ProviderError::NotConfigured(format!(
                    "Unknown provider type: '{}'. Available: {}",
                    provider_type,
                    self.available_types().join(", ")
                ))
            })
    }

    /// Validate `config`, then build the provider.
    pub fn create(
        &self,
        provider_type: &str,
        config: &JsonValue,
    ) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        let factory = self.factory(provider_type)?;
        factory.validate_config(config)?;
        let provider = factory.create(config)?;
        debug!(provider = provider_type, "Created {}", factory.description());
        Ok(provider)
    }

    pub fn validate(&self, provider_type: &str, config: &JsonValue) -> Result<(), ProviderError> {
        self.factory(provider_type)?.validate_config(config)
    }

    pub fn available_types(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    pub fn has_provider(&self, provider_type: &str) -> bool {
        self.factories.contains_key(provider_type)
    }

    pub fn default_config(&self, provider_type: &str) -> Option<JsonValue> {
        self.factory(provider_type).ok().map(|f| f.default_config())
    }

    /// Every provider compiled into this build.
    #[allow(unused_mut)]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        #[cfg(feature = "anthropic")]
        registry.register(Arc::new(super::AnthropicProviderFactory));
        #[cfg(feature = "gemini")]
        registry.register(Arc::new(super::GeminiProviderFactory));
        registry
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.available_types())
            .finish()
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
            Ok(CompletionResponse {
                content: messages
                    .last()
                    .map(|m| m.content.clone())
                    .unwrap_or_default(),
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

        fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
            if config["name"].is_number() {
                return Err(ProviderError::NotConfigured("name must be a string".into()));
            }
            Ok(())
        }
    }

    #[test]
    fn test_registry_register_and_create() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(EchoProviderFactory));

        assert!(registry.has_provider("echo"));
        assert!(!registry.has_provider("unknown"));

        let provider = registry
            .create("echo", &serde_json::json!({"name": "critic-echo"}))
            .unwrap();
        assert_eq!(provider.name(), "critic-echo");
    }

    #[test]
    fn test_registry_unknown_provider_lists_available() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(EchoProviderFactory));

        match registry.create("unknown", &serde_json::json!({})) {
            Err(ProviderError::NotConfigured(msg)) => {
                assert!(msg.contains("Unknown provider type"));
                assert!(msg.contains("echo"));
            }
            _ => panic!("Expected NotConfigured error"),
        }
    }

    #[test]
    fn test_registry_validate() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(EchoProviderFactory));

        assert!(registry.validate("echo", &serde_json::json!({})).is_ok());
        assert!(registry.validate("echo", &serde_json::json!({"name": 3})).is_err());
        assert!(registry.validate("unknown", &serde_json::json!({})).is_err());
    }

    #[test]
    fn test_create_rejects_invalid_config() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(EchoProviderFactory));

        assert!(matches!(
            registry.create("echo", &serde_json::json!({"name": 3})),
            Err(ProviderError::NotConfigured(_))
        ));
        assert_eq!(registry.default_config("echo"), Some(serde_json::json!({})));
        assert!(registry.default_config("unknown").is_none());
    }

    #[tokio::test]
    async fn test_created_provider_completes() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(EchoProviderFactory));
        let provider = registry.create("echo", &serde_json::json!({})).unwrap();

        let response = provider
            .complete(vec![ChatMessage::user("hello")], &CompletionConfig::default())
            .await
            .unwrap();
        assert_eq!(response.content, "hello");
    }
}
