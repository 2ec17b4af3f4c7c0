//! Provider registry for dynamic provider resolution.

use std::collections::HashMap;
use std::sync::Arc;

use super::{ModelProvider, ProviderFactory};
use crate::config::SageConfig;
use crate::error::SageError;
use crate::models::{LanguageModel, ModelCapabilities};

/// Registry mapping provider keys to their factories.
///
/// The agent loop resolves adapters through it and reads capabilities from
/// it before deciding on a tool mode.
#[derive(Clone)]
pub struct ProviderRegistry {
    factories: HashMap<String, Arc<dyn ProviderFactory>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with the hosted Gemini adapter and every CLI backend.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(super::gemini::GeminiFactory));
        registry.register(Arc::new(super::cli::CliFactory));
        registry
    }

    /// Register a factory for all provider keys it declares.
    pub fn register(&mut self, factory: Arc<dyn ProviderFactory>) {
        for key in factory.provider_keys() {
            self.factories.insert(key.to_string(), factory.clone());
        }
    }

    fn factory(&self, provider_key: &str) -> Result<&Arc<dyn ProviderFactory>, SageError> {
        self.factories.get(provider_key).ok_or_else(|| {
            SageError::ModelNotFound(format!(
                "No provider factory registered for '{provider_key}'"
            ))
        })
    }

    /// Create a provider instance by looking up the registered factory.
    pub fn create_provider(
        &self,
        provider_key: &str,
        model_id: &str,
        config: &SageConfig,
    ) -> Result<Box<dyn ModelProvider>, SageError> {
        self.factory(provider_key)?
            .create(config, provider_key, model_id)
    }

    pub fn create_for(
        &self,
        model: &LanguageModel,
        config: &SageConfig,
    ) -> Result<Box<dyn ModelProvider>, SageError> {
        self.create_provider(model.provider_name(), model.model_id(), config)
    }

    /// Capabilities for a model, as reported by its factory.
    pub fn capabilities(
        &self,
        provider_key: &str,
        model_id: &str,
    ) -> Result<ModelCapabilities, SageError> {
        Ok(self.factory(provider_key)?.capabilities(provider_key, model_id))
    }

    /// Check whether a factory is registered for the given key.
    pub fn has_provider(&self, provider_key: &str) -> bool {
        self.factories.contains_key(provider_key)
    }

    /// List all registered provider keys.
    pub fn provider_keys(&self) -> Vec<&str> {
        self.factories.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys = self.provider_keys();
        keys.sort();
        f.debug_struct("ProviderRegistry").field("keys", &keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderRequest;
    use crate::types::EventStream;
    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    struct StubFactory;

    impl ProviderFactory for StubFactory {
        fn provider_keys(&self) -> &[&str] {
            &["stub", "stub-alias"]
        }

        fn create(
            &self,
            _config: &SageConfig,
            _provider_key: &str,
            model_id: &str,
        ) -> Result<Box<dyn ModelProvider>, SageError> {
            Ok(Box::new(StubProvider {
                model_id: model_id.to_string(),
                caps: self.capabilities("stub", model_id),
            }))
        }

        fn capabilities(&self, _provider_key: &str, model_id: &str) -> ModelCapabilities {
            ModelCapabilities {
                supports_tools: model_id != "no-tools",
                ..ModelCapabilities::default()
            }
        }
    }

    struct StubProvider {
        model_id: String,
        caps: ModelCapabilities,
    }

    #[async_trait]
    impl ModelProvider for StubProvider {
        fn provider_name(&self) -> &str {
            "stub"
        }
        fn model_id(&self) -> &str {
            &self.model_id
        }
        fn capabilities(&self) -> &ModelCapabilities {
            &self.caps
        }
        async fn stream(
            &self,
            _request: &ProviderRequest,
            _cancel: CancellationToken,
        ) -> Result<EventStream, SageError> {
            Err(SageError::InvalidState("stub does not stream".into()))
        }
    }

    #[test]
    fn register_and_create() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(StubFactory));

        assert!(registry.has_provider("stub"));
        assert!(registry.has_provider("stub-alias"));
        assert!(!registry.has_provider("unknown"));

        let provider = registry
            .create_provider("stub-alias", "my-model", &SageConfig::new())
            .unwrap();
        assert_eq!(provider.model_id(), "my-model");
        assert_eq!(provider.provider_name(), "stub");
    }

    #[test]
    fn create_unregistered_fails() {
        let registry = ProviderRegistry::new();
        match registry.create_provider("nope", "m", &SageConfig::new()) {
            Err(SageError::ModelNotFound(msg)) => assert!(msg.contains("nope")),
            Err(e) => panic!("expected ModelNotFound, got error: {e}"),
            Ok(_) => panic!("expected ModelNotFound, got Ok"),
        }
    }

    #[test]
    fn capabilities_come_from_the_factory() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(StubFactory));
        assert!(registry.capabilities("stub", "m").unwrap().supports_tools);
        assert!(!registry.capabilities("stub", "no-tools").unwrap().supports_tools);
        assert!(registry.capabilities("other", "m").is_err());
    }

    #[test]
    fn defaults_cover_hosted_and_cli_backends() {
        let registry = ProviderRegistry::with_defaults();
        let mut keys = registry.provider_keys();
        keys.sort();
        assert_eq!(keys, vec!["claude", "codex", "gemini", "gemini-cli", "google"]);

        let caps = registry.capabilities("codex", "").unwrap();
        assert!(caps.is_cli && caps.supports_session_resumption);
        let caps = registry.capabilities("gemini", "gemini-2.5-pro").unwrap();
        assert!(caps.supports_tools && !caps.is_cli);
    }
}
