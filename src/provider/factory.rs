//! Provider factory trait for creating ModelProvider instances.

use super::ModelProvider;
use crate::config::SageConfig;
use crate::error::SageError;
use crate::models::ModelCapabilities;

/// Factory for creating ModelProvider instances from a provider key + model ID.
pub trait ProviderFactory: Send + Sync {
    /// Provider key(s) this factory handles (e.g., &["gemini", "google"]).
    fn provider_keys(&self) -> &[&str];

    /// Create a ModelProvider for the given model ID and config.
    fn create(
        &self,
        config: &SageConfig,
        provider_key: &str,
        model_id: &str,
    ) -> Result<Box<dyn ModelProvider>, SageError>;

    /// Capabilities of a model without constructing a provider.
    fn capabilities(&self, provider_key: &str, model_id: &str) -> ModelCapabilities;
}
