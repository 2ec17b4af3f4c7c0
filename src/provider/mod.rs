//! Provider adapters: one hosted API plus the CLI backends.

pub mod cli;
pub mod factory;
pub mod gemini;
pub mod http;
pub mod registry;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::SageError;
use crate::models::capabilities::ModelCapabilities;
use crate::types::{EventStream, GenerationSettings, Message};

pub use crate::tools::ToolDefinition;
pub use factory::ProviderFactory;
pub use registry::ProviderRegistry;

/// Everything one adapter invocation needs.
#[derive(Debug, Clone, Default)]
pub struct ProviderRequest {
    /// Conversation snapshot, oldest first.
    pub messages: Vec<Message>,
    pub system_prompt: Option<String>,
    /// `None` or empty means tool mode "none".
    pub tools: Option<Vec<ToolDefinition>>,
    pub settings: GenerationSettings,
    /// Hosted retrieval stores, bare or canonical names.
    pub retrieval_stores: Vec<String>,
    pub web_search: bool,
    /// Stored session id for resumable backends.
    pub session_id: Option<String>,
}

impl ProviderRequest {
    pub fn has_tools(&self) -> bool {
        self.tools.as_ref().is_some_and(|t| !t.is_empty())
    }

    pub fn wants_retrieval(&self) -> bool {
        !self.retrieval_stores.is_empty()
    }
}

/// Core trait implemented by every adapter.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider name (e.g., "gemini", "claude").
    fn provider_name(&self) -> &str;
    /// The model ID this provider instance serves.
    fn model_id(&self) -> &str;

    /// Capabilities of the model.
    fn capabilities(&self) -> &ModelCapabilities;

    /// Launch the transport and return its event stream.
    ///
    /// Errors returned here happen before any event was produced. Once the
    /// stream exists, failures arrive as [`crate::types::StreamEvent::Error`].
    /// When `cancel` fires the adapter terminates the transport and yields
    /// [`crate::types::StreamEvent::Aborted`].
    async fn stream(
        &self,
        request: &ProviderRequest,
        cancel: CancellationToken,
    ) -> Result<EventStream, SageError>;
}
