//! Model definitions and selection.

pub mod capabilities;
pub mod cli;
pub mod gemini;
pub mod selector;

pub use capabilities::ModelCapabilities;
pub use cli::CliKind;
pub use gemini::GeminiModel;
pub use selector::ModelSelector;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Top-level model identifier, dispatching to a provider adapter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "provider", content = "model")]
pub enum LanguageModel {
    /// Hosted Gemini API.
    Gemini(GeminiModel),
    /// External CLI backend, optionally pinned to one of its models.
    Cli {
        kind: CliKind,
        model: Option<String>,
    },
    /// Model served by a provider registered at runtime.
    Custom { provider: String, model_id: String },
}

impl LanguageModel {
    pub fn cli(kind: CliKind) -> Self {
        Self::Cli { kind, model: None }
    }

    /// The model's API identifier string (empty for a CLI's default model).
    pub fn model_id(&self) -> &str {
        match self {
            Self::Gemini(m) => m.as_str(),
            Self::Cli { model, .. } => model.as_deref().unwrap_or(""),
            Self::Custom { model_id, .. } => model_id,
        }
    }

    /// Provider key used for registry lookup and session bookkeeping.
    pub fn provider_name(&self) -> &str {
        match self {
            Self::Gemini(_) => "gemini",
            Self::Cli { kind, .. } => kind.as_str(),
            Self::Custom { provider, .. } => provider,
        }
    }

    /// Static capabilities for built-in models.
    pub fn capabilities(&self) -> ModelCapabilities {
        match self {
            Self::Gemini(m) => m.capabilities(),
            Self::Cli { kind, .. } => kind.capabilities(),
            Self::Custom { .. } => ModelCapabilities::default(),
        }
    }
}

impl fmt::Display for LanguageModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cli { kind, model: None } => write!(f, "{}", kind.as_str()),
            _ => write!(f, "{}:{}", self.provider_name(), self.model_id()),
        }
    }
}
