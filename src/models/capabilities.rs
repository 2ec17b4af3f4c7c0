//! Model capabilities descriptor.

use serde::{Deserialize, Serialize};

/// Describes what a model and its transport can do.
///
/// The agent loop consults these flags instead of branching on provider
/// names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelCapabilities {
    /// Function calling is available.
    pub supports_tools: bool,
    /// Function calling can be combined with a retrieval store in one request.
    pub supports_tools_with_retrieval: bool,
    /// Hosted web search grounding is available.
    pub supports_web_search: bool,
    /// Retrieval-store grounding is available.
    pub supports_retrieval: bool,
    /// The backend can continue a conversation from an opaque session id.
    pub supports_session_resumption: bool,
    /// The transport is an external command-line program.
    pub is_cli: bool,
}

impl Default for ModelCapabilities {
    fn default() -> Self {
        Self {
            supports_tools: false,
            supports_tools_with_retrieval: false,
            supports_web_search: false,
            supports_retrieval: false,
            supports_session_resumption: false,
            is_cli: false,
        }
    }
}

impl ModelCapabilities {
    /// Hosted model with the full feature set.
    pub fn hosted() -> Self {
        Self {
            supports_tools: true,
            supports_tools_with_retrieval: true,
            supports_web_search: true,
            supports_retrieval: true,
            supports_session_resumption: false,
            is_cli: false,
        }
    }

    /// External CLI backend: plain text in, plain text out.
    pub fn cli(supports_session_resumption: bool) -> Self {
        Self {
            supports_session_resumption,
            is_cli: true,
            ..Self::default()
        }
    }
}
