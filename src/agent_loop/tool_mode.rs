//! Which tools a run may offer to the model.

use crate::models::ModelCapabilities;
use crate::tools::ToolGateway;

/// Tool mode, computed once before the first streaming round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolMode {
    /// No function declarations are sent.
    None,
    /// Hosted retrieval is active; search and list tools are withheld.
    WithRetrieval,
    /// The full catalogue.
    Full,
}

impl ToolMode {
    pub fn select(capabilities: &ModelCapabilities, web_search: bool, retrieval: bool) -> Self {
        if capabilities.is_cli || !capabilities.supports_tools || web_search {
            return ToolMode::None;
        }
        if retrieval {
            if !capabilities.supports_tools_with_retrieval {
                return ToolMode::None;
            }
            return ToolMode::WithRetrieval;
        }
        ToolMode::Full
    }

    /// Restrict `catalogue` to this mode. Mutating tools are dropped unless
    /// writes are allowed.
    pub fn apply(self, catalogue: &ToolGateway, allow_writes: bool) -> ToolGateway {
        match self {
            ToolMode::None => ToolGateway::default(),
            ToolMode::WithRetrieval => catalogue.filtered(|tool| {
                let kind = tool.kind();
                !kind.is_discovery() && (allow_writes || !kind.is_mutating())
            }),
            ToolMode::Full => {
                catalogue.filtered(|tool| allow_writes || !tool.kind().is_mutating())
            }
        }
    }
}
