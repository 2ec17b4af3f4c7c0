//! Tool system: the `Tool` trait, the workspace catalogue, and the gateway
//! that executes calls on behalf of the agent loop.

pub mod arguments;
pub mod gateway;
pub mod tool;
pub mod types;
pub mod validation;
pub mod workspace;

pub use arguments::ToolArguments;
pub use gateway::ToolGateway;
pub use tool::{AgentTool, Tool, ToolDefinition, ToolExecutionContext, ToolKind};
pub use types::AgentToolParameters;
pub use workspace::{workspace_tools, ContentMatch, FsWorkspace, Workspace};
