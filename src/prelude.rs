//! Convenience re-exports for common use.

pub use crate::agent_loop::{
    CancellationController, LoopRunner, RunEvent, RunEventPayload, RunHandle, RunOutcome,
    RunRequest, Runner,
};
pub use crate::config::SageConfig;
pub use crate::error::{Result, SageError};
pub use crate::models::{CliKind, LanguageModel};
pub use crate::provider::ModelProvider;
pub use crate::session::{FileSessionStore, InMemorySessionStore, SessionStore};
pub use crate::tools::{AgentTool, AgentToolParameters, Tool, ToolArguments, ToolKind};
pub use crate::types::{GenerationSettings, Message, Role, StreamEvent, ToolCall, ToolResult};
