//! Tool execution gateway.
//!
//! The single boundary between the agent loop and tool side effects. Every
//! call produces a [`ToolResult`]; nothing a tool does can fail the run.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;

use super::arguments::ToolArguments;
use super::tool::{Tool, ToolDefinition, ToolExecutionContext};
use super::validation::validate_arguments;
use crate::types::{ToolCall, ToolResult};

/// Ordered tool catalogue with a non-failing `execute`.
#[derive(Clone, Default)]
pub struct ToolGateway {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolGateway {
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Self {
        Self { tools }
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn tools(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    /// A gateway restricted to the tools matching `keep`.
    pub fn filtered(&self, keep: impl Fn(&dyn Tool) -> bool) -> Self {
        Self {
            tools: self
                .tools
                .iter()
                .filter(|t| keep(t.as_ref()))
                .cloned()
                .collect(),
        }
    }

    /// Run one tool call to completion.
    pub async fn execute(&self, call: &ToolCall, ctx: &ToolExecutionContext) -> ToolResult {
        let Some(tool) = self.get(&call.name) else {
            tracing::warn!(tool = %call.name, "model requested unknown tool");
            return ToolResult::failure(&call.name, format!("Unknown tool: {}", call.name));
        };

        if let Err(reason) = validate_arguments(&call.arguments, tool.parameters()) {
            tracing::debug!(tool = %call.name, %reason, "rejecting tool call arguments");
            return ToolResult::failure(&call.name, format!("Invalid arguments: {reason}"));
        }

        let args = ToolArguments::new(call.arguments.clone());
        let outcome = AssertUnwindSafe(tool.execute(&args, ctx))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(payload)) => {
                tracing::debug!(tool = %call.name, "tool call succeeded");
                ToolResult::ok(&call.name, payload)
            }
            Ok(Err(err)) => {
                tracing::debug!(tool = %call.name, error = %err, "tool call failed");
                ToolResult::failure(&call.name, err.to_string())
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::warn!(tool = %call.name, %message, "tool panicked");
                ToolResult::failure(&call.name, format!("Tool panicked: {message}"))
            }
        }
    }
}

impl std::fmt::Debug for ToolGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolGateway")
            .field("tools", &self.names())
            .finish()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
