//! Core run types for the agent loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{Message, ToolCall, ToolResult};

/// Unique run identifier.
pub type RunId = Uuid;

/// Run lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Idle,
    Streaming,
    AwaitingTools,
    Finalized,
    Aborted,
    Errored,
}

/// Mutable state of one run. Owned by the run task; never shared.
#[derive(Debug, Clone)]
pub struct RunState {
    pub status: RunStatus,
    /// Private copy of the caller's conversation, grown as the run proceeds.
    pub conversation: Vec<Message>,
    pub accumulated_text: String,
    pub tool_calls: Vec<ToolCall>,
    pub tool_results: Vec<ToolResult>,
    pub retrieval_sources: Vec<String>,
    pub web_search_used: bool,
    pub session_id: Option<String>,
    pub iteration_count: usize,
    pub aborted: bool,
}

impl RunState {
    pub fn new(conversation: Vec<Message>) -> Self {
        Self {
            status: RunStatus::Idle,
            conversation,
            accumulated_text: String::new(),
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
            retrieval_sources: Vec::new(),
            web_search_used: false,
            session_id: None,
            iteration_count: 0,
            aborted: false,
        }
    }

    /// Names of the tools called so far, in call order.
    pub fn tool_calls_used(&self) -> Vec<String> {
        self.tool_calls.iter().map(|c| c.name.clone()).collect()
    }

    pub fn into_outcome(mut self, aborted: bool) -> RunOutcome {
        self.aborted = aborted;
        self.status = if aborted {
            RunStatus::Aborted
        } else {
            RunStatus::Finalized
        };
        RunOutcome {
            tool_calls_used: self.tool_calls_used(),
            text: self.accumulated_text,
            tool_calls: self.tool_calls,
            tool_results: self.tool_results,
            retrieval_sources: self.retrieval_sources,
            web_search_used: self.web_search_used,
            session_id: self.session_id,
            aborted: self.aborted,
            iterations: self.iteration_count,
            conversation: self.conversation,
            finished_at: Utc::now(),
        }
    }
}

/// What a finalized or aborted run reports back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    /// All assistant text streamed during the run. Partial when `aborted`.
    pub text: String,
    pub tool_calls_used: Vec<String>,
    pub tool_calls: Vec<ToolCall>,
    pub tool_results: Vec<ToolResult>,
    /// Grounding source URIs, duplicates preserved.
    pub retrieval_sources: Vec<String>,
    pub web_search_used: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub aborted: bool,
    /// Number of adapter invocations.
    pub iterations: usize,
    /// The run's conversation, ready for the caller to persist.
    pub conversation: Vec<Message>,
    pub finished_at: DateTime<Utc>,
}
