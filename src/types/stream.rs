//! Provider-neutral streaming events.

use futures::stream::BoxStream;

use super::message::ToolCall;
use crate::error::SageError;

/// One event produced by a provider adapter while a transport is live.
///
/// Adapters narrow their backend's wire schema onto this closed set; anything
/// else on the wire is dropped at the adapter boundary.
#[derive(Debug)]
pub enum StreamEvent {
    /// Incremental assistant text.
    TextDelta(String),
    /// The model asked for a tool to be executed.
    ToolCallRequested(ToolCall),
    /// Grounding metadata was attached to the response.
    RetrievalUsed(Grounding),
    /// Provider-issued conversation id for resumable backends.
    SessionId(String),
    /// Fatal failure; no further events follow.
    Error(SageError),
    /// The transport was terminated by the cancellation controller.
    Aborted,
}

/// What kind of grounding a response used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grounding {
    /// Hosted web search contributed to the answer.
    WebSearch,
    /// Source URIs of retrieval-store chunks, in the order reported.
    Sources(Vec<String>),
}

/// Event stream returned by a provider adapter for one invocation.
pub type EventStream = BoxStream<'static, StreamEvent>;
