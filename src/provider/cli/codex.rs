//! OpenAI Codex (`codex exec --json`).

use serde::Deserialize;

use super::CliBackend;
use crate::error::SageError;
use crate::models::CliKind;
use crate::types::StreamEvent;

pub struct Codex;

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum CodexEvent {
    #[serde(rename = "thread.started")]
    ThreadStarted { thread_id: String },
    #[serde(rename = "item.completed")]
    ItemCompleted { item: CodexItem },
    #[serde(rename = "turn.failed")]
    TurnFailed { error: Option<CodexError> },
    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        message: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub struct CodexItem {
    #[serde(rename = "type", alias = "item_type", default)]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
pub struct CodexError {
    #[serde(default)]
    message: String,
}

impl CliBackend for Codex {
    type Event = CodexEvent;

    const KIND: CliKind = CliKind::Codex;

    fn args(model: Option<&str>, resume_session: Option<&str>) -> Vec<String> {
        let mut args: Vec<String> = ["exec", "--json", "--skip-git-repo-check"]
            .into_iter()
            .map(String::from)
            .collect();
        if let Some(model) = model {
            args.extend(["-m".to_string(), model.to_string()]);
        }
        if let Some(session) = resume_session {
            args.extend(["resume".to_string(), session.to_string()]);
        }
        // Read the prompt from stdin.
        args.push("-".to_string());
        args
    }

    fn map_event(event: CodexEvent) -> Option<StreamEvent> {
        let provider = Self::KIND.as_str();
        match event {
            CodexEvent::ThreadStarted { thread_id } => Some(StreamEvent::SessionId(thread_id)),
            CodexEvent::ItemCompleted { item } if item.kind == "agent_message" => {
                (!item.text.is_empty()).then_some(StreamEvent::TextDelta(item.text))
            }
            CodexEvent::TurnFailed { error } => {
                let message = error
                    .map(|e| e.message)
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| "turn failed".to_string());
                Some(StreamEvent::Error(SageError::protocol(provider, message)))
            }
            CodexEvent::Error { message } => {
                Some(StreamEvent::Error(SageError::protocol(provider, message)))
            }
            _ => None,
        }
    }
}
