//! Claude Code (`claude -p --output-format stream-json --verbose`).

use serde::Deserialize;

use super::CliBackend;
use crate::error::SageError;
use crate::models::CliKind;
use crate::types::StreamEvent;

pub struct ClaudeCode;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClaudeEvent {
    System {
        #[serde(default)]
        subtype: String,
        session_id: Option<String>,
    },
    Assistant {
        message: ClaudeMessage,
    },
    Result {
        #[serde(default)]
        is_error: bool,
        #[serde(default)]
        subtype: String,
        result: Option<String>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub struct ClaudeMessage {
    #[serde(default)]
    content: Vec<ClaudeContent>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClaudeContent {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

impl CliBackend for ClaudeCode {
    type Event = ClaudeEvent;

    const KIND: CliKind = CliKind::ClaudeCode;

    fn args(model: Option<&str>, resume_session: Option<&str>) -> Vec<String> {
        let mut args: Vec<String> = ["-p", "--output-format", "stream-json", "--verbose"]
            .into_iter()
            .map(String::from)
            .collect();
        if let Some(model) = model {
            args.extend(["--model".to_string(), model.to_string()]);
        }
        if let Some(session) = resume_session {
            args.extend(["--resume".to_string(), session.to_string()]);
        }
        args
    }

    fn map_event(event: ClaudeEvent) -> Option<StreamEvent> {
        match event {
            ClaudeEvent::System {
                subtype,
                session_id: Some(id),
            } if subtype == "init" => Some(StreamEvent::SessionId(id)),
            ClaudeEvent::Assistant { message } => {
                let text: String = message
                    .content
                    .into_iter()
                    .filter_map(|block| match block {
                        ClaudeContent::Text { text } => Some(text),
                        ClaudeContent::Other => None,
                    })
                    .collect();
                (!text.is_empty()).then_some(StreamEvent::TextDelta(text))
            }
            ClaudeEvent::Result {
                is_error: true,
                subtype,
                result,
            } => {
                let message = result.filter(|r| !r.is_empty()).unwrap_or(subtype);
                Some(StreamEvent::Error(SageError::protocol(
                    Self::KIND.as_str(),
                    message,
                )))
            }
            _ => None,
        }
    }
}
