//! Gemini CLI (`gemini --output-format stream-json`).
//!
//! Sessions cannot be resumed from a non-interactive invocation, so every
//! turn replays the flattened conversation.

use serde::Deserialize;

use super::CliBackend;
use crate::error::SageError;
use crate::models::CliKind;
use crate::types::StreamEvent;

pub struct GeminiCli;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GeminiCliEvent {
    Init {
        session_id: Option<String>,
    },
    Message {
        #[serde(default)]
        role: String,
        #[serde(default)]
        content: String,
    },
    Result {
        #[serde(default)]
        status: String,
        error: Option<GeminiCliError>,
    },
    Error {
        #[serde(default)]
        message: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub struct GeminiCliError {
    #[serde(default)]
    message: String,
}

impl CliBackend for GeminiCli {
    type Event = GeminiCliEvent;

    const KIND: CliKind = CliKind::GeminiCli;

    fn args(model: Option<&str>, _resume_session: Option<&str>) -> Vec<String> {
        let mut args = vec!["--output-format".to_string(), "stream-json".to_string()];
        if let Some(model) = model {
            args.extend(["-m".to_string(), model.to_string()]);
        }
        args
    }

    fn map_event(event: GeminiCliEvent) -> Option<StreamEvent> {
        let provider = Self::KIND.as_str();
        match event {
            GeminiCliEvent::Init {
                session_id: Some(id),
            } => Some(StreamEvent::SessionId(id)),
            GeminiCliEvent::Message { role, content } if role == "assistant" => {
                (!content.is_empty()).then_some(StreamEvent::TextDelta(content))
            }
            GeminiCliEvent::Result { status, error } if status == "error" => {
                let message = error
                    .map(|e| e.message)
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| "request failed".to_string());
                Some(StreamEvent::Error(SageError::protocol(provider, message)))
            }
            GeminiCliEvent::Error { message } => {
                Some(StreamEvent::Error(SageError::protocol(provider, message)))
            }
            _ => None,
        }
    }
}
