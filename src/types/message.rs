//! Conversation message types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Arguments of a tool call, as produced by the model.
pub type ToolArgumentMap = serde_json::Map<String, serde_json::Value>;

/// A message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_results: Vec<ToolResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Message {
    /// Create a user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text.into())
    }

    /// Create a model message.
    pub fn model(text: impl Into<String>) -> Self {
        Self::new(Role::Model, text.into())
    }

    /// Model turn recording the tool calls it asked for.
    pub fn model_tool_calls(text: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: calls,
            ..Self::new(Role::Model, text.into())
        }
    }

    /// User turn carrying the results of a batch of tool calls.
    pub fn tool_results(results: Vec<ToolResult>) -> Self {
        Self {
            tool_results: results,
            ..Self::new(Role::User, String::new())
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    fn new(role: Role, text: String) -> Self {
        Self {
            role,
            text,
            attachments: Vec::new(),
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
            timestamp: Some(Utc::now()),
        }
    }

    /// True for user turns that only exist to return tool results.
    pub fn is_tool_result_turn(&self) -> bool {
        self.role == Role::User && !self.tool_results.is_empty() && self.text.is_empty()
    }
}

/// Conversation role.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// Binary content attached to a user message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attachment {
    pub mime_type: String,
    /// Base64-encoded payload.
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Attachment {
    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        use base64::Engine;
        Self {
            mime_type: mime_type.into(),
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            name: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A tool call requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: ToolArgumentMap,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        let arguments = match arguments {
            serde_json::Value::Object(map) => map,
            _ => ToolArgumentMap::new(),
        };
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// Outcome of one tool execution. Always produced, even on failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    pub tool_call_name: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ToolResult {
    pub fn ok(tool_call_name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            tool_call_name: tool_call_name.into(),
            success: true,
            payload: Some(payload),
            error_message: None,
        }
    }

    pub fn failure(tool_call_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tool_call_name: tool_call_name.into(),
            success: false,
            payload: None,
            error_message: Some(message.into()),
        }
    }

    /// The JSON object handed back to the model as the function response.
    pub fn response_value(&self) -> serde_json::Value {
        if self.success {
            serde_json::json!({
                "success": true,
                "result": self.payload.clone().unwrap_or(serde_json::Value::Null),
            })
        } else {
            serde_json::json!({
                "success": false,
                "error": self.error_message.clone().unwrap_or_default(),
            })
        }
    }
}
