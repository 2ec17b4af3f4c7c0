//! Hosted Gemini model definitions.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::capabilities::ModelCapabilities;

/// Hosted Gemini models.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString)]
pub enum GeminiModel {
    #[strum(serialize = "gemini-2.5-pro")]
    Gemini25Pro,
    #[strum(serialize = "gemini-2.5-flash")]
    Gemini25Flash,
    #[strum(serialize = "gemini-2.5-flash-lite")]
    Gemini25FlashLite,
    #[strum(serialize = "gemini-2.0-flash")]
    Gemini20Flash,
    #[strum(serialize = "gemini-2.0-flash-lite")]
    Gemini20FlashLite,
    #[strum(serialize = "gemini-3-pro-preview")]
    Gemini3ProPreview,
    #[strum(serialize = "gemini-3-flash-preview")]
    Gemini3FlashPreview,
    /// Custom/unknown model id.
    #[strum(default)]
    Custom(String),
}

impl GeminiModel {
    /// Known model for `id`, or [`GeminiModel::Custom`].
    pub fn from_id(id: &str) -> Self {
        id.parse().unwrap_or_else(|_| Self::Custom(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Gemini25Pro => "gemini-2.5-pro",
            Self::Gemini25Flash => "gemini-2.5-flash",
            Self::Gemini25FlashLite => "gemini-2.5-flash-lite",
            Self::Gemini20Flash => "gemini-2.0-flash",
            Self::Gemini20FlashLite => "gemini-2.0-flash-lite",
            Self::Gemini3ProPreview => "gemini-3-pro-preview",
            Self::Gemini3FlashPreview => "gemini-3-flash-preview",
            Self::Custom(s) => s,
        }
    }

    pub fn capabilities(&self) -> ModelCapabilities {
        let mut caps = ModelCapabilities::hosted();
        match self {
            // File search cannot be combined with function declarations here.
            Self::Gemini20Flash | Self::Gemini20FlashLite | Self::Gemini25FlashLite => {
                caps.supports_tools_with_retrieval = false;
            }
            Self::Custom(id) if !custom_supports_tools(id) => {
                caps.supports_tools = false;
                caps.supports_tools_with_retrieval = false;
            }
            _ => {}
        }
        caps
    }
}

/// Open-weight and media-generation models do not do function calling.
fn custom_supports_tools(model_id: &str) -> bool {
    !(model_id.starts_with("gemma")
        || model_id.contains("-image")
        || model_id.contains("-tts")
        || model_id.contains("embedding"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn known_ids_parse_and_round_trip() {
        let model = GeminiModel::from_str("gemini-2.5-flash").unwrap();
        assert_eq!(model, GeminiModel::Gemini25Flash);
        assert_eq!(model.as_str(), "gemini-2.5-flash");
    }

    #[test]
    fn unknown_ids_become_custom() {
        let model = GeminiModel::from_str("gemini-exp-1206").unwrap();
        assert_eq!(model.as_str(), "gemini-exp-1206");
        assert!(model.capabilities().supports_tools);
    }

    #[test]
    fn gemma_has_no_function_calling() {
        let caps = GeminiModel::from_str("gemma-3-27b-it").unwrap().capabilities();
        assert!(!caps.supports_tools);
        assert!(caps.supports_web_search);
    }

    #[test]
    fn lite_models_cannot_mix_tools_and_retrieval() {
        let caps = GeminiModel::Gemini25FlashLite.capabilities();
        assert!(caps.supports_tools);
        assert!(!caps.supports_tools_with_retrieval);
    }
}
