//! Model selection and parsing.

use std::str::FromStr;

use super::{CliKind, GeminiModel, LanguageModel};
use crate::error::SageError;

/// Parses model identifiers into a [`LanguageModel`].
pub struct ModelSelector;

impl ModelSelector {
    /// Parse a model identifier.
    ///
    /// Accepted forms: `"provider:model_id"` (`gemini:gemini-2.5-pro`,
    /// `claude:sonnet`, `codex:gpt-5-codex`), a bare CLI backend name
    /// (`claude`, `codex`, `gemini-cli`), or a bare hosted model id
    /// (`gemini-2.5-flash`).
    pub fn parse(s: &str) -> Result<LanguageModel, SageError> {
        let s = s.trim();
        let Some((provider, model_id)) = s.split_once(':') else {
            if let Ok(kind) = CliKind::from_str(s) {
                return Ok(LanguageModel::cli(kind));
            }
            if s.starts_with("gemini-") || s.starts_with("gemma-") {
                return Ok(LanguageModel::Gemini(gemini_model(s)));
            }
            return Err(SageError::InvalidArgument(format!(
                "Invalid model selector '{s}': expected 'provider:model_id'"
            )));
        };

        if model_id.is_empty() {
            return Err(SageError::InvalidArgument(format!(
                "Invalid model selector '{s}': empty model id"
            )));
        }

        match provider {
            "gemini" | "google" => Ok(LanguageModel::Gemini(gemini_model(model_id))),
            other => match CliKind::from_str(other) {
                Ok(kind) => Ok(LanguageModel::Cli {
                    kind,
                    model: Some(model_id.to_string()),
                }),
                Err(_) => Ok(LanguageModel::Custom {
                    provider: provider.to_string(),
                    model_id: model_id.to_string(),
                }),
            },
        }
    }
}

fn gemini_model(id: &str) -> GeminiModel {
    GeminiModel::from_id(id)
}

impl FromStr for LanguageModel {
    type Err = SageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelSelector::parse(s)
    }
}
