//! External CLI backend identifiers.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::capabilities::ModelCapabilities;

/// The command-line AI backends Sage can drive.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString,
)]
pub enum CliKind {
    #[strum(serialize = "claude-code", to_string = "claude")]
    ClaudeCode,
    #[strum(serialize = "codex-cli", to_string = "codex")]
    Codex,
    #[strum(to_string = "gemini-cli")]
    GeminiCli,
}

impl CliKind {
    pub const ALL: [CliKind; 3] = [Self::ClaudeCode, Self::Codex, Self::GeminiCli];

    /// Provider key, also used as the session-registry provider name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ClaudeCode => "claude",
            Self::Codex => "codex",
            Self::GeminiCli => "gemini-cli",
        }
    }

    /// Executable name resolved through `PATH` as the last resort.
    pub const fn executable(self) -> &'static str {
        match self {
            Self::ClaudeCode => "claude",
            Self::Codex => "codex",
            Self::GeminiCli => "gemini",
        }
    }

    /// Human-readable name used in remediation messages.
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::ClaudeCode => "Claude Code",
            Self::Codex => "Codex CLI",
            Self::GeminiCli => "Gemini CLI",
        }
    }

    pub fn capabilities(self) -> ModelCapabilities {
        ModelCapabilities::cli(matches!(self, Self::ClaudeCode | Self::Codex))
    }
}
