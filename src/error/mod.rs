//! Error types for Sage.

use thiserror::Error;

/// Primary error type for all Sage operations.
#[derive(Error, Debug)]
pub enum SageError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The transport itself failed: non-zero process exit, HTTP failure,
    /// dropped connection. The message is surfaced verbatim.
    #[error("{provider} transport failed: {message}")]
    Transport { provider: String, message: String },

    /// The backend answered with a well-formed error object.
    #[error("{provider} returned an error: {message}")]
    Protocol { provider: String, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// A CLI backend is missing or unusable. The message is remediation text
    /// meant for the end user.
    #[error("{backend} is not available: {remediation}")]
    Unavailable { backend: String, remediation: String },

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Tool execution error: {tool_name}: {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("maximum tool iterations reached ({max})")]
    IterationLimit { max: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Broad error category for routing caller-side handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Transport,
    Protocol,
    Network,
    Timeout,
    Configuration,
    Serialization,
    ToolExecution,
    IterationLimit,
    Unavailable,
    Unknown,
}

impl SageError {
    pub fn transport(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn protocol(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Protocol {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn unavailable(backend: impl Into<String>, remediation: impl Into<String>) -> Self {
        Self::Unavailable {
            backend: backend.into(),
            remediation: remediation.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Transport { .. } => ErrorCategory::Transport,
            Self::Protocol { .. } => ErrorCategory::Protocol,
            Self::Network(e) if e.is_timeout() => ErrorCategory::Timeout,
            Self::Network(_) => ErrorCategory::Network,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::ToolExecution { .. } => ErrorCategory::ToolExecution,
            Self::IterationLimit { .. } => ErrorCategory::IterationLimit,
            Self::Unavailable { .. } => ErrorCategory::Unavailable,
            _ => ErrorCategory::Unknown,
        }
    }

    /// Whether a caller could reasonably retry the same request.
    ///
    /// Sage itself never retries; this is advisory.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Network | ErrorCategory::Timeout | ErrorCategory::Transport
        )
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, SageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iteration_limit_is_distinct_from_transport() {
        let err = SageError::IterationLimit { max: 10 };
        assert_eq!(err.category(), ErrorCategory::IterationLimit);
        assert!(err.to_string().contains("maximum tool iterations reached"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn transport_message_is_verbatim() {
        let err = SageError::transport("codex", "exit status 2: not logged in");
        assert_eq!(
            err.to_string(),
            "codex transport failed: exit status 2: not logged in"
        );
        assert!(err.is_retryable());
    }

    #[test]
    fn unavailable_carries_remediation() {
        let err = SageError::unavailable("claude", "Install with `npm i -g @anthropic-ai/claude-code`");
        assert_eq!(err.category(), ErrorCategory::Unavailable);
        assert!(err.to_string().contains("npm i -g"));
    }
}
