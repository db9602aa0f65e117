//! Error types for the Parley domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; the top-level [`Error`]
//! wraps them and classifies every failure into an [`ErrorKind`] so the
//! caller can render one human-readable message per exchange.

use thiserror::Error;

/// Fallback shown when neither the service nor the error carries a message.
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong. Please try again.";

/// Notice shown when the user cancelled an exchange.
pub const CONVERSATION_STOPPED: &str = "Conversation stopped";

/// The top-level error type for all Parley operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Remote service errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Cancellation ---
    #[error("Conversation stopped")]
    Aborted,

    // --- Planning loop did not converge ---
    #[error("Planning did not produce an answer within {iterations} iterations")]
    PlanningExhausted { iterations: u32 },

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of a terminal exchange failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network/HTTP failure talking to a model, tool, or planning service.
    Transport,
    /// Missing or rejected credential; the UI should prompt for a key.
    Auth,
    /// A named tool failed or is unavailable.
    ToolExecution,
    /// The cancellation flag was observed.
    AbortedByUser,
    /// A service returned data that could not be interpreted.
    MalformedResponse,
    /// The plan/act/observe loop hit its iteration cap.
    PlanningExhausted,
    /// Configuration or programming errors.
    Internal,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Provider(e) => e.kind(),
            Error::Tool(_) => ErrorKind::ToolExecution,
            Error::Aborted => ErrorKind::AbortedByUser,
            Error::PlanningExhausted { .. } => ErrorKind::PlanningExhausted,
            Error::Serialization(_) => ErrorKind::MalformedResponse,
            Error::Config { .. } | Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether this error is a user-requested stop rather than a failure.
    pub fn is_abort(&self) -> bool {
        matches!(self, Error::Aborted)
    }

    /// The single message shown to the user for this error.
    ///
    /// Service-supplied messages win over generic text.
    pub fn user_message(&self) -> String {
        match self {
            Error::Aborted => CONVERSATION_STOPPED.to_string(),
            Error::Provider(e) => e
                .service_message()
                .map(str::to_string)
                .unwrap_or_else(|| e.to_string()),
            Error::Tool(e) => e.to_string(),
            Error::PlanningExhausted { .. } => self.to_string(),
            Error::Config { message } => message.clone(),
            Error::Serialization(_) | Error::Internal(_) => GENERIC_ERROR_MESSAGE.to_string(),
        }
    }
}

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    /// `retry_after_secs` comes from the `Retry-After` header when present
    #[error("Rate limited by provider: {message}")]
    RateLimited {
        retry_after_secs: Option<u64>,
        message: String,
    },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl ProviderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::AuthenticationFailed(_) => ErrorKind::Auth,
            ProviderError::MalformedResponse(_) => ErrorKind::MalformedResponse,
            _ => ErrorKind::Transport,
        }
    }

    /// The message the remote service itself supplied, if any.
    pub fn service_message(&self) -> Option<&str> {
        match self {
            ProviderError::ApiError { message, .. } if !message.trim().is_empty() => {
                Some(message.as_str())
            }
            ProviderError::AuthenticationFailed(message)
            | ProviderError::RateLimited { message, .. }
                if !message.trim().is_empty() =>
            {
                Some(message.as_str())
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool disabled for this conversation: {0}")]
    Disabled(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },
}

impl ToolError {
    /// Name of the tool that failed.
    pub fn tool_name(&self) -> &str {
        match self {
            ToolError::NotFound(name) | ToolError::Disabled(name) => name,
            ToolError::ExecutionFailed { tool_name, .. } | ToolError::Timeout { tool_name, .. } => {
                tool_name
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn rate_limit_keeps_the_service_message() {
        let err = Error::from(ProviderError::RateLimited {
            retry_after_secs: Some(30),
            message: "Daily Google quota exhausted".into(),
        });
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(err.user_message(), "Daily Google quota exhausted");
    }

    #[test]
    fn tool_error_carries_tool_name() {
        let err = ToolError::ExecutionFailed {
            tool_name: "web_search".into(),
            reason: "connection reset".into(),
        };
        assert_eq!(err.tool_name(), "web_search");
        assert!(err.to_string().contains("connection reset"));
        assert_eq!(Error::Tool(err).kind(), ErrorKind::ToolExecution);
    }

    #[test]
    fn classification_follows_taxonomy() {
        assert_eq!(
            Error::from(ProviderError::AuthenticationFailed("bad key".into())).kind(),
            ErrorKind::Auth
        );
        assert_eq!(
            Error::from(ProviderError::Network("refused".into())).kind(),
            ErrorKind::Transport
        );
        assert_eq!(
            Error::from(ProviderError::MalformedResponse("no message".into())).kind(),
            ErrorKind::MalformedResponse
        );
        assert_eq!(Error::Aborted.kind(), ErrorKind::AbortedByUser);
        assert_eq!(
            Error::PlanningExhausted { iterations: 3 }.kind(),
            ErrorKind::PlanningExhausted
        );
    }

    #[test]
    fn user_message_prefers_service_text() {
        let err = Error::from(ProviderError::ApiError {
            status_code: 400,
            message: "This model's maximum context length is 4097 tokens".into(),
        });
        assert_eq!(
            err.user_message(),
            "This model's maximum context length is 4097 tokens"
        );

        let err = Error::from(ProviderError::ApiError {
            status_code: 500,
            message: "  ".into(),
        });
        assert!(err.user_message().contains("500"));
    }

    #[test]
    fn abort_resolves_to_stop_notice() {
        assert!(Error::Aborted.is_abort());
        assert_eq!(Error::Aborted.user_message(), CONVERSATION_STOPPED);
        assert_eq!(
            Error::Internal("boom".into()).user_message(),
            GENERIC_ERROR_MESSAGE
        );
    }
}
