//! Completion error taxonomy.

use std::time::Duration;

use adforge_models::FailureCategory;
use thiserror::Error;

pub type CompletionResult<T> = Result<T, CompletionError>;

const DEFAULT_THROTTLE_BACKOFF: Duration = Duration::from_secs(5);
const DEFAULT_TRANSPORT_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum CompletionError {
    /// No usable output: blocked, no candidates, blank or non-JSON text.
    #[error("Empty response: {0}")]
    EmptyResponse(String),

    /// Output parsed as JSON but does not match the requested structure.
    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    #[error("Throttled by provider: {message}")]
    Throttled {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Request exceeds the provider's size ceiling; never truncated silently.
    #[error("Request payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CompletionError {
    pub fn empty_response(msg: impl Into<String>) -> Self {
        Self::EmptyResponse(msg.into())
    }

    pub fn schema_violation(msg: impl Into<String>) -> Self {
        Self::SchemaViolation(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Map a non-success HTTP status to an error.
    pub fn from_http_status(status: u16, body: &str, retry_after: Option<Duration>) -> Self {
        let message = body.trim().chars().take(500).collect::<String>();
        match status {
            429 => Self::Throttled {
                message,
                retry_after,
            },
            413 => Self::PayloadTooLarge(message),
            500 | 502 | 503 | 504 => Self::Transport(format!("HTTP {}: {}", status, message)),
            _ => Self::Rejected { status, message },
        }
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CompletionError::Throttled { .. } | CompletionError::Transport(_)
        )
    }

    /// Suggested delay before a retry; `None` if retrying as-is is pointless.
    pub fn backoff_hint(&self) -> Option<Duration> {
        match self {
            CompletionError::Throttled { retry_after, .. } => {
                Some(retry_after.unwrap_or(DEFAULT_THROTTLE_BACKOFF))
            }
            CompletionError::Transport(_) => Some(DEFAULT_TRANSPORT_BACKOFF),
            _ => None,
        }
    }

    /// Failure category recorded on assets caught in a failed call.
    pub fn failure_category(&self) -> FailureCategory {
        match self {
            CompletionError::EmptyResponse(_) => FailureCategory::EmptyResponse,
            CompletionError::SchemaViolation(_) => FailureCategory::SchemaViolation,
            CompletionError::Throttled { .. } => FailureCategory::Throttled,
            CompletionError::Transport(_) => FailureCategory::Transport,
            CompletionError::PayloadTooLarge(_) => FailureCategory::PayloadTooLarge,
            CompletionError::Rejected { .. } | CompletionError::Config(_) => {
                FailureCategory::Rejected
            }
        }
    }
}
