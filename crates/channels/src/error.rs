use std::{error::Error as StdError, time::Duration};

/// Crate-wide result type for session operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed session errors shared across the session traits.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Input payload or parameter is invalid.
    #[error("invalid session input: {message}")]
    InvalidInput { message: String },

    /// The session is not logged in or its transport is down.
    #[error("session unavailable: {message}")]
    Unavailable { message: String },

    /// The session answered but refused the request.
    #[error("session rejected {operation}: {reason}")]
    Rejected { operation: String, reason: String },

    /// No answer arrived within the allotted time.
    #[error("session {operation} timed out after {}s", timeout.as_secs())]
    Timeout {
        operation: String,
        timeout: Duration,
    },

    /// Wrapped source error from an external dependency.
    #[error("session operation failed: {context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// JSON (de)serialization failed.
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

impl Error {
    #[must_use]
    pub fn invalid_input(message: impl std::fmt::Display) -> Self {
        Self::InvalidInput {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn unavailable(message: impl std::fmt::Display) -> Self {
        Self::Unavailable {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn rejected(operation: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Rejected {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }

    #[must_use]
    pub fn timeout(operation: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout,
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Whether the failure means the session is not ready rather than that
    /// this particular request went wrong.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}
