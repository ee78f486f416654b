//! Error types shared by bot implementations.
//!
//! Framework-level errors (extraction, parsing) are defined in
//! `clasp-framework`.

use thiserror::Error;

/// Error type for bot API calls.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The bot is not connected.
    #[error("bot is not connected")]
    NotConnected,
    /// The API call timed out.
    #[error("API call timed out")]
    Timeout,
    /// The platform rejected the call.
    #[error("API error ({retcode}): {message}")]
    ApiError { retcode: i64, message: String },
    /// Failed to serialize/deserialize.
    #[error("serialization error: {0}")]
    SerializationError(String),
    /// The event does not carry the session needed to reply.
    #[error("missing session info")]
    MissingSession,
    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

/// Result type for API calls.
pub type ApiResult<T> = Result<T, ApiError>;
