//! Error types for the Clasp framework.

use thiserror::Error;

/// Returned by a service when an event is **not** meant for it.
///
/// The dispatcher recognises this error and silently moves on to the next
/// service without logging anything. All other errors are treated as
/// genuine failures.
#[derive(Debug, Clone, Error)]
#[error("event skipped by filter")]
pub struct EventSkipped;

/// Errors that can occur during context extraction.
#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    /// The event type does not match the expected type.
    #[error("event type mismatch: expected '{expected}', got '{got}'")]
    EventTypeMismatch {
        /// Expected type name.
        expected: &'static str,
        /// Actual event name.
        got: &'static str,
    },

    /// The bot type does not match the expected type.
    #[error("bot type mismatch: expected '{expected}'")]
    BotTypeMismatch {
        /// Expected bot type name.
        expected: &'static str,
    },

    /// No command result was published for this dispatch.
    #[error("no command result in context; is the service wrapped by a command layer?")]
    NoCommandResult,

    /// The published result has nothing to offer for the requested parameter.
    #[error("'{0}' is not provided by the command result")]
    NotProvided(String),

    /// Custom extraction error.
    #[error("{0}")]
    Custom(String),
}

impl ExtractError {
    /// Creates a custom extraction error.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }
}

/// Result type for extraction operations.
pub type ExtractResult<T> = Result<T, ExtractError>;
