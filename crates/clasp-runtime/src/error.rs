//! Runtime error types.

use thiserror::Error;

use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Runtime is not running")]
    NotRunning,

    #[error("Runtime is already running")]
    AlreadyRunning,

    #[error("Failed to listen for the shutdown signal: {0}")]
    Signal(#[from] std::io::Error),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
