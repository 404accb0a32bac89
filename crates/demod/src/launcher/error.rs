//! Launcher error types.

use std::time::Duration;

use thiserror::Error;

/// Result type for launcher operations.
pub type LaunchResult<T> = Result<T, LaunchError>;

/// Errors from the external launcher process.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The launcher exited non-zero.
    #[error("launcher {action} failed: {message}")]
    ScriptFailed { action: String, message: String },

    /// Launcher output did not contain a container-ref/port line.
    #[error("failed to parse launcher output: {0}")]
    UnparseableOutput(String),

    /// The launcher did not finish within the enforced deadline.
    #[error("launcher {action} timed out after {timeout:?}")]
    TimedOut { action: String, timeout: Duration },

    /// Invalid input provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The launcher process could not be spawned.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
