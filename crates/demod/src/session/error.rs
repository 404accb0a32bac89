//! Session lifecycle error types.

use thiserror::Error;

use crate::launcher::LaunchError;
use crate::ports::PortsExhausted;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors surfaced by the session lifecycle manager.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Admission failed: the concurrency cap is reached.
    #[error("maximum number of demo sessions reached")]
    CapacityExceeded,

    /// Resource exhaustion: every port in the configured range is occupied.
    #[error(transparent)]
    NoPortAvailable(#[from] PortsExhausted),

    /// Unknown or already-removed session ID. For idempotent stop this
    /// means "already stopped", not a loud failure.
    #[error("session not found: {0}")]
    NotFound(String),

    /// Launch failure recorded on the session record.
    #[error(transparent)]
    Launch(#[from] LaunchError),
}
