//! Application state shared across handlers.

use std::sync::Arc;

use uuid::Uuid;

use crate::gate::RateGate;
use crate::session::SessionManager;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Session lifecycle manager.
    pub sessions: Arc<SessionManager>,
    /// Admission/rate gate consulted before manager operations.
    pub gate: Arc<RateGate>,
    /// Shared secret for admin endpoints. `None` locks them out entirely.
    pub admin_token: Option<Uuid>,
}

impl AppState {
    pub fn new(sessions: Arc<SessionManager>, gate: RateGate, admin_token: Option<Uuid>) -> Self {
        Self {
            sessions,
            gate: Arc::new(gate),
            admin_token,
        }
    }
}
