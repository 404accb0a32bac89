//! Session data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Session status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Launcher has been dispatched but has not reported back yet.
    Starting,
    /// Container is up and reachable on the session port.
    Running,
    /// Launch failed; the record stays visible for diagnosis.
    Error,
    /// Transient marker during teardown; never observable in listings
    /// for long, because terminated records are removed from the store.
    Terminated,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Starting => write!(f, "starting"),
            SessionStatus::Running => write!(f, "running"),
            SessionStatus::Error => write!(f, "error"),
            SessionStatus::Terminated => write!(f, "terminated"),
        }
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "starting" => Ok(SessionStatus::Starting),
            "running" => Ok(SessionStatus::Running),
            "error" => Ok(SessionStatus::Error),
            "terminated" => Ok(SessionStatus::Terminated),
            _ => Err(format!("unknown session status: {}", s)),
        }
    }
}

/// Immutable metadata about the requesting client, kept for observability.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientMeta {
    /// Requesting user agent, or "unknown".
    pub user_agent: String,
    /// Source address of the creation request.
    pub remote_addr: String,
}

/// A demo session: one port and one external container for one visitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Unique, time-ordered session ID (e.g. "demo-1724745600000-3fa4b2c1").
    pub id: String,
    /// TCP port exclusively owned by this session while it is live.
    pub port: u16,
    /// Current lifecycle state.
    pub status: SessionStatus,
    /// When the session record was created.
    pub created_at: DateTime<Utc>,
    /// Fixed at creation; never extended.
    pub expires_at: DateTime<Utc>,
    /// Container reference reported by the launcher. Set at most once.
    pub container_ref: Option<String>,
    /// Requesting client metadata.
    pub client_meta: ClientMeta,
    /// Launch error message, present only in the error state.
    pub last_error: Option<String>,
    /// URL where the demo instance is reachable.
    pub access_url: String,
}

impl Session {
    /// Create a new record in the starting state.
    pub fn new(
        id: String,
        port: u16,
        expires_at: DateTime<Utc>,
        client_meta: ClientMeta,
        public_host: &str,
    ) -> Self {
        Self {
            id,
            port,
            status: SessionStatus::Starting,
            created_at: Utc::now(),
            expires_at,
            container_ref: None,
            client_meta,
            last_error: None,
            access_url: format!("http://{}:{}", public_host, port),
        }
    }

    /// Whether the session counts toward the concurrency cap.
    pub fn is_active(&self) -> bool {
        matches!(
            self.status,
            SessionStatus::Starting | SessionStatus::Running
        )
    }

    /// Whether the session still owns its port.
    pub fn is_live(&self) -> bool {
        self.status != SessionStatus::Terminated
    }

    /// Whether the session is past its deadline at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Generate a session ID that is unique and sorts by creation time.
pub fn generate_session_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("demo-{}-{}", Utc::now().timestamp_millis(), &suffix[..8])
}
