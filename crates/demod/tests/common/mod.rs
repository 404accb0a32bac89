//! Test utilities and common setup.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Method, Request};
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use demod::api::{self, AppState};
use demod::gate::{GateLimits, RateGate};
use demod::launcher::{LaunchError, LaunchResult, Launcher};
use demod::session::{SessionManager, SessionManagerConfig, SessionStatus};

/// Admin token used by test apps (a fixed UUIDv4).
pub const ADMIN_TOKEN: &str = "d2f1b6a0-3c4e-4a5b-9c8d-7e6f5a4b3c2d";

/// Launcher test double. Records calls and fails on demand.
#[derive(Default)]
pub struct MockLauncher {
    /// Fail every start call with a script error.
    pub fail_start: bool,
    /// Fail every stop call with a script error.
    pub fail_stop: bool,
    /// Hold start calls open for this long before returning.
    pub start_delay: Option<Duration>,
    pub started: Mutex<Vec<(String, u16)>>,
    pub stopped: Mutex<Vec<String>>,
}

impl MockLauncher {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail_start: true,
            ..Self::default()
        })
    }

    pub fn started_count(&self) -> usize {
        self.started.lock().unwrap().len()
    }

    pub fn stopped_refs(&self) -> Vec<String> {
        self.stopped.lock().unwrap().clone()
    }
}

#[async_trait]
impl Launcher for MockLauncher {
    async fn start(
        &self,
        session_id: &str,
        port: u16,
        _expires_at: DateTime<Utc>,
    ) -> LaunchResult<String> {
        if let Some(delay) = self.start_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_start {
            return Err(LaunchError::ScriptFailed {
                action: "start".to_string(),
                message: "image pull failed".to_string(),
            });
        }
        self.started
            .lock()
            .unwrap()
            .push((session_id.to_string(), port));
        Ok(format!("mock-{session_id}"))
    }

    async fn stop(&self, container_ref: &str) -> LaunchResult<()> {
        self.stopped.lock().unwrap().push(container_ref.to_string());
        if self.fail_stop {
            return Err(LaunchError::ScriptFailed {
                action: "cleanup".to_string(),
                message: "no such container".to_string(),
            });
        }
        Ok(())
    }
}

/// Manager config that ports tests into an unclaimed range and keeps the
/// background sweeper out of the way.
pub fn test_config() -> SessionManagerConfig {
    SessionManagerConfig {
        max_sessions: 10,
        session_timeout: Duration::from_secs(1800),
        cleanup_interval: Duration::from_secs(3600),
        port_range_start: 48100,
        port_range_end: 48149,
        public_host: "localhost".to_string(),
        shutdown_timeout: Duration::from_secs(5),
    }
}

/// Gate limits high enough to never interfere with functional tests.
pub fn generous_limits() -> GateLimits {
    GateLimits {
        api_limit: 10_000,
        api_window: Duration::from_secs(60),
        create_limit: 10_000,
        create_window: Duration::from_secs(3600),
    }
}

pub fn test_manager(
    config: SessionManagerConfig,
    launcher: Arc<MockLauncher>,
) -> Arc<SessionManager> {
    Arc::new(SessionManager::new(config, launcher))
}

/// Create a test application with a well-behaved launcher.
pub fn test_app() -> (Router, Arc<SessionManager>) {
    test_app_with(test_config(), MockLauncher::ok(), generous_limits())
}

pub fn test_app_with(
    config: SessionManagerConfig,
    launcher: Arc<MockLauncher>,
    limits: GateLimits,
) -> (Router, Arc<SessionManager>) {
    let manager = test_manager(config, launcher);
    let admin_token = Uuid::parse_str(ADMIN_TOKEN).unwrap();
    let state = AppState::new(manager.clone(), RateGate::new(limits), Some(admin_token));
    (api::create_router(state, &[]), manager)
}

/// Build a request carrying the client address the router expects.
pub fn request(method: Method, uri: &str) -> Request<Body> {
    request_from(method, uri, "203.0.113.7:55000")
}

pub fn request_from(method: Method, uri: &str, remote: &str) -> Request<Body> {
    let addr: SocketAddr = remote.parse().unwrap();
    let mut req = Request::builder()
        .uri(uri)
        .method(method)
        .body(Body::empty())
        .unwrap();
    req.extensions_mut().insert(ConnectInfo(addr));
    req
}

pub async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// Poll until the session reaches the given status or the deadline passes.
pub async fn wait_for_status(
    manager: &SessionManager,
    session_id: &str,
    status: SessionStatus,
) -> demod::session::Session {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        if let Some(session) = manager.status(session_id) {
            if session.status == status {
                return session;
            }
        }
        if tokio::time::Instant::now() > deadline {
            panic!("session {session_id} never reached {status:?}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Poll until the session record disappears or the deadline passes.
pub async fn wait_for_removal(manager: &SessionManager, session_id: &str) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while manager.status(session_id).is_some() {
        if tokio::time::Instant::now() > deadline {
            panic!("session {session_id} was never removed");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
