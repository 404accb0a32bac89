//! Session lifecycle manager.
//!
//! Orchestrates each session through `Starting -> Running -> (Error |
//! Terminated)`. Creation validates admission and reserves a port
//! atomically, then drives the external launcher from a tracked background
//! task so request latency is bounded regardless of launcher slowness.
//!
//! Expiry is enforced twice: a per-session timer scheduled when the launch
//! succeeds, and a periodic sweep over the whole store. Both paths funnel
//! into `stop_session`, which is idempotent.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::launcher::Launcher;
use crate::ports::PortAllocator;

use super::error::{SessionError, SessionResult};
use super::models::{ClientMeta, Session, SessionStatus, generate_session_id};
use super::store::{SessionStore, StatusCounts};

/// Session manager configuration.
#[derive(Debug, Clone)]
pub struct SessionManagerConfig {
    /// Maximum number of concurrently starting/running sessions.
    pub max_sessions: usize,
    /// Lifetime of a session, fixed at creation.
    pub session_timeout: Duration,
    /// Interval of the expiry sweep.
    pub cleanup_interval: Duration,
    /// Inclusive port range to allocate from.
    pub port_range_start: u16,
    /// Inclusive port range end.
    pub port_range_end: u16,
    /// Host name used in access URLs handed to clients.
    pub public_host: String,
    /// Deadline for the best-effort stop pass on shutdown.
    pub shutdown_timeout: Duration,
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self {
            max_sessions: 10,
            session_timeout: Duration::from_secs(1800),
            cleanup_interval: Duration::from_secs(300),
            port_range_start: 8100,
            port_range_end: 8199,
            public_host: "localhost".to_string(),
            shutdown_timeout: Duration::from_secs(20),
        }
    }
}

/// Orchestrates session lifecycles against the store and the launcher.
pub struct SessionManager {
    config: SessionManagerConfig,
    store: SessionStore,
    allocator: PortAllocator,
    launcher: Arc<dyn Launcher>,
}

impl SessionManager {
    pub fn new(config: SessionManagerConfig, launcher: Arc<dyn Launcher>) -> Self {
        let allocator = PortAllocator::new(config.port_range_start, config.port_range_end);
        Self {
            config,
            store: SessionStore::new(),
            allocator,
            launcher,
        }
    }

    pub fn config(&self) -> &SessionManagerConfig {
        &self.config
    }

    /// Create a session and kick off its launch in the background.
    ///
    /// Admission (capacity), port allocation and the insert happen
    /// atomically; the returned record is always in the starting state and
    /// callers observe launch progress via status polls.
    pub fn create_session(self: &Arc<Self>, client_meta: ClientMeta) -> SessionResult<Session> {
        let expires_at = Utc::now()
            + chrono::Duration::from_std(self.config.session_timeout)
                .unwrap_or(chrono::Duration::seconds(1800));

        let session = self.store.admit(self.config.max_sessions, &self.allocator, |port| {
            Session::new(
                generate_session_id(),
                port,
                expires_at,
                client_meta,
                &self.config.public_host,
            )
        })?;

        info!(
            session_id = %session.id,
            port = session.port,
            expires_at = %session.expires_at,
            "created session"
        );

        let manager = Arc::clone(self);
        let session_id = session.id.clone();
        tokio::spawn(async move {
            manager.drive_launch(&session_id).await;
        });

        Ok(session)
    }

    /// Drive the launcher for a freshly created session and write the
    /// outcome back to the store.
    ///
    /// Runs off the request path. Holds the per-key lock for the whole
    /// launch-then-write-back sequence so a concurrent stop is ordered
    /// either entirely before (record already gone, nothing launched) or
    /// entirely after (container ref visible to the stop).
    async fn drive_launch(self: &Arc<Self>, session_id: &str) {
        let Some(op_lock) = self.store.op_lock(session_id) else {
            return;
        };
        let _guard = op_lock.lock().await;

        // Stopped before the launch began.
        let Some(session) = self.store.get(session_id) else {
            return;
        };
        if session.status != SessionStatus::Starting {
            return;
        }

        match self
            .launcher
            .start(session_id, session.port, session.expires_at)
            .await
        {
            Ok(container_ref) => {
                info!(session_id, container_ref = %container_ref, "container started");
                let updated = self.store.update(session_id, |s| {
                    s.status = SessionStatus::Running;
                    s.container_ref = Some(container_ref.clone());
                });
                match updated {
                    Some(_) => self.schedule_expiry(session_id, session.expires_at),
                    // Record vanished while we held the key lock; should not
                    // happen, but never leak the container if it does.
                    None => {
                        warn!(session_id, "record gone after launch; tearing container down");
                        if let Err(e) = self.launcher.stop(&container_ref).await {
                            warn!(session_id, error = %e, "orphan container teardown failed");
                        }
                    }
                }
            }
            Err(e) => {
                // No automatic retry: a retry is a client-initiated new
                // session, which avoids retry storms against a broken
                // launcher.
                error!(session_id, error = %e, "launch failed");
                self.store.update(session_id, |s| {
                    s.status = SessionStatus::Error;
                    s.last_error = Some(e.to_string());
                });
            }
        }
    }

    /// Schedule the per-session expiry timer.
    fn schedule_expiry(self: &Arc<Self>, session_id: &str, expires_at: DateTime<Utc>) {
        let manager = Arc::clone(self);
        let id = session_id.to_string();
        let delay = (expires_at - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO);

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Detach our own handle first so teardown never aborts the task
            // that is performing it.
            manager.store.take_expiry_timer(&id);
            info!(session_id = %id, "session expired");
            // NotFound here means another path already stopped it.
            let _ = manager.stop_session(&id).await;
        });

        self.store.set_expiry_timer(session_id, handle);
    }

    /// Stop a session: cancel its expiry timer, tear down the container if
    /// one was launched, and remove the record.
    ///
    /// Idempotent: a second call after successful removal returns
    /// `NotFound`, which callers treat as "already stopped". Teardown
    /// failures are logged and never block record removal; a leaked
    /// container is a lesser harm than a permanently undeletable record.
    pub async fn stop_session(&self, session_id: &str) -> SessionResult<()> {
        let Some(op_lock) = self.store.op_lock(session_id) else {
            return Err(SessionError::NotFound(session_id.to_string()));
        };
        let _guard = op_lock.lock().await;

        // Re-check under the key lock: a concurrent stop may have finished
        // while we waited.
        let Some(container_ref) = self.store.begin_teardown(session_id) else {
            return Err(SessionError::NotFound(session_id.to_string()));
        };

        if let Some(container_ref) = container_ref {
            if let Err(e) = self.launcher.stop(&container_ref).await {
                warn!(
                    session_id,
                    container_ref = %container_ref,
                    error = %e,
                    "launcher cleanup failed; removing record anyway"
                );
            }
        }

        self.store.remove(session_id);
        info!(session_id, "session stopped");
        Ok(())
    }

    /// Stop every session whose deadline has passed.
    ///
    /// Safety net for missed or cancelled timers; runs alongside the
    /// per-session timers, not instead of them.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) {
        for session in self.store.list() {
            if session.is_expired(now) && session.is_live() {
                info!(session_id = %session.id, "sweeping expired session");
                // NotFound means we lost the race to a timer or an
                // explicit stop.
                let _ = self.stop_session(&session.id).await;
            }
        }
    }

    /// Spawn the periodic expiry sweep. The returned handle is aborted on
    /// shutdown.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        let period = self.config.cleanup_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                manager.sweep_expired(Utc::now()).await;
            }
        })
    }

    /// Pure read of a session snapshot.
    pub fn status(&self, session_id: &str) -> Option<Session> {
        self.store.get(session_id)
    }

    /// Snapshot of all tracked sessions.
    pub fn list_sessions(&self) -> Vec<Session> {
        self.store.list()
    }

    /// Counts by state.
    pub fn counts(&self) -> StatusCounts {
        self.store.counts()
    }

    /// Number of sessions counting toward the concurrency cap.
    pub fn active_count(&self) -> usize {
        let counts = self.store.counts();
        counts.starting + counts.running
    }

    /// Stop every tracked session, best-effort. Returns the number of
    /// sessions that were targeted, regardless of individual stop failures.
    pub async fn cleanup_all(&self) -> usize {
        let sessions = self.store.list();
        let count = sessions.len();
        for session in sessions {
            let _ = self.stop_session(&session.id).await;
        }
        count
    }

    /// Shutdown pass: stop everything within the configured deadline.
    /// Exceeding the deadline logs and returns; forced shutdown is allowed
    /// to leak.
    pub async fn shutdown(&self) {
        let tracked = self.store.len();
        if tracked == 0 {
            info!("no sessions to stop on shutdown");
            return;
        }

        info!(count = tracked, "stopping sessions before exit");
        match tokio::time::timeout(self.config.shutdown_timeout, self.cleanup_all()).await {
            Ok(stopped) => info!(count = stopped, "shutdown cleanup complete"),
            Err(_) => warn!(
                remaining = self.store.len(),
                "shutdown deadline exceeded; leaking remaining sessions"
            ),
        }
    }
}
