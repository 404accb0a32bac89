//! In-memory session registry.
//!
//! The store is the single source of truth for session state and the only
//! shared mutable state in the system. A map-level mutex guards the registry
//! structure and makes capacity-check-and-reserve atomic with respect to
//! concurrent creations; a per-key async mutex serializes lifecycle
//! operations that span an external launcher call (single-writer-per-key).
//!
//! Session state is durable only for the lifetime of the process.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;

use crate::ports::PortAllocator;

use super::error::{SessionError, SessionResult};
use super::models::{Session, SessionStatus};

/// Counts of sessions by state, for status reporting.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusCounts {
    pub total: usize,
    pub starting: usize,
    pub running: usize,
    pub error: usize,
}

struct Entry {
    session: Session,
    /// Serializes launch/stop sequences for this key. Held across
    /// check-then-act sections that include the external launcher call.
    op_lock: Arc<tokio::sync::Mutex<()>>,
    /// Pending per-session expiry timer, if scheduled.
    expiry_timer: Option<JoinHandle<()>>,
}

/// Keyed registry of session records.
#[derive(Default)]
pub struct SessionStore {
    inner: Mutex<HashMap<String, Entry>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        self.inner.lock().expect("session store lock poisoned")
    }

    /// Admission check, port reservation and insert under one lock
    /// acquisition, so two concurrent creations cannot both pass a capacity
    /// check that only holds for one of them.
    ///
    /// `build` receives the allocated port and produces the record to store.
    pub fn admit(
        &self,
        max_active: usize,
        allocator: &PortAllocator,
        build: impl FnOnce(u16) -> Session,
    ) -> SessionResult<Session> {
        let mut map = self.lock();

        let active = map.values().filter(|e| e.session.is_active()).count();
        if active >= max_active {
            return Err(SessionError::CapacityExceeded);
        }

        let reserved: HashSet<u16> = map
            .values()
            .filter(|e| e.session.is_live())
            .map(|e| e.session.port)
            .collect();
        let port = allocator.allocate(&reserved)?;

        let session = build(port);
        map.insert(
            session.id.clone(),
            Entry {
                session: session.clone(),
                op_lock: Arc::new(tokio::sync::Mutex::new(())),
                expiry_timer: None,
            },
        );

        Ok(session)
    }

    /// Snapshot of a single record.
    pub fn get(&self, id: &str) -> Option<Session> {
        let map = self.lock();
        map.get(id).map(|e| e.session.clone())
    }

    /// The per-key operation lock, or `None` if the record is gone.
    pub fn op_lock(&self, id: &str) -> Option<Arc<tokio::sync::Mutex<()>>> {
        let map = self.lock();
        map.get(id).map(|e| Arc::clone(&e.op_lock))
    }

    /// Mutate a record in place. Returns the updated snapshot, or `None`
    /// when the record no longer exists.
    pub fn update(&self, id: &str, f: impl FnOnce(&mut Session)) -> Option<Session> {
        let mut map = self.lock();
        let entry = map.get_mut(id)?;
        f(&mut entry.session);
        Some(entry.session.clone())
    }

    /// Attach the expiry timer handle, aborting any previously scheduled
    /// timer for the key.
    pub fn set_expiry_timer(&self, id: &str, handle: JoinHandle<()>) {
        let mut map = self.lock();
        match map.get_mut(id) {
            Some(entry) => {
                if let Some(old) = entry.expiry_timer.replace(handle) {
                    old.abort();
                }
            }
            // Record removed while the timer was being scheduled.
            None => handle.abort(),
        }
    }

    /// Detach the expiry timer without aborting it. The timer task calls
    /// this when it fires, so that teardown never aborts the task that is
    /// performing it.
    pub fn take_expiry_timer(&self, id: &str) -> Option<JoinHandle<()>> {
        let mut map = self.lock();
        map.get_mut(id).and_then(|e| e.expiry_timer.take())
    }

    /// Mark a record as terminated and cancel its pending expiry timer.
    /// Returns the container ref to tear down, or `None` when the record
    /// does not exist. Cancelling an already-fired timer is a no-op.
    pub fn begin_teardown(&self, id: &str) -> Option<Option<String>> {
        let mut map = self.lock();
        let entry = map.get_mut(id)?;
        entry.session.status = SessionStatus::Terminated;
        if let Some(timer) = entry.expiry_timer.take() {
            timer.abort();
        }
        Some(entry.session.container_ref.clone())
    }

    /// Remove a record. Terminated records are removed immediately after
    /// teardown; they are never long-lived storage state.
    pub fn remove(&self, id: &str) -> Option<Session> {
        let mut map = self.lock();
        map.remove(id).map(|mut e| {
            if let Some(timer) = e.expiry_timer.take() {
                timer.abort();
            }
            e.session
        })
    }

    /// Consistent snapshot of all records. Iteration never observes a
    /// record mid-mutation.
    pub fn list(&self) -> Vec<Session> {
        let map = self.lock();
        map.values().map(|e| e.session.clone()).collect()
    }

    /// Counts by state.
    pub fn counts(&self) -> StatusCounts {
        let map = self.lock();
        let mut counts = StatusCounts {
            total: map.len(),
            ..StatusCounts::default()
        };
        for entry in map.values() {
            match entry.session.status {
                SessionStatus::Starting => counts.starting += 1,
                SessionStatus::Running => counts.running += 1,
                SessionStatus::Error => counts.error += 1,
                SessionStatus::Terminated => {}
            }
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
