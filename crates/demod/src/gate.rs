//! Admission/rate gate.
//!
//! Fixed-window per-client limiter consulted before requests reach the
//! session manager, with a stricter category for session creation than for
//! read-only queries. Counters live in memory; a process restart resets
//! them, which is acceptable for an anonymous demo service.

use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Request category, each with its own window and budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateCategory {
    /// General API traffic.
    Api,
    /// Session creation. Much stricter than general traffic.
    DemoCreate,
}

/// Outcome of a gate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allowed,
    Throttled {
        /// Seconds until the client's window resets.
        retry_after: u64,
    },
}

/// Per-category budgets.
#[derive(Debug, Clone)]
pub struct GateLimits {
    /// Requests per window for general API traffic.
    pub api_limit: u32,
    pub api_window: Duration,
    /// Session creations per window.
    pub create_limit: u32,
    pub create_window: Duration,
}

impl Default for GateLimits {
    fn default() -> Self {
        Self {
            api_limit: 100,
            api_window: Duration::from_secs(60),
            create_limit: 5,
            create_window: Duration::from_secs(3600),
        }
    }
}

struct Window {
    started: Instant,
    count: u32,
}

/// In-memory fixed-window rate gate keyed by client address.
pub struct RateGate {
    limits: GateLimits,
    windows: DashMap<(GateCategory, String), Window>,
}

impl RateGate {
    pub fn new(limits: GateLimits) -> Self {
        Self {
            limits,
            windows: DashMap::new(),
        }
    }

    fn budget(&self, category: GateCategory) -> (u32, Duration) {
        match category {
            GateCategory::Api => (self.limits.api_limit, self.limits.api_window),
            GateCategory::DemoCreate => (self.limits.create_limit, self.limits.create_window),
        }
    }

    /// Consume one request from the client's budget for the category.
    pub fn check(&self, client_key: &str, category: GateCategory) -> GateDecision {
        let (limit, window) = self.budget(category);
        let now = Instant::now();

        let mut entry = self
            .windows
            .entry((category, client_key.to_string()))
            .or_insert_with(|| Window {
                started: now,
                count: 0,
            });

        let elapsed = now.duration_since(entry.started);
        if elapsed >= window {
            entry.started = now;
            entry.count = 0;
        }

        if entry.count < limit {
            entry.count += 1;
            GateDecision::Allowed
        } else {
            let retry_after = window
                .saturating_sub(now.duration_since(entry.started))
                .as_secs()
                .max(1);
            GateDecision::Throttled { retry_after }
        }
    }
}

impl Default for RateGate {
    fn default() -> Self {
        Self::new(GateLimits::default())
    }
}
