//! Port allocation for demo sessions.
//!
//! The allocator scans a configured closed interval in ascending order and
//! returns the first port that is neither reserved by a live session nor
//! bound by a local listener. Low-numbered ports are reused preferentially
//! once freed; this is a tie-break for predictability, not fairness.
//!
//! The bind probe only observes the socket and releases it immediately, so
//! there is a window between allocation and the launcher actually binding
//! the port. Callers keep that window small by allocating right before
//! invoking the launcher, and the reservation set rules out collisions
//! between concurrent allocations in this process.

use std::collections::HashSet;
use std::net::TcpListener;

use thiserror::Error;

/// Every port in the configured range is occupied.
#[derive(Debug, Error)]
#[error("no available ports in range {start}-{end}")]
pub struct PortsExhausted {
    pub start: u16,
    pub end: u16,
}

/// Allocates ports from a fixed inclusive range.
#[derive(Debug, Clone)]
pub struct PortAllocator {
    start: u16,
    end: u16,
}

impl PortAllocator {
    pub fn new(start: u16, end: u16) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    /// The configured range, for reporting.
    pub fn range(&self) -> (u16, u16) {
        (self.start, self.end)
    }

    /// Find the lowest free port, skipping `reserved` ports owned by live
    /// sessions.
    pub fn allocate(&self, reserved: &HashSet<u16>) -> Result<u16, PortsExhausted> {
        for port in self.start..=self.end {
            if reserved.contains(&port) {
                continue;
            }
            if Self::probe(port) {
                return Ok(port);
            }
        }
        Err(PortsExhausted {
            start: self.start,
            end: self.end,
        })
    }

    /// Check whether a port has no active local listener.
    fn probe(port: u16) -> bool {
        TcpListener::bind(("0.0.0.0", port)).is_ok()
    }
}
