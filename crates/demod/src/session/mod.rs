//! Session lifecycle management.
//!
//! The manager orchestrates sessions through their state machine, the store
//! is the in-memory source of truth, and the models define the records and
//! their wire shapes.

mod error;
mod manager;
mod models;
mod store;

pub use error::{SessionError, SessionResult};
pub use manager::{SessionManager, SessionManagerConfig};
pub use models::{ClientMeta, Session, SessionStatus, generate_session_id};
pub use store::{SessionStore, StatusCounts};
