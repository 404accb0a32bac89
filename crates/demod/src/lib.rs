//! Demo Sandbox Session Manager
//!
//! Core components for running short-lived, self-expiring demo sessions
//! behind an HTTP API.

pub mod api;
pub mod auth;
pub mod gate;
pub mod launcher;
pub mod ports;
pub mod session;
