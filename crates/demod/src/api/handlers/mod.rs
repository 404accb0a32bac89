//! HTTP request handlers.

pub mod admin;
pub mod demo;
pub mod misc;
