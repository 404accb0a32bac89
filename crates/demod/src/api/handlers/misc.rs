//! Health and system status handlers.

use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub active_sessions: usize,
    pub max_sessions: usize,
}

/// Health check endpoint.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        active_sessions: state.sessions.active_count(),
        max_sessions: state.sessions.config().max_sessions,
    })
}

/// Static system configuration summary.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub max_sessions: usize,
    pub session_timeout: u64,
    pub port_range: String,
}

/// Session counts by state and remaining capacity.
#[derive(Debug, Serialize)]
pub struct SessionCounts {
    pub total: usize,
    pub active: usize,
    pub starting: usize,
    pub error: usize,
    pub available: usize,
}

/// Response for `GET /api/status`.
#[derive(Debug, Serialize)]
pub struct ApiStatusResponse {
    pub system: SystemInfo,
    pub sessions: SessionCounts,
}

/// Aggregate system status.
pub async fn api_status(State(state): State<AppState>) -> Json<ApiStatusResponse> {
    let config = state.sessions.config();
    let counts = state.sessions.counts();

    Json(ApiStatusResponse {
        system: SystemInfo {
            max_sessions: config.max_sessions,
            session_timeout: config.session_timeout.as_secs(),
            port_range: format!("{}-{}", config.port_range_start, config.port_range_end),
        },
        sessions: SessionCounts {
            total: counts.total,
            active: counts.running,
            starting: counts.starting,
            error: counts.error,
            available: config
                .max_sessions
                .saturating_sub(counts.running + counts.starting),
        },
    })
}
