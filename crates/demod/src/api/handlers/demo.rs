//! Demo session handlers.

use std::net::SocketAddr;

use axum::{
    Json,
    extract::{ConnectInfo, Path, State},
    http::HeaderMap,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument};

use crate::gate::{GateCategory, GateDecision};
use crate::session::{ClientMeta, Session};

use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;

/// Client-facing session snapshot returned from creation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedSession {
    pub id: String,
    pub status: String,
    pub access_url: String,
    pub expires_at: DateTime<Utc>,
}

/// Response for `POST /api/demo/start`.
#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub success: bool,
    pub session: StartedSession,
}

/// Client-facing session snapshot returned from status polls.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub id: String,
    pub status: String,
    pub access_url: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Session> for SessionSnapshot {
    fn from(session: Session) -> Self {
        Self {
            id: session.id,
            status: session.status.to_string(),
            access_url: session.access_url,
            created_at: session.created_at,
            expires_at: session.expires_at,
            error: session.last_error,
        }
    }
}

/// Response for `GET /api/demo/{id}/status`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    pub session: SessionSnapshot,
}

/// Response for `DELETE /api/demo/{id}`.
#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub success: bool,
    pub message: String,
}

/// Create a new demo session.
///
/// Subject to the creation-specific admission gate on top of the general
/// API gate. Returns immediately with the record in the starting state;
/// clients observe launch progress via status polls.
#[instrument(skip(state, headers))]
pub async fn start_demo(
    State(state): State<AppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> ApiResult<Json<StartResponse>> {
    let client_key = remote.ip().to_string();
    if let GateDecision::Throttled { retry_after } =
        state.gate.check(&client_key, GateCategory::DemoCreate)
    {
        return Err(ApiError::Throttled { retry_after });
    }

    let user_agent = headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let client_meta = ClientMeta {
        user_agent,
        remote_addr: client_key,
    };

    let session = state.sessions.create_session(client_meta)?;
    info!(session_id = %session.id, port = session.port, "demo session requested");

    Ok(Json(StartResponse {
        success: true,
        session: StartedSession {
            id: session.id,
            status: session.status.to_string(),
            access_url: session.access_url,
            expires_at: session.expires_at,
        },
    }))
}

/// Poll a session's status.
#[instrument(skip(state))]
pub async fn demo_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<StatusResponse>> {
    let session = state
        .sessions
        .status(&session_id)
        .ok_or_else(|| ApiError::not_found("Session not found"))?;

    Ok(Json(StatusResponse {
        success: true,
        session: session.into(),
    }))
}

/// Stop a session. Idempotent: repeating the call after removal yields 404.
#[instrument(skip(state))]
pub async fn stop_demo(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<StopResponse>> {
    state
        .sessions
        .stop_session(&session_id)
        .await
        .map_err(|_| ApiError::not_found("Session not found"))?;

    info!(session_id = %session_id, "demo session stopped by client");
    Ok(Json(StopResponse {
        success: true,
        message: "Session stopped successfully".to_string(),
    }))
}
