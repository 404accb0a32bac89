//! Admin-only handlers, protected by the shared-secret token.

use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument};

use crate::auth::RequireAdminToken;
use crate::session::Session;

use crate::api::error::ApiResult;
use crate::api::state::AppState;

/// Full session record exposed to operators, including port and client
/// metadata that regular clients never see.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSession {
    pub id: String,
    pub status: String,
    pub port: u16,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_ref: Option<String>,
    pub remote_addr: String,
    pub user_agent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Session> for AdminSession {
    fn from(session: Session) -> Self {
        Self {
            id: session.id,
            status: session.status.to_string(),
            port: session.port,
            created_at: session.created_at,
            expires_at: session.expires_at,
            container_ref: session.container_ref,
            remote_addr: session.client_meta.remote_addr,
            user_agent: session.client_meta.user_agent,
            error: session.last_error,
        }
    }
}

/// Response for `GET /api/admin/sessions`.
#[derive(Debug, Serialize)]
pub struct AdminSessionsResponse {
    pub success: bool,
    pub sessions: Vec<AdminSession>,
}

/// Response for `POST /api/admin/cleanup`.
#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub success: bool,
    pub message: String,
}

/// List all tracked sessions with full records.
#[instrument(skip(state))]
pub async fn list_sessions(
    State(state): State<AppState>,
    RequireAdminToken: RequireAdminToken,
) -> ApiResult<Json<AdminSessionsResponse>> {
    let sessions: Vec<AdminSession> = state
        .sessions
        .list_sessions()
        .into_iter()
        .map(AdminSession::from)
        .collect();
    info!(count = sessions.len(), "admin listed sessions");

    Ok(Json(AdminSessionsResponse {
        success: true,
        sessions,
    }))
}

/// Stop every tracked session, best-effort.
#[instrument(skip(state))]
pub async fn cleanup_sessions(
    State(state): State<AppState>,
    RequireAdminToken: RequireAdminToken,
) -> ApiResult<Json<CleanupResponse>> {
    let count = state.sessions.cleanup_all().await;
    info!(count, "admin cleanup complete");

    Ok(Json(CleanupResponse {
        success: true,
        message: format!("Cleaned up {} sessions", count),
    }))
}
