//! Admin endpoint authentication.
//!
//! Admin routes are protected by a shared-secret token carried in the
//! `x-demo-token` header or the `token` query parameter. The token must be
//! a well-formed UUIDv4 before it is compared against the configured
//! secret, so arbitrary strings never reach the comparison.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::api::AppState;

/// Header carrying the admin token.
pub const ADMIN_TOKEN_HEADER: &str = "x-demo-token";

/// Admin authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No token in header or query.
    #[error("demo token is required")]
    MissingToken,

    /// Token is not a well-formed UUIDv4.
    #[error("demo token format is invalid")]
    MalformedToken,

    /// Token does not match the configured secret.
    #[error("demo token is invalid")]
    InvalidToken,

    /// No admin token configured on the server.
    #[error("admin access is not configured")]
    NotConfigured,
}

/// Error response body.
#[derive(Debug, Serialize)]
struct AuthErrorResponse {
    success: bool,
    error: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = Json(AuthErrorResponse {
            success: false,
            error: self.to_string(),
        });
        (StatusCode::UNAUTHORIZED, body).into_response()
    }
}

/// Extractor that rejects requests without a valid admin token.
#[derive(Debug)]
pub struct RequireAdminToken;

fn token_from_parts(parts: &Parts) -> Option<String> {
    if let Some(value) = parts.headers.get(ADMIN_TOKEN_HEADER) {
        return value.to_str().ok().map(str::to_string);
    }

    // Fall back to the `token` query parameter. Tokens are UUIDs, so plain
    // splitting is sufficient; no percent-decoding needed.
    parts.uri.query().and_then(|query| {
        query.split('&').find_map(|pair| {
            pair.split_once('=')
                .filter(|(key, _)| *key == "token")
                .map(|(_, value)| value.to_string())
        })
    })
}

/// Validate token format and compare against the configured secret.
pub fn validate_admin_token(
    presented: Option<&str>,
    configured: Option<&Uuid>,
) -> Result<(), AuthError> {
    let configured = configured.ok_or(AuthError::NotConfigured)?;
    let presented = presented.ok_or(AuthError::MissingToken)?;

    let parsed = Uuid::parse_str(presented).map_err(|_| AuthError::MalformedToken)?;
    if parsed.get_version_num() != 4 {
        return Err(AuthError::MalformedToken);
    }

    if &parsed != configured {
        return Err(AuthError::InvalidToken);
    }

    Ok(())
}

impl FromRequestParts<AppState> for RequireAdminToken {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = token_from_parts(parts);
        validate_admin_token(token.as_deref(), state.admin_token.as_ref())?;
        Ok(RequireAdminToken)
    }
}
