//! API error types and their HTTP mappings.

use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::session::SessionError;

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors returned by API handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("Too many requests")]
    Throttled { retry_after: u64 },

    /// Session lifecycle errors; status code depends on the variant.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Unexpected fault. The detail is logged server-side and never
    /// leaks to the client.
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    #[serde(rename = "retryAfter", skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, retry_after) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone(), None),
            ApiError::Throttled { retry_after } => (
                StatusCode::TOO_MANY_REQUESTS,
                self.to_string(),
                Some(*retry_after),
            ),
            ApiError::Session(err) => match err {
                SessionError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string(), None),
                // Admission and exhaustion surface synchronously in the
                // creation response.
                SessionError::CapacityExceeded | SessionError::NoPortAvailable(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string(), None)
                }
                SessionError::Launch(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string(), None)
                }
            },
            ApiError::Internal(err) => {
                error!(error = ?err, "unhandled error in request handler");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            success: false,
            error: message,
            retry_after,
        });

        let mut response = (status, body).into_response();
        if let Some(seconds) = retry_after {
            if let Ok(value) = seconds.to_string().parse() {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}
