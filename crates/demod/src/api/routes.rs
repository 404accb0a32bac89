//! API route definitions.

use std::net::SocketAddr;

use axum::{
    Json, Router, middleware,
    extract::{ConnectInfo, Request, State},
    http::{HeaderValue, Method, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, warn};

use crate::gate::{GateCategory, GateDecision};

use super::error::{ApiError, ErrorResponse};
use super::handlers::{admin, demo, misc};
use super::state::AppState;

/// Create the application router.
pub fn create_router(state: AppState, cors_origins: &[String]) -> Router {
    let cors = build_cors_layer(cors_origins);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    // All /api traffic passes the general admission gate; session creation
    // additionally consumes from the stricter creation budget inside its
    // handler.
    let api_routes = Router::new()
        .route("/status", get(misc::api_status))
        .route("/demo/start", post(demo::start_demo))
        .route("/demo/{session_id}/status", get(demo::demo_status))
        .route("/demo/{session_id}", delete(demo::stop_demo))
        .route("/admin/sessions", get(admin::list_sessions))
        .route("/admin/cleanup", post(admin::cleanup_sessions))
        .layer(middleware::from_fn_with_state(state.clone(), api_gate));

    Router::new()
        .route("/health", get(misc::health))
        .nest("/api", api_routes)
        .fallback(endpoint_not_found)
        .layer(trace_layer)
        .layer(cors)
        .with_state(state)
}

/// General per-IP admission gate for API routes.
async fn api_gate(
    State(state): State<AppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    match state.gate.check(&remote.ip().to_string(), GateCategory::Api) {
        GateDecision::Allowed => next.run(request).await,
        GateDecision::Throttled { retry_after } => {
            warn!(client = %remote.ip(), "request throttled");
            ApiError::Throttled { retry_after }.into_response()
        }
    }
}

/// Uniform 404 body for unknown routes.
async fn endpoint_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            success: false,
            error: "Endpoint not found".to_string(),
            retry_after: None,
        }),
    )
        .into_response()
}

fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::HeaderName::from_static("x-demo-token")]);

    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match origin.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin, "ignoring unparseable CORS origin");
                    None
                }
            })
            .collect();
        layer.allow_origin(AllowOrigin::list(parsed))
    }
}
