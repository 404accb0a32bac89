//! API integration tests.

use std::time::Duration;

use axum::http::{Method, StatusCode, header};
use tower::ServiceExt;

use demod::session::SessionStatus;

mod common;
use common::{
    ADMIN_TOKEN, MockLauncher, body_json, generous_limits, request, request_from, test_app,
    test_app_with, test_config, wait_for_status,
};

/// Health endpoint works without a session or a token.
#[tokio::test]
async fn test_health_endpoint() {
    let (app, _manager) = test_app();

    let response = app
        .oneshot(request(Method::GET, "/health"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["activeSessions"], 0);
    assert_eq!(json["maxSessions"], 10);
    assert!(json["timestamp"].is_string());
}

#[tokio::test]
async fn test_api_status_reports_capacity() {
    let (app, _manager) = test_app();

    let response = app
        .oneshot(request(Method::GET, "/api/status"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["system"]["maxSessions"], 10);
    assert_eq!(json["system"]["sessionTimeout"], 1800);
    assert_eq!(json["system"]["portRange"], "48100-48149");
    assert_eq!(json["sessions"]["total"], 0);
    assert_eq!(json["sessions"]["available"], 10);
}

/// Full client flow: create, poll until running, stop, observe 404.
#[tokio::test]
async fn test_demo_session_flow() {
    let (app, manager) = test_app();

    let response = app
        .clone()
        .oneshot(request(Method::POST, "/api/demo/start"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    let session_id = json["session"]["id"].as_str().unwrap().to_string();
    assert!(session_id.starts_with("demo-"));
    assert_eq!(json["session"]["status"], "starting");
    assert!(
        json["session"]["accessUrl"]
            .as_str()
            .unwrap()
            .starts_with("http://localhost:")
    );

    wait_for_status(&manager, &session_id, SessionStatus::Running).await;

    let response = app
        .clone()
        .oneshot(request(
            Method::GET,
            &format!("/api/demo/{session_id}/status"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["session"]["status"], "running");
    assert!(json["session"]["error"].is_null());

    let response = app
        .clone()
        .oneshot(request(Method::DELETE, &format!("/api/demo/{session_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["message"], "Session stopped successfully");

    let response = app
        .oneshot(request(
            Method::GET,
            &format!("/api/demo/{session_id}/status"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_status_unknown_session_returns_404() {
    let (app, _manager) = test_app();

    let response = app
        .oneshot(request(Method::GET, "/api/demo/demo-000-nope/status"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Session not found");
}

#[tokio::test]
async fn test_stop_unknown_session_returns_404() {
    let (app, _manager) = test_app();

    let response = app
        .oneshot(request(Method::DELETE, "/api/demo/demo-000-nope"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

/// A failed launch surfaces in the status poll instead of the creation
/// response.
#[tokio::test]
async fn test_failed_launch_visible_in_status() {
    let (app, manager) = test_app_with(test_config(), MockLauncher::failing(), generous_limits());

    let response = app
        .clone()
        .oneshot(request(Method::POST, "/api/demo/start"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let session_id = json["session"]["id"].as_str().unwrap().to_string();

    wait_for_status(&manager, &session_id, SessionStatus::Error).await;

    let response = app
        .oneshot(request(
            Method::GET,
            &format!("/api/demo/{session_id}/status"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["session"]["status"], "error");
    assert!(
        json["session"]["error"]
            .as_str()
            .unwrap()
            .contains("image pull failed")
    );
}

#[tokio::test]
async fn test_unknown_route_returns_404() {
    let (app, _manager) = test_app();

    let response = app
        .oneshot(request(Method::GET, "/api/nope"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Endpoint not found");
}

#[tokio::test]
async fn test_admin_requires_token() {
    let (app, _manager) = test_app();

    let response = app
        .oneshot(request(Method::GET, "/api/admin/sessions"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "demo token is required");
}

#[tokio::test]
async fn test_admin_rejects_malformed_token() {
    let (app, _manager) = test_app();

    let mut req = request(Method::GET, "/api/admin/sessions");
    req.headers_mut()
        .insert("x-demo-token", "not-a-uuid".parse().unwrap());
    let response = app.oneshot(req).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["error"], "demo token format is invalid");
}

#[tokio::test]
async fn test_admin_rejects_wrong_token() {
    let (app, _manager) = test_app();

    let mut req = request(Method::GET, "/api/admin/sessions");
    req.headers_mut().insert(
        "x-demo-token",
        uuid::Uuid::new_v4().to_string().parse().unwrap(),
    );
    let response = app.oneshot(req).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["error"], "demo token is invalid");
}

#[tokio::test]
async fn test_admin_lists_sessions_with_header_token() {
    let (app, manager) = test_app();

    let response = app
        .clone()
        .oneshot(request(Method::POST, "/api/demo/start"))
        .await
        .unwrap();
    let json = body_json(response).await;
    let session_id = json["session"]["id"].as_str().unwrap().to_string();
    wait_for_status(&manager, &session_id, SessionStatus::Running).await;

    let mut req = request(Method::GET, "/api/admin/sessions");
    req.headers_mut()
        .insert("x-demo-token", ADMIN_TOKEN.parse().unwrap());
    let response = app.oneshot(req).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);

    let sessions = json["sessions"].as_array().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["id"], session_id.as_str());
    assert_eq!(sessions[0]["remoteAddr"], "203.0.113.7");
    assert!(sessions[0]["port"].as_u64().unwrap() >= 48100);
}

#[tokio::test]
async fn test_admin_accepts_query_token() {
    let (app, _manager) = test_app();

    let response = app
        .oneshot(request(
            Method::GET,
            &format!("/api/admin/sessions?token={ADMIN_TOKEN}"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_admin_cleanup_stops_everything() {
    let (app, manager) = test_app();

    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(request(Method::POST, "/api/demo/start"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    // Let the launches settle before sweeping them away.
    let ids: Vec<String> = manager.list_sessions().into_iter().map(|s| s.id).collect();
    for id in &ids {
        wait_for_status(&manager, id, SessionStatus::Running).await;
    }

    let mut req = request(Method::POST, "/api/admin/cleanup");
    req.headers_mut()
        .insert("x-demo-token", ADMIN_TOKEN.parse().unwrap());
    let response = app.oneshot(req).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["message"], "Cleaned up 3 sessions");
    assert_eq!(manager.list_sessions().len(), 0);
}

/// The creation gate throttles repeat creations from one address while the
/// general gate still admits other traffic.
#[tokio::test]
async fn test_create_gate_throttles() {
    let limits = demod::gate::GateLimits {
        api_limit: 10_000,
        api_window: Duration::from_secs(60),
        create_limit: 1,
        create_window: Duration::from_secs(3600),
    };
    let (app, _manager) = test_app_with(test_config(), MockLauncher::ok(), limits);

    let response = app
        .clone()
        .oneshot(request(Method::POST, "/api/demo/start"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(request(Method::POST, "/api/demo/start"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));

    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert!(json["retryAfter"].as_u64().unwrap() > 0);

    // A different client is unaffected.
    let response = app
        .oneshot(request_from(
            Method::POST,
            "/api/demo/start",
            "198.51.100.9:40000",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_api_gate_throttles_all_api_routes() {
    let limits = demod::gate::GateLimits {
        api_limit: 2,
        api_window: Duration::from_secs(60),
        create_limit: 10_000,
        create_window: Duration::from_secs(3600),
    };
    let (app, _manager) = test_app_with(test_config(), MockLauncher::ok(), limits);

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(request(Method::GET, "/api/status"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .clone()
        .oneshot(request(Method::GET, "/api/status"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    // Health sits outside the gated API tree.
    let response = app
        .oneshot(request(Method::GET, "/health"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
