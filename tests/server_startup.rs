//! Server Startup Tests
//!
//! Tests for server lifecycle, configuration handling, and route setup.

use std::sync::Arc;
use std::time::Duration;

use axum::{body::Body, http::Request};
use http_body_util::BodyExt;
use tower::util::ServiceExt;

use voicebridge::{ServerConfig, routes, state::AppState};

/// Helper function to create a minimal test configuration
fn create_minimal_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        tls: None,
        cors_allowed_origins: None,
        setup_timeout: Duration::from_secs(10),
        upstream_bearer_token: Some("test-token".to_string()),
        token_command: None,
        tool_servers: Vec::new(),
    }
}

fn create_app() -> axum::Router {
    let state = Arc::new(AppState::new(create_minimal_config()).unwrap());
    routes::create_app(state)
}

/// The server boots with a minimal configuration and answers health checks
#[tokio::test]
async fn test_minimal_config_boot() {
    let app = create_app();

    let request = Request::builder()
        .uri("/api/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), axum::http::StatusCode::OK);
}

/// Tool listing works with no servers configured (empty listing, not an error)
#[tokio::test]
async fn test_tool_listing_without_servers() {
    let app = create_app();

    let request = Request::builder()
        .uri("/api/mcp/tools")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["tools"].as_array().unwrap().len(), 0);
}

/// Calling a tool no server advertises returns 404 with the uniform error body
#[tokio::test]
async fn test_unknown_tool_call_is_not_found() {
    let app = create_app();

    let request = Request::builder()
        .method("POST")
        .uri("/api/mcp/tools/call")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"tool":"no_such_tool","arguments":{}}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::NOT_FOUND);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["success"], false);
}

/// A tool call with non-object arguments is rejected before any routing
#[tokio::test]
async fn test_bad_arguments_rejected() {
    let app = create_app();

    let request = Request::builder()
        .method("POST")
        .uri("/api/mcp/tools/call")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"tool":"x","arguments":[1,2]}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
}

/// The bridge WebSocket route exists (upgrade handshake is attempted, not 404)
#[tokio::test]
async fn test_bridge_route_setup() {
    let app = create_app();

    let request = Request::builder()
        .uri("/ws/live")
        .header("upgrade", "websocket")
        .header("connection", "upgrade")
        .header("sec-websocket-key", "dGhlIHNhbXBsZSBub25jZQ==")
        .header("sec-websocket-version", "13")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_ne!(response.status(), axum::http::StatusCode::NOT_FOUND);
}

/// Unknown paths are 404
#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = create_app();

    let request = Request::builder()
        .uri("/api/nope")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::NOT_FOUND);
}

/// The config correctly identifies TLS status
#[tokio::test]
async fn test_tls_configuration() {
    let config = create_minimal_config();
    assert!(!config.is_tls_enabled());

    let mut config_with_tls = create_minimal_config();
    config_with_tls.tls = Some(voicebridge::config::TlsConfig {
        cert_path: std::path::PathBuf::from("/path/to/cert.pem"),
        key_path: std::path::PathBuf::from("/path/to/key.pem"),
    });
    assert!(config_with_tls.is_tls_enabled());
}

/// Concurrent request handling capability
#[tokio::test]
async fn test_concurrent_request_handling() {
    let app = create_app();

    let tasks: Vec<_> = (0..10)
        .map(|_| {
            let app = app.clone();
            tokio::spawn(async move {
                let request = Request::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .unwrap();
                let response = app.oneshot(request).await.unwrap();
                response.status()
            })
        })
        .collect();

    for task in tasks {
        let status = task.await.expect("Task should complete");
        assert_eq!(status, axum::http::StatusCode::OK);
    }
}
