//! Test utilities for integration tests
#![allow(dead_code)]

use std::sync::{Arc, RwLock};

use axum::{Router, body::Body};
use serde_json::json;

use relaychat::api::AppState;
use relaychat::api::app;
use relaychat::core::AppConfig;

pub const TEST_MODEL: &str = "gemini-test";
pub const TEST_API_KEY: &str = "test-api-key";

/// Path the relay calls on the provider for `TEST_MODEL`
pub fn stream_path() -> String {
    format!("/v1beta/models/{}:streamGenerateContent", TEST_MODEL)
}

/// Config pointing the relay at a mock provider. No environment
/// variables are read.
pub fn test_config(gemini_api_hostname: &str, api_key: Option<&str>) -> AppConfig {
    AppConfig {
        storage_path: String::from("./"),
        history_path: String::from("./history"),
        relay_url: String::from("http://127.0.0.1:2222"),
        gemini_api_hostname: gemini_api_hostname.to_string(),
        gemini_model: String::from(TEST_MODEL),
        gemini_api_key: api_key.map(str::to_string),
    }
}

/// Creates a test application router for the given config.
pub fn test_app(config: AppConfig) -> Router {
    let app_state = AppState::new(config);
    app(Arc::new(RwLock::new(app_state)))
}

/// Serves the app on an ephemeral local port and returns its base URL.
pub async fn spawn_app(config: AppConfig) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = test_app(config);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Encodes text deltas the way the provider streams them.
pub fn sse_body(deltas: &[&str]) -> String {
    deltas
        .iter()
        .map(|d| {
            sse_event(&json!({
                "candidates": [{"content": {"parts": [{"text": d}], "role": "model"}, "index": 0}]
            }))
        })
        .collect()
}

pub fn sse_event(value: &serde_json::Value) -> String {
    format!("data: {}\r\n\r\n", value)
}

pub fn sse_error(message: &str) -> String {
    sse_event(&json!({"error": {"code": 500, "message": message, "status": "INTERNAL"}}))
}

pub async fn body_to_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
