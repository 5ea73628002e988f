//! Common test utilities and helpers for session-api tests

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, Response},
    Router,
};
use session_orchestrator::test_utils::{manager_with, stub_manager};
use session_orchestrator::SessionProvisioner;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

/// Helper to extract JSON body from axum response
pub async fn extract_json_body<T>(response: Response<Body>) -> T
where
    T: serde::de::DeserializeOwned,
{
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read response body");

    serde_json::from_slice(&body).expect("Failed to deserialize JSON")
}

/// TestClient to encapsulate API interaction logic
pub struct TestClient {
    pub app: Router,
    // Keeps the storage root alive for the client's lifetime
    _storage: TempDir,
}

impl TestClient {
    /// App backed by the stub provisioner and a fresh storage root
    pub fn new() -> Self {
        let storage = TempDir::new().expect("Failed to create temp dir");
        let app = session_api::create_app(stub_manager(storage.path()));
        Self {
            app,
            _storage: storage,
        }
    }

    pub fn with_provisioner(provisioner: Arc<dyn SessionProvisioner>) -> Self {
        let storage = TempDir::new().expect("Failed to create temp dir");
        let app = session_api::create_app(manager_with(storage.path(), provisioner));
        Self {
            app,
            _storage: storage,
        }
    }

    pub async fn send_request(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(request).await.unwrap()
    }

    pub async fn post<T: serde::Serialize>(&self, uri: &str, body: &T) -> Response<Body> {
        let req_body = serde_json::to_string(body).expect("Failed to serialize request body");
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(req_body))
            .unwrap();
        self.send_request(request).await
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.send_request(request).await
    }

    pub async fn delete(&self, uri: &str) -> Response<Body> {
        let request = Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.send_request(request).await
    }
}
