//! Common test utilities for E2E testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with a mock order store and temporary marketplace folders, enabling
//! end-to-end dispatch runs without a real share or order database.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use orderflow_core::{
    testing::MockOrderStore, EntityIdCache, InMemorySessionStore, Marketplace, OrderDispatcher,
    OrderStore,
};
use orderflow_server::{api::create_router, state::AppState};

/// Re-export fixtures for test convenience
pub use orderflow_core::testing::fixtures;

/// How long a stream may take before the test gives up.
const STREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Test fixture for E2E testing with mock dependencies.
///
/// Every marketplace's base directory lives under `temp_dir` and jobs run
/// as `sh run.sh`, so brand folders created with
/// [`TestFixture::brand_folder`] are picked up by runs.
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock order store behind the entity id cache
    pub order_store: Arc<MockOrderStore>,
    /// Temporary directory for marketplace folders and the input file
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// One server-sent event frame.
#[derive(Debug, Clone)]
pub struct SseFrame {
    pub id: Option<String>,
    pub data: Value,
}

/// Response from a stream request
#[derive(Debug)]
pub struct StreamResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub frames: Vec<SseFrame>,
}

impl StreamResponse {
    /// `content` of every frame, in order.
    pub fn contents(&self) -> Vec<String> {
        self.frames
            .iter()
            .filter_map(|f| f.data["content"].as_str().map(str::to_string))
            .collect()
    }
}

impl TestFixture {
    /// Create a new test fixture with an empty order store.
    pub async fn new() -> Self {
        Self::with_order_store(MockOrderStore::new()).await
    }

    /// Create a test fixture backed by the given order store.
    pub async fn with_order_store(order_store: MockOrderStore) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config = fixtures::config_for(temp_dir.path());

        let order_store = Arc::new(order_store);
        let store: Arc<dyn OrderStore> = Arc::clone(&order_store) as Arc<dyn OrderStore>;
        let entity_cache = EntityIdCache::new(store);

        let dispatcher = OrderDispatcher::new(
            config,
            Arc::new(InMemorySessionStore::new()),
            Arc::new(entity_cache),
        );
        let state = Arc::new(AppState::new(Arc::new(dispatcher)));

        // Create router
        let router = create_router(state);

        Self {
            router,
            order_store,
            temp_dir,
        }
    }

    /// Base directory of a marketplace.
    pub fn base_dir(&self, marketplace: Marketplace) -> PathBuf {
        self.temp_dir.path().join(marketplace.key())
    }

    /// Create a brand folder for `marketplace` with a job script.
    pub fn brand_folder(&self, marketplace: Marketplace, name: &str, script: &str) -> PathBuf {
        fixtures::brand_folder(&self.base_dir(marketplace), name, script)
    }

    /// Path of the canonical input file.
    pub fn input_path(&self) -> PathBuf {
        self.temp_dir.path().join("work").join("input_orders.txt")
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// GET a path and return the raw body as text.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Open an event stream and read it until the server ends it.
    pub async fn stream(&self, path: &str, last_event_id: Option<usize>) -> StreamResponse {
        let mut request_builder = Request::builder().method("GET").uri(path);
        if let Some(id) = last_event_id {
            request_builder = request_builder.header("Last-Event-ID", id.to_string());
        }
        let request = request_builder.body(Body::empty()).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body_bytes = tokio::time::timeout(STREAM_TIMEOUT, response.into_body().collect())
            .await
            .expect("Stream did not end in time")
            .expect("Failed to collect body")
            .to_bytes();

        StreamResponse {
            status,
            content_type,
            frames: parse_sse(&String::from_utf8_lossy(&body_bytes)),
        }
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Split an SSE body into frames, skipping keep-alive comments.
fn parse_sse(body: &str) -> Vec<SseFrame> {
    body.split("\n\n")
        .filter_map(|block| {
            let mut id = None;
            let mut data = String::new();
            for line in block.lines() {
                if let Some(value) = line.strip_prefix("id:") {
                    id = Some(value.trim().to_string());
                } else if let Some(value) = line.strip_prefix("data:") {
                    data.push_str(value.strip_prefix(' ').unwrap_or(value));
                }
            }
            if data.is_empty() {
                return None;
            }
            let data = serde_json::from_str(&data).expect("SSE data is JSON");
            Some(SseFrame { id, data })
        })
        .collect()
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
