//! Common test utilities for HTTP testing with mocks.
//!
//! This module provides a test fixture that builds the router in-process
//! with mock processors behind every media service, so the whole request
//! path (option parsing, admission, streaming) runs without ffmpeg.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::response::Response;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use m4k_client::multipart::{boundary_of, PartParser};
use m4k_core::{testing::MockProcessor, Config, MediaKind, MediaService, QueueConfig};
use m4k_server::{create_router, AppState};

/// Test fixture for HTTP testing with mock processors.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_audio() {
///     let fixture = TestFixture::new();
///     let response = fixture.process("/audio/process?format=ogg", &[], "bytes").await;
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    pub audio: MockProcessor,
    pub video: MockProcessor,
    pub image: MockProcessor,
    /// Temporary directory for mock outputs
    pub temp_dir: TempDir,
}

/// Response from a JSON endpoint
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Response from a processing endpoint, split into parts.
#[derive(Debug)]
pub struct StreamResponse {
    pub status: StatusCode,
    pub content_type: String,
    /// Raw body text
    pub raw: String,
    /// Parsed parts when the response is multipart, otherwise empty
    pub parts: Vec<Part>,
}

impl StreamResponse {
    /// JSON body of an error response.
    pub fn error(&self) -> Option<String> {
        serde_json::from_str::<Value>(&self.raw)
            .ok()
            .and_then(|v| v["error"].as_str().map(str::to_string))
    }

    /// Parts other than keepalives.
    pub fn events(&self) -> Vec<&Part> {
        self.parts.iter().filter(|p| !p.is_keepalive()).collect()
    }

    pub fn files(&self) -> Vec<&Part> {
        self.parts.iter().filter(|p| p.filename().is_some()).collect()
    }
}

/// One part of a multipart/mixed body.
#[derive(Debug, Clone)]
pub struct Part {
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Part {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn filename(&self) -> Option<&str> {
        let disposition = self.header("Content-Disposition")?;
        disposition
            .split("filename=\"")
            .nth(1)
            .and_then(|rest| rest.strip_suffix('"'))
    }

    pub fn is_keepalive(&self) -> bool {
        self.header("Content-Type") == Some("text/plain") && self.body == "keepalive"
    }

    pub fn json(&self) -> Option<Value> {
        if self.header("Content-Type") == Some("application/json") {
            serde_json::from_str(&self.body).ok()
        } else {
            None
        }
    }
}

/// Configuration for test fixture.
#[derive(Debug, Clone)]
pub struct TestConfig {
    pub queue: QueueConfig,
    /// Delay each mock job spends before producing output
    pub delay: Duration,
    pub keepalive_interval_ms: u64,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            queue: QueueConfig::new(1, 5),
            delay: Duration::ZERO,
            keepalive_interval_ms: 60_000,
        }
    }
}

impl TestFixture {
    /// Create a new test fixture with default mocks.
    pub fn new() -> Self {
        Self::with_config(TestConfig::default())
    }

    /// Create a test fixture with custom configuration.
    pub fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let mut config = Config::default();
        config.server.keepalive_interval_ms = test_config.keepalive_interval_ms;
        config.processing.tmp_dir = temp_dir.path().join("tmp");

        let mock = |kind: MediaKind| {
            MockProcessor::new()
                .with_delay(test_config.delay)
                .with_temp_dir(temp_dir.path().join(kind.as_str()))
        };
        let audio = mock(MediaKind::Audio);
        let video = mock(MediaKind::Video);
        let image = mock(MediaKind::Image);

        let service = |kind: MediaKind, processor: &MockProcessor| {
            MediaService::new(kind, test_config.queue, Arc::new(processor.clone()))
        };
        let state = Arc::new(AppState::new(
            config,
            service(MediaKind::Audio, &audio),
            service(MediaKind::Video, &video),
            service(MediaKind::Image, &image),
        ));

        Self {
            router: create_router(state),
            audio,
            video,
            image,
            temp_dir,
        }
    }

    /// Send a GET request and parse the body as JSON.
    pub async fn get(&self, path: &str) -> TestResponse {
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

    /// Send a GET request and return the body as text.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    /// POST raw input to a processing route and collect the whole stream.
    pub async fn process(
        &self,
        path: &str,
        headers: &[(&str, &str)],
        body: impl Into<Body>,
    ) -> StreamResponse {
        read_stream(self.send(path, headers, body).await).await
    }

    /// POST raw input and return as soon as the response head is ready.
    pub async fn send(
        &self,
        path: &str,
        headers: &[(&str, &str)],
        body: impl Into<Body>,
    ) -> Response {
        let mut builder = Request::builder().method("POST").uri(path);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = builder.body(body.into()).unwrap();

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request")
    }
}

/// Collects a processing response and splits it into parts.
pub async fn read_stream(response: Response) -> StreamResponse {
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to collect body")
        .to_bytes();
    let raw = String::from_utf8_lossy(&bytes).into_owned();

    let parts = boundary_of(&content_type)
        .map(|boundary| parse_parts(&bytes, boundary))
        .unwrap_or_default();

    StreamResponse {
        status,
        content_type,
        raw,
        parts,
    }
}

/// Splits a complete multipart/mixed body with the client's part parser.
pub fn parse_parts(raw: &[u8], boundary: &str) -> Vec<Part> {
    let mut parser = PartParser::new(boundary);
    let parts = parser
        .feed(raw)
        .unwrap_or_else(|e| panic!("malformed multipart body: {e}"));
    parser
        .finish()
        .unwrap_or_else(|e| panic!("incomplete multipart body: {e}"));

    parts
        .into_iter()
        .map(|part| Part {
            headers: part.headers,
            body: String::from_utf8_lossy(&part.body).into_owned(),
        })
        .collect()
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {:?}",
            $status, $response.status, $response
        );
    };
}
