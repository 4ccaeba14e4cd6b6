//! Status route tests: health, queue occupancy and metrics.

mod common;

use std::time::Duration;

use axum::http::StatusCode;

use common::{read_stream, TestConfig, TestFixture};

#[tokio::test]
async fn test_health() {
    let fixture = TestFixture::new();
    let response = fixture.get("/health").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
}

#[tokio::test]
async fn test_queues_report_running_and_waiting() {
    let fixture = TestFixture::with_config(TestConfig {
        delay: Duration::from_millis(300),
        ..Default::default()
    });

    let idle = fixture.get("/queues").await;
    assert_status!(idle, StatusCode::OK);
    assert_eq!(idle.body["video"]["running"], 0);
    assert_eq!(idle.body["video"]["parallelize"], 1);
    assert_eq!(idle.body["video"]["max"], 5);

    let first = fixture.send("/videos/process?format=webm", &[], "a").await;
    let second = fixture.send("/videos/process?format=webm", &[], "b").await;

    let busy = fixture.get("/queues").await;
    assert_eq!(busy.body["video"]["running"], 1);
    assert_eq!(busy.body["video"]["queued"], 1);
    assert_eq!(busy.body["audio"]["running"], 0);

    let (first, second) = tokio::join!(read_stream(first), read_stream(second));
    assert_eq!(first.files().len(), 1);
    assert_eq!(second.files().len(), 1);
}

#[tokio::test]
async fn test_metrics_after_traffic() {
    let fixture = TestFixture::new();

    fixture
        .process("/images/process?format=png", &[], "image")
        .await;
    fixture.process("/images/process", &[], "image").await;

    let (status, text) = fixture.get_text("/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("m4k_jobs_submitted_total{kind=\"image\"}"));
    assert!(text.contains("path=\"/images/process\",status=\"400\""));
    assert!(text.contains("path=\"/images/process\",status=\"200\""));
    assert!(text.contains("m4k_queue_depth{kind=\"image\"} 0"));
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let fixture = TestFixture::new();
    let response = fixture.get("/music/process").await;
    assert_status!(response, StatusCode::NOT_FOUND);
}
