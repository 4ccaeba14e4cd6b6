//! Processing route tests through the full HTTP stack.
//!
//! These tests verify:
//! - Option collection from query, `options` parameter and `x-options` header
//! - Immediate 400/409 answers before streaming starts
//! - The multipart event stream: positions, progress, files, errors, keepalives
//! - Disk outputs and client disconnects

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;

use common::{read_stream, TestConfig, TestFixture};
use m4k_core::{MediaOptions, QueueConfig};

#[tokio::test]
async fn test_audio_stream_shape() {
    let fixture = TestFixture::new();

    let response = fixture
        .process("/audio/process?format=ogg", &[], "input-bytes")
        .await;

    assert_status!(response, StatusCode::OK);
    assert!(response
        .content_type
        .starts_with("multipart/mixed; boundary=-boundary-"));

    let events = response.events();
    let json: Vec<_> = events.iter().filter_map(|p| p.json()).collect();
    assert_eq!(
        json,
        vec![
            json!({"position": 0}),
            json!({"progress": 0}),
            json!({"progress": 50}),
            json!({"progress": 100}),
        ]
    );

    let files = response.files();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].filename(), Some("output1.bin"));
    assert_eq!(
        files[0].header("Content-Type"),
        Some("application/octet-stream")
    );
    assert_eq!(files[0].body, "mock-output");

    // Files come after every status part.
    assert!(events.last().unwrap().filename().is_some());
}

#[tokio::test]
async fn test_request_body_reaches_processor() {
    let fixture = TestFixture::new();
    let input = vec![7u8; 256 * 1024];

    let response = fixture
        .process("/videos/process?format=webm", &[], input.clone())
        .await;
    assert_status!(response, StatusCode::OK);

    let recorded = fixture.video.recorded_jobs().await;
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].input_len, Some(input.len()));
}

#[tokio::test]
async fn test_options_from_all_sources_in_order() {
    let fixture = TestFixture::new();

    let response = fixture
        .process(
            "/audio/process?name=first.mp3&options=%5B%7B%22name%22%3A%22second.ogg%22%7D%5D",
            &[("x-options", r#"{"name":"third.flac","format":"flac"}"#)],
            "input",
        )
        .await;
    assert_status!(response, StatusCode::OK);

    let names: Vec<_> = response.files().iter().filter_map(|p| p.filename()).collect();
    assert_eq!(names, vec!["first.mp3", "second.ogg", "third.flac"]);

    let recorded = fixture.audio.recorded_jobs().await;
    let MediaOptions::Audio(third) = &recorded[0].options[2] else {
        panic!("expected audio options");
    };
    assert_eq!(third.format.as_deref(), Some("flac"));
}

#[tokio::test]
async fn test_image_query_is_unflattened() {
    let fixture = TestFixture::new();

    let response = fixture
        .process(
            "/images/process?format=png&width=120&cropWidth=10&cropHeight=20",
            &[],
            "image-bytes",
        )
        .await;
    assert_status!(response, StatusCode::OK);

    let recorded = fixture.image.recorded_jobs().await;
    let MediaOptions::Image(image) = &recorded[0].options[0] else {
        panic!("expected image options");
    };
    assert_eq!(image.resize.as_ref().unwrap().width, Some(120));
    let crop = image.crop.as_ref().unwrap();
    assert_eq!((crop.left, crop.top, crop.width, crop.height), (0, 0, 10, 20));
}

#[tokio::test]
async fn test_missing_options_is_bad_request() {
    let fixture = TestFixture::new();

    let response = fixture.process("/audio/process", &[], "input").await;

    assert_status!(response, StatusCode::BAD_REQUEST);
    assert_eq!(response.error().as_deref(), Some("No options provided"));
    assert_eq!(fixture.audio.calls(), 0);
}

#[tokio::test]
async fn test_malformed_options_is_bad_request() {
    let fixture = TestFixture::new();

    let response = fixture
        .process("/videos/process", &[("x-options", "[{")], "input")
        .await;

    assert_status!(response, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.error().as_deref(),
        Some("Error while parsing options")
    );
}

#[tokio::test]
async fn test_schema_violation_names_field() {
    let fixture = TestFixture::new();

    let response = fixture
        .process("/videos/process?fps=fast", &[], "input")
        .await;
    assert_status!(response, StatusCode::BAD_REQUEST);
    assert_eq!(response.error().as_deref(), Some("[/fps] Expected number"));

    let response = fixture
        .process("/audio/process?volume=11", &[], "input")
        .await;
    assert_status!(response, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.error().as_deref(),
        Some("[/volume] Unexpected property")
    );
}

#[tokio::test]
async fn test_name_with_line_break_is_bad_request() {
    let fixture = TestFixture::new();

    let response = fixture
        .process(
            "/audio/process",
            &[("x-options", r#"{"name":"a.ogg\r\nX-Injected: yes"}"#)],
            "input",
        )
        .await;

    assert_status!(response, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.error().as_deref(),
        Some("[/name] Expected string without control characters")
    );
    assert_eq!(fixture.audio.calls(), 0);
}

#[tokio::test]
async fn test_partial_crop_is_bad_request() {
    let fixture = TestFixture::new();

    let response = fixture
        .process("/images/process?format=png&cropLeft=5", &[], "image-bytes")
        .await;

    assert_status!(response, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.error().as_deref(),
        Some("[/cropWidth] Expected required property")
    );
}

#[tokio::test]
async fn test_queue_full_is_conflict() {
    let fixture = TestFixture::with_config(TestConfig {
        queue: QueueConfig::new(1, 1),
        delay: Duration::from_millis(300),
        ..Default::default()
    });

    let first = fixture
        .send("/audio/process?format=ogg", &[], "input")
        .await;
    assert_eq!(first.status(), StatusCode::OK);

    let rejected = fixture
        .process("/audio/process?format=ogg", &[], "input")
        .await;
    assert_status!(rejected, StatusCode::CONFLICT);
    assert_eq!(rejected.error().as_deref(), Some("Queue is full"));

    let first = read_stream(first).await;
    assert_eq!(first.files().len(), 1);
    assert_eq!(fixture.audio.calls(), 1);
}

#[tokio::test]
async fn test_queued_request_sees_positions() {
    let fixture = TestFixture::with_config(TestConfig {
        delay: Duration::from_millis(200),
        ..Default::default()
    });

    let first = fixture.send("/audio/process?format=ogg", &[], "a").await;
    let second = fixture.send("/audio/process?format=ogg", &[], "b").await;
    let (first, second) = tokio::join!(read_stream(first), read_stream(second));

    let positions = |r: &common::StreamResponse| -> Vec<u64> {
        r.events()
            .iter()
            .filter_map(|p| p.json())
            .filter_map(|v| v["position"].as_u64())
            .collect()
    };
    assert_eq!(positions(&first), vec![0]);
    assert_eq!(positions(&second), vec![1, 0]);
    assert_eq!(second.files().len(), 1);
}

#[tokio::test]
async fn test_processing_failure_is_final_error_part() {
    let fixture = TestFixture::new();
    fixture.audio.fail_next("Invalid data found").await;

    let response = fixture
        .process("/audio/process?format=ogg", &[], "input")
        .await;

    // Streaming had started, so the status stays 200.
    assert_status!(response, StatusCode::OK);
    let last = response.events().last().unwrap().json().unwrap();
    assert_eq!(
        last,
        json!({"error": "ffmpeg exited with code 1: Invalid data found"})
    );
    assert!(response.files().is_empty());
}

#[tokio::test]
async fn test_keepalive_while_waiting() {
    let fixture = TestFixture::with_config(TestConfig {
        delay: Duration::from_millis(200),
        keepalive_interval_ms: 30,
        ..Default::default()
    });

    let response = fixture
        .process("/audio/process?format=ogg", &[], "input")
        .await;
    assert_status!(response, StatusCode::OK);

    let first_file = response
        .parts
        .iter()
        .position(|p| p.filename().is_some())
        .unwrap();
    let keepalives = response.parts[..first_file]
        .iter()
        .filter(|p| p.is_keepalive())
        .count();
    assert!(keepalives >= 2, "parts: {:?}", response.parts);
    assert!(response.parts[first_file..].iter().all(|p| !p.is_keepalive()));
}

#[tokio::test]
async fn test_output_option_writes_to_disk() {
    let fixture = TestFixture::new();
    let output = fixture.temp_dir.path().join("saved").join("result.ogg");
    let header = json!({"format": "ogg", "output": output}).to_string();

    let response = fixture
        .process("/audio/process", &[("x-options", &header)], "input")
        .await;

    assert_status!(response, StatusCode::OK);
    assert!(response.files().is_empty());
    assert_eq!(std::fs::read(&output).unwrap(), b"mock-output");
}

#[tokio::test]
async fn test_client_disconnect_frees_slot() {
    let fixture = TestFixture::with_config(TestConfig {
        delay: Duration::from_secs(30),
        ..Default::default()
    });

    let response = fixture
        .send("/audio/process?format=ogg", &[], "input")
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(fixture.get("/queues").await.body["audio"]["running"], 1);

    drop(response);

    let mut running = 1;
    for _ in 0..100 {
        running = fixture.get("/queues").await.body["audio"]["running"]
            .as_u64()
            .unwrap();
        if running == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(running, 0);
}
