//! Client tests against the server router on a local socket, with mock
//! processors behind every media kind.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tempfile::TempDir;

use m4k_client::{ClientError, ClientEvent, EventStream, M4kClient, StatusPayload};
use m4k_core::options::{AudioOptions, Fit, ImageFormat, ImageOptions, Resize, VideoOptions};
use m4k_core::{testing::MockProcessor, Config, MediaKind, MediaOptions, MediaService, QueueConfig};
use m4k_server::{create_router, AppState};

struct Server {
    client: M4kClient,
    audio: MockProcessor,
    video: MockProcessor,
    image: MockProcessor,
    _temp_dir: TempDir,
}

async fn start(queue: QueueConfig, delay: Duration, keepalive_interval_ms: u64) -> Server {
    let temp_dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.server.keepalive_interval_ms = keepalive_interval_ms;
    config.processing.tmp_dir = temp_dir.path().join("tmp");

    let mock = |kind: MediaKind| {
        MockProcessor::new()
            .with_delay(delay)
            .with_temp_dir(temp_dir.path().join(kind.as_str()))
    };
    let (audio, video, image) = (
        mock(MediaKind::Audio),
        mock(MediaKind::Video),
        mock(MediaKind::Image),
    );
    let service = |kind, processor: &MockProcessor| {
        MediaService::new(kind, queue, Arc::new(processor.clone()))
    };
    let state = Arc::new(AppState::new(
        config,
        service(MediaKind::Audio, &audio),
        service(MediaKind::Video, &video),
        service(MediaKind::Image, &image),
    ));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, create_router(state)).await.unwrap();
    });

    Server {
        client: M4kClient::new(format!("http://{addr}/")),
        audio,
        video,
        image,
        _temp_dir: temp_dir,
    }
}

async fn default_server() -> Server {
    start(QueueConfig::new(1, 5), Duration::ZERO, 60_000).await
}

async fn collect(mut events: EventStream) -> Vec<ClientEvent> {
    let mut collected = Vec::new();
    while let Some(event) = events.next().await {
        collected.push(event.unwrap());
    }
    collected
}

fn ogg(name: &str) -> AudioOptions {
    AudioOptions {
        format: Some("ogg".to_string()),
        name: Some(name.to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_audio_events_in_order() {
    let server = default_server().await;

    let events = server
        .client
        .optimize_audio("input-bytes", &[ogg("song.ogg")])
        .await
        .unwrap();
    let events = collect(events).await;

    let statuses: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ClientEvent::Status(status) => Some(status.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(
        statuses,
        vec![
            StatusPayload::Position { position: 0 },
            StatusPayload::Progress { progress: 0 },
            StatusPayload::Progress { progress: 50 },
            StatusPayload::Progress { progress: 100 },
        ]
    );

    let Some(ClientEvent::File(file)) = events.last() else {
        panic!("expected a file last, got {:?}", events);
    };
    assert_eq!(file.name, "song.ogg");
    assert_eq!(file.mime_type, "application/octet-stream");
    assert_eq!(file.data, b"mock-output");

    let recorded = server.audio.recorded_jobs().await;
    assert_eq!(recorded[0].input_len, Some("input-bytes".len()));
}

#[tokio::test]
async fn test_keepalives_are_not_reported() {
    let server = start(QueueConfig::new(1, 5), Duration::from_millis(150), 20).await;

    let events = server
        .client
        .optimize_video(
            "input",
            &[VideoOptions {
                format: Some("webm".to_string()),
                ..Default::default()
            }],
        )
        .await
        .unwrap();
    let events = collect(events).await;

    // position, three progress values, one file
    assert_eq!(events.len(), 5);
    assert_eq!(server.video.calls(), 1);
}

#[tokio::test]
async fn test_image_options_reach_processor() {
    let server = default_server().await;
    let options = ImageOptions {
        format: Some(ImageFormat::Webp),
        resize: Some(Resize {
            width: Some(320),
            height: Some(200),
            fit: Some(Fit::Cover),
        }),
        quality: Some(70),
        ..Default::default()
    };

    let events = server
        .client
        .optimize_image(vec![1u8, 2, 3], std::slice::from_ref(&options))
        .await
        .unwrap();
    collect(events).await;

    let recorded = server.image.recorded_jobs().await;
    assert_eq!(recorded[0].options, vec![MediaOptions::Image(options)]);
}

#[tokio::test]
async fn test_multiple_outputs() {
    let server = default_server().await;

    let events = server
        .client
        .optimize_audio("input", &[ogg("a.ogg"), ogg("b.ogg")])
        .await
        .unwrap();
    let names: Vec<_> = collect(events)
        .await
        .into_iter()
        .filter_map(|e| match e {
            ClientEvent::File(file) => Some(file.name),
            _ => None,
        })
        .collect();
    assert_eq!(names, vec!["a.ogg", "b.ogg"]);
}

#[tokio::test]
async fn test_rejected_request() {
    let server = default_server().await;

    let result = server.client.optimize_audio("input", &[]).await;
    match result {
        Err(ClientError::Rejected { status, message }) => {
            assert_eq!(status, 400);
            assert_eq!(message, "No options provided");
        }
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("request should be rejected"),
    }
}

#[tokio::test]
async fn test_queue_full_is_rejected() {
    let server = start(QueueConfig::new(1, 1), Duration::from_millis(300), 60_000).await;

    let first = server
        .client
        .optimize_audio("input", &[ogg("a.ogg")])
        .await
        .unwrap();
    let second = server.client.optimize_audio("input", &[ogg("b.ogg")]).await;
    assert!(matches!(
        second,
        Err(ClientError::Rejected { status: 409, .. })
    ));

    assert_eq!(collect(first).await.len(), 5);
}

#[tokio::test]
async fn test_processing_failure_is_a_status() {
    let server = default_server().await;
    server.audio.fail_next("Invalid data found").await;

    let events = server
        .client
        .optimize_audio("input", &[ogg("a.ogg")])
        .await
        .unwrap();
    let events = collect(events).await;

    assert_eq!(
        events.last(),
        Some(&ClientEvent::Status(StatusPayload::Error {
            error: "ffmpeg exited with code 1: Invalid data found".to_string()
        }))
    );
}
