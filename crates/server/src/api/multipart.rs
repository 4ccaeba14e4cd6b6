//! Streaming a job's events as one `multipart/mixed` response.
//!
//! Every event becomes one part. Status events are JSON parts, produced
//! files are streamed from disk chunk by chunk, and idle periods before the
//! first file are filled with `keepalive` text parts so that clients and
//! proxies do not time out while a job waits in line.

use std::io;
use std::time::Duration;

use axum::body::{Body, Bytes};
use futures::StreamExt;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use m4k_core::{Event, ProcessedFile, StatusPayload};

use crate::metrics::{STREAM_DISCONNECTS, STREAM_PARTS_SENT};

const LB: &str = "\r\n";

/// Chunks buffered between the writer task and the response body.
const BODY_BUFFER: usize = 8;

/// Read size for file parts.
const FILE_CHUNK: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum StreamError {
    /// The response body was dropped by the client.
    #[error("Client disconnected")]
    Disconnected,

    #[error("Failed to read output file: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to encode status: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Random boundary for one response.
pub fn new_boundary() -> String {
    format!("-boundary-{}", Uuid::new_v4().simple())
}

/// Value of the response `Content-Type` header.
pub fn content_type(boundary: &str) -> String {
    format!("multipart/mixed; boundary={boundary}")
}

/// Writes parts into a channel that backs a streaming response body.
///
/// The closing boundary is written by [`MultipartWriter::close`], which
/// consumes the writer.
#[derive(Debug)]
pub struct MultipartWriter {
    boundary: String,
    tx: mpsc::Sender<Bytes>,
    first: bool,
}

impl MultipartWriter {
    /// Creates a writer and the body that yields what it writes.
    pub fn channel(boundary: impl Into<String>) -> (Self, Body) {
        let (tx, rx) = mpsc::channel::<Bytes>(BODY_BUFFER);
        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|chunk| (Ok::<_, io::Error>(chunk), rx))
        });
        let writer = Self {
            boundary: boundary.into(),
            tx,
            first: true,
        };
        (writer, Body::from_stream(stream))
    }

    async fn write(&self, chunk: impl Into<Bytes>) -> Result<(), StreamError> {
        self.tx
            .send(chunk.into())
            .await
            .map_err(|_| StreamError::Disconnected)
    }

    /// Resolves when the response body has been dropped.
    pub async fn closed(&self) {
        self.tx.closed().await
    }

    /// Starts a part: delimiter, headers and the blank line before the payload.
    async fn begin_part(&mut self, headers: &[(&str, &str)]) -> Result<(), StreamError> {
        let mut head = String::new();
        if !self.first {
            head.push_str(LB);
        }
        self.first = false;

        head.push_str("--");
        head.push_str(&self.boundary);
        head.push_str(LB);
        for (name, value) in headers {
            head.push_str(name);
            head.push_str(": ");
            head.push_str(value);
            head.push_str(LB);
        }
        head.push_str(LB);
        self.write(head).await
    }

    pub async fn json_part<T: Serialize>(&mut self, payload: &T) -> Result<(), StreamError> {
        let json = serde_json::to_vec(payload)?;
        self.begin_part(&[("Content-Type", "application/json")])
            .await?;
        self.write(json).await
    }

    pub async fn text_part(&mut self, text: &str) -> Result<(), StreamError> {
        self.begin_part(&[("Content-Type", "text/plain")]).await?;
        self.write(text.to_string()).await
    }

    /// Streams a produced file as an attachment part.
    pub async fn file_part(&mut self, file: &ProcessedFile) -> Result<(), StreamError> {
        let handle = file.open().await?;
        let disposition = format!("attachment; filename=\"{}\"", quoted_filename(&file.name));
        self.begin_part(&[
            ("Content-Disposition", disposition.as_str()),
            ("Content-Type", file.mime_type.as_str()),
        ])
        .await?;

        let mut chunks = ReaderStream::with_capacity(handle, FILE_CHUNK);
        while let Some(chunk) = chunks.next().await {
            self.write(chunk?).await?;
        }
        Ok(())
    }

    /// Writes the closing delimiter.
    pub async fn close(self) -> Result<(), StreamError> {
        let end = format!("{LB}--{}--{LB}", self.boundary);
        self.write(end).await
    }
}

/// Escapes a file name for a quoted header parameter.
///
/// Control characters are dropped so a name can never end the header line.
fn quoted_filename(name: &str) -> String {
    let mut quoted = String::with_capacity(name.len());
    for c in name.chars().filter(|c| !c.is_control()) {
        if c == '\\' || c == '"' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted
}

/// Turns a job's event channel into a streaming response body.
///
/// Returns the boundary together with the body. The relay runs in its own
/// task; when the client goes away it cancels `cancel` and stops silently.
pub fn stream_events(
    events: mpsc::Receiver<Event>,
    cancel: CancellationToken,
    keepalive: Duration,
) -> (String, Body) {
    let boundary = new_boundary();
    let (writer, body) = MultipartWriter::channel(boundary.clone());
    tokio::spawn(pump(events, writer, cancel, keepalive));
    (boundary, body)
}

async fn pump(
    mut events: mpsc::Receiver<Event>,
    mut writer: MultipartWriter,
    cancel: CancellationToken,
    keepalive: Duration,
) {
    match relay(&mut events, &mut writer, keepalive).await {
        Ok(()) => {}
        Err(StreamError::Disconnected) => {
            debug!("Client disconnected, stopping job");
            STREAM_DISCONNECTS.inc();
            cancel.cancel();
        }
        Err(e) => {
            warn!(error = %e, "Event stream failed");
            cancel.cancel();
            let payload = StatusPayload::Error {
                error: e.to_string(),
            };
            if writer.json_part(&payload).await.is_ok() {
                STREAM_PARTS_SENT.with_label_values(&["error"]).inc();
            }
        }
    }

    // Stops the job if it is still producing.
    drop(events);

    if writer.close().await.is_err() {
        debug!("Client gone before closing delimiter");
    }
}

async fn relay(
    events: &mut mpsc::Receiver<Event>,
    writer: &mut MultipartWriter,
    keepalive: Duration,
) -> Result<(), StreamError> {
    let mut timer = Some(keepalive_timer(keepalive));

    loop {
        let event = match timer.as_mut() {
            Some(timer) => tokio::select! {
                event = events.recv() => event,
                _ = timer.tick() => {
                    writer.text_part("keepalive").await?;
                    STREAM_PARTS_SENT.with_label_values(&["keepalive"]).inc();
                    continue;
                }
                _ = writer.closed() => return Err(StreamError::Disconnected),
            },
            None => tokio::select! {
                event = events.recv() => event,
                _ = writer.closed() => return Err(StreamError::Disconnected),
            },
        };

        let Some(event) = event else {
            return Ok(());
        };

        match event {
            Event::ProcessedFile(file) => {
                timer = None;
                writer.file_part(&file).await?;
                STREAM_PARTS_SENT.with_label_values(&["file"]).inc();
                // Dropping the file lets the producer delete it.
                drop(file);
            }
            other => {
                if let Some(status) = other.status() {
                    writer.json_part(&status).await?;
                    STREAM_PARTS_SENT.with_label_values(&["status"]).inc();
                }
                if let Some(timer) = timer.as_mut() {
                    timer.reset();
                }
            }
        }
    }
}

fn keepalive_timer(period: Duration) -> Interval {
    let mut timer = interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer
}
