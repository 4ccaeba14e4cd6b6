//! Types shared by the job pipeline: media kinds, jobs, inputs and events.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncRead;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use super::error::ProcessError;
use crate::options::MediaOptions;

/// The kind of media a job transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Audio,
    Video,
    Image,
}

impl MediaKind {
    pub const ALL: [MediaKind; 3] = [MediaKind::Audio, MediaKind::Video, MediaKind::Image];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Image => "image",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the bytes of a job come from.
pub enum JobInput {
    /// A file that already exists on disk. Never deleted by the pipeline.
    Path(PathBuf),
    /// A byte stream that gets staged into a temp file before processing.
    Reader(Box<dyn AsyncRead + Send + Unpin>),
}

impl JobInput {
    pub fn reader(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self::Reader(Box::new(reader))
    }
}

impl fmt::Debug for JobInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Reader(_) => f.write_str("Reader(..)"),
        }
    }
}

/// One submitted transformation request.
#[derive(Debug)]
pub struct Job {
    pub kind: MediaKind,
    /// One entry per requested output, in output order.
    pub options: Vec<MediaOptions>,
    pub input: JobInput,
    pub cancel: CancellationToken,
}

impl Job {
    pub fn new(kind: MediaKind, options: Vec<MediaOptions>, input: JobInput) -> Self {
        Self {
            kind,
            options,
            input,
            cancel: CancellationToken::new(),
        }
    }

    /// Uses an externally owned cancellation signal.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// A produced output file handed to the consumer of a job's events.
///
/// The producer keeps the file on disk until this value is dropped, so a
/// consumer may read it at its own pace and then let it go.
pub struct ProcessedFile {
    pub name: String,
    pub mime_type: String,
    path: PathBuf,
    _release: oneshot::Sender<()>,
}

impl ProcessedFile {
    /// Creates a file event together with the handle its producer awaits
    /// before deleting the file.
    pub fn new(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> (Self, FileRelease) {
        let (tx, rx) = oneshot::channel();
        let file = Self {
            name: name.into(),
            mime_type: mime_type.into(),
            path: path.into(),
            _release: tx,
        };
        (file, FileRelease(rx))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens the file for streaming its bytes.
    pub async fn open(&self) -> std::io::Result<tokio::fs::File> {
        tokio::fs::File::open(&self.path).await
    }

    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl fmt::Debug for ProcessedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessedFile")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("path", &self.path)
            .finish()
    }
}

/// Resolves once the matching [`ProcessedFile`] has been dropped.
#[derive(Debug)]
pub struct FileRelease(oneshot::Receiver<()>);

impl FileRelease {
    pub async fn released(self) {
        // The sender is never used, only dropped.
        let _ = self.0.await;
    }
}

/// A status or result produced for one job.
#[derive(Debug)]
pub enum Event {
    /// Number of admitted jobs that will run before this one. 0 means running.
    QueuePosition { position: usize },
    /// Completion percentage, 0..=100.
    Progress { progress: u8 },
    /// One finished output.
    ProcessedFile(ProcessedFile),
    /// The job failed; no further events follow.
    ProcessingError { message: String },
}

impl Event {
    /// JSON payload for status events; `None` for file events.
    pub fn status(&self) -> Option<StatusPayload> {
        match self {
            Self::QueuePosition { position } => Some(StatusPayload::Position {
                position: *position,
            }),
            Self::Progress { progress } => Some(StatusPayload::Progress {
                progress: *progress,
            }),
            Self::ProcessingError { message } => Some(StatusPayload::Error {
                error: message.clone(),
            }),
            Self::ProcessedFile(_) => None,
        }
    }
}

/// Wire shape of a status event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatusPayload {
    Position { position: usize },
    Progress { progress: u8 },
    Error { error: String },
}

/// Sending half of a job's event channel.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<Event>,
}

impl EventSink {
    /// Creates a bounded event channel.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }

    /// Sends an event, waiting for room in the channel.
    ///
    /// Fails with [`ProcessError::Disconnected`] once the receiver is gone.
    pub async fn send(&self, event: Event) -> Result<(), ProcessError> {
        self.tx
            .send(event)
            .await
            .map_err(|_| ProcessError::Disconnected)
    }

    pub async fn progress(&self, progress: u8) -> Result<(), ProcessError> {
        self.send(Event::Progress { progress }).await
    }

    /// Sends a file event and waits until the consumer has dropped it.
    ///
    /// Cancellation only interrupts the hand-over. A file the consumer
    /// already holds is always waited for, so the producer never deletes it
    /// while it is being read.
    pub async fn file(
        &self,
        file: ProcessedFile,
        release: FileRelease,
        cancel: &CancellationToken,
    ) -> Result<(), ProcessError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProcessError::Aborted),
            sent = self.send(Event::ProcessedFile(file)) => sent?,
        }
        release.released().await;
        if cancel.is_cancelled() {
            return Err(ProcessError::Aborted);
        }
        Ok(())
    }

    /// Resolves when the receiving side has been dropped.
    pub async fn closed(&self) {
        self.tx.closed().await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
