//! Error types for the processing pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that end a job once it has been admitted.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// FFmpeg binary not found.
    #[error("FFmpeg not found at path: {path}")]
    FfmpegNotFound { path: PathBuf },

    /// The transcoder exited with a nonzero status.
    #[error("ffmpeg exited with code {}: {}", display_code(.code), .stderr)]
    ProcessFailed { code: Option<i32>, stderr: String },

    /// The options cannot be processed by this processor.
    #[error("Invalid options: {reason}")]
    InvalidOptions { reason: String },

    /// Image decoding, transformation or encoding failed.
    #[error("Image processing failed: {reason}")]
    Image { reason: String },

    /// The job ran longer than the configured limit.
    #[error("Processing timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// The job was cancelled by its caller.
    #[error("Processing aborted")]
    Aborted,

    /// The consumer of the job's events went away.
    #[error("Event consumer disconnected")]
    Disconnected,

    /// I/O error while staging, running or writing outputs.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn display_code(code: &Option<i32>) -> String {
    code.map(|c| c.to_string())
        .unwrap_or_else(|| "none".to_string())
}

impl ProcessError {
    /// Creates a process failure carrying the captured diagnostic output.
    pub fn process_failed(code: Option<i32>, stderr: impl Into<String>) -> Self {
        Self::ProcessFailed {
            code,
            stderr: stderr.into(),
        }
    }

    pub fn invalid_options(reason: impl Into<String>) -> Self {
        Self::InvalidOptions {
            reason: reason.into(),
        }
    }

    pub fn image(reason: impl Into<String>) -> Self {
        Self::Image {
            reason: reason.into(),
        }
    }

    /// Whether the job ended because somebody stopped it rather than because it failed.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Aborted | Self::Disconnected)
    }
}

/// Errors returned synchronously when a job is submitted.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// The queue already holds its maximum number of jobs.
    #[error("Queue is full")]
    QueueFull,

    #[error("No options provided")]
    NoOptions,

    /// The job was cancelled before it was admitted.
    #[error("Processing aborted")]
    Aborted,

    #[error("{job} job submitted to the {service} service")]
    KindMismatch {
        job: super::MediaKind,
        service: super::MediaKind,
    },
}
