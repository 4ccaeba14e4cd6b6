//! Mock processor for testing.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::options::MediaOptions;
use crate::processor::{EventSink, JobInput, ProcessError, ProcessedFile, Processor};
use crate::staging::{new_job_id, remove_quietly};

/// A recorded job for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedJob {
    pub options: Vec<MediaOptions>,
    /// Bytes read from a streamed input; `None` for path inputs.
    pub input_len: Option<usize>,
}

/// Mock implementation of the Processor trait.
///
/// Provides controllable behavior for testing:
/// - Scripted progress values
/// - One output file per option with a fixed payload
/// - Simulated run time (cancellable)
/// - Simulated failure of the next job
///
/// # Example
///
/// ```rust,ignore
/// use m4k_core::testing::MockProcessor;
///
/// let processor = MockProcessor::new().with_delay(Duration::from_millis(50));
/// processor.fail_next("boom").await;
///
/// let service = MediaService::new(MediaKind::Audio, QueueConfig::new(1, 5), Arc::new(processor.clone()));
/// // ...
/// assert_eq!(processor.calls(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct MockProcessor {
    calls: Arc<AtomicUsize>,
    recorded: Arc<RwLock<Vec<RecordedJob>>>,
    progress: Arc<RwLock<Vec<u8>>>,
    payload: Arc<RwLock<Vec<u8>>>,
    next_error: Arc<RwLock<Option<String>>>,
    delay: Duration,
    temp_dir: PathBuf,
}

impl Default for MockProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProcessor {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            recorded: Arc::new(RwLock::new(Vec::new())),
            progress: Arc::new(RwLock::new(vec![0, 50, 100])),
            payload: Arc::new(RwLock::new(b"mock-output".to_vec())),
            next_error: Arc::new(RwLock::new(None)),
            delay: Duration::ZERO,
            temp_dir: std::env::temp_dir().join("m4k-mock"),
        }
    }

    /// Waits this long before producing anything.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = temp_dir.into();
        self
    }

    /// Number of jobs that reached the processor.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn recorded_jobs(&self) -> Vec<RecordedJob> {
        self.recorded.read().await.clone()
    }

    pub async fn set_progress(&self, progress: Vec<u8>) {
        *self.progress.write().await = progress;
    }

    pub async fn set_payload(&self, payload: impl Into<Vec<u8>>) {
        *self.payload.write().await = payload.into();
    }

    /// Makes the next job fail like a process exiting with status 1.
    pub async fn fail_next(&self, stderr: impl Into<String>) {
        *self.next_error.write().await = Some(stderr.into());
    }
}

#[async_trait]
impl Processor for MockProcessor {
    fn name(&self) -> &str {
        "mock"
    }

    async fn process(
        &self,
        input: JobInput,
        options: &[MediaOptions],
        events: &EventSink,
        cancel: &CancellationToken,
    ) -> Result<(), ProcessError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let input_len = match input {
            JobInput::Path(_) => None,
            JobInput::Reader(mut reader) => {
                let mut bytes = Vec::new();
                reader.read_to_end(&mut bytes).await?;
                Some(bytes.len())
            }
        };
        self.recorded.write().await.push(RecordedJob {
            options: options.to_vec(),
            input_len,
        });

        if !self.delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(self.delay) => {}
                _ = cancel.cancelled() => return Err(ProcessError::Aborted),
            }
        }
        if cancel.is_cancelled() {
            return Err(ProcessError::Aborted);
        }

        if let Some(stderr) = self.next_error.write().await.take() {
            return Err(ProcessError::process_failed(Some(1), stderr));
        }

        let progress = self.progress.read().await.clone();
        for p in progress {
            events.progress(p).await?;
        }

        tokio::fs::create_dir_all(&self.temp_dir).await?;
        let id = new_job_id();
        let payload = self.payload.read().await.clone();
        for n in 1..=options.len() {
            let path = self.temp_dir.join(format!("mock-{}-{}.bin", id, n));
            tokio::fs::write(&path, &payload).await?;

            let (file, release) =
                ProcessedFile::new(format!("output{}.bin", n), "application/octet-stream", &path);
            let sent = events.file(file, release, cancel).await;
            remove_quietly(&path).await;
            sent?;
        }
        Ok(())
    }
}
