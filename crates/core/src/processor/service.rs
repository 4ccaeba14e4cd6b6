//! Per-kind media service: admission, scheduling and event relabelling.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::{ProcessError, SubmitError};
use super::traits::Processor;
use super::types::{Event, EventSink, Job, JobInput, MediaKind, ProcessedFile};
use crate::config::{Config, QueueConfig};
use crate::converter::{ConverterConfig, FfmpegConverter};
use crate::imaging::ImageProcessor;
use crate::metrics;
use crate::options::MediaOptions;
use crate::queue::{JobQueue, QueueStatus, Ticket};

const DEFAULT_EVENT_BUFFER: usize = 16;

/// Accepts jobs of one media kind and runs them through its processor.
///
/// Each admitted job gets its own event channel. The channel first carries
/// queue positions (ending with 0 once the job runs), then the processor's
/// progress and files, and finally a `ProcessingError` if the job failed.
#[derive(Clone)]
pub struct MediaService {
    kind: MediaKind,
    queue: JobQueue,
    processor: Arc<dyn Processor>,
    event_buffer: usize,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for MediaService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaService")
            .field("kind", &self.kind)
            .field("processor", &self.processor.name())
            .field("queue", &self.queue.status())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl MediaService {
    pub fn new(kind: MediaKind, queue: QueueConfig, processor: Arc<dyn Processor>) -> Self {
        Self {
            kind,
            queue: JobQueue::new(queue),
            processor,
            event_buffer: DEFAULT_EVENT_BUFFER,
            timeout: None,
        }
    }

    /// Builds the service of one kind with its default processor.
    pub fn from_config(kind: MediaKind, config: &Config) -> Self {
        let processor: Arc<dyn Processor> = match kind {
            MediaKind::Image => Arc::new(ImageProcessor::new(
                config.processing.kind_tmp_dir(kind),
            )),
            MediaKind::Audio | MediaKind::Video => Arc::new(FfmpegConverter::new(
                ConverterConfig::from_config(kind, config),
            )),
        };
        let timeout =
            (config.processing.timeout_secs > 0).then(|| Duration::from_secs(config.processing.timeout_secs));

        Self::new(kind, *config.queue(kind), processor)
            .with_event_buffer(config.processing.event_buffer)
            .with_timeout(timeout)
    }

    /// Limits the run phase of every job.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_event_buffer(mut self, event_buffer: usize) -> Self {
        self.event_buffer = event_buffer.max(1);
        self
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn queue_status(&self) -> QueueStatus {
        self.queue.status()
    }

    /// Admits a job and starts driving it in the background.
    ///
    /// Fails without doing any work when the job is of another kind, has no
    /// options, is already cancelled or the queue is full. Dropping the
    /// returned receiver stops the job silently.
    pub fn submit(&self, job: Job) -> Result<mpsc::Receiver<Event>, SubmitError> {
        if job.kind != self.kind {
            return Err(SubmitError::KindMismatch {
                job: job.kind,
                service: self.kind,
            });
        }
        if job.options.is_empty() {
            return Err(SubmitError::NoOptions);
        }
        if job.cancel.is_cancelled() {
            return Err(SubmitError::Aborted);
        }

        let kind = self.kind.as_str();
        let Some(ticket) = self.queue.push() else {
            metrics::JOBS_REJECTED.with_label_values(&[kind]).inc();
            warn!(kind, "Queue is full, job rejected");
            return Err(SubmitError::QueueFull);
        };
        metrics::JOBS_SUBMITTED.with_label_values(&[kind]).inc();
        self.record_depth();
        info!(kind, position = ticket.position(), outputs = job.options.len(), "Job admitted");

        let (sink, rx) = EventSink::channel(self.event_buffer);
        tokio::spawn(self.clone().run_job(job, ticket, sink));
        Ok(rx)
    }

    fn record_depth(&self) {
        metrics::QUEUE_DEPTH
            .with_label_values(&[self.kind.as_str()])
            .set(self.queue.status().queued as i64);
    }

    async fn run_job(self, job: Job, mut ticket: Ticket, sink: EventSink) {
        let Job {
            options,
            input,
            cancel,
            ..
        } = job;
        let kind = self.kind.as_str();

        // Queue phase: report every position until a run slot is granted.
        let mut position = ticket.position();
        loop {
            if sink.send(Event::QueuePosition { position }).await.is_err() {
                debug!(kind, "Consumer left while queued");
                self.finish_waiting(ticket);
                return;
            }
            if position == 0 {
                break;
            }
            position = tokio::select! {
                next = ticket.changed() => next,
                _ = cancel.cancelled() => {
                    info!(kind, "Job cancelled while queued");
                    self.finish_waiting(ticket);
                    let _ = sink
                        .send(Event::ProcessingError {
                            message: ProcessError::Aborted.to_string(),
                        })
                        .await;
                    return;
                }
                _ = sink.closed() => {
                    debug!(kind, "Consumer left while queued");
                    self.finish_waiting(ticket);
                    return;
                }
            };
        }
        self.record_depth();

        // Run phase.
        let started = Instant::now();
        metrics::JOBS_RUNNING.with_label_values(&[kind]).inc();

        let result = self.run(input, &options, &sink, &cancel).await;

        let outcome = match &result {
            Ok(()) => "completed",
            Err(ProcessError::Timeout { .. }) => "timeout",
            Err(e) if e.is_cancellation() => "aborted",
            Err(_) if sink.is_closed() => "aborted",
            Err(_) => "failed",
        };
        match result {
            Ok(()) => info!(kind, elapsed_ms = started.elapsed().as_millis() as u64, "Job completed"),
            Err(e) if sink.is_closed() || matches!(e, ProcessError::Disconnected) => {
                debug!(kind, reason = %e, "Consumer left, job stopped");
            }
            Err(e) => {
                info!(kind, error = %e, "Job ended with error");
                let _ = sink
                    .send(Event::ProcessingError {
                        message: e.to_string(),
                    })
                    .await;
            }
        }

        metrics::JOBS_RUNNING.with_label_values(&[kind]).dec();
        metrics::JOBS_FINISHED
            .with_label_values(&[kind, outcome])
            .inc();
        metrics::JOB_DURATION
            .with_label_values(&[kind])
            .observe(started.elapsed().as_secs_f64());

        drop(ticket);
        self.record_depth();
    }

    fn finish_waiting(&self, ticket: Ticket) {
        drop(ticket);
        self.record_depth();
        metrics::JOBS_FINISHED
            .with_label_values(&[self.kind.as_str(), "aborted"])
            .inc();
    }

    /// Runs the processor while relabelling its events for the consumer.
    async fn run(
        &self,
        input: JobInput,
        options: &[MediaOptions],
        sink: &EventSink,
        cancel: &CancellationToken,
    ) -> Result<(), ProcessError> {
        // Cancelled by the caller, the timeout or a failing forwarder.
        let run_cancel = cancel.child_token();
        let done = CancellationToken::new();
        let (driver_sink, driver_rx) = EventSink::channel(self.event_buffer);

        let work = async {
            let events = driver_sink;
            self.processor
                .process(input, options, &events, &run_cancel)
                .await
        };
        let forward = forward_events(driver_rx, options, sink, &run_cancel);
        let run = async {
            let results = tokio::join!(work, forward);
            done.cancel();
            results
        };
        let watchdog = async {
            let limit = async {
                match self.timeout {
                    Some(limit) => tokio::time::sleep(limit).await,
                    None => std::future::pending::<()>().await,
                }
            };
            tokio::select! {
                _ = limit => {
                    warn!(kind = self.kind.as_str(), "Job timed out");
                    run_cancel.cancel();
                    true
                }
                _ = sink.closed() => {
                    debug!(kind = self.kind.as_str(), "Consumer left, stopping job");
                    run_cancel.cancel();
                    false
                }
                _ = done.cancelled() => false,
            }
        };

        let ((work_result, forward_result), timed_out) = tokio::join!(run, watchdog);

        let result = match (work_result, forward_result) {
            (_, Err(e)) if !e.is_cancellation() => Err(e),
            (Err(e), _) => Err(e),
            (Ok(()), Err(e)) => Err(e),
            (Ok(()), Ok(())) => Ok(()),
        };
        match result {
            Err(_) if timed_out => Err(ProcessError::Timeout {
                timeout_secs: self.timeout.map(|t| t.as_secs()).unwrap_or_default(),
            }),
            other => other,
        }
    }
}

/// Relays processor events, writing files with an `output` path to disk.
///
/// The n-th file event belongs to the n-th option. Any failure cancels the
/// run so the processor stops and cleans up.
async fn forward_events(
    mut events: mpsc::Receiver<Event>,
    options: &[MediaOptions],
    sink: &EventSink,
    run_cancel: &CancellationToken,
) -> Result<(), ProcessError> {
    let mut index = 0;
    while let Some(event) = events.recv().await {
        let forwarded = match event {
            Event::ProcessedFile(file) => {
                let option = options.get(index);
                index += 1;
                match option.and_then(|o| o.output()) {
                    Some(output) => write_output(file, output).await,
                    None => {
                        let file = match option.and_then(|o| o.name()) {
                            Some(name) => file.renamed(name),
                            None => file,
                        };
                        sink.send(Event::ProcessedFile(file)).await
                    }
                }
            }
            other => sink.send(other).await,
        };

        if let Err(e) = forwarded {
            run_cancel.cancel();
            return Err(e);
        }
    }
    Ok(())
}

/// Copies a produced file to its requested destination and releases it.
async fn write_output(file: ProcessedFile, output: &str) -> Result<(), ProcessError> {
    let destination = std::path::Path::new(output);
    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let bytes = tokio::fs::copy(file.path(), destination).await?;
    info!(output, bytes, "Output written to disk");
    Ok(())
}
