//! Prometheus metrics for the job pipeline.
//!
//! All metrics carry a `kind` label (`audio`, `video`, `image`).

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts};

// =============================================================================
// Admission
// =============================================================================

/// Jobs admitted to a queue.
pub static JOBS_SUBMITTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("m4k_jobs_submitted_total", "Total jobs admitted to a queue"),
        &["kind"],
    )
    .unwrap()
});

/// Jobs turned away because the queue was full.
pub static JOBS_REJECTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "m4k_jobs_rejected_total",
            "Total jobs rejected because the queue was full",
        ),
        &["kind"],
    )
    .unwrap()
});

/// Jobs waiting for a run slot.
pub static QUEUE_DEPTH: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("m4k_queue_depth", "Jobs waiting for a run slot"),
        &["kind"],
    )
    .unwrap()
});

// =============================================================================
// Execution
// =============================================================================

/// Jobs currently holding a run slot.
pub static JOBS_RUNNING: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("m4k_jobs_running", "Jobs currently running"),
        &["kind"],
    )
    .unwrap()
});

/// Finished jobs by outcome.
pub static JOBS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("m4k_jobs_finished_total", "Total finished jobs"),
        &["kind", "result"], // "completed", "failed", "aborted", "timeout"
    )
    .unwrap()
});

/// Run phase duration in seconds.
pub static JOB_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("m4k_job_duration_seconds", "Duration of the run phase")
            .buckets(vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 1800.0]),
        &["kind"],
    )
    .unwrap()
});

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(JOBS_SUBMITTED.clone()),
        Box::new(JOBS_REJECTED.clone()),
        Box::new(QUEUE_DEPTH.clone()),
        Box::new(JOBS_RUNNING.clone()),
        Box::new(JOBS_FINISHED.clone()),
        Box::new(JOB_DURATION.clone()),
    ]
}
