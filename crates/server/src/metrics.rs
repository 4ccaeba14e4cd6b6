//! Prometheus metrics for observability.
//!
//! This module provides the HTTP-side metrics of the m4k server:
//! - HTTP request metrics (latency, counts, in flight)
//! - Multipart stream metrics (parts written, disconnects)
//! - Queue occupancy (collected dynamically before each scrape)
//!
//! Job metrics live in `m4k_core::metrics` and are registered here too.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};

use m4k_core::metrics::{JOBS_RUNNING, QUEUE_DEPTH};
use m4k_core::MediaKind;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds, measured until the response head is ready.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "m4k_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("m4k_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "m4k_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Multipart Stream Metrics
// =============================================================================

/// Parts written to multipart responses by type.
pub static STREAM_PARTS_SENT: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "m4k_stream_parts_sent_total",
            "Multipart parts written to responses",
        ),
        &["type"], // "status", "file", "keepalive", "error"
    )
    .unwrap()
});

/// Responses whose client went away before the stream ended.
pub static STREAM_DISCONNECTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "m4k_stream_disconnects_total",
        "Streaming responses abandoned by the client",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Streams
    registry
        .register(Box::new(STREAM_PARTS_SENT.clone()))
        .unwrap();
    registry
        .register(Box::new(STREAM_DISCONNECTS.clone()))
        .unwrap();

    // Core metrics (admission, execution)
    for metric in m4k_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Collect dynamic metrics from current application state.
///
/// Queue gauges are refreshed from each service's live status so a scrape
/// never reports a stale depth.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    for kind in MediaKind::ALL {
        let status = state.service(kind).queue_status();
        QUEUE_DEPTH
            .with_label_values(&[kind.as_str()])
            .set(status.queued as i64);
        JOBS_RUNNING
            .with_label_values(&[kind.as_str()])
            .set(status.running as i64);
    }
}
