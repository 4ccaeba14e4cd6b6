use axum::{extract::State, http::header, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;

use m4k_core::{MediaKind, QueueStatus};

use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Occupancy of every job queue.
#[derive(Serialize)]
pub struct QueuesResponse {
    pub audio: QueueStatus,
    pub video: QueueStatus,
    pub image: QueueStatus,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub async fn queues(State(state): State<Arc<AppState>>) -> Json<QueuesResponse> {
    Json(QueuesResponse {
        audio: state.service(MediaKind::Audio).queue_status(),
        video: state.service(MediaKind::Video).queue_status(),
        image: state.service(MediaKind::Image).queue_status(),
    })
}

/// Prometheus text exposition.
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    collect_dynamic_metrics(&state);
    (
        [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
        encode_metrics(),
    )
}
