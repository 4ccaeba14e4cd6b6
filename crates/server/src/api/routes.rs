use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{handlers, middleware::metrics_middleware, process};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health and status
        .route("/health", get(handlers::health))
        .route("/queues", get(handlers::queues))
        .route("/metrics", get(handlers::metrics))
        // Processing (raw input as the request body)
        .route("/audio/process", post(process::process_audio))
        .route("/videos/process", post(process::process_video))
        .route("/images/process", post(process::process_image))
        .layer(DefaultBodyLimit::disable())
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
