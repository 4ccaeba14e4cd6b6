//! `POST /<kind>/process` handlers.

use std::io;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::TryStreamExt;
use serde::Serialize;
use thiserror::Error;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use m4k_core::{Job, JobInput, MediaKind, OptionsError, SubmitError};

use super::multipart::{content_type, stream_events};
use super::options::collect_options;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Failures reported before any part of the stream is sent.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Options(#[from] OptionsError),

    #[error(transparent)]
    Submit(#[from] SubmitError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Options(_) => StatusCode::BAD_REQUEST,
            Self::Submit(SubmitError::QueueFull) => StatusCode::CONFLICT,
            Self::Submit(SubmitError::NoOptions | SubmitError::Aborted) => {
                StatusCode::BAD_REQUEST
            }
            Self::Submit(SubmitError::KindMismatch { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        } else {
            debug!(error = %self, status = status.as_u16(), "Request rejected");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

pub async fn process_audio(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Response, ApiError> {
    process(&state, MediaKind::Audio, request)
}

pub async fn process_video(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Response, ApiError> {
    process(&state, MediaKind::Video, request)
}

pub async fn process_image(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Response, ApiError> {
    process(&state, MediaKind::Image, request)
}

/// Parses the options, admits the job and answers with its event stream.
///
/// The request body is handed to the job unread; it is consumed while the
/// input is staged.
fn process(state: &AppState, kind: MediaKind, request: Request) -> Result<Response, ApiError> {
    let (parts, body) = request.into_parts();
    let options = collect_options(kind, &parts.uri, &parts.headers)?;

    let cancel = CancellationToken::new();
    let job = Job::new(kind, options, body_input(body)).with_cancel(cancel.clone());
    let events = state.service(kind).submit(job)?;

    let (boundary, body) = stream_events(events, cancel, state.keepalive_interval());
    Ok((
        [(header::CONTENT_TYPE, content_type(&boundary))],
        body,
    )
        .into_response())
}

fn body_input(body: Body) -> JobInput {
    let stream = body.into_data_stream().map_err(io::Error::other);
    JobInput::reader(StreamReader::new(stream))
}
