use futures::{StreamExt, TryStreamExt};
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use m4k_core::options::{AudioOptions, ImageOptions, VideoOptions};
use m4k_core::MediaKind;

use crate::error::ClientError;
use crate::event::{decode_events, EventStream};
use crate::multipart::boundary_of;

/// Header carrying the JSON option list.
pub const OPTIONS_HEADER: &str = "x-options";

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// HTTP client for an m4k server.
///
/// # Example
///
/// ```rust,ignore
/// let client = M4kClient::new("http://localhost:3000");
/// let mut events = client
///     .optimize_image(bytes, &[ImageOptions { format: Some(ImageFormat::Webp), ..Default::default() }])
///     .await?;
/// while let Some(event) = events.next().await {
///     match event? {
///         ClientEvent::Status(status) => println!("{status:?}"),
///         ClientEvent::File(file) => std::fs::write(&file.name, &file.data)?,
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct M4kClient {
    http: reqwest::Client,
    base_url: String,
}

impl M4kClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_http_client(base_url, reqwest::Client::new())
    }

    /// Uses a preconfigured HTTP client (timeouts, proxies, TLS).
    pub fn with_http_client(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn optimize_audio(
        &self,
        input: impl Into<reqwest::Body>,
        options: &[AudioOptions],
    ) -> Result<EventStream, ClientError> {
        self.process(MediaKind::Audio, input, options).await
    }

    pub async fn optimize_video(
        &self,
        input: impl Into<reqwest::Body>,
        options: &[VideoOptions],
    ) -> Result<EventStream, ClientError> {
        self.process(MediaKind::Video, input, options).await
    }

    pub async fn optimize_image(
        &self,
        input: impl Into<reqwest::Body>,
        options: &[ImageOptions],
    ) -> Result<EventStream, ClientError> {
        self.process(MediaKind::Image, input, options).await
    }

    /// Posts `input` with `options` and returns the response events.
    ///
    /// Fails before streaming when the server rejects the request, e.g.
    /// for invalid options or a full queue.
    pub async fn process<T>(
        &self,
        kind: MediaKind,
        input: impl Into<reqwest::Body>,
        options: &T,
    ) -> Result<EventStream, ClientError>
    where
        T: Serialize + ?Sized,
    {
        let options = serde_json::to_string(options).map_err(ClientError::Options)?;
        let url = format!("{}/{}", self.base_url, route(kind));
        debug!(%url, "Submitting job");

        let response = self
            .http
            .post(&url)
            .header(OPTIONS_HEADER, options)
            .body(input)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or(body);
            warn!(%url, status = status.as_u16(), %message, "Job rejected");
            return Err(ClientError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let boundary = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(boundary_of)
            .ok_or(ClientError::NotMultipart)?
            .to_string();

        let chunks = response.bytes_stream().map_err(ClientError::from).boxed();
        Ok(decode_events(chunks, &boundary))
    }
}

fn route(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Audio => "audio/process",
        MediaKind::Video => "videos/process",
        MediaKind::Image => "images/process",
    }
}
