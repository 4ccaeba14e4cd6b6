use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered before streaming, with an error status.
    #[error("Failed to optimize: [{status}] {message}")]
    Rejected { status: u16, message: String },

    #[error("Response is not multipart/mixed")]
    NotMultipart,

    #[error("Malformed multipart body: {0}")]
    Malformed(String),

    #[error("Failed to encode options: {0}")]
    Options(#[source] serde_json::Error),

    #[error("Invalid status part: {0}")]
    Status(#[from] serde_json::Error),
}

impl ClientError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed(reason.into())
    }
}
