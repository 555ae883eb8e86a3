//! Error type shared by the transports, config loading and the engine.
//!
//! ERROR HANDLING
//! ==============
//! Library operations return `Result<_, SyncError>`. The engine never hands
//! these to its callers directly: request failures become a message on the
//! error surface, transport failures become a connection-status change, and
//! `NotFound` on a detail fetch is a deletion signal rather than an error.

#[cfg(test)]
#[path = "error_test.rs"]
mod error_test;

/// Errors produced by sync operations.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A configuration value could not be parsed or is inconsistent.
    #[error("config parse failed: {0}")]
    Config(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// The request never produced a response (connect, timeout, body read).
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server answered 404 for the requested resource.
    #[error("not found")]
    NotFound,

    /// The server returned a non-success status other than 404.
    #[error("server returned status {status}")]
    Status { status: u16, body: String },

    /// The response body was not the expected JSON shape.
    #[error("response parse failed: {0}")]
    Decode(#[from] serde_json::Error),

    /// The push stream failed mid-read.
    #[error("push stream failed: {0}")]
    Stream(String),
}

impl SyncError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Whether repeating the same call may succeed without any change on our side.
    #[must_use]
    pub fn retryable(&self) -> bool {
        match self {
            Self::Request(_) | Self::Stream(_) => true,
            Self::Status { status, .. } => matches!(status, 429 | 500..=599),
            Self::Config(_) | Self::HttpClientBuild(_) | Self::NotFound | Self::Decode(_) => false,
        }
    }
}
