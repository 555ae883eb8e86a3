//! Server-sent event transport for the push channel.
//!
//! The stream yields the raw `data` field of each event. Decoding belongs to
//! the dispatcher so that keep-alive text and malformed payloads are dropped
//! in one place.

#[cfg(test)]
#[path = "stream_test.rs"]
mod stream_test;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use reqwest::header::ACCEPT;

use crate::config::SyncConfig;
use crate::error::SyncError;

/// Raw event payloads from one open stream. Ends when the server closes it.
pub type FrameStream = BoxStream<'static, Result<String, SyncError>>;

/// Opens push-stream connections. The connection manager owns the only
/// caller, so tests can substitute a scripted source.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Open a new stream.
    async fn connect(&self) -> Result<FrameStream, SyncError>;
}

fn stream_endpoint() -> &'static str {
    "/api/messages/stream"
}

/// `EventSource` over `GET /api/messages/stream`.
#[derive(Clone, Debug)]
pub struct SseEventSource {
    http: reqwest::Client,
    url: String,
}

impl SseEventSource {
    /// # Errors
    ///
    /// Returns `SyncError::HttpClientBuild` if the client cannot be constructed.
    pub fn new(config: &SyncConfig) -> Result<Self, SyncError> {
        // No request timeout: the stream stays open indefinitely.
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| SyncError::HttpClientBuild(e.to_string()))?;
        let url = format!("{}{}", config.base_url.trim_end_matches('/'), stream_endpoint());
        Ok(Self { http, url })
    }
}

#[async_trait]
impl EventSource for SseEventSource {
    async fn connect(&self) -> Result<FrameStream, SyncError> {
        let response = self
            .http
            .get(&self.url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Status { status: status.as_u16(), body });
        }

        let frames = response.bytes_stream().eventsource().map(|event| match event {
            Ok(event) => Ok(event.data),
            Err(e) => Err(SyncError::Stream(e.to_string())),
        });
        Ok(frames.boxed())
    }
}
