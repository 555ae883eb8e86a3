//! REST client for the alert-analysis service.
//!
//! ERROR HANDLING
//! ==============
//! 404 maps to `SyncError::NotFound` so the engine can treat it as a deletion
//! signal; every other non-success status keeps its code and body. Bodies
//! are read as text and parsed separately so decode failures are reported as
//! `SyncError::Decode` rather than as transport errors.

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use super::types::{AlertDetailRecord, AlertId, AlertSummary, ChatReply, ChatRequest};
use crate::config::SyncConfig;
use crate::error::SyncError;

/// The pull channel the engine reads content through.
#[async_trait]
pub trait AlertApi: Send + Sync {
    /// `GET /api/alerts`
    async fn list_alerts(&self) -> Result<Vec<AlertSummary>, SyncError>;

    /// `GET /api/alerts/{id}`
    async fn get_alert(&self, id: AlertId) -> Result<AlertDetailRecord, SyncError>;

    /// `DELETE /api/alerts/{id}`
    async fn delete_alert(&self, id: AlertId) -> Result<(), SyncError>;

    /// `POST /api/alerts/{id}/chat`
    async fn send_chat(&self, id: AlertId, message: &str) -> Result<ChatReply, SyncError>;
}

fn alerts_endpoint() -> &'static str {
    "/api/alerts"
}

fn alert_endpoint(id: AlertId) -> String {
    format!("/api/alerts/{id}")
}

fn chat_endpoint(id: AlertId) -> String {
    format!("/api/alerts/{id}/chat")
}

fn health_endpoint() -> &'static str {
    "/api/health"
}

// =============================================================================
// CLIENT
// =============================================================================

/// `AlertApi` over HTTP with `reqwest`.
#[derive(Clone, Debug)]
pub struct HttpAlertApi {
    http: reqwest::Client,
    base_url: String,
}

impl HttpAlertApi {
    /// # Errors
    ///
    /// Returns `SyncError::HttpClientBuild` if the client cannot be constructed.
    pub fn new(config: &SyncConfig) -> Result<Self, SyncError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| SyncError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: config.base_url.trim_end_matches('/').to_owned() })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// `GET /api/health`, returned as raw JSON.
    ///
    /// # Errors
    ///
    /// Returns the request, status or decode failure.
    pub async fn health(&self) -> Result<serde_json::Value, SyncError> {
        let response = self.http.get(self.url(health_endpoint())).send().await?;
        read_json(response).await
    }

    /// `POST /api/alerts` with a raw alert payload, returned as raw JSON.
    ///
    /// # Errors
    ///
    /// Returns the request, status or decode failure.
    pub async fn submit_alert(&self, alert: &serde_json::Value) -> Result<serde_json::Value, SyncError> {
        let response = self
            .http
            .post(self.url(alerts_endpoint()))
            .json(alert)
            .send()
            .await?;
        read_json(response).await
    }
}

#[async_trait]
impl AlertApi for HttpAlertApi {
    async fn list_alerts(&self) -> Result<Vec<AlertSummary>, SyncError> {
        let response = self.http.get(self.url(alerts_endpoint())).send().await?;
        read_json(response).await
    }

    async fn get_alert(&self, id: AlertId) -> Result<AlertDetailRecord, SyncError> {
        let response = self.http.get(self.url(&alert_endpoint(id))).send().await?;
        read_json(response).await
    }

    async fn delete_alert(&self, id: AlertId) -> Result<(), SyncError> {
        let response = self.http.delete(self.url(&alert_endpoint(id))).send().await?;
        check_status(response).await?;
        Ok(())
    }

    async fn send_chat(&self, id: AlertId, message: &str) -> Result<ChatReply, SyncError> {
        let response = self
            .http
            .post(self.url(&chat_endpoint(id)))
            .json(&ChatRequest { message })
            .send()
            .await?;
        read_json(response).await
    }
}

// =============================================================================
// RESPONSE HANDLING
// =============================================================================

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, SyncError> {
    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(SyncError::NotFound);
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SyncError::Status { status: status.as_u16(), body });
    }
    Ok(response)
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, SyncError> {
    let response = check_status(response).await?;
    let text = response.text().await?;
    parse_body(&text)
}

fn parse_body<T: DeserializeOwned>(text: &str) -> Result<T, SyncError> {
    Ok(serde_json::from_str(text)?)
}
