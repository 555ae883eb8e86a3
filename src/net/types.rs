//! Wire types for the alert-analysis HTTP API.
//!
//! DESIGN
//! ======
//! Decoding is tolerant: everything except ids defaults when absent, and a
//! couple of field aliases cover the two spellings the server has used. The
//! engine converts detail records into `state` types before publishing them,
//! so nothing outside `net` depends on the exact wire layout.

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

use serde::{Deserialize, Serialize};

/// Server-assigned alert id.
pub type AlertId = i64;

/// Server-assigned chat message id.
pub type ServerMessageId = i64;

/// One row of `GET /api/alerts`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlertSummary {
    pub id: AlertId,
    #[serde(default)]
    pub created_at: String,
    #[serde(default, alias = "kind")]
    pub details_kind: Option<String>,
    #[serde(default)]
    pub prefix: Option<String>,
}

/// Author of a chat message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// A persisted chat message as returned inside an alert detail.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessageRecord {
    pub id: ServerMessageId,
    #[serde(default)]
    pub alert_id: AlertId,
    pub role: ChatRole,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub created_at: String,
}

/// Body of `GET /api/alerts/{id}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlertDetailRecord {
    /// Raw alert payload as ingested by the server.
    #[serde(default, alias = "alert_data")]
    pub alert: serde_json::Value,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub initial_response: String,
    #[serde(default, alias = "messages")]
    pub chat_messages: Vec<ChatMessageRecord>,
}

/// Body of `POST /api/alerts/{id}/chat`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatRequest<'a> {
    pub message: &'a str,
}

/// Response of `POST /api/alerts/{id}/chat`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub message_id: ServerMessageId,
    pub response: String,
}

/// A decoded push-stream payload. The stream carries invalidation signals
/// only; content is always re-read over HTTP.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushEvent {
    NewAlert {
        #[serde(default)]
        alert_id: Option<AlertId>,
    },
    ChatMessage {
        alert_id: AlertId,
        #[serde(default)]
        message_id: Option<ServerMessageId>,
    },
    AlertDeleted {
        alert_id: AlertId,
    },
    Error {
        message: String,
    },
    HealthCheck {
        #[serde(default)]
        status: Option<String>,
    },
}

/// Event kinds this client understands.
pub const KNOWN_EVENT_KINDS: [&str; 5] = ["new_alert", "chat_message", "alert_deleted", "error", "health_check"];
