//! Alert detail and transcript model.
//!
//! SYSTEM CONTEXT
//! ==============
//! At most one `AlertDetail` is resident at a time: the one for the selected
//! alert. It is rebuilt from the server record on every successful fetch;
//! only the optimistic messages of an in-flight send survive a rebuild.

#[cfg(test)]
#[path = "alerts_test.rs"]
mod alerts_test;

use uuid::Uuid;

use crate::net::types::{AlertDetailRecord, AlertId, AlertSummary, ChatMessageRecord, ChatRole, ServerMessageId};

/// Identity of a transcript entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageId {
    /// Persisted by the server.
    Confirmed(ServerMessageId),
    /// Inserted locally ahead of server confirmation.
    Optimistic(Uuid),
}

impl MessageId {
    #[must_use]
    pub fn optimistic() -> Self {
        Self::Optimistic(Uuid::new_v4())
    }
}

/// One entry in an alert's chat transcript.
#[derive(Clone, Debug, PartialEq)]
pub struct ChatMessage {
    pub id: MessageId,
    pub alert_id: AlertId,
    pub role: ChatRole,
    pub content: String,
    pub created_at: String,
    /// True only for the assistant placeholder of an in-flight send.
    pub pending: bool,
}

impl ChatMessage {
    /// Whether this entry exists only locally and may still be rolled back.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self.id, MessageId::Optimistic(_))
    }
}

impl From<ChatMessageRecord> for ChatMessage {
    fn from(record: ChatMessageRecord) -> Self {
        Self {
            id: MessageId::Confirmed(record.id),
            alert_id: record.alert_id,
            role: record.role,
            content: record.content,
            created_at: record.created_at,
            pending: false,
        }
    }
}

/// Full detail of the selected alert.
#[derive(Clone, Debug, PartialEq)]
pub struct AlertDetail {
    pub id: AlertId,
    /// Raw alert payload as ingested by the server.
    pub alert: serde_json::Value,
    pub created_at: String,
    pub initial_response: String,
    pub chat_messages: Vec<ChatMessage>,
}

impl AlertDetail {
    #[must_use]
    pub fn from_record(id: AlertId, record: AlertDetailRecord) -> Self {
        let chat_messages = record
            .chat_messages
            .into_iter()
            .map(|msg| {
                let mut msg = ChatMessage::from(msg);
                // Nested messages may omit alert_id.
                if msg.alert_id == 0 {
                    msg.alert_id = id;
                }
                msg
            })
            .collect();
        Self {
            id,
            alert: record.alert,
            created_at: record.created_at,
            initial_response: record.initial_response,
            chat_messages,
        }
    }

    /// BGP prefix named by the alert payload, if any.
    #[must_use]
    pub fn prefix(&self) -> Option<&str> {
        self.alert
            .pointer("/details/prefix")
            .or_else(|| self.alert.get("prefix"))
            .and_then(serde_json::Value::as_str)
    }

    #[must_use]
    pub fn has_pending_reply(&self) -> bool {
        self.chat_messages.iter().any(|msg| msg.pending)
    }

    #[must_use]
    pub fn contains_confirmed(&self, id: ServerMessageId) -> bool {
        self.chat_messages
            .iter()
            .any(|msg| msg.id == MessageId::Confirmed(id))
    }
}

/// Remove `id` from the list. Returns whether an entry was removed.
pub fn remove_summary(alerts: &mut Vec<AlertSummary>, id: AlertId) -> bool {
    let before = alerts.len();
    alerts.retain(|alert| alert.id != id);
    alerts.len() != before
}
