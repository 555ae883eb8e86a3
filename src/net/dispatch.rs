//! Push-frame dispatch.
//!
//! DESIGN
//! ======
//! Frames are decoded into a [`PushEvent`], planned into an [`Action`]
//! against the current selection, and the action is applied through the same
//! engine operations a front-end calls. Push events are invalidation signals:
//! every action either re-reads over HTTP or removes local data, so frame
//! content never lands in state directly.
//!
//! Anything that is not a JSON object with a string `type` is a keep-alive
//! and is dropped without a trace above `trace`. Unknown kinds are logged at
//! `debug`. Known kinds whose payload does not decode are malformed and
//! dropped the same way.

#[cfg(test)]
#[path = "dispatch_test.rs"]
mod dispatch_test;

use tracing::{debug, trace};

use super::types::{AlertId, KNOWN_EVENT_KINDS, PushEvent};
use crate::engine::SyncEngine;

/// Result of decoding one raw frame.
#[derive(Clone, Debug, PartialEq)]
pub enum Decoded {
    Event(PushEvent),
    /// A JSON object with a `type` this client does not handle.
    Unrecognized(String),
    /// Keep-alive text, non-object JSON, or a known kind with a bad payload.
    Malformed,
}

/// What a push event asks the engine to do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    RefreshAlerts,
    RefreshDetail(AlertId),
    RemoveAlert(AlertId),
    RaiseError(String),
    Ignore,
}

// =============================================================================
// DECODE
// =============================================================================

#[must_use]
pub fn decode_frame(frame: &str) -> Decoded {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(frame) else {
        return Decoded::Malformed;
    };
    let Some(kind) = value.get("type").and_then(serde_json::Value::as_str) else {
        return Decoded::Malformed;
    };
    if !KNOWN_EVENT_KINDS.contains(&kind) {
        return Decoded::Unrecognized(kind.to_owned());
    }
    match serde_json::from_value::<PushEvent>(value) {
        Ok(event) => Decoded::Event(event),
        Err(_) => Decoded::Malformed,
    }
}

// =============================================================================
// PLAN
// =============================================================================

/// Map an event to an action given the alert currently selected.
#[must_use]
pub fn plan(event: PushEvent, selected: Option<AlertId>) -> Action {
    match event {
        PushEvent::NewAlert { .. } => Action::RefreshAlerts,
        PushEvent::ChatMessage { alert_id, .. } if selected == Some(alert_id) => Action::RefreshDetail(alert_id),
        PushEvent::ChatMessage { .. } | PushEvent::HealthCheck { .. } => Action::Ignore,
        PushEvent::AlertDeleted { alert_id } => Action::RemoveAlert(alert_id),
        PushEvent::Error { message } => Action::RaiseError(message),
    }
}

// =============================================================================
// APPLY
// =============================================================================

/// Decode `frame` and apply the resulting action to `engine`.
pub async fn dispatch_frame(engine: &SyncEngine, frame: &str) {
    match decode_frame(frame) {
        Decoded::Event(event) => {
            let selected = engine.snapshot().selected_alert_id;
            apply(engine, plan(event, selected)).await;
        }
        Decoded::Unrecognized(kind) => debug!(%kind, "ignoring unrecognized push event"),
        Decoded::Malformed => trace!(len = frame.len(), "dropping non-event frame"),
    }
}

pub async fn apply(engine: &SyncEngine, action: Action) {
    match action {
        Action::RefreshAlerts => engine.fetch_alerts().await,
        Action::RefreshDetail(id) => engine.fetch_alert_detail(id).await,
        Action::RemoveAlert(id) => engine.remove_alert_locally(id),
        Action::RaiseError(message) => engine.raise_error(message),
        Action::Ignore => {}
    }
}
