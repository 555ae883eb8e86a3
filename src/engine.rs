//! Sync engine: the single owner of client state.
//!
//! SYSTEM CONTEXT
//! ==============
//! `SyncEngine` is a cheap, cloneable handle to one state container. Every
//! mutation, whether it comes from a front-end call or a push event, goes
//! through the same operations below and lands in a `watch` channel that
//! front-ends subscribe to.
//!
//! DESIGN
//! ======
//! - Mutations are synchronous closures applied with `send_modify`; no lock
//!   is held across a network await.
//! - REST is the source of truth. Lists and details are replaced wholesale
//!   on every successful fetch; a detail response for an alert that is no
//!   longer selected is discarded.
//! - Chat sends are optimistic: two local entries are inserted before the
//!   request, then confirmed or rolled back when it settles.
//!
//! LIFECYCLE
//! =========
//! 1. `new` builds an idle engine (no connection, empty state).
//! 2. `mount` opens the push stream and loads the alert list.
//! 3. Stream events are pumped into the dispatcher; each reconnect after the
//!    first triggers a full resync.
//! 4. `unmount` closes the stream and turns every later mutation into a
//!    no-op. An engine is not remounted after `unmount`.

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{BackoffConfig, SyncConfig};
use crate::net::api::AlertApi;
use crate::net::connection::{ConnectionEvent, ConnectionManager};
use crate::net::dispatch;
use crate::net::stream::EventSource;
use crate::net::types::{AlertId, ServerMessageId};
use crate::state::alerts::{AlertDetail, remove_summary};
use crate::state::chat::{self, PendingSend};
use crate::state::{ConnectionStatus, Request, SyncState};

/// Result of [`SyncEngine::send_message`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// The server replied; the placeholder now holds its answer.
    Confirmed { message_id: ServerMessageId },
    /// The request failed; both optimistic entries were removed.
    RolledBack,
    /// Nothing was inserted and no request was made.
    Rejected(SendRejection),
}

/// Why a send was refused before any state changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SendRejection {
    #[error("message is empty")]
    EmptyMessage,
    #[error("a reply is already pending")]
    ReplyPending,
    #[error("no alert selected")]
    NoSelection,
    #[error("alert detail is not loaded yet")]
    DetailNotLoaded,
    #[error("engine is unmounted")]
    Unmounted,
}

struct EngineInner {
    api: Arc<dyn AlertApi>,
    state: watch::Sender<SyncState>,
    shutdown: CancellationToken,
    backoff: BackoffConfig,
    error_clear_after: Option<Duration>,
    connection: Mutex<Option<ConnectionManager>>,
}

/// Handle to one sync engine. Clones share state.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("state", &*self.inner.state.borrow())
            .field("unmounted", &self.inner.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl SyncEngine {
    #[must_use]
    pub fn new(api: Arc<dyn AlertApi>, config: &SyncConfig) -> Self {
        let (state, _) = watch::channel(SyncState::default());
        Self {
            inner: Arc::new(EngineInner {
                api,
                state,
                shutdown: CancellationToken::new(),
                backoff: config.backoff,
                error_clear_after: config.error_clear_after,
                connection: Mutex::new(None),
            }),
        }
    }

    /// Receiver that observes every published snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.inner.state.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> SyncState {
        self.inner.state.borrow().clone()
    }

    #[must_use]
    pub fn is_unmounted(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Apply `mutate` and notify subscribers. Returns `None` once unmounted.
    fn update<R>(&self, mutate: impl FnOnce(&mut SyncState) -> R) -> Option<R> {
        if self.is_unmounted() {
            return None;
        }
        let mut out = None;
        self.inner.state.send_modify(|state| out = Some(mutate(state)));
        out
    }

    fn connection(&self) -> MutexGuard<'_, Option<ConnectionManager>> {
        self.inner.connection.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // ERROR SURFACE
    // =========================================================================

    /// Show `message`, replacing any current error. With an auto-clear delay
    /// configured, only this message is cleared when the delay expires.
    ///
    /// # Panics
    ///
    /// With an auto-clear delay configured, the clear is a spawned task, so
    /// this must be called inside a tokio runtime.
    pub fn raise_error(&self, message: impl Into<String>) {
        let message = message.into();
        warn!(%message, "raising error");
        let Some(revision) = self.update(|state| state.error.raise(message)) else {
            return;
        };
        let Some(after) = self.inner.error_clear_after else {
            return;
        };
        let engine = Arc::downgrade(&self.inner);
        let shutdown = self.inner.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = shutdown.cancelled() => return,
                () = tokio::time::sleep(after) => {}
            }
            if let Some(inner) = engine.upgrade() {
                SyncEngine { inner }.update(|state| state.error.clear_if(revision));
            }
        });
    }

    pub fn clear_error(&self) {
        self.update(|state| state.error.clear());
    }

    // =========================================================================
    // ALERT STORE
    // =========================================================================

    /// Replace the alert list with the server's. On failure the list is kept.
    pub async fn fetch_alerts(&self) {
        if self.update(|state| state.in_flight.begin(Request::AlertList)).is_none() {
            return;
        }
        let result = self.inner.api.list_alerts().await;
        let failed = self.update(|state| {
            state.in_flight.end(Request::AlertList);
            match result {
                Ok(alerts) => {
                    debug!(count = alerts.len(), "alert list replaced");
                    state.alerts = alerts;
                    None
                }
                Err(e) => Some(e),
            }
        });
        if let Some(Some(e)) = failed {
            warn!(error = %e, retryable = e.retryable(), "alert list fetch failed");
            self.raise_error(format!("Failed to load alerts: {e}"));
        }
    }

    /// Change the selection. `Some(id)` loads that alert's detail; `None`
    /// drops the resident detail without a request.
    pub async fn select_alert(&self, id: Option<AlertId>) {
        let selected = self.update(|state| {
            state.selected_alert_id = id;
            if state.detail.as_ref().is_some_and(|detail| Some(detail.id) != id) {
                state.detail = None;
            }
        });
        if let (Some(()), Some(id)) = (selected, id) {
            self.fetch_alert_detail(id).await;
        }
    }

    /// Load the detail of `id` and make it resident if `id` is still selected.
    ///
    /// A 404 means the alert was deleted elsewhere: the selection is dropped
    /// if it still points at `id`, and the list is reloaded exactly once.
    pub async fn fetch_alert_detail(&self, id: AlertId) {
        if self.update(|state| state.in_flight.begin(Request::AlertDetail)).is_none() {
            return;
        }
        let result = self.inner.api.get_alert(id).await;
        let failed = self.update(|state| {
            state.in_flight.end(Request::AlertDetail);
            match result {
                Ok(record) => {
                    if state.is_selected(id) {
                        let mut next = AlertDetail::from_record(id, record);
                        if let Some(previous) = &state.detail {
                            chat::carry_transient(previous, &mut next);
                        }
                        state.detail = Some(next);
                    } else {
                        debug!(alert_id = id, "discarding detail for deselected alert");
                    }
                    None
                }
                Err(e) => {
                    if state.is_selected(id) {
                        state.clear_selection();
                    }
                    Some(e)
                }
            }
        });

        match failed {
            Some(Some(e)) if e.is_not_found() => {
                info!(alert_id = id, "alert no longer exists; reloading list");
                self.fetch_alerts().await;
            }
            Some(Some(e)) => {
                warn!(alert_id = id, error = %e, retryable = e.retryable(), "alert detail fetch failed");
                self.raise_error(format!("Failed to load alert {id}: {e}"));
            }
            _ => {}
        }
    }

    /// Delete `id` on the server, then locally. A 404 counts as already deleted.
    pub async fn delete_alert(&self, id: AlertId) {
        if self.update(|state| state.in_flight.begin(Request::Delete)).is_none() {
            return;
        }
        let result = self.inner.api.delete_alert(id).await;
        self.update(|state| state.in_flight.end(Request::Delete));
        match result {
            Err(e) if !e.is_not_found() => {
                warn!(alert_id = id, error = %e, retryable = e.retryable(), "alert delete failed");
                self.raise_error(format!("Failed to delete alert {id}: {e}"));
            }
            _ => {
                info!(alert_id = id, "alert deleted");
                self.remove_alert_locally(id);
            }
        }
    }

    /// Drop `id` from the list and, if it is selected, the selection.
    pub fn remove_alert_locally(&self, id: AlertId) {
        self.update(|state| {
            remove_summary(&mut state.alerts, id);
            if state.is_selected(id) {
                state.clear_selection();
            }
        });
    }

    // =========================================================================
    // CHAT
    // =========================================================================

    /// Send `text` as a user message on the selected alert.
    pub async fn send_message(&self, text: &str) -> SendOutcome {
        let Some(text) = chat::arm(text) else {
            return SendOutcome::Rejected(SendRejection::EmptyMessage);
        };
        if self.is_unmounted() {
            return SendOutcome::Rejected(SendRejection::Unmounted);
        }

        let now = timestamp();
        let mut armed = Err(SendRejection::NoSelection);
        self.inner.state.send_if_modified(|state| {
            armed = insert_send(state, text, &now);
            armed.is_ok()
        });
        let send = match armed {
            Ok(send) => send,
            Err(rejection) => {
                debug!(%rejection, "send rejected");
                return SendOutcome::Rejected(rejection);
            }
        };

        match self.inner.api.send_chat(send.alert_id, text).await {
            Ok(reply) => {
                let message_id = reply.message_id;
                let now = timestamp();
                let applied = self.update(|state| {
                    state.in_flight.end(Request::Send);
                    state
                        .detail
                        .as_mut()
                        .is_some_and(|detail| chat::confirm(detail, &send, reply, &now))
                });
                if applied == Some(false) {
                    debug!(alert_id = send.alert_id, "reply arrived after detail changed");
                }
                SendOutcome::Confirmed { message_id }
            }
            Err(e) => {
                self.update(|state| {
                    state.in_flight.end(Request::Send);
                    if let Some(detail) = state.detail.as_mut() {
                        chat::rollback(detail, &send);
                    }
                });
                warn!(alert_id = send.alert_id, error = %e, retryable = e.retryable(), "chat send failed");
                self.raise_error(format!("Failed to send message: {e}"));
                SendOutcome::RolledBack
            }
        }
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Open the push stream from `source` and load the alert list. A second
    /// mount replaces the first connection.
    pub async fn mount(&self, source: Arc<dyn EventSource>) {
        if self.is_unmounted() {
            return;
        }
        let (sink, events) = mpsc::unbounded_channel();
        let mut manager = ConnectionManager::new(source, self.inner.backoff);
        manager.open(sink);
        let previous = self.connection().replace(manager);
        drop(previous);
        tokio::spawn(pump_events(
            Arc::downgrade(&self.inner),
            events,
            self.inner.shutdown.clone(),
        ));
        info!("engine mounted");
        self.fetch_alerts().await;
    }

    /// Close the push stream, cancel any scheduled reconnect, and freeze state.
    pub fn unmount(&self) {
        self.inner.shutdown.cancel();
        let manager = self.connection().take();
        drop(manager);
        self.inner.state.send_modify(|state| {
            state.connection = ConnectionStatus::Disconnected;
            state.reconnect_delay = None;
        });
        info!("engine unmounted");
    }

    /// Reload everything the push stream may have invalidated while down.
    async fn resync(&self) {
        let selected = self.snapshot().selected_alert_id;
        match selected {
            Some(id) => {
                tokio::join!(self.fetch_alerts(), self.fetch_alert_detail(id));
            }
            None => self.fetch_alerts().await,
        }
    }
}

fn insert_send(state: &mut SyncState, text: &str, now: &str) -> Result<PendingSend, SendRejection> {
    let selected = state.selected_alert_id.ok_or(SendRejection::NoSelection)?;
    let detail = state
        .detail
        .as_mut()
        .filter(|detail| detail.id == selected)
        .ok_or(SendRejection::DetailNotLoaded)?;
    if detail.has_pending_reply() {
        return Err(SendRejection::ReplyPending);
    }
    let send = chat::insert_optimistic(detail, text, now);
    state.in_flight.begin(Request::Send);
    Ok(send)
}

fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

// =============================================================================
// EVENT PUMP
// =============================================================================

async fn pump_events(
    engine: Weak<EngineInner>,
    mut events: mpsc::UnboundedReceiver<ConnectionEvent>,
    shutdown: CancellationToken,
) {
    let mut connected_before = false;
    loop {
        let event = tokio::select! {
            () = shutdown.cancelled() => return,
            event = events.recv() => match event {
                Some(event) => event,
                None => return,
            },
        };
        let Some(inner) = engine.upgrade() else {
            return;
        };
        let engine = SyncEngine { inner };

        match event {
            ConnectionEvent::Status(status) => {
                engine.update(|state| {
                    state.connection = status;
                    if status == ConnectionStatus::Connected {
                        state.reconnect_delay = None;
                    }
                });
                if status == ConnectionStatus::Connected {
                    if connected_before {
                        info!("push stream restored; resyncing");
                        tokio::spawn(async move { engine.resync().await });
                    }
                    connected_before = true;
                }
            }
            ConnectionEvent::ReconnectScheduled(delay) => {
                engine.update(|state| state.reconnect_delay = Some(delay));
            }
            ConnectionEvent::Frame(frame) => {
                tokio::spawn(async move { dispatch::dispatch_frame(&engine, &frame).await });
            }
        }
    }
}
