//! Scripted collaborators for engine, dispatcher and connection tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;
use tokio::sync::{mpsc, oneshot};

use crate::config::SyncConfig;
use crate::engine::SyncEngine;
use crate::error::SyncError;
use crate::net::api::AlertApi;
use crate::net::stream::{EventSource, FrameStream};
use crate::net::types::{AlertDetailRecord, AlertId, AlertSummary, ChatReply};

pub(crate) fn summary(id: AlertId) -> AlertSummary {
    AlertSummary {
        id,
        created_at: format!("2025-01-15T10:3{id}:00Z"),
        details_kind: Some("hijack".into()),
        prefix: Some(format!("192.0.2.{id}/32")),
    }
}

pub(crate) fn detail_record(messages: serde_json::Value) -> AlertDetailRecord {
    serde_json::from_value(serde_json::json!({
        "alert": { "details": { "prefix": "192.0.2.0/24", "asn": "64500" } },
        "created_at": "2025-01-15T10:30:00Z",
        "initial_response": "Origin AS changed.",
        "chat_messages": messages
    }))
    .unwrap()
}

/// Yield to spawned tasks until `condition` holds.
pub(crate) async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

// =============================================================================
// FAKE API
// =============================================================================

#[derive(Clone, Copy, Debug)]
pub(crate) enum Failure {
    NotFound,
    Unavailable,
}

impl Failure {
    fn into_error(self) -> SyncError {
        match self {
            Self::NotFound => SyncError::NotFound,
            Self::Unavailable => SyncError::Status { status: 503, body: "unavailable".into() },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Call {
    ListAlerts,
    GetAlert(AlertId),
    DeleteAlert(AlertId),
    SendChat(AlertId, String),
}

/// In-memory server. Detail and chat requests can be held open with gates.
#[derive(Default)]
pub(crate) struct FakeApi {
    alerts: Mutex<Vec<AlertSummary>>,
    list_failure: Mutex<Option<Failure>>,
    details: Mutex<HashMap<AlertId, AlertDetailRecord>>,
    detail_failures: Mutex<HashMap<AlertId, Failure>>,
    delete_failure: Mutex<Option<Failure>>,
    chat_replies: Mutex<VecDeque<Result<ChatReply, Failure>>>,
    detail_gates: Mutex<HashMap<AlertId, oneshot::Receiver<()>>>,
    chat_gate: Mutex<Option<oneshot::Receiver<()>>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeApi {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn set_alerts(&self, ids: &[AlertId]) {
        *self.alerts.lock().unwrap() = ids.iter().copied().map(summary).collect();
    }

    pub(crate) fn set_detail(&self, id: AlertId, messages: serde_json::Value) {
        self.details.lock().unwrap().insert(id, detail_record(messages));
    }

    pub(crate) fn fail_list(&self, failure: Option<Failure>) {
        *self.list_failure.lock().unwrap() = failure;
    }

    pub(crate) fn fail_detail(&self, id: AlertId, failure: Failure) {
        self.detail_failures.lock().unwrap().insert(id, failure);
    }

    pub(crate) fn fail_delete(&self, failure: Option<Failure>) {
        *self.delete_failure.lock().unwrap() = failure;
    }

    pub(crate) fn push_chat_reply(&self, reply: Result<ChatReply, Failure>) {
        self.chat_replies.lock().unwrap().push_back(reply);
    }

    /// Hold the next detail request for `id` until the returned sender fires.
    pub(crate) fn gate_detail(&self, id: AlertId) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.detail_gates.lock().unwrap().insert(id, rx);
        tx
    }

    /// Hold the next chat request until the returned sender fires.
    pub(crate) fn gate_chat(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.chat_gate.lock().unwrap() = Some(rx);
        tx
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, call: &Call) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == call).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl AlertApi for FakeApi {
    async fn list_alerts(&self) -> Result<Vec<AlertSummary>, SyncError> {
        self.record(Call::ListAlerts);
        if let Some(failure) = *self.list_failure.lock().unwrap() {
            return Err(failure.into_error());
        }
        Ok(self.alerts.lock().unwrap().clone())
    }

    async fn get_alert(&self, id: AlertId) -> Result<AlertDetailRecord, SyncError> {
        self.record(Call::GetAlert(id));
        let gate = self.detail_gates.lock().unwrap().remove(&id);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        if let Some(failure) = self.detail_failures.lock().unwrap().get(&id).copied() {
            return Err(failure.into_error());
        }
        self.details
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(SyncError::NotFound)
    }

    async fn delete_alert(&self, id: AlertId) -> Result<(), SyncError> {
        self.record(Call::DeleteAlert(id));
        if let Some(failure) = *self.delete_failure.lock().unwrap() {
            return Err(failure.into_error());
        }
        self.alerts.lock().unwrap().retain(|a| a.id != id);
        self.details.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn send_chat(&self, id: AlertId, message: &str) -> Result<ChatReply, SyncError> {
        self.record(Call::SendChat(id, message.to_owned()));
        let gate = self.chat_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        let next = self.chat_replies.lock().unwrap().pop_front();
        match next {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(failure)) => Err(failure.into_error()),
            None => Err(Failure::Unavailable.into_error()),
        }
    }
}

pub(crate) fn engine_over(api: &Arc<FakeApi>) -> SyncEngine {
    let api: Arc<dyn AlertApi> = api.clone();
    SyncEngine::new(api, &SyncConfig::default())
}

// =============================================================================
// FAKE EVENT SOURCE
// =============================================================================

/// Outcome of one `connect` call.
pub(crate) enum Script {
    /// Connect fails.
    Fail,
    /// Connect succeeds, yields the frames, then the server closes the stream.
    Frames(Vec<String>),
    /// Connect succeeds, yields the frames, then a read error.
    Broken(Vec<String>),
    /// Connect succeeds, yields the frames, then stays open.
    Hold(Vec<String>),
    /// Connect succeeds and relays frames sent into the channel.
    Live(mpsc::UnboundedReceiver<String>),
}

/// Replays scripts in order; fails every connect once they run out.
pub(crate) struct FakeSource {
    scripts: Mutex<VecDeque<Script>>,
    connects: AtomicUsize,
}

impl FakeSource {
    pub(crate) fn new(scripts: Vec<Script>) -> Arc<Self> {
        Arc::new(Self { scripts: Mutex::new(scripts.into()), connects: AtomicUsize::new(0) })
    }

    pub(crate) fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventSource for FakeSource {
    async fn connect(&self) -> Result<FrameStream, SyncError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.lock().unwrap().pop_front().unwrap_or(Script::Fail);
        match script {
            Script::Fail => Err(SyncError::Stream("connection refused".into())),
            Script::Frames(frames) => Ok(stream::iter(frames.into_iter().map(Ok)).boxed()),
            Script::Broken(frames) => Ok(stream::iter(frames.into_iter().map(Ok))
                .chain(stream::once(async { Err(SyncError::Stream("connection reset".into())) }))
                .boxed()),
            Script::Hold(frames) => Ok(stream::iter(frames.into_iter().map(Ok))
                .chain(stream::pending())
                .boxed()),
            Script::Live(rx) => Ok(stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|frame| (Ok(frame), rx))
            })
            .boxed()),
        }
    }
}
