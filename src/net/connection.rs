//! Push-stream connection lifecycle.
//!
//! The `ConnectionManager` owns at most one live stream task. The task opens
//! the stream, forwards raw frames, and reconnects after a loss with a
//! running backoff. Everything it observes is reported to the owner over one
//! channel of [`ConnectionEvent`]s; it never touches engine state itself.
//!
//! BACKOFF
//! =======
//! The delay is a running multiply-and-clamp, not an exponential series from
//! a fixed base: each scheduled reconnect uses the current delay and then
//! grows it to `min(ceiling, delay * multiplier)`. A successful open resets
//! it to the floor. With the defaults a burst of failures waits 1000, 1500,
//! 2250, 3375, 5000, 5000, ... ms. There is no retry limit.

#[cfg(test)]
#[path = "connection_test.rs"]
mod connection_test;

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::stream::EventSource;
use crate::config::BackoffConfig;
use crate::state::ConnectionStatus;

/// What the connection task reports to its owner, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionEvent {
    Status(ConnectionStatus),
    /// A reconnect will be attempted after this delay.
    ReconnectScheduled(Duration),
    /// Raw `data` of one stream event.
    Frame(String),
}

// =============================================================================
// BACKOFF
// =============================================================================

/// Running reconnect delay.
#[derive(Clone, Debug)]
pub struct Backoff {
    config: BackoffConfig,
    current: Duration,
}

impl Backoff {
    #[must_use]
    pub fn new(config: BackoffConfig) -> Self {
        Self { config, current: config.floor.min(config.ceiling) }
    }

    /// Delay for the reconnect being scheduled now; advances the running delay.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        let grown = self.current.as_secs_f64() * self.config.multiplier;
        self.current = Duration::try_from_secs_f64(grown).map_or(self.config.ceiling, |d| d.min(self.config.ceiling));
        delay
    }

    /// Back to the floor after a successful open.
    pub fn reset(&mut self) {
        self.current = self.config.floor.min(self.config.ceiling);
    }

    #[must_use]
    pub fn current(&self) -> Duration {
        self.current
    }
}

// =============================================================================
// MANAGER
// =============================================================================

/// Handle to a running connection task. Closing (or dropping) it cancels
/// the stream read and any scheduled reconnect.
#[derive(Debug)]
pub struct ConnectionHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ConnectionHandle {
    pub fn close(self) {
        drop(self);
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.task.abort();
    }
}

/// Owns the single push-stream connection.
pub struct ConnectionManager {
    source: Arc<dyn EventSource>,
    backoff: BackoffConfig,
    live: Option<ConnectionHandle>,
}

impl ConnectionManager {
    #[must_use]
    pub fn new(source: Arc<dyn EventSource>, backoff: BackoffConfig) -> Self {
        Self { source, backoff, live: None }
    }

    /// Start a connection task that reports into `sink`. Any existing
    /// connection is closed first. Must be called inside a tokio runtime.
    pub fn open(&mut self, sink: mpsc::UnboundedSender<ConnectionEvent>) {
        self.close();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_connection(
            Arc::clone(&self.source),
            Backoff::new(self.backoff),
            sink,
            cancel.clone(),
        ));
        self.live = Some(ConnectionHandle { cancel, task });
    }

    /// Tear down the live connection, if any, and cancel its pending reconnect.
    pub fn close(&mut self) {
        if let Some(handle) = self.live.take() {
            debug!("closing push stream");
            handle.close();
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.live.as_ref().is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.close();
    }
}

// =============================================================================
// CONNECTION TASK
// =============================================================================

async fn run_connection(
    source: Arc<dyn EventSource>,
    mut backoff: Backoff,
    sink: mpsc::UnboundedSender<ConnectionEvent>,
    cancel: CancellationToken,
) {
    loop {
        if !emit(&sink, ConnectionEvent::Status(ConnectionStatus::Connecting)) {
            return;
        }

        let connected = tokio::select! {
            () = cancel.cancelled() => return,
            result = source.connect() => result,
        };

        match connected {
            Ok(mut stream) => {
                backoff.reset();
                info!("push stream connected");
                if !emit(&sink, ConnectionEvent::Status(ConnectionStatus::Connected)) {
                    return;
                }
                loop {
                    let next = tokio::select! {
                        () = cancel.cancelled() => return,
                        next = stream.next() => next,
                    };
                    match next {
                        Some(Ok(frame)) => {
                            if !emit(&sink, ConnectionEvent::Frame(frame)) {
                                return;
                            }
                        }
                        Some(Err(e)) => {
                            warn!(error = %e, "push stream failed");
                            break;
                        }
                        None => {
                            info!("push stream closed by server");
                            break;
                        }
                    }
                }
            }
            Err(e) => warn!(error = %e, "push stream connect failed"),
        }

        if !emit(&sink, ConnectionEvent::Status(ConnectionStatus::Disconnected)) {
            return;
        }
        let delay = backoff.next_delay();
        debug!(delay_ms = delay.as_millis(), "push stream reconnect scheduled");
        if !emit(&sink, ConnectionEvent::ReconnectScheduled(delay)) {
            return;
        }

        tokio::select! {
            () = cancel.cancelled() => return,
            () = tokio::time::sleep(delay) => {}
        }
    }
}

/// Returns `false` once the owner has stopped listening.
fn emit(sink: &mpsc::UnboundedSender<ConnectionEvent>, event: ConnectionEvent) -> bool {
    sink.send(event).is_ok()
}
