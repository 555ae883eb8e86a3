//! Aggregate snapshot published by the engine.
//!
//! SYSTEM CONTEXT
//! ==============
//! The engine owns one `SyncState` behind a `tokio::sync::watch` channel.
//! Front-ends subscribe and render whatever snapshot they last saw; they
//! never mutate it directly.

#[cfg(test)]
#[path = "sync_test.rs"]
mod sync_test;

use std::time::Duration;

use crate::net::types::{AlertId, AlertSummary};
use crate::state::alerts::AlertDetail;
use crate::state::notice::ErrorSurface;

/// Push-stream connection status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// No stream; either never opened, torn down, or waiting to reconnect.
    #[default]
    Disconnected,
    /// Stream request is in flight.
    Connecting,
    /// Stream is open and delivering events.
    Connected,
}

/// Request kinds counted by [`InFlight`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Request {
    AlertList,
    AlertDetail,
    Delete,
    Send,
}

/// Number of requests in flight per operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InFlight {
    pub alert_list: u32,
    pub alert_detail: u32,
    pub delete: u32,
    pub send: u32,
}

impl InFlight {
    pub fn begin(&mut self, request: Request) {
        *self.slot(request) += 1;
    }

    pub fn end(&mut self, request: Request) {
        let slot = self.slot(request);
        *slot = slot.saturating_sub(1);
    }

    fn slot(&mut self, request: Request) -> &mut u32 {
        match request {
            Request::AlertList => &mut self.alert_list,
            Request::AlertDetail => &mut self.alert_detail,
            Request::Delete => &mut self.delete,
            Request::Send => &mut self.send,
        }
    }

    #[must_use]
    pub fn loading_alerts(&self) -> bool {
        self.alert_list > 0
    }

    #[must_use]
    pub fn loading_detail(&self) -> bool {
        self.alert_detail > 0
    }

    #[must_use]
    pub fn deleting(&self) -> bool {
        self.delete > 0
    }

    #[must_use]
    pub fn sending(&self) -> bool {
        self.send > 0
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        *self == Self::default()
    }
}

/// Everything the engine exposes to its front-end.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SyncState {
    /// Alert summaries in server order.
    pub alerts: Vec<AlertSummary>,
    pub selected_alert_id: Option<AlertId>,
    /// Resident detail; only ever the selected alert's.
    pub detail: Option<AlertDetail>,
    pub connection: ConnectionStatus,
    /// Delay of the most recently scheduled reconnect, cleared once connected.
    pub reconnect_delay: Option<Duration>,
    pub in_flight: InFlight,
    pub error: ErrorSurface,
}

impl SyncState {
    /// Drop the selection together with the resident detail.
    pub fn clear_selection(&mut self) {
        self.selected_alert_id = None;
        self.detail = None;
    }

    /// Whether `id` is the current selection.
    #[must_use]
    pub fn is_selected(&self, id: AlertId) -> bool {
        self.selected_alert_id == Some(id)
    }
}
