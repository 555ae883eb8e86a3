//! # alert-sync
//!
//! Client-side synchronization engine for the alert-analysis service.
//!
//! Keeps a local projection of the alert list and the selected alert's chat
//! transcript consistent with the server across two channels: REST fetches
//! (the source of truth for content) and a server-sent event stream (a
//! low-latency invalidation signal). Chat sends are applied optimistically
//! and confirmed or rolled back when the request settles.
//!
//! `engine` is the entry point; `net` holds the transports and the push
//! connection lifecycle; `state` holds the plain data the engine publishes.

pub mod config;
pub mod engine;
pub mod error;
pub mod net;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::SyncConfig;
pub use engine::{SendOutcome, SendRejection, SyncEngine};
pub use error::SyncError;
