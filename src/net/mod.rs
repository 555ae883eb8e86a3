//! Networking modules for the alert HTTP API and the push stream.
//!
//! SYSTEM CONTEXT
//! ==============
//! `api` handles REST calls, `stream` opens the server-sent event stream,
//! `connection` owns the stream lifecycle and reconnect pacing, `dispatch`
//! maps decoded push events onto engine operations, and `types` defines the
//! wire schema.

pub mod api;
pub mod connection;
pub mod dispatch;
pub mod stream;
pub mod types;
