//! Plain state published by the sync engine.
//!
//! DESIGN
//! ======
//! State is split by concern (`alerts` for the list and the resident detail,
//! `chat` for the optimistic transcript edits, `notice` for the error slot,
//! `sync` for the aggregate snapshot) so each piece can be tested as plain
//! data without a runtime or a network.

pub mod alerts;
pub mod chat;
pub mod notice;
pub mod sync;

pub use alerts::{AlertDetail, ChatMessage, MessageId};
pub use notice::ErrorSurface;
pub use sync::{ConnectionStatus, InFlight, Request, SyncState};
