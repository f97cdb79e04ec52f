//! # telecare-signal-relay
//!
//! The signaling mailbox for telemedicine call establishment: a durable,
//! per-session store of addressed messages that relays offers, answers and
//! ICE candidates between two participants who are never connected to the
//! same request.
//!
//! The mailbox guarantees per-recipient FIFO delivery, exactly-once
//! consumption under racing drains, and strict addressing (a message is only
//! ever delivered to its `to` participant). Sessions move monotonically
//! through `Scheduled → Active → Ended` (or `Scheduled → Expired` when
//! nobody joins) and are purged with their messages after a retention
//! window.
//!
//! The crate exposes the store directly ([`SignalingMailbox`]) for
//! in-process use, and an axum HTTP surface ([`api`]) for browser clients
//! polling over the network.

pub mod api;
pub mod config;
pub mod error;
pub mod mailbox;
pub mod sweeper;
pub mod types;

pub use config::RelayConfig;
pub use error::{RelayError, RelayResult};
pub use mailbox::{MailboxConfig, SignalingMailbox, SweepReport};
pub use sweeper::RetentionSweeper;
pub use types::{
    join_url, MessageDraft, MessageId, ParticipantId, Session, SessionId, SessionStatus,
    SignalKind, SignalingMessage,
};
