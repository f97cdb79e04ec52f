//! # telecare-signal-transport
//!
//! Client-side bridge between the signaling mailbox and a call
//! orchestrator. Since no participant can receive server-initiated pushes,
//! this crate implements the polling side of the protocol: bounded-backoff
//! sends, a non-overlapping drain loop, and strict "is this message mine"
//! routing on normalized participant identifiers.

pub mod error;
pub mod relay_api;
pub mod retry;
pub mod transport;

pub use error::{TransportError, TransportResult};
pub use relay_api::{HttpRelayClient, InMemoryRelay, RelayApi};
pub use retry::{retry_with_backoff, RetryConfig};
pub use transport::SignalingTransport;
