//! Call orchestration for telemedicine sessions
//!
//! Sits on top of the signaling transport and the media layer and drives one
//! call from join link to teardown: offer/answer exchange, trickled
//! candidates, bounded reconnection after a dropped link, and an idempotent
//! hangup that always stops polling and releases capture devices together.
//!
//! # Roles
//!
//! Exactly one participant (by convention the clinician) is the
//! [`CallRole::Initiator`] and creates every offer, including restart offers
//! during reconnection. The responder only ever answers, so simultaneous
//! offers cannot occur.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use chrono::{Duration, Utc};
//! use telecare_call_core::{CallConfig, CallOrchestrator, CallRole};
//! use telecare_media_bridge::{SimulatedMediaConfig, SimulatedMediaTransport};
//! use telecare_signal_relay::{ParticipantId, Session, SessionId, SignalingMailbox};
//! use telecare_signal_transport::{InMemoryRelay, SignalingTransport};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mailbox = SignalingMailbox::new(Default::default());
//! let session_id = SessionId::new();
//! mailbox.create_session(Session::new(
//!     session_id.clone(),
//!     ParticipantId::new("dr-lee"),
//!     ParticipantId::new("patient-7"),
//!     Utc::now(),
//!     Utc::now() + Duration::minutes(30),
//! ))?;
//!
//! let transport = SignalingTransport::new(
//!     Arc::new(InMemoryRelay::new(mailbox)),
//!     session_id,
//!     ParticipantId::new("dr-lee"),
//!     ParticipantId::new("patient-7"),
//! );
//! let media = Arc::new(SimulatedMediaTransport::new(SimulatedMediaConfig::default()));
//! let (call, mut events) =
//!     CallOrchestrator::new(transport, media, CallRole::Initiator, CallConfig::default());
//! call.start_call().await?;
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod events;
mod orchestrator;
mod types;

pub use error::{CallError, CallResult};
pub use events::{CallEvent, EndReason};
pub use orchestrator::CallOrchestrator;
pub use types::{CallConfig, CallRole, CallState, CallStats, ReconnectPolicy};
