//! # telecare-media-bridge
//!
//! Abstraction over the local media negotiation primitive for telemedicine
//! calls: capture devices, offer/answer production, candidate handling and
//! track control, behind the swappable [`MediaTransport`] trait. The call
//! orchestrator drives this interface without knowing whether frames come
//! from a real browser media stack or from [`SimulatedMediaTransport`].

pub mod controller;
pub mod error;
pub mod simulated;
pub mod types;

pub use controller::{MediaEvent, MediaTransport};
pub use error::{MediaError, MediaResult};
pub use simulated::{SimulatedMediaConfig, SimulatedMediaTransport};
pub use types::{
    ConnectionState, DescriptionKind, IceCandidate, MediaConstraints, MediaStreamHandle,
    MediaTrack, SessionDescription, TrackKind, TrackSource,
};
