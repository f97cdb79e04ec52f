//! Events surfaced to the embedding application
//!
//! The clinic UI consumes these to render call progress and, per the error
//! design, to tell "can't reach camera" apart from "can't reach the other
//! participant" apart from "the call link has expired".

use telecare_media_bridge::{ConnectionState, MediaStreamHandle};

use crate::types::CallState;

/// Why a call reached `Ended`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    /// Explicit local hangup
    Hangup,
    /// The user refused camera/microphone permission
    MediaAccessDenied,
    /// The relay could not be reached after bounded retries
    SignalingUnavailable,
    /// The session link is unknown or expired
    LinkExpired,
    /// The peer connection failed and bounded reconnection was exhausted
    PeerUnreachable,
    /// The media layer reported an unrecoverable failure
    MediaFailed,
}

/// Notifications emitted by the orchestrator over its event channel
#[derive(Debug, Clone)]
pub enum CallEvent {
    /// Call-level state transition
    StateChanged { from: CallState, to: CallState },
    /// Raw connection-state transition from the media layer
    ConnectionStateChanged(ConnectionState),
    /// The remote participant's stream became available for rendering
    RemoteStreamAdded(MediaStreamHandle),
    /// The shared screen surface was closed; video reverted to camera
    ScreenShareEnded,
    /// A reconnection attempt is being made
    Reconnecting { attempt: u32, max_attempts: u32 },
    /// The call ended, with its terminal cause
    Ended { reason: EndReason },
    /// A non-fatal error the UI may want to surface
    Error { detail: String },
}
