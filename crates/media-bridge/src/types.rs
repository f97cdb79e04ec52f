//! Media negotiation types
//!
//! Client-local, never persisted: connection state, session descriptions,
//! candidates and the capture/render track handles a call owns.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Negotiation progress of the underlying peer connection.
///
/// `Closed` is terminal; no transition leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionState {
    New,
    HaveLocalOffer,
    HaveRemoteOffer,
    Stable,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl ConnectionState {
    /// Whether `next` is a legal transition from this state
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        match (self, next) {
            // Closed is terminal
            (Closed, _) => false,
            // Anything may close or fail
            (_, Closed) | (_, Failed) if self != Failed => true,
            (Failed, Closed) => true,
            (New, HaveLocalOffer) | (New, HaveRemoteOffer) => true,
            (HaveLocalOffer, Stable) | (HaveRemoteOffer, Stable) => true,
            (Stable, Connecting) => true,
            (Connecting, Connected) => true,
            (Connected, Disconnected) => true,
            // Retry path and ICE-restart renegotiation
            (Disconnected, Connecting) => true,
            (Connected, HaveRemoteOffer)
            | (Disconnected, HaveRemoteOffer)
            | (Stable, HaveRemoteOffer)
            | (Connecting, HaveRemoteOffer) => true,
            (Connected, HaveLocalOffer) | (Disconnected, HaveLocalOffer) => true,
            _ => false,
        }
    }

    /// Terminal states accept no further negotiation
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionState::Closed)
    }
}

/// Whether a description is the offering or answering side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptionKind {
    Offer,
    Answer,
}

/// An SDP document exchanged as offer or answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: DescriptionKind,
    pub sdp: String,
}

impl SessionDescription {
    /// Parse a description out of a relayed payload
    pub fn from_payload(payload: &serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(payload.clone())
    }

    /// Render this description as a relay payload
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::json!({ "type": self.kind, "sdp": self.sdp })
    }
}

/// A discovered network path proposed for peer connectivity, trickled
/// incrementally during and after offer/answer exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    pub sdp_mid: Option<String>,
    pub sdp_mline_index: Option<u32>,
}

impl IceCandidate {
    /// Parse a candidate out of a relayed payload
    pub fn from_payload(payload: &serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(payload.clone())
    }

    /// Render this candidate as a relay payload
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Capture constraints for local media acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: bool,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            audio: true,
            video: true,
        }
    }
}

/// Kind of a media track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

/// Where a track's frames come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackSource {
    Microphone,
    Camera,
    Screen,
    Remote,
}

/// One capture or render track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaTrack {
    pub id: String,
    pub kind: TrackKind,
    pub source: TrackSource,
    pub enabled: bool,
}

impl MediaTrack {
    /// Create an enabled track with a fresh id
    pub fn new(kind: TrackKind, source: TrackSource) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            source,
            enabled: true,
        }
    }
}

/// A set of tracks owned by one call endpoint; never shared across sessions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaStreamHandle {
    pub id: String,
    pub tracks: Vec<MediaTrack>,
}

impl MediaStreamHandle {
    /// Create a stream from tracks, with a fresh id
    pub fn new(tracks: Vec<MediaTrack>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tracks,
        }
    }

    /// The first track of the given kind, if present
    pub fn track(&self, kind: TrackKind) -> Option<&MediaTrack> {
        self.tracks.iter().find(|t| t.kind == kind)
    }
}
