//! Data model for the signaling relay
//!
//! Everything that crosses the relay wire lives here: sessions, participant
//! identifiers and the signaling message envelope. Payloads are opaque to the
//! relay; it stores and routes, it never interprets SDP or candidates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque identifier for one call attempt.
///
/// Session ids are minted by the appointment service when a telemedicine
/// visit is booked; the relay treats them as tokens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generate a fresh random session id
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Stable identifier for one call participant.
///
/// Callers hand identifiers to the relay in whatever representation they
/// have on hand (raw id string, display form with stray whitespace, numeric
/// id rendered to text). Routing a message to the wrong participant stalls a
/// call with no error anywhere, so every identifier is normalized exactly
/// once, at construction, and all comparisons use the normalized form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Build a normalized participant id (trimmed, stringified)
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ParticipantId {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<ParticipantId> for String {
    fn from(id: ParticipantId) -> Self {
        id.0
    }
}

/// Lifecycle status of a session.
///
/// Transitions are monotonic: `Scheduled → Active → Ended`, or
/// `Scheduled → Expired` when nobody ever joined. There are no backward
/// transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Booked, waiting for the first participant
    Scheduled,
    /// At least one negotiated connection succeeded
    Active,
    /// Explicit hangup or inactivity timeout
    Ended,
    /// The scheduled window passed with no join
    Expired,
}

impl SessionStatus {
    /// Whether `next` is a legal transition from this status
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (self, next),
            (Scheduled, Active) | (Scheduled, Expired) | (Active, Ended) | (Scheduled, Ended)
        )
    }

    /// Ended and Expired sessions accept no further traffic
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Ended | SessionStatus::Expired)
    }
}

/// One scheduled call attempt between two participants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: SessionId,
    pub participant_a: ParticipantId,
    pub participant_b: ParticipantId,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: DateTime<Utc>,
    pub status: SessionStatus,
    /// Set when the session reached Ended or Expired; drives retention
    pub closed_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Create a Scheduled session for the given participants and window
    pub fn new(
        session_id: SessionId,
        participant_a: ParticipantId,
        participant_b: ParticipantId,
        scheduled_start: DateTime<Utc>,
        scheduled_end: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id,
            participant_a,
            participant_b,
            scheduled_start,
            scheduled_end,
            status: SessionStatus::Scheduled,
            closed_at: None,
        }
    }

    /// Whether the given participant belongs to this session
    pub fn has_participant(&self, participant: &ParticipantId) -> bool {
        &self.participant_a == participant || &self.participant_b == participant
    }

    /// The other participant of the session, if `participant` is a member
    pub fn peer_of(&self, participant: &ParticipantId) -> Option<&ParticipantId> {
        if &self.participant_a == participant {
            Some(&self.participant_b)
        } else if &self.participant_b == participant {
            Some(&self.participant_a)
        } else {
            None
        }
    }
}

/// Kind of signaling artifact being relayed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalKind::Offer => write!(f, "offer"),
            SignalKind::Answer => write!(f, "answer"),
            SignalKind::IceCandidate => write!(f, "ice-candidate"),
        }
    }
}

/// Unique identifier of a relayed message
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a sender hands to the relay: everything except the fields the relay
/// stamps itself (id, timestamps, sequence).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDraft {
    #[serde(rename = "type")]
    pub kind: SignalKind,
    /// Opaque negotiation blob: an SDP document for offer/answer, a
    /// candidate descriptor for ice-candidate
    pub payload: serde_json::Value,
    pub from: ParticipantId,
    pub to: ParticipantId,
}

/// One relayed negotiation artifact, immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalingMessage {
    pub id: MessageId,
    pub session_id: SessionId,
    #[serde(rename = "type")]
    pub kind: SignalKind,
    pub payload: serde_json::Value,
    pub from: ParticipantId,
    pub to: ParticipantId,
    pub created_at: DateTime<Utc>,
    /// Set exactly once, by the drain call that claimed the message
    pub consumed_at: Option<DateTime<Utc>>,
}

/// Shape of the join link handed to the notification collaborator.
///
/// The relay only owns the URL shape; delivering it to the patient is the
/// email service's job.
pub fn join_url(base_url: &str, session_id: &SessionId) -> String {
    format!("{}/telemedicine/{}", base_url.trim_end_matches('/'), session_id)
}
