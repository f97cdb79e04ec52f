//! The signaling mailbox: durable per-session store of addressed messages
//!
//! The mailbox is the only shared state between the two participants of a
//! call; they are never connected to the same request. It is multi-writer by
//! construction (both participants push and drain concurrently), so all the
//! concurrency control of the relay lives here.
//!
//! Delivery contract:
//! - per-recipient FIFO: messages addressed to a participant come back in
//!   creation order;
//! - exactly-once: a message id is returned by at most one drain call, even
//!   when two drains from the same participant race (retried polls);
//! - no leakage: a message is only ever returned to its `to` participant,
//!   compared on normalized identifiers.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{RelayError, RelayResult};
use crate::types::{
    MessageDraft, MessageId, ParticipantId, Session, SessionId, SessionStatus, SignalingMessage,
};

/// Mailbox retention and expiry configuration
#[derive(Debug, Clone)]
pub struct MailboxConfig {
    /// How long Ended/Expired sessions (and their messages) are kept before
    /// the sweep purges them
    pub retention: Duration,
    /// Grace period past `scheduled_end` before a never-joined session is
    /// marked Expired
    pub expiry_grace: Duration,
    /// How long past `scheduled_end` an Active session may keep running
    /// before the sweep force-ends it. Covers both participants crashing
    /// without a hangup; a clean `end_session` normally arrives first.
    pub inactivity_timeout: Duration,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            retention: Duration::minutes(30),
            expiry_grace: Duration::minutes(5),
            inactivity_timeout: Duration::minutes(30),
        }
    }
}

/// Outcome of one sweep pass, for logging and tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Scheduled sessions moved to Expired
    pub expired: usize,
    /// Abandoned Active sessions force-moved to Ended
    pub ended: usize,
    /// Sessions (with messages) removed past the retention window
    pub purged: usize,
}

/// Everything the mailbox knows about one session, guarded as a unit.
///
/// A single mutex per session gives the atomic claim `drain` needs: the
/// winning drain stamps `consumed_at` while holding the lock, so a racing
/// drain from a retried poll observes the stamp and returns nothing.
struct SessionSlot {
    session: Session,
    messages: Vec<SignalingMessage>,
}

/// Durable relay of signaling messages between two participants.
///
/// Cheap to clone via `Arc`; the HTTP layer and the in-process client share
/// one instance.
pub struct SignalingMailbox {
    sessions: DashMap<SessionId, Arc<Mutex<SessionSlot>>>,
    config: MailboxConfig,
}

impl SignalingMailbox {
    /// Create an empty mailbox with the given retention configuration
    pub fn new(config: MailboxConfig) -> Arc<Self> {
        Arc::new(Self {
            sessions: DashMap::new(),
            config,
        })
    }

    /// Register a session created by the appointment service.
    ///
    /// Rejects duplicate ids: at most one session per call attempt.
    pub fn create_session(&self, session: Session) -> RelayResult<()> {
        let id = session.session_id.clone();
        if session.participant_a == session.participant_b {
            return Err(RelayError::invalid_input(
                "A session needs two distinct participants",
            ));
        }
        use dashmap::mapref::entry::Entry;
        match self.sessions.entry(id.clone()) {
            Entry::Occupied(_) => Err(RelayError::SessionExists {
                session_id: id.to_string(),
            }),
            Entry::Vacant(slot) => {
                info!(session_id = %id, participant_a = %session.participant_a,
                      participant_b = %session.participant_b, "Session created");
                slot.insert(Arc::new(Mutex::new(SessionSlot {
                    session,
                    messages: Vec::new(),
                })));
                Ok(())
            }
        }
    }

    /// Snapshot of a session's current metadata
    pub fn get_session(&self, session_id: &SessionId) -> RelayResult<Session> {
        let slot = self.slot(session_id)?;
        let guard = slot.lock();
        Ok(guard.session.clone())
    }

    /// Append a new, immutable message to the session.
    ///
    /// Both `from` and `to` must be members of the session; the relay stamps
    /// id and creation time. No interpretation of the payload happens here.
    pub fn push(&self, session_id: &SessionId, draft: MessageDraft) -> RelayResult<SignalingMessage> {
        let slot = self.slot(session_id)?;
        let mut guard = slot.lock();
        Self::check_open(&guard.session)?;

        for participant in [&draft.from, &draft.to] {
            if !guard.session.has_participant(participant) {
                return Err(RelayError::UnknownParticipant {
                    session_id: session_id.to_string(),
                    participant: participant.to_string(),
                });
            }
        }
        if draft.from == draft.to {
            return Err(RelayError::invalid_input("Message addressed to its sender"));
        }

        let message = SignalingMessage {
            id: MessageId::new(),
            session_id: session_id.clone(),
            kind: draft.kind,
            payload: draft.payload,
            from: draft.from,
            to: draft.to,
            created_at: Utc::now(),
            consumed_at: None,
        };
        debug!(session_id = %session_id, kind = %message.kind,
               from = %message.from, to = %message.to, id = %message.id, "Message pushed");
        guard.messages.push(message.clone());
        Ok(message)
    }

    /// Return all unconsumed messages addressed to `participant`, in creation
    /// order, atomically marking them consumed.
    ///
    /// The claim happens under the session lock, so overlapping drains from
    /// the same participant each receive a disjoint set of messages.
    pub fn drain(
        &self,
        session_id: &SessionId,
        participant: &ParticipantId,
    ) -> RelayResult<Vec<SignalingMessage>> {
        let slot = self.slot(session_id)?;
        let mut guard = slot.lock();
        Self::check_open(&guard.session)?;
        if !guard.session.has_participant(participant) {
            return Err(RelayError::UnknownParticipant {
                session_id: session_id.to_string(),
                participant: participant.to_string(),
            });
        }

        let now = Utc::now();
        let mut claimed = Vec::new();
        for message in guard.messages.iter_mut() {
            if message.consumed_at.is_none() && &message.to == participant {
                message.consumed_at = Some(now);
                claimed.push(message.clone());
            }
        }
        if !claimed.is_empty() {
            debug!(session_id = %session_id, participant = %participant,
                   count = claimed.len(), "Messages drained");
        }
        Ok(claimed)
    }

    /// Record the first successful negotiated connection.
    ///
    /// Idempotent for already-Active sessions; rejected for terminal ones.
    pub fn mark_active(&self, session_id: &SessionId) -> RelayResult<()> {
        self.transition(session_id, SessionStatus::Active)
    }

    /// Move a session to Ended on explicit hangup or inactivity timeout.
    ///
    /// Idempotent: ending an already-terminal session is a no-op.
    pub fn end_session(&self, session_id: &SessionId) -> RelayResult<()> {
        self.transition(session_id, SessionStatus::Ended)
    }

    /// One pass of the background sweep: expire never-joined sessions whose
    /// window has passed, end Active sessions abandoned past the inactivity
    /// timeout, and purge terminal sessions past retention.
    pub fn sweep(&self, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();
        let mut purge_ids = Vec::new();

        for entry in self.sessions.iter() {
            let mut guard = entry.value().lock();
            match guard.session.status {
                SessionStatus::Scheduled
                    if now > guard.session.scheduled_end + self.config.expiry_grace =>
                {
                    guard.session.status = SessionStatus::Expired;
                    guard.session.closed_at = Some(now);
                    report.expired += 1;
                    info!(session_id = %guard.session.session_id, "Session expired, never joined");
                }
                SessionStatus::Active
                    if now > guard.session.scheduled_end + self.config.inactivity_timeout =>
                {
                    // Both clients gone without a hangup; reclaim the session
                    guard.session.status = SessionStatus::Ended;
                    guard.session.closed_at = Some(now);
                    report.ended += 1;
                    info!(session_id = %guard.session.session_id,
                          "Session ended, inactive past its window");
                }
                SessionStatus::Ended | SessionStatus::Expired => {
                    let closed_at = guard.session.closed_at.unwrap_or(now);
                    if now > closed_at + self.config.retention {
                        purge_ids.push(entry.key().clone());
                    }
                }
                _ => {}
            }
        }

        for id in purge_ids {
            if self.sessions.remove(&id).is_some() {
                report.purged += 1;
                info!(session_id = %id, "Session purged past retention window");
            }
        }
        report
    }

    /// Number of sessions currently held (all statuses)
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn slot(&self, session_id: &SessionId) -> RelayResult<Arc<Mutex<SessionSlot>>> {
        self.sessions
            .get(session_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RelayError::not_found(session_id))
    }

    fn check_open(session: &Session) -> RelayResult<()> {
        if session.status.is_terminal() {
            Err(RelayError::expired(&session.session_id))
        } else {
            Ok(())
        }
    }

    fn transition(&self, session_id: &SessionId, to: SessionStatus) -> RelayResult<()> {
        let slot = self.slot(session_id)?;
        let mut guard = slot.lock();
        let from = guard.session.status;
        if from == to {
            return Ok(());
        }
        // Ending an already-closed session is an idempotent no-op; any other
        // backward move is a caller bug.
        if from.is_terminal() && to == SessionStatus::Ended {
            return Ok(());
        }
        if !from.can_transition_to(to) {
            warn!(session_id = %session_id, ?from, ?to, "Rejected session transition");
            return Err(RelayError::InvalidTransition {
                session_id: session_id.to_string(),
                from: format!("{:?}", from),
                to: format!("{:?}", to),
            });
        }
        guard.session.status = to;
        if to.is_terminal() {
            guard.session.closed_at = Some(Utc::now());
        }
        info!(session_id = %session_id, ?from, ?to, "Session transition");
        Ok(())
    }
}
