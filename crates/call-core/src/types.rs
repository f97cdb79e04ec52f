//! Call-level types and configuration

use chrono::{DateTime, Utc};
use std::time::Duration;
use telecare_media_bridge::{ConnectionState, MediaConstraints};

/// Call-level state, coarser than the media layer's [`ConnectionState`].
///
/// `Ended` is terminal. Entry to `Negotiating` requires local media; entry
/// to `Connected` requires the underlying connection to be connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Idle,
    Negotiating,
    Connected,
    Reconnecting,
    Ended,
}

impl CallState {
    /// Whether `next` is a legal transition from this state
    pub fn can_transition_to(self, next: CallState) -> bool {
        use CallState::*;
        match (self, next) {
            (Ended, _) => false,
            (_, Ended) => true,
            (Idle, Negotiating) => true,
            (Negotiating, Connected) => true,
            (Connected, Reconnecting) => true,
            (Reconnecting, Connected) => true,
            _ => false,
        }
    }
}

/// Which side of the session this participant plays.
///
/// Exactly one side of a session is designated initiator; only the initiator
/// proactively sends the first offer, the responder only answers. This fixed
/// designation is what removes offer glare (and with it rollback logic).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallRole {
    Initiator,
    Responder,
}

impl CallRole {
    pub fn is_initiator(self) -> bool {
        matches!(self, CallRole::Initiator)
    }
}

/// Bounded reconnection after a `Disconnected` report.
///
/// The defaults are deliberately conservative: three ICE-restart attempts at
/// 2s, 4s and 8s before the call is declared unreachable.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Maximum restart attempts before giving up
    pub max_attempts: u32,
    /// Delay before the first attempt
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each attempt
    pub backoff_multiplier: f64,
    /// Cap on the delay between attempts
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(2),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(15),
        }
    }
}

impl ReconnectPolicy {
    /// The delay before attempt `attempt` (1-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let mut delay = self.initial_delay;
        for _ in 1..attempt {
            let next_ms = (delay.as_millis() as f64 * self.backoff_multiplier) as u64;
            delay = Duration::from_millis(next_ms).min(self.max_delay);
        }
        delay.min(self.max_delay)
    }
}

/// Configuration for one call attempt
#[derive(Debug, Clone)]
pub struct CallConfig {
    /// Capture constraints for local media acquisition
    pub constraints: MediaConstraints,
    /// How often the mailbox is drained
    pub poll_interval: Duration,
    /// Reconnection bounds after a dropped connection
    pub reconnect: ReconnectPolicy,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            constraints: MediaConstraints::default(),
            poll_interval: Duration::from_millis(750),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl CallConfig {
    /// Set the mailbox poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the reconnection policy
    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Set the capture constraints
    pub fn with_constraints(mut self, constraints: MediaConstraints) -> Self {
        self.constraints = constraints;
        self
    }
}

/// Snapshot of a call's progress
#[derive(Debug, Clone)]
pub struct CallStats {
    pub call_state: CallState,
    pub connection_state: ConnectionState,
    pub role: CallRole,
    /// Signaling messages pushed to the relay
    pub messages_sent: u64,
    /// Signaling messages received from the relay
    pub messages_received: u64,
    /// Reconnection attempts made so far
    pub reconnect_attempts: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub connected_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ended_is_terminal() {
        use CallState::*;
        for next in [Idle, Negotiating, Connected, Reconnecting, Ended] {
            assert!(!Ended.can_transition_to(next));
        }
    }

    #[test]
    fn reconnect_delays_back_off_and_cap() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(8));
        let capped = ReconnectPolicy {
            max_attempts: 10,
            ..Default::default()
        };
        assert_eq!(capped.delay_for_attempt(8), Duration::from_secs(15));
    }
}
