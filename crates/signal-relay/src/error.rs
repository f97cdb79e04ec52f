//! Error types for the signaling relay

use thiserror::Error;

/// Result type for relay operations
pub type RelayResult<T> = Result<T, RelayError>;

/// Errors that can occur in the signaling relay
#[derive(Debug, Clone, Error)]
pub enum RelayError {
    /// The session id is unknown (never created, or already purged)
    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: String },

    /// The session exists but is Ended or Expired
    #[error("Session expired or ended: {session_id}")]
    SessionExpired { session_id: String },

    /// A session with this id already exists
    #[error("Session already exists: {session_id}")]
    SessionExists { session_id: String },

    /// The named participant is not a member of the session
    #[error("Participant {participant} does not belong to session {session_id}")]
    UnknownParticipant {
        session_id: String,
        participant: String,
    },

    /// Attempted a backward or otherwise illegal status transition
    #[error("Illegal session transition for {session_id}: {from} -> {to}")]
    InvalidTransition {
        session_id: String,
        from: String,
        to: String,
    },

    /// Malformed request input
    #[error("Invalid request: {message}")]
    InvalidInput { message: String },

    /// Internal error
    #[error("Internal relay error: {message}")]
    Internal { message: String },
}

impl RelayError {
    /// Create a session-not-found error
    pub fn not_found(session_id: impl std::fmt::Display) -> Self {
        Self::SessionNotFound {
            session_id: session_id.to_string(),
        }
    }

    /// Create a session-expired error
    pub fn expired(session_id: impl std::fmt::Display) -> Self {
        Self::SessionExpired {
            session_id: session_id.to_string(),
        }
    }

    /// Create an invalid-input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
