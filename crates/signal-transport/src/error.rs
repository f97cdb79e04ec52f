//! Error types for the signaling transport

use telecare_signal_relay::RelayError;
use thiserror::Error;

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors that can occur while talking to the signaling relay
#[derive(Debug, Error)]
pub enum TransportError {
    /// The relay could not be reached after bounded retries
    #[error("Signaling unavailable after {attempts} attempts: {reason}")]
    SignalingUnavailable { attempts: u32, reason: String },

    /// The call link refers to a session the relay does not know
    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: String },

    /// The call link has expired
    #[error("Session expired: {session_id}")]
    SessionExpired { session_id: String },

    /// The relay rejected the request (client-side error, not retried)
    #[error("Relay rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Network-level failure reaching the relay
    #[error("Network error: {reason}")]
    Network { reason: String },

    /// A payload could not be serialized or parsed
    #[error("Serialization error: {reason}")]
    Serialization { reason: String },
}

impl TransportError {
    /// Whether the retry layer may try this operation again
    pub fn is_recoverable(&self) -> bool {
        match self {
            TransportError::Network { .. } => true,
            TransportError::Rejected { status, .. } => *status >= 500,
            TransportError::SignalingUnavailable { .. } => false,
            TransportError::SessionNotFound { .. } => false,
            TransportError::SessionExpired { .. } => false,
            TransportError::Serialization { .. } => false,
        }
    }

    /// Coarse category for structured logging
    pub fn category(&self) -> &'static str {
        match self {
            TransportError::SignalingUnavailable { .. } => "unavailable",
            TransportError::SessionNotFound { .. } | TransportError::SessionExpired { .. } => {
                "session"
            }
            TransportError::Rejected { .. } => "rejected",
            TransportError::Network { .. } => "network",
            TransportError::Serialization { .. } => "serialization",
        }
    }

    /// Create a network error
    pub fn network(reason: impl Into<String>) -> Self {
        Self::Network {
            reason: reason.into(),
        }
    }
}

impl From<RelayError> for TransportError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::SessionNotFound { session_id } => {
                TransportError::SessionNotFound { session_id }
            }
            RelayError::SessionExpired { session_id } => {
                TransportError::SessionExpired { session_id }
            }
            other => TransportError::Rejected {
                status: 400,
                message: other.to_string(),
            },
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            TransportError::Serialization {
                reason: err.to_string(),
            }
        } else {
            TransportError::Network {
                reason: err.to_string(),
            }
        }
    }
}
