//! Error types for the media bridge

use crate::types::ConnectionState;
use thiserror::Error;

/// Result type for media operations
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur in the media transport controller
#[derive(Debug, Clone, Error)]
pub enum MediaError {
    /// The user refused capture permission. Fatal to call start; the system
    /// never retries, the user must re-initiate explicitly.
    #[error("Media access denied for {device}")]
    AccessDenied { device: String },

    /// An offer/answer operation was invoked in the wrong state. This is a
    /// programming error in the caller, not a transient failure.
    #[error("Invalid negotiation state for {operation}: connection is {state:?}")]
    InvalidNegotiationState {
        operation: &'static str,
        state: ConnectionState,
    },

    /// The remote payload could not be applied
    #[error("Negotiation failed: {reason}")]
    NegotiationFailed { reason: String },

    /// No local stream has been acquired yet
    #[error("No local stream: call start_local_stream first")]
    NoLocalStream,

    /// The controller has been closed
    #[error("Media transport is closed")]
    Closed,
}

impl MediaError {
    /// Create an access-denied error
    pub fn access_denied(device: impl Into<String>) -> Self {
        Self::AccessDenied {
            device: device.into(),
        }
    }

    /// Create a negotiation-failed error
    pub fn negotiation_failed(reason: impl Into<String>) -> Self {
        Self::NegotiationFailed {
            reason: reason.into(),
        }
    }
}
