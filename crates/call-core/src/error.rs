//! Error types for call orchestration

use telecare_media_bridge::MediaError;
use telecare_signal_transport::TransportError;
use thiserror::Error;

use crate::types::CallState;

/// Result type for call operations
pub type CallResult<T> = Result<T, CallError>;

/// Errors that can occur while orchestrating a call
#[derive(Debug, Error)]
pub enum CallError {
    /// Signaling-layer failure
    #[error("Signaling error: {0}")]
    Transport(#[from] TransportError),

    /// Media-layer failure
    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    /// An operation was invoked in the wrong call state
    #[error("Invalid call state for {operation}: call is {state:?}")]
    InvalidState {
        operation: &'static str,
        state: CallState,
    },
}

impl CallError {
    /// Create an invalid-state error
    pub fn invalid_state(operation: &'static str, state: CallState) -> Self {
        Self::InvalidState { operation, state }
    }
}
