//! The media transport controller seam
//!
//! [`MediaTransport`] isolates the call orchestrator from device and
//! transport details: it owns local capture, produces offers/answers and
//! candidates, and reports connection-state transitions. What to do about
//! `Disconnected` or `Failed` is the orchestrator's decision, never this
//! layer's.
//!
//! Implementations are swappable by design: a real device-backed controller
//! in the browser shell, [`SimulatedMediaTransport`] in tests and demos.
//!
//! [`SimulatedMediaTransport`]: crate::simulated::SimulatedMediaTransport

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::MediaResult;
use crate::types::{
    ConnectionState, IceCandidate, MediaConstraints, MediaStreamHandle, SessionDescription,
};

/// Asynchronous notifications from the media layer.
///
/// Two activity sources feed the orchestrator: the poll loop and these
/// events. The orchestrator serializes both into its single state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    /// The underlying connection state changed
    ConnectionStateChanged(ConnectionState),
    /// A locally discovered candidate ready to trickle to the peer
    LocalCandidate(IceCandidate),
    /// The remote stream became available
    RemoteStream(MediaStreamHandle),
    /// The user closed the shared surface; outgoing video reverted to camera
    ScreenShareEnded,
}

/// Local media negotiation primitive.
///
/// Owns the local media state of exactly one call attempt; handles are never
/// shared across sessions and are released deterministically by [`close`].
///
/// [`close`]: MediaTransport::close
#[async_trait]
pub trait MediaTransport: Send + Sync {
    /// Acquire local capture. [`MediaError::AccessDenied`] is fatal to call
    /// start; the caller must re-request user permission explicitly.
    ///
    /// [`MediaError::AccessDenied`]: crate::error::MediaError::AccessDenied
    async fn start_local_stream(
        &self,
        constraints: MediaConstraints,
    ) -> MediaResult<MediaStreamHandle>;

    /// Produce an offer and set it as the local description. Valid only in
    /// `New`; calling out of order is a programming error.
    async fn create_offer(&self) -> MediaResult<SessionDescription>;

    /// Produce an answer to a pending remote offer and set it as the local
    /// description. Valid only in `HaveRemoteOffer`.
    async fn create_answer(&self) -> MediaResult<SessionDescription>;

    /// Consume a remote offer or answer, advancing the connection state and
    /// flushing any buffered candidates.
    async fn set_remote_description(&self, description: SessionDescription) -> MediaResult<()>;

    /// Queue a remote candidate. Safe before or after the remote description
    /// is set; early candidates are buffered and applied later, never
    /// dropped.
    async fn add_ice_candidate(&self, candidate: IceCandidate) -> MediaResult<()>;

    /// Produce a fresh offer for ICE restart after a `Disconnected` report.
    async fn restart_ice(&self) -> MediaResult<SessionDescription>;

    /// Enable or disable the outgoing audio track. No renegotiation.
    async fn toggle_audio(&self, enabled: bool) -> MediaResult<()>;

    /// Enable or disable the outgoing video track. No renegotiation.
    async fn toggle_video(&self, enabled: bool) -> MediaResult<()>;

    /// Swap the outgoing video track for a screen-capture track in place.
    async fn start_screen_share(&self) -> MediaResult<()>;

    /// Swap the outgoing video track back to the camera.
    async fn stop_screen_share(&self) -> MediaResult<()>;

    /// Current connection state
    fn connection_state(&self) -> ConnectionState;

    /// The local capture stream, if acquired
    fn local_stream(&self) -> Option<MediaStreamHandle>;

    /// The remote render stream, once the connection produced one
    fn remote_stream(&self) -> Option<MediaStreamHandle>;

    /// Take the event stream. Each call supersedes the previous receiver;
    /// the orchestrator takes it exactly once at call start.
    fn events(&self) -> mpsc::UnboundedReceiver<MediaEvent>;

    /// Release all local tracks and the negotiation primitive. Idempotent;
    /// safe from any state.
    async fn close(&self);
}
