//! Deterministic media transport for tests and demos
//!
//! Produces synthetic SDP and candidates and walks the same connection-state
//! machine a device-backed controller would, so the orchestrator is fully
//! testable without hardware, network or a browser. Hooks exist to deny
//! capture permission and to drop or fail an established connection.

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::controller::{MediaEvent, MediaTransport};
use crate::error::{MediaError, MediaResult};
use crate::types::{
    ConnectionState, DescriptionKind, IceCandidate, MediaConstraints, MediaStreamHandle,
    MediaTrack, SessionDescription, TrackKind, TrackSource,
};

/// Behavior knobs for the simulated transport
#[derive(Debug, Clone)]
pub struct SimulatedMediaConfig {
    /// Refuse capture permission, as a user denying the camera prompt would
    pub deny_access: bool,
    /// How many local candidates to trickle after a local description is set
    pub trickle_candidates: usize,
}

impl Default for SimulatedMediaConfig {
    fn default() -> Self {
        Self {
            deny_access: false,
            trickle_candidates: 2,
        }
    }
}

struct Inner {
    state: ConnectionState,
    local_stream: Option<MediaStreamHandle>,
    remote_stream: Option<MediaStreamHandle>,
    local_description: Option<SessionDescription>,
    remote_description: Option<SessionDescription>,
    /// Remote candidates received before the remote description; applied,
    /// never dropped, once the description arrives
    buffered_candidates: Vec<IceCandidate>,
    applied_candidates: Vec<IceCandidate>,
    events_tx: mpsc::UnboundedSender<MediaEvent>,
    /// Instrumentation: how many times create_offer ran (glare assertions)
    offers_created: u32,
}

impl Inner {
    fn emit(&self, event: MediaEvent) {
        // Receiver gone just means nobody is listening yet
        let _ = self.events_tx.send(event);
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state == next {
            return;
        }
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal simulated transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(from = ?self.state, to = ?next, "Simulated connection transition");
        self.state = next;
        self.emit(MediaEvent::ConnectionStateChanged(next));
    }

    /// Connecting plus at least one applied remote candidate means the
    /// simulated path is viable: go Connected and surface the remote stream.
    fn maybe_connect(&mut self) {
        if self.state == ConnectionState::Connecting && !self.applied_candidates.is_empty() {
            self.transition(ConnectionState::Connected);
            let remote = MediaStreamHandle::new(vec![
                MediaTrack::new(TrackKind::Audio, TrackSource::Remote),
                MediaTrack::new(TrackKind::Video, TrackSource::Remote),
            ]);
            self.remote_stream = Some(remote.clone());
            self.emit(MediaEvent::RemoteStream(remote));
        }
    }

    fn trickle(&mut self, count: usize) {
        for n in 0..count {
            self.emit(MediaEvent::LocalCandidate(IceCandidate {
                candidate: format!(
                    "candidate:{} 1 udp 2113937151 198.51.100.{} 544{:02} typ host",
                    Uuid::new_v4().simple(),
                    n + 1,
                    n
                ),
                sdp_mid: Some("0".to_string()),
                sdp_mline_index: Some(0),
            }));
        }
    }

    fn synth_sdp(&self, kind: DescriptionKind, restart: bool) -> String {
        let session = Uuid::new_v4().simple();
        let marker = if restart { "a=ice-restart\r\n" } else { "" };
        format!(
            "v=0\r\no=- {session} {version} IN IP4 127.0.0.1\r\ns=telecare-sim\r\nt=0 0\r\n\
             m=audio 9 UDP/TLS/RTP/SAVPF 111\r\nm=video 9 UDP/TLS/RTP/SAVPF 96\r\n{marker}a=kind:{kind:?}\r\n",
            session = session,
            version = self.offers_created,
            marker = marker,
            kind = kind,
        )
    }

    fn ensure_open(&self) -> MediaResult<()> {
        if self.state == ConnectionState::Closed {
            Err(MediaError::Closed)
        } else {
            Ok(())
        }
    }
}

/// Simulated implementation of [`MediaTransport`]
pub struct SimulatedMediaTransport {
    config: SimulatedMediaConfig,
    inner: Mutex<Inner>,
}

impl SimulatedMediaTransport {
    /// Create a simulated transport with the given behavior
    pub fn new(config: SimulatedMediaConfig) -> Self {
        let (events_tx, _events_rx) = mpsc::unbounded_channel();
        Self {
            config,
            inner: Mutex::new(Inner {
                state: ConnectionState::New,
                local_stream: None,
                remote_stream: None,
                local_description: None,
                remote_description: None,
                buffered_candidates: Vec::new(),
                applied_candidates: Vec::new(),
                events_tx,
                offers_created: 0,
            }),
        }
    }

    /// Simulate the peer link dropping after it was established
    pub fn drop_connection(&self) {
        let mut inner = self.inner.lock();
        if inner.state == ConnectionState::Connected {
            inner.transition(ConnectionState::Disconnected);
        }
    }

    /// Simulate an unrecoverable connectivity failure
    pub fn fail_connection(&self) {
        let mut inner = self.inner.lock();
        if inner.state != ConnectionState::Closed && inner.state != ConnectionState::Failed {
            inner.transition(ConnectionState::Failed);
        }
    }

    /// Simulate the user closing the shared screen surface
    pub fn end_screen_surface(&self) {
        let mut inner = self.inner.lock();
        let mut reverted = false;
        if let Some(stream) = inner.local_stream.as_mut() {
            for track in stream.tracks.iter_mut() {
                if track.kind == TrackKind::Video && track.source == TrackSource::Screen {
                    track.source = TrackSource::Camera;
                    reverted = true;
                }
            }
        }
        if reverted {
            inner.emit(MediaEvent::ScreenShareEnded);
        }
    }

    /// How many offers this side ever created
    pub fn offers_created(&self) -> u32 {
        self.inner.lock().offers_created
    }

    /// Remote candidates waiting for the remote description
    pub fn buffered_candidate_count(&self) -> usize {
        self.inner.lock().buffered_candidates.len()
    }

    /// Remote candidates applied to the connection
    pub fn applied_candidate_count(&self) -> usize {
        self.inner.lock().applied_candidates.len()
    }

    fn swap_video_source(&self, to: TrackSource) -> MediaResult<()> {
        let mut inner = self.inner.lock();
        inner.ensure_open()?;
        let stream = inner.local_stream.as_mut().ok_or(MediaError::NoLocalStream)?;
        let track = stream
            .tracks
            .iter_mut()
            .find(|t| t.kind == TrackKind::Video)
            .ok_or_else(|| MediaError::negotiation_failed("No outgoing video track to swap"))?;
        track.source = to;
        Ok(())
    }

    fn toggle(&self, kind: TrackKind, enabled: bool) -> MediaResult<()> {
        let mut inner = self.inner.lock();
        inner.ensure_open()?;
        let stream = inner.local_stream.as_mut().ok_or(MediaError::NoLocalStream)?;
        for track in stream.tracks.iter_mut() {
            if track.kind == kind {
                track.enabled = enabled;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl MediaTransport for SimulatedMediaTransport {
    async fn start_local_stream(
        &self,
        constraints: MediaConstraints,
    ) -> MediaResult<MediaStreamHandle> {
        let mut inner = self.inner.lock();
        inner.ensure_open()?;
        if self.config.deny_access {
            return Err(MediaError::access_denied("camera/microphone"));
        }
        let mut tracks = Vec::new();
        if constraints.audio {
            tracks.push(MediaTrack::new(TrackKind::Audio, TrackSource::Microphone));
        }
        if constraints.video {
            tracks.push(MediaTrack::new(TrackKind::Video, TrackSource::Camera));
        }
        let stream = MediaStreamHandle::new(tracks);
        inner.local_stream = Some(stream.clone());
        Ok(stream)
    }

    async fn create_offer(&self) -> MediaResult<SessionDescription> {
        let mut inner = self.inner.lock();
        inner.ensure_open()?;
        if inner.state != ConnectionState::New {
            return Err(MediaError::InvalidNegotiationState {
                operation: "create_offer",
                state: inner.state,
            });
        }
        if inner.local_stream.is_none() {
            return Err(MediaError::NoLocalStream);
        }
        inner.offers_created += 1;
        let offer = SessionDescription {
            kind: DescriptionKind::Offer,
            sdp: inner.synth_sdp(DescriptionKind::Offer, false),
        };
        inner.local_description = Some(offer.clone());
        inner.transition(ConnectionState::HaveLocalOffer);
        inner.trickle(self.config.trickle_candidates);
        Ok(offer)
    }

    async fn create_answer(&self) -> MediaResult<SessionDescription> {
        let mut inner = self.inner.lock();
        inner.ensure_open()?;
        if inner.state != ConnectionState::HaveRemoteOffer {
            return Err(MediaError::InvalidNegotiationState {
                operation: "create_answer",
                state: inner.state,
            });
        }
        if inner.local_stream.is_none() {
            return Err(MediaError::NoLocalStream);
        }
        let answer = SessionDescription {
            kind: DescriptionKind::Answer,
            sdp: inner.synth_sdp(DescriptionKind::Answer, false),
        };
        inner.local_description = Some(answer.clone());
        inner.transition(ConnectionState::Stable);
        inner.transition(ConnectionState::Connecting);
        inner.trickle(self.config.trickle_candidates);
        inner.maybe_connect();
        Ok(answer)
    }

    async fn set_remote_description(&self, description: SessionDescription) -> MediaResult<()> {
        let mut inner = self.inner.lock();
        inner.ensure_open()?;
        match description.kind {
            DescriptionKind::Offer => {
                // Initial offer, or a restart offer on an established link
                let legal = matches!(
                    inner.state,
                    ConnectionState::New
                        | ConnectionState::Stable
                        | ConnectionState::Connecting
                        | ConnectionState::Connected
                        | ConnectionState::Disconnected
                );
                if !legal {
                    return Err(MediaError::InvalidNegotiationState {
                        operation: "set_remote_description(offer)",
                        state: inner.state,
                    });
                }
                inner.remote_description = Some(description);
                inner.transition(ConnectionState::HaveRemoteOffer);
            }
            DescriptionKind::Answer => {
                if inner.state != ConnectionState::HaveLocalOffer {
                    return Err(MediaError::InvalidNegotiationState {
                        operation: "set_remote_description(answer)",
                        state: inner.state,
                    });
                }
                inner.remote_description = Some(description);
                inner.transition(ConnectionState::Stable);
                inner.transition(ConnectionState::Connecting);
            }
        }
        // Early candidates were buffered; apply them now
        let buffered = std::mem::take(&mut inner.buffered_candidates);
        inner.applied_candidates.extend(buffered);
        inner.maybe_connect();
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> MediaResult<()> {
        let mut inner = self.inner.lock();
        inner.ensure_open()?;
        if inner.remote_description.is_none() {
            debug!(candidate = %candidate.candidate, "Buffering early candidate");
            inner.buffered_candidates.push(candidate);
        } else {
            inner.applied_candidates.push(candidate);
            inner.maybe_connect();
        }
        Ok(())
    }

    async fn restart_ice(&self) -> MediaResult<SessionDescription> {
        let mut inner = self.inner.lock();
        inner.ensure_open()?;
        // HaveLocalOffer is legal too: a second restart while the previous
        // restart offer is still unanswered
        let legal = matches!(
            inner.state,
            ConnectionState::Connected
                | ConnectionState::Disconnected
                | ConnectionState::HaveLocalOffer
        );
        if !legal {
            return Err(MediaError::InvalidNegotiationState {
                operation: "restart_ice",
                state: inner.state,
            });
        }
        inner.offers_created += 1;
        let offer = SessionDescription {
            kind: DescriptionKind::Offer,
            sdp: inner.synth_sdp(DescriptionKind::Offer, true),
        };
        inner.local_description = Some(offer.clone());
        // A restart renegotiates from the local-offer position
        inner.applied_candidates.clear();
        inner.transition(ConnectionState::HaveLocalOffer);
        inner.trickle(self.config.trickle_candidates);
        Ok(offer)
    }

    async fn toggle_audio(&self, enabled: bool) -> MediaResult<()> {
        self.toggle(TrackKind::Audio, enabled)
    }

    async fn toggle_video(&self, enabled: bool) -> MediaResult<()> {
        self.toggle(TrackKind::Video, enabled)
    }

    async fn start_screen_share(&self) -> MediaResult<()> {
        self.swap_video_source(TrackSource::Screen)
    }

    async fn stop_screen_share(&self) -> MediaResult<()> {
        self.swap_video_source(TrackSource::Camera)
    }

    fn connection_state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    fn local_stream(&self) -> Option<MediaStreamHandle> {
        self.inner.lock().local_stream.clone()
    }

    fn remote_stream(&self) -> Option<MediaStreamHandle> {
        self.inner.lock().remote_stream.clone()
    }

    fn events(&self) -> mpsc::UnboundedReceiver<MediaEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().events_tx = tx;
        rx
    }

    async fn close(&self) {
        let mut inner = self.inner.lock();
        if inner.state == ConnectionState::Closed {
            return;
        }
        inner.transition(ConnectionState::Closed);
        inner.local_stream = None;
        inner.remote_stream = None;
        inner.local_description = None;
        inner.remote_description = None;
        inner.buffered_candidates.clear();
        inner.applied_candidates.clear();
    }
}
