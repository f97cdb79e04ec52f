//! The call orchestrator
//!
//! Ties signaling to media negotiation: the only component aware of both.
//! One spawned event loop owns the call state machine; inbound signaling
//! messages, media-layer events and the reconnect timer are all serialized
//! through that loop, so state transitions have a single writer. Public
//! controls (mute, camera, screen share) go straight to the media layer and
//! never touch call state.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use telecare_media_bridge::{
    ConnectionState, IceCandidate, MediaError, MediaEvent, MediaTransport, SessionDescription,
};
use telecare_signal_relay::{SignalKind, SignalingMessage};
use telecare_signal_transport::{SignalingTransport, TransportError};

use crate::error::{CallError, CallResult};
use crate::events::{CallEvent, EndReason};
use crate::types::{CallConfig, CallRole, CallState, CallStats};

struct SharedState {
    call_state: CallState,
    /// Claimed by the start_call that won the Idle gate; checked and set
    /// under the same lock so concurrent starts cannot both proceed
    starting: bool,
    messages_sent: u64,
    messages_received: u64,
    reconnect_attempts: u32,
    started_at: Option<DateTime<Utc>>,
    connected_at: Option<DateTime<Utc>>,
}

/// Drives one telemedicine call attempt from join to teardown
pub struct CallOrchestrator {
    transport: Arc<SignalingTransport>,
    media: Arc<dyn MediaTransport>,
    role: CallRole,
    config: CallConfig,
    shared: Mutex<SharedState>,
    events_tx: mpsc::UnboundedSender<CallEvent>,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
    ended: AtomicBool,
}

impl CallOrchestrator {
    /// Create an orchestrator and the event channel the UI consumes.
    ///
    /// Exactly one side of the session must be [`CallRole::Initiator`]; the
    /// responder never creates an offer, which is what prevents glare.
    pub fn new(
        transport: SignalingTransport,
        media: Arc<dyn MediaTransport>,
        role: CallRole,
        config: CallConfig,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<CallEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = watch::channel(false);
        let orchestrator = Arc::new(Self {
            transport: Arc::new(transport),
            media,
            role,
            config,
            shared: Mutex::new(SharedState {
                call_state: CallState::Idle,
                starting: false,
                messages_sent: 0,
                messages_received: 0,
                reconnect_attempts: 0,
                started_at: None,
                connected_at: None,
            }),
            events_tx,
            loop_handle: Mutex::new(None),
            shutdown_tx,
            ended: AtomicBool::new(false),
        });
        (orchestrator, events_rx)
    }

    /// Current call-level state
    pub async fn state(&self) -> CallState {
        self.shared.lock().await.call_state
    }

    /// Snapshot of call progress for diagnostics
    pub async fn stats(&self) -> CallStats {
        let shared = self.shared.lock().await;
        CallStats {
            call_state: shared.call_state,
            connection_state: self.media.connection_state(),
            role: self.role,
            messages_sent: shared.messages_sent,
            messages_received: shared.messages_received,
            reconnect_attempts: shared.reconnect_attempts,
            started_at: shared.started_at,
            connected_at: shared.connected_at,
        }
    }

    /// Start the call: acquire local media, begin polling, and (as the
    /// initiator) create and send the first offer.
    ///
    /// Permission denial is fatal and nothing is ever sent; the user must
    /// re-initiate explicitly after granting access.
    pub async fn start_call(self: &Arc<Self>) -> CallResult<()> {
        {
            let mut shared = self.shared.lock().await;
            if shared.call_state != CallState::Idle || shared.starting {
                return Err(CallError::invalid_state("start_call", shared.call_state));
            }
            shared.starting = true;
        }

        if let Err(e) = self.media.start_local_stream(self.config.constraints).await {
            warn!(error = %e, "Local media acquisition failed, call not started");
            self.end(EndReason::MediaAccessDenied).await;
            return Err(e.into());
        }

        // Take the media event stream before any negotiation so trickled
        // candidates are not lost.
        let media_events = self.media.events();
        let inbound = self.transport.start_polling(self.config.poll_interval).await;

        {
            let mut shared = self.shared.lock().await;
            shared.started_at = Some(Utc::now());
        }
        self.set_state(CallState::Negotiating).await;

        let loop_self = self.clone();
        let shutdown_rx = self.shutdown_tx.subscribe();
        *self.loop_handle.lock().await = Some(tokio::spawn(async move {
            loop_self.run_event_loop(inbound, media_events, shutdown_rx).await;
        }));

        if self.role.is_initiator() {
            let offer = match self.media.create_offer().await {
                Ok(offer) => offer,
                Err(e) => {
                    self.end(EndReason::MediaFailed).await;
                    return Err(e.into());
                }
            };
            if let Err(e) = self.send_signal(SignalKind::Offer, offer.to_payload()).await {
                let reason = end_reason_for_transport(&e);
                self.end(reason).await;
                return Err(e.into());
            }
        }
        Ok(())
    }

    /// Enable or disable the outgoing audio track
    pub async fn toggle_audio(&self, enabled: bool) -> CallResult<()> {
        Ok(self.media.toggle_audio(enabled).await?)
    }

    /// Enable or disable the outgoing video track
    pub async fn toggle_video(&self, enabled: bool) -> CallResult<()> {
        Ok(self.media.toggle_video(enabled).await?)
    }

    /// Swap the outgoing video track for screen capture
    pub async fn start_screen_share(&self) -> CallResult<()> {
        Ok(self.media.start_screen_share().await?)
    }

    /// Swap the outgoing video track back to the camera
    pub async fn stop_screen_share(&self) -> CallResult<()> {
        Ok(self.media.stop_screen_share().await?)
    }

    /// End the call: stop polling and release media, always both.
    ///
    /// Idempotent and safe from any state, including before the call ever
    /// reached `Connected`.
    pub async fn end_call(&self) {
        self.end(EndReason::Hangup).await;
    }

    /// Idempotent teardown with a terminal cause
    async fn end(&self, reason: EndReason) {
        if self.ended.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(?reason, "Ending call");
        let _ = self.shutdown_tx.send(true);
        // Detach the loop task; it exits on the shutdown signal
        drop(self.loop_handle.lock().await.take());
        self.transport.stop_polling().await;
        self.media.close().await;
        // Leave the session open on permission denial so the same link works
        // once access is granted; skip the call when the relay already
        // considers the session gone.
        let keep_session = matches!(
            reason,
            EndReason::LinkExpired | EndReason::MediaAccessDenied
        );
        if !keep_session {
            if let Err(e) = self.transport.end_session().await {
                debug!(error = %e, "Relay end_session failed during teardown");
            }
        }
        self.set_state(CallState::Ended).await;
        self.emit(CallEvent::Ended { reason });
    }

    fn emit(&self, event: CallEvent) {
        let _ = self.events_tx.send(event);
    }

    /// Single place where call state changes; enforces monotonicity
    async fn set_state(&self, next: CallState) {
        let mut shared = self.shared.lock().await;
        let from = shared.call_state;
        if from == next {
            return;
        }
        if !from.can_transition_to(next) {
            debug!(?from, ?next, "Suppressed illegal call transition");
            return;
        }
        shared.call_state = next;
        drop(shared);
        info!(?from, ?next, "Call state changed");
        self.emit(CallEvent::StateChanged { from, to: next });
    }

    async fn send_signal(
        &self,
        kind: SignalKind,
        payload: serde_json::Value,
    ) -> Result<(), TransportError> {
        let result = match kind {
            SignalKind::Offer => self.transport.send_offer(payload).await,
            SignalKind::Answer => self.transport.send_answer(payload).await,
            SignalKind::IceCandidate => self.transport.send_candidate(payload).await,
        };
        if result.is_ok() {
            self.shared.lock().await.messages_sent += 1;
        }
        result
    }

    async fn run_event_loop(
        self: Arc<Self>,
        mut inbound: mpsc::UnboundedReceiver<SignalingMessage>,
        mut media_events: mpsc::UnboundedReceiver<MediaEvent>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let mut inbound_open = true;
        let mut media_open = true;
        let mut reconnect_deadline: Option<Instant> = None;

        loop {
            if self.ended.load(Ordering::SeqCst) {
                return;
            }
            let next_signal = async {
                if inbound_open {
                    inbound.recv().await
                } else {
                    std::future::pending().await
                }
            };
            let next_media = async {
                if media_open {
                    media_events.recv().await
                } else {
                    std::future::pending().await
                }
            };
            let reconnect_timer = async {
                match reconnect_deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                _ = shutdown_rx.changed() => return,
                message = next_signal => match message {
                    Some(message) => self.handle_signal(message).await,
                    None => inbound_open = false,
                },
                event = next_media => match event {
                    Some(event) => self.handle_media_event(event, &mut reconnect_deadline).await,
                    None => media_open = false,
                },
                _ = reconnect_timer => {
                    reconnect_deadline = None;
                    self.attempt_reconnect(&mut reconnect_deadline).await;
                }
            }
        }
    }

    /// Handle one drained signaling message (steps 2-4 of the call flow)
    async fn handle_signal(&self, message: SignalingMessage) {
        self.shared.lock().await.messages_received += 1;
        debug!(kind = %message.kind, from = %message.from, id = %message.id,
               "Handling signaling message");

        match message.kind {
            SignalKind::Offer => {
                let offer = match SessionDescription::from_payload(&message.payload) {
                    Ok(offer) => offer,
                    Err(e) => {
                        self.emit(CallEvent::Error {
                            detail: format!("Malformed offer payload: {}", e),
                        });
                        self.end(EndReason::MediaFailed).await;
                        return;
                    }
                };
                if let Err(e) = self.media.set_remote_description(offer).await {
                    self.fail_on_media(e, "apply remote offer").await;
                    return;
                }
                let answer = match self.media.create_answer().await {
                    Ok(answer) => answer,
                    Err(e) => {
                        self.fail_on_media(e, "create answer").await;
                        return;
                    }
                };
                if let Err(e) = self.send_signal(SignalKind::Answer, answer.to_payload()).await {
                    let reason = end_reason_for_transport(&e);
                    self.emit(CallEvent::Error {
                        detail: e.to_string(),
                    });
                    self.end(reason).await;
                }
            }
            SignalKind::Answer => {
                let answer = match SessionDescription::from_payload(&message.payload) {
                    Ok(answer) => answer,
                    Err(e) => {
                        self.emit(CallEvent::Error {
                            detail: format!("Malformed answer payload: {}", e),
                        });
                        self.end(EndReason::MediaFailed).await;
                        return;
                    }
                };
                if let Err(e) = self.media.set_remote_description(answer).await {
                    self.fail_on_media(e, "apply remote answer").await;
                }
            }
            SignalKind::IceCandidate => {
                let candidate = match IceCandidate::from_payload(&message.payload) {
                    Ok(candidate) => candidate,
                    Err(e) => {
                        // One bad candidate does not doom the call
                        warn!(error = %e, "Discarding malformed candidate payload");
                        return;
                    }
                };
                if let Err(e) = self.media.add_ice_candidate(candidate).await {
                    self.fail_on_media(e, "add remote candidate").await;
                }
            }
        }
    }

    async fn handle_media_event(
        &self,
        event: MediaEvent,
        reconnect_deadline: &mut Option<Instant>,
    ) {
        match event {
            MediaEvent::LocalCandidate(candidate) => {
                if let Err(e) = self
                    .send_signal(SignalKind::IceCandidate, candidate.to_payload())
                    .await
                {
                    let reason = end_reason_for_transport(&e);
                    self.emit(CallEvent::Error {
                        detail: e.to_string(),
                    });
                    self.end(reason).await;
                }
            }
            MediaEvent::RemoteStream(stream) => {
                self.emit(CallEvent::RemoteStreamAdded(stream));
            }
            MediaEvent::ScreenShareEnded => {
                self.emit(CallEvent::ScreenShareEnded);
            }
            MediaEvent::ConnectionStateChanged(state) => {
                self.emit(CallEvent::ConnectionStateChanged(state));
                match state {
                    ConnectionState::Connected => {
                        *reconnect_deadline = None;
                        {
                            let mut shared = self.shared.lock().await;
                            shared.reconnect_attempts = 0;
                            if shared.connected_at.is_none() {
                                shared.connected_at = Some(Utc::now());
                            }
                        }
                        self.set_state(CallState::Connected).await;
                        if let Err(e) = self.transport.mark_active().await {
                            debug!(error = %e, "Relay mark_active failed");
                        }
                    }
                    ConnectionState::Disconnected => {
                        let call_state = self.shared.lock().await.call_state;
                        if call_state == CallState::Connected {
                            self.set_state(CallState::Reconnecting).await;
                            let delay = self.config.reconnect.delay_for_attempt(1);
                            *reconnect_deadline = Some(Instant::now() + delay);
                        }
                    }
                    ConnectionState::Failed => {
                        self.end(EndReason::MediaFailed).await;
                    }
                    ConnectionState::Closed => {
                        // Expected during our own teardown; anything else is
                        // the media layer dying underneath us
                        if !self.ended.load(Ordering::SeqCst) {
                            self.end(EndReason::MediaFailed).await;
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    /// One bounded reconnection attempt (ICE restart semantics)
    async fn attempt_reconnect(&self, reconnect_deadline: &mut Option<Instant>) {
        let attempt = {
            let mut shared = self.shared.lock().await;
            if shared.call_state != CallState::Reconnecting {
                return;
            }
            shared.reconnect_attempts += 1;
            shared.reconnect_attempts
        };
        let max_attempts = self.config.reconnect.max_attempts;
        if attempt > max_attempts {
            warn!(attempts = max_attempts, "Reconnection exhausted, ending call");
            self.end(EndReason::PeerUnreachable).await;
            return;
        }
        self.emit(CallEvent::Reconnecting {
            attempt,
            max_attempts,
        });
        info!(attempt, max_attempts, "Attempting reconnection");

        // Only the initiator re-offers; the responder answers the restart
        // offer through the normal inbound path. Skip the restart when a
        // handshake is already in flight (an answer arrived and candidates
        // are still trickling); the attempt still counts against the bound.
        let wants_restart = matches!(
            self.media.connection_state(),
            ConnectionState::Disconnected | ConnectionState::HaveLocalOffer
        );
        if self.role.is_initiator() && wants_restart {
            match self.media.restart_ice().await {
                Ok(offer) => {
                    if let Err(e) = self.send_signal(SignalKind::Offer, offer.to_payload()).await {
                        let reason = end_reason_for_transport(&e);
                        self.end(reason).await;
                        return;
                    }
                }
                Err(e) => {
                    self.fail_on_media(e, "restart ice").await;
                    return;
                }
            }
        }
        let delay = self.config.reconnect.delay_for_attempt(attempt + 1);
        *reconnect_deadline = Some(Instant::now() + delay);
    }

    /// Media errors inside the loop: negotiation-state violations are
    /// programming errors and surfaced immediately; everything else is an
    /// unrecoverable media failure.
    async fn fail_on_media(&self, e: MediaError, context: &str) {
        if matches!(e, MediaError::Closed) && self.ended.load(Ordering::SeqCst) {
            return;
        }
        error!(error = %e, context, "Media operation failed");
        self.emit(CallEvent::Error {
            detail: format!("{}: {}", context, e),
        });
        self.end(EndReason::MediaFailed).await;
    }
}

fn end_reason_for_transport(e: &TransportError) -> EndReason {
    match e {
        TransportError::SessionNotFound { .. } | TransportError::SessionExpired { .. } => {
            EndReason::LinkExpired
        }
        _ => EndReason::SignalingUnavailable,
    }
}
