//! Per-client signaling transport
//!
//! Bridges the relay mailbox and the local call orchestrator. Outbound
//! messages are pushed with bounded-backoff retry; inbound messages arrive
//! through a recurring drain that never overlaps itself (the next drain is
//! only issued after the previous one resolved). There is no guarantee about
//! relative timing between the two participants' poll cycles; correctness
//! must not depend on it.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::TransportResult;
use crate::relay_api::RelayApi;
use crate::retry::{retry_with_backoff, RetryConfig};
use telecare_signal_relay::{
    MessageDraft, ParticipantId, SessionId, SignalKind, SignalingMessage,
};

struct PollTask {
    handle: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

/// Signaling transport for one participant of one session
pub struct SignalingTransport {
    relay: Arc<dyn RelayApi>,
    session_id: SessionId,
    local: ParticipantId,
    peer: ParticipantId,
    retry: RetryConfig,
    poll_task: Mutex<Option<PollTask>>,
}

impl SignalingTransport {
    /// Create a transport for `local`, talking to `peer` through `relay`.
    ///
    /// Identifiers are normalized by [`ParticipantId::new`]; route checks on
    /// drained messages always compare normalized forms.
    pub fn new(
        relay: Arc<dyn RelayApi>,
        session_id: SessionId,
        local: ParticipantId,
        peer: ParticipantId,
    ) -> Self {
        Self {
            relay,
            session_id,
            local,
            peer,
            retry: RetryConfig::default(),
            poll_task: Mutex::new(None),
        }
    }

    /// Override the send retry policy
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// The local participant identity
    pub fn local(&self) -> &ParticipantId {
        &self.local
    }

    /// The remote participant identity
    pub fn peer(&self) -> &ParticipantId {
        &self.peer
    }

    /// Send an SDP offer to the peer
    pub async fn send_offer(&self, payload: serde_json::Value) -> TransportResult<()> {
        self.send(SignalKind::Offer, payload).await
    }

    /// Send an SDP answer to the peer
    pub async fn send_answer(&self, payload: serde_json::Value) -> TransportResult<()> {
        self.send(SignalKind::Answer, payload).await
    }

    /// Send a trickled ICE candidate to the peer
    pub async fn send_candidate(&self, payload: serde_json::Value) -> TransportResult<()> {
        self.send(SignalKind::IceCandidate, payload).await
    }

    /// Record the first negotiated connection on the relay
    pub async fn mark_active(&self) -> TransportResult<()> {
        self.relay.mark_active(&self.session_id).await
    }

    /// Move the session to Ended on the relay
    pub async fn end_session(&self) -> TransportResult<()> {
        self.relay.end_session(&self.session_id).await
    }

    async fn send(&self, kind: SignalKind, payload: serde_json::Value) -> TransportResult<()> {
        let draft = MessageDraft {
            kind,
            payload,
            from: self.local.clone(),
            to: self.peer.clone(),
        };
        let operation = format!("push_{}", kind);
        retry_with_backoff(&operation, &self.retry, || {
            let draft = draft.clone();
            async move { self.relay.push(&self.session_id, draft).await }
        })
        .await?;
        Ok(())
    }

    /// Start the recurring drain loop.
    ///
    /// Returns the channel inbound messages are dispatched on, in the order
    /// the relay returned them. Individual poll failures are logged and
    /// swallowed; the next tick retries. Only [`stop_polling`] stops the
    /// loop. Starting while already polling returns a fresh receiver and
    /// stops the previous loop.
    ///
    /// [`stop_polling`]: SignalingTransport::stop_polling
    pub async fn start_polling(
        &self,
        interval: Duration,
    ) -> mpsc::UnboundedReceiver<SignalingMessage> {
        self.stop_polling().await;

        let (message_tx, message_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let relay = self.relay.clone();
        let session_id = self.session_id.clone();
        let local = self.local.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        // The drain is awaited before the next tick fires, so
                        // polls never overlap themselves.
                        match relay.drain(&session_id, &local).await {
                            Ok(messages) => {
                                for message in messages {
                                    if message.to != local {
                                        warn!(session_id = %session_id, id = %message.id,
                                              to = %message.to, "Dropping misrouted message");
                                        continue;
                                    }
                                    if message_tx.send(message).is_err() {
                                        debug!(session_id = %session_id,
                                               "Message receiver dropped, poll loop exiting");
                                        return;
                                    }
                                }
                            }
                            Err(e) => {
                                warn!(session_id = %session_id, error = %e,
                                      category = e.category(), "Poll failed, will retry next tick");
                            }
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        debug!(session_id = %session_id, "Poll loop stopped");
                        return;
                    }
                }
            }
        });

        *self.poll_task.lock().await = Some(PollTask {
            handle,
            shutdown_tx,
        });
        message_rx
    }

    /// Stop the drain loop; idempotent and safe to call from any state
    pub async fn stop_polling(&self) {
        if let Some(task) = self.poll_task.lock().await.take() {
            let _ = task.shutdown_tx.send(true);
            let _ = task.handle.await;
        }
    }
}
