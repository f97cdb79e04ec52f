//! Client-side view of the relay
//!
//! [`RelayApi`] is the seam between the transport and the mailbox service.
//! Two implementations ship: [`HttpRelayClient`] for browser-style
//! deployments polling over the network, and [`InMemoryRelay`] holding a
//! direct handle to the store for tests and single-process setups.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::{TransportError, TransportResult};
use telecare_signal_relay::{
    MessageDraft, ParticipantId, SessionId, SignalingMailbox, SignalingMessage,
};

/// Operations the transport needs from the relay
#[async_trait]
pub trait RelayApi: Send + Sync {
    /// Append a message to the session mailbox
    async fn push(
        &self,
        session_id: &SessionId,
        draft: MessageDraft,
    ) -> TransportResult<SignalingMessage>;

    /// Drain and consume all messages addressed to `participant`
    async fn drain(
        &self,
        session_id: &SessionId,
        participant: &ParticipantId,
    ) -> TransportResult<Vec<SignalingMessage>>;

    /// Record the first successful negotiated connection
    async fn mark_active(&self, session_id: &SessionId) -> TransportResult<()>;

    /// Move the session to Ended
    async fn end_session(&self, session_id: &SessionId) -> TransportResult<()>;
}

/// Relay client speaking the HTTP wire contract
pub struct HttpRelayClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpRelayClient {
    /// Create a client against `base_url` (no trailing slash required)
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, session_id: &SessionId, suffix: &str) -> String {
        format!("{}/sessions/{}{}", self.base_url, session_id, suffix)
    }

    /// Map an error response to the transport taxonomy
    async fn reject(session_id: &SessionId, response: reqwest::Response) -> TransportError {
        let status = response.status().as_u16();
        match status {
            404 => TransportError::SessionNotFound {
                session_id: session_id.to_string(),
            },
            410 => TransportError::SessionExpired {
                session_id: session_id.to_string(),
            },
            _ => {
                let message = response.text().await.unwrap_or_default();
                TransportError::Rejected { status, message }
            }
        }
    }
}

#[async_trait]
impl RelayApi for HttpRelayClient {
    async fn push(
        &self,
        session_id: &SessionId,
        draft: MessageDraft,
    ) -> TransportResult<SignalingMessage> {
        let response = self
            .http
            .post(self.url(session_id, "/messages"))
            .json(&draft)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::reject(session_id, response).await);
        }
        Ok(response.json().await?)
    }

    async fn drain(
        &self,
        session_id: &SessionId,
        participant: &ParticipantId,
    ) -> TransportResult<Vec<SignalingMessage>> {
        let response = self
            .http
            .get(self.url(session_id, "/messages"))
            .query(&[("participant", participant.as_str())])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::reject(session_id, response).await);
        }
        Ok(response.json().await?)
    }

    async fn mark_active(&self, session_id: &SessionId) -> TransportResult<()> {
        let response = self
            .http
            .post(self.url(session_id, "/activate"))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::reject(session_id, response).await);
        }
        Ok(())
    }

    async fn end_session(&self, session_id: &SessionId) -> TransportResult<()> {
        let response = self.http.post(self.url(session_id, "/end")).send().await?;
        if !response.status().is_success() {
            return Err(Self::reject(session_id, response).await);
        }
        Ok(())
    }
}

/// Relay client holding the mailbox in-process
pub struct InMemoryRelay {
    mailbox: Arc<SignalingMailbox>,
}

impl InMemoryRelay {
    pub fn new(mailbox: Arc<SignalingMailbox>) -> Self {
        Self { mailbox }
    }
}

#[async_trait]
impl RelayApi for InMemoryRelay {
    async fn push(
        &self,
        session_id: &SessionId,
        draft: MessageDraft,
    ) -> TransportResult<SignalingMessage> {
        Ok(self.mailbox.push(session_id, draft)?)
    }

    async fn drain(
        &self,
        session_id: &SessionId,
        participant: &ParticipantId,
    ) -> TransportResult<Vec<SignalingMessage>> {
        Ok(self.mailbox.drain(session_id, participant)?)
    }

    async fn mark_active(&self, session_id: &SessionId) -> TransportResult<()> {
        Ok(self.mailbox.mark_active(session_id)?)
    }

    async fn end_session(&self, session_id: &SessionId) -> TransportResult<()> {
        Ok(self.mailbox.end_session(session_id)?)
    }
}
