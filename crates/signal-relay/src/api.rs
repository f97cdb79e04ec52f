//! HTTP surface of the signaling relay
//!
//! The wire contract the browser clients poll against: push a message, drain
//! the messages addressed to you, plus the session-lifecycle endpoints the
//! appointment service and the orchestrator invoke. Draining implicitly
//! consumes; there is no separate acknowledgement round-trip.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::mailbox::SignalingMailbox;
use crate::sweeper::RetentionSweeper;
use crate::types::{join_url, MessageDraft, ParticipantId, Session, SessionId, SignalingMessage};

/// Shared state behind every handler
#[derive(Clone)]
pub struct RelayState {
    pub mailbox: Arc<SignalingMailbox>,
    pub join_base_url: String,
}

/// Request body for session creation
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    /// Externally minted token; generated when absent
    pub session_id: Option<String>,
    pub participant_a: ParticipantId,
    pub participant_b: ParticipantId,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: DateTime<Utc>,
}

/// Response body for session creation
#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub session: Session,
    /// The artifact handed to the email-notification service
    pub join_url: String,
}

#[derive(Debug, Deserialize)]
pub struct DrainQuery {
    pub participant: ParticipantId,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = match &self {
            RelayError::SessionNotFound { .. } => StatusCode::NOT_FOUND,
            RelayError::SessionExpired { .. } => StatusCode::GONE,
            RelayError::SessionExists { .. } => StatusCode::CONFLICT,
            RelayError::UnknownParticipant { .. } => StatusCode::FORBIDDEN,
            RelayError::InvalidTransition { .. } => StatusCode::CONFLICT,
            RelayError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            RelayError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(ErrorBody {
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}

/// Build the relay router over the given state
pub fn create_router(state: RelayState) -> Router {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/:id", get(get_session))
        .route("/sessions/:id/messages", post(push_message).get(drain_messages))
        .route("/sessions/:id/activate", post(activate_session))
        .route("/sessions/:id/end", post(end_session))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the relay service until the process is stopped.
///
/// Binds the API, starts the retention sweeper, and serves forever.
pub async fn serve(config: RelayConfig) -> Result<(), RelayError> {
    let mailbox = SignalingMailbox::new(config.mailbox.clone());
    let sweeper = RetentionSweeper::new(mailbox.clone(), config.sweep_interval);
    sweeper.start().await;

    let state = RelayState {
        mailbox,
        join_base_url: config.join_base_url.clone(),
    };
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .map_err(|e| RelayError::internal(format!("Failed to bind {}: {}", config.bind_addr, e)))?;
    info!(addr = %config.bind_addr, "Signaling relay listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| RelayError::internal(format!("Server error: {}", e)))
}

async fn create_session(
    State(state): State<RelayState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), RelayError> {
    if request.scheduled_end <= request.scheduled_start {
        return Err(RelayError::invalid_input(
            "scheduled_end must be after scheduled_start",
        ));
    }
    let session_id = match request.session_id {
        Some(raw) if raw.trim().is_empty() => {
            return Err(RelayError::invalid_input("session_id must not be blank"))
        }
        Some(raw) => SessionId(raw),
        None => SessionId::new(),
    };
    let session = Session::new(
        session_id.clone(),
        request.participant_a,
        request.participant_b,
        request.scheduled_start,
        request.scheduled_end,
    );
    state.mailbox.create_session(session.clone())?;
    let join_url = join_url(&state.join_base_url, &session_id);
    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse { session, join_url }),
    ))
}

async fn get_session(
    State(state): State<RelayState>,
    Path(id): Path<String>,
) -> Result<Json<Session>, RelayError> {
    Ok(Json(state.mailbox.get_session(&SessionId(id))?))
}

async fn push_message(
    State(state): State<RelayState>,
    Path(id): Path<String>,
    Json(draft): Json<MessageDraft>,
) -> Result<(StatusCode, Json<SignalingMessage>), RelayError> {
    let message = state.mailbox.push(&SessionId(id), draft)?;
    Ok((StatusCode::CREATED, Json(message)))
}

async fn drain_messages(
    State(state): State<RelayState>,
    Path(id): Path<String>,
    Query(query): Query<DrainQuery>,
) -> Result<Json<Vec<SignalingMessage>>, RelayError> {
    Ok(Json(state.mailbox.drain(&SessionId(id), &query.participant)?))
}

async fn activate_session(
    State(state): State<RelayState>,
    Path(id): Path<String>,
) -> Result<StatusCode, RelayError> {
    state.mailbox.mark_active(&SessionId(id))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn end_session(
    State(state): State<RelayState>,
    Path(id): Path<String>,
) -> Result<StatusCode, RelayError> {
    state.mailbox.end_session(&SessionId(id))?;
    Ok(StatusCode::NO_CONTENT)
}
