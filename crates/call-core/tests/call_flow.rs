//! End-to-end call flows over an in-process relay
//!
//! Two orchestrators share one mailbox through [`InMemoryRelay`] and
//! negotiate through [`SimulatedMediaTransport`], exercising the same
//! offer/answer/candidate traffic a deployed pair would exchange over HTTP.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;
use tokio::time::timeout;

use telecare_call_core::{
    CallConfig, CallError, CallEvent, CallOrchestrator, CallRole, CallState, EndReason,
    ReconnectPolicy,
};
use telecare_media_bridge::{
    ConnectionState, IceCandidate, MediaConstraints, MediaError, MediaEvent, MediaTransport,
    SessionDescription, SimulatedMediaConfig, SimulatedMediaTransport, TrackKind, TrackSource,
};
use telecare_signal_relay::{
    MailboxConfig, ParticipantId, Session, SessionId, SessionStatus, SignalKind, SignalingMailbox,
};
use telecare_signal_transport::{InMemoryRelay, RelayApi, SignalingTransport, TransportError};

const DOCTOR: &str = "dr-chen";
const PATIENT: &str = "patient-42";

fn new_session(mailbox: &SignalingMailbox) -> SessionId {
    let id = SessionId::new();
    mailbox
        .create_session(Session::new(
            id.clone(),
            ParticipantId::new(DOCTOR),
            ParticipantId::new(PATIENT),
            Utc::now(),
            Utc::now() + chrono::Duration::minutes(30),
        ))
        .unwrap();
    id
}

fn fast_config() -> CallConfig {
    CallConfig::default()
        .with_poll_interval(Duration::from_millis(10))
        .with_reconnect(ReconnectPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(30),
            backoff_multiplier: 1.0,
            max_delay: Duration::from_millis(50),
        })
}

struct Endpoint {
    call: Arc<CallOrchestrator>,
    events: mpsc::UnboundedReceiver<CallEvent>,
    media: Arc<SimulatedMediaTransport>,
}

fn endpoint(
    mailbox: &Arc<SignalingMailbox>,
    session_id: &SessionId,
    local: &str,
    peer: &str,
    role: CallRole,
    media_config: SimulatedMediaConfig,
) -> Endpoint {
    let transport = SignalingTransport::new(
        Arc::new(InMemoryRelay::new(mailbox.clone())),
        session_id.clone(),
        ParticipantId::new(local),
        ParticipantId::new(peer),
    );
    let media = Arc::new(SimulatedMediaTransport::new(media_config));
    let (call, events) = CallOrchestrator::new(
        transport,
        media.clone() as Arc<dyn MediaTransport>,
        role,
        fast_config(),
    );
    Endpoint { call, events, media }
}

fn call_pair(mailbox: &Arc<SignalingMailbox>, session_id: &SessionId) -> (Endpoint, Endpoint) {
    (
        endpoint(
            mailbox,
            session_id,
            DOCTOR,
            PATIENT,
            CallRole::Initiator,
            SimulatedMediaConfig::default(),
        ),
        endpoint(
            mailbox,
            session_id,
            PATIENT,
            DOCTOR,
            CallRole::Responder,
            SimulatedMediaConfig::default(),
        ),
    )
}

async fn wait_for(
    events: &mut mpsc::UnboundedReceiver<CallEvent>,
    what: &str,
    mut pred: impl FnMut(&CallEvent) -> bool,
) -> CallEvent {
    timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Some(event) if pred(&event) => return event,
                Some(_) => continue,
                None => panic!("event channel closed waiting for {what}"),
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
}

async fn wait_for_state(events: &mut mpsc::UnboundedReceiver<CallEvent>, state: CallState) {
    wait_for(events, &format!("call state {state:?}"), |event| {
        matches!(event, CallEvent::StateChanged { to, .. } if *to == state)
    })
    .await;
}

/// Everything already queued plus whatever arrives in the next 100ms
async fn drain_events(events: &mut mpsc::UnboundedReceiver<CallEvent>) -> Vec<CallEvent> {
    let mut collected = Vec::new();
    while let Ok(Some(event)) = timeout(Duration::from_millis(100), events.recv()).await {
        collected.push(event);
    }
    collected
}

#[tokio::test]
async fn call_connects_end_to_end() {
    let mailbox = SignalingMailbox::new(MailboxConfig::default());
    let session_id = new_session(&mailbox);
    let (mut doctor, mut patient) = call_pair(&mailbox, &session_id);

    doctor.call.start_call().await.unwrap();
    patient.call.start_call().await.unwrap();

    wait_for_state(&mut doctor.events, CallState::Connected).await;
    wait_for_state(&mut patient.events, CallState::Connected).await;

    assert!(doctor.media.remote_stream().is_some());
    assert!(patient.media.remote_stream().is_some());
    assert_eq!(
        mailbox.get_session(&session_id).unwrap().status,
        SessionStatus::Active
    );

    let stats = doctor.call.stats().await;
    assert_eq!(stats.call_state, CallState::Connected);
    assert!(stats.connected_at.is_some());
    assert!(stats.messages_sent >= 1);
    assert!(stats.messages_received >= 1);

    doctor.call.end_call().await;
    patient.call.end_call().await;
}

#[tokio::test]
async fn responder_never_creates_an_offer() {
    let mailbox = SignalingMailbox::new(MailboxConfig::default());
    let session_id = new_session(&mailbox);
    let (mut doctor, mut patient) = call_pair(&mailbox, &session_id);

    doctor.call.start_call().await.unwrap();
    patient.call.start_call().await.unwrap();
    wait_for_state(&mut doctor.events, CallState::Connected).await;
    wait_for_state(&mut patient.events, CallState::Connected).await;

    assert_eq!(doctor.media.offers_created(), 1);
    assert_eq!(patient.media.offers_created(), 0);

    doctor.call.end_call().await;
    patient.call.end_call().await;
}

#[tokio::test]
async fn concurrent_start_calls_admit_only_one() {
    let mailbox = SignalingMailbox::new(MailboxConfig::default());
    let session_id = new_session(&mailbox);
    let (mut doctor, mut patient) = call_pair(&mailbox, &session_id);

    // A double-tapped join button races two starts on one orchestrator
    let (first, second) = tokio::join!(doctor.call.start_call(), doctor.call.start_call());
    let succeeded = [&first, &second].iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 1);
    for result in [first, second] {
        if let Err(err) = result {
            assert!(matches!(err, CallError::InvalidState { .. }));
        }
    }
    assert_eq!(doctor.media.offers_created(), 1);

    // The surviving attempt still completes normally
    patient.call.start_call().await.unwrap();
    wait_for_state(&mut doctor.events, CallState::Connected).await;
    wait_for_state(&mut patient.events, CallState::Connected).await;

    doctor.call.end_call().await;
    patient.call.end_call().await;
}

#[tokio::test]
async fn late_responder_still_connects() {
    let mailbox = SignalingMailbox::new(MailboxConfig::default());
    let session_id = new_session(&mailbox);
    let (mut doctor, mut patient) = call_pair(&mailbox, &session_id);

    // The offer and candidates sit in the mailbox until the peer polls
    doctor.call.start_call().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    patient.call.start_call().await.unwrap();
    wait_for_state(&mut doctor.events, CallState::Connected).await;
    wait_for_state(&mut patient.events, CallState::Connected).await;

    doctor.call.end_call().await;
    patient.call.end_call().await;
}

#[tokio::test]
async fn denied_permission_stops_before_signaling() {
    let mailbox = SignalingMailbox::new(MailboxConfig::default());
    let session_id = new_session(&mailbox);
    let mut doctor = endpoint(
        &mailbox,
        &session_id,
        DOCTOR,
        PATIENT,
        CallRole::Initiator,
        SimulatedMediaConfig {
            deny_access: true,
            ..Default::default()
        },
    );

    let err = doctor.call.start_call().await.unwrap_err();
    assert!(matches!(
        err,
        CallError::Media(MediaError::AccessDenied { .. })
    ));

    let ended = wait_for(&mut doctor.events, "ended event", |event| {
        matches!(event, CallEvent::Ended { .. })
    })
    .await;
    assert!(matches!(
        ended,
        CallEvent::Ended {
            reason: EndReason::MediaAccessDenied
        }
    ));
    assert_eq!(doctor.call.state().await, CallState::Ended);
    assert_eq!(doctor.call.stats().await.messages_sent, 0);

    // The session survives for an explicit retry, and the peer's mailbox
    // never saw a message
    assert_eq!(
        mailbox.get_session(&session_id).unwrap().status,
        SessionStatus::Scheduled
    );
    assert!(mailbox
        .drain(&session_id, &ParticipantId::new(PATIENT))
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn hangup_is_idempotent() {
    let mailbox = SignalingMailbox::new(MailboxConfig::default());
    let session_id = new_session(&mailbox);
    let (mut doctor, mut patient) = call_pair(&mailbox, &session_id);

    doctor.call.start_call().await.unwrap();
    patient.call.start_call().await.unwrap();
    wait_for_state(&mut doctor.events, CallState::Connected).await;
    wait_for_state(&mut patient.events, CallState::Connected).await;

    doctor.call.end_call().await;
    doctor.call.end_call().await;

    assert_eq!(doctor.media.connection_state(), ConnectionState::Closed);
    assert_eq!(doctor.call.state().await, CallState::Ended);
    assert_eq!(
        mailbox.get_session(&session_id).unwrap().status,
        SessionStatus::Ended
    );

    let ended_events = drain_events(&mut doctor.events)
        .await
        .into_iter()
        .filter(|event| matches!(event, CallEvent::Ended { .. }))
        .count();
    assert_eq!(ended_events, 1);

    patient.call.end_call().await;
}

#[tokio::test]
async fn hangup_before_connecting_releases_everything() {
    let mailbox = SignalingMailbox::new(MailboxConfig::default());
    let session_id = new_session(&mailbox);
    let mut doctor = endpoint(
        &mailbox,
        &session_id,
        DOCTOR,
        PATIENT,
        CallRole::Initiator,
        SimulatedMediaConfig::default(),
    );

    // No responder ever joins; hang up while still negotiating
    doctor.call.start_call().await.unwrap();
    wait_for_state(&mut doctor.events, CallState::Negotiating).await;
    doctor.call.end_call().await;

    wait_for(&mut doctor.events, "ended event", |event| {
        matches!(
            event,
            CallEvent::Ended {
                reason: EndReason::Hangup
            }
        )
    })
    .await;
    assert_eq!(doctor.media.connection_state(), ConnectionState::Closed);
    assert!(doctor.media.local_stream().is_none());
}

#[tokio::test]
async fn media_controls_reach_the_media_layer() {
    let mailbox = SignalingMailbox::new(MailboxConfig::default());
    let session_id = new_session(&mailbox);
    let (mut doctor, mut patient) = call_pair(&mailbox, &session_id);

    doctor.call.start_call().await.unwrap();
    patient.call.start_call().await.unwrap();
    wait_for_state(&mut doctor.events, CallState::Connected).await;
    wait_for_state(&mut patient.events, CallState::Connected).await;

    doctor.call.toggle_audio(false).await.unwrap();
    let stream = doctor.media.local_stream().unwrap();
    assert!(!stream.track(TrackKind::Audio).unwrap().enabled);

    doctor.call.start_screen_share().await.unwrap();
    assert_eq!(
        doctor
            .media
            .local_stream()
            .unwrap()
            .track(TrackKind::Video)
            .unwrap()
            .source,
        TrackSource::Screen
    );

    // User closes the shared surface: the orchestrator relays the revert
    doctor.media.end_screen_surface();
    wait_for(&mut doctor.events, "screen share ended", |event| {
        matches!(event, CallEvent::ScreenShareEnded)
    })
    .await;
    assert_eq!(
        doctor
            .media
            .local_stream()
            .unwrap()
            .track(TrackKind::Video)
            .unwrap()
            .source,
        TrackSource::Camera
    );

    doctor.call.end_call().await;
    patient.call.end_call().await;
}

#[tokio::test]
async fn dropped_connection_reconnects() {
    let mailbox = SignalingMailbox::new(MailboxConfig::default());
    let session_id = new_session(&mailbox);
    let (mut doctor, mut patient) = call_pair(&mailbox, &session_id);

    doctor.call.start_call().await.unwrap();
    patient.call.start_call().await.unwrap();
    wait_for_state(&mut doctor.events, CallState::Connected).await;
    wait_for_state(&mut patient.events, CallState::Connected).await;

    doctor.media.drop_connection();
    wait_for_state(&mut doctor.events, CallState::Reconnecting).await;
    wait_for(&mut doctor.events, "reconnect attempt", |event| {
        matches!(event, CallEvent::Reconnecting { attempt: 1, .. })
    })
    .await;

    // ICE restart renegotiates through the same mailbox
    wait_for_state(&mut doctor.events, CallState::Connected).await;
    let stats = doctor.call.stats().await;
    assert_eq!(stats.call_state, CallState::Connected);
    assert_eq!(stats.reconnect_attempts, 0);

    doctor.call.end_call().await;
    patient.call.end_call().await;
}

#[tokio::test]
async fn exhausted_reconnection_ends_peer_unreachable() {
    let mailbox = SignalingMailbox::new(MailboxConfig::default());
    let session_id = new_session(&mailbox);
    let mut doctor = endpoint(
        &mailbox,
        &session_id,
        DOCTOR,
        PATIENT,
        CallRole::Initiator,
        SimulatedMediaConfig::default(),
    );

    // Hand-driven peer: answers the first negotiation, then goes silent so
    // every restart offer lands in a mailbox nobody drains.
    let patient_media = SimulatedMediaTransport::new(SimulatedMediaConfig::default());
    let patient_transport = SignalingTransport::new(
        Arc::new(InMemoryRelay::new(mailbox.clone())) as Arc<dyn RelayApi>,
        session_id.clone(),
        ParticipantId::new(PATIENT),
        ParticipantId::new(DOCTOR),
    );
    patient_media
        .start_local_stream(MediaConstraints::default())
        .await
        .unwrap();
    let mut patient_events = patient_media.events();
    let mut patient_inbound = patient_transport
        .start_polling(Duration::from_millis(10))
        .await;

    doctor.call.start_call().await.unwrap();

    let answer_machine = async {
        loop {
            tokio::select! {
                Some(message) = patient_inbound.recv() => match message.kind {
                    SignalKind::Offer => {
                        let offer = SessionDescription::from_payload(&message.payload).unwrap();
                        patient_media.set_remote_description(offer).await.unwrap();
                        let answer = patient_media.create_answer().await.unwrap();
                        patient_transport.send_answer(answer.to_payload()).await.unwrap();
                    }
                    SignalKind::IceCandidate => {
                        let candidate = IceCandidate::from_payload(&message.payload).unwrap();
                        patient_media.add_ice_candidate(candidate).await.unwrap();
                    }
                    SignalKind::Answer => {}
                },
                Some(event) = patient_events.recv() => {
                    if let MediaEvent::LocalCandidate(candidate) = event {
                        patient_transport
                            .send_candidate(candidate.to_payload())
                            .await
                            .unwrap();
                    }
                }
            }
        }
    };
    tokio::select! {
        _ = answer_machine => unreachable!("answer machine never finishes"),
        _ = wait_for_state(&mut doctor.events, CallState::Connected) => {}
    }

    patient_transport.stop_polling().await;
    doctor.media.drop_connection();

    wait_for(&mut doctor.events, "first reconnect attempt", |event| {
        matches!(event, CallEvent::Reconnecting { attempt: 1, .. })
    })
    .await;
    wait_for(&mut doctor.events, "final reconnect attempt", |event| {
        matches!(event, CallEvent::Reconnecting { attempt: 3, .. })
    })
    .await;

    let ended = wait_for(&mut doctor.events, "ended event", |event| {
        matches!(event, CallEvent::Ended { .. })
    })
    .await;
    assert!(matches!(
        ended,
        CallEvent::Ended {
            reason: EndReason::PeerUnreachable
        }
    ));
    assert_eq!(doctor.call.state().await, CallState::Ended);
    assert_eq!(doctor.media.connection_state(), ConnectionState::Closed);
}

#[tokio::test]
async fn terminal_session_fails_fast_with_link_expired() {
    let mailbox = SignalingMailbox::new(MailboxConfig::default());
    let session_id = new_session(&mailbox);
    mailbox.end_session(&session_id).unwrap();

    let mut doctor = endpoint(
        &mailbox,
        &session_id,
        DOCTOR,
        PATIENT,
        CallRole::Initiator,
        SimulatedMediaConfig::default(),
    );

    let err = doctor.call.start_call().await.unwrap_err();
    assert!(matches!(
        err,
        CallError::Transport(TransportError::SessionExpired { .. })
    ));

    let ended = wait_for(&mut doctor.events, "ended event", |event| {
        matches!(event, CallEvent::Ended { .. })
    })
    .await;
    assert!(matches!(
        ended,
        CallEvent::Ended {
            reason: EndReason::LinkExpired
        }
    ));
    assert_eq!(doctor.media.connection_state(), ConnectionState::Closed);
}
