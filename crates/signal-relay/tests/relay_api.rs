//! HTTP contract tests for the relay API

use chrono::{Duration, Utc};
use telecare_signal_relay::api::{create_router, RelayState};
use telecare_signal_relay::{MailboxConfig, SessionId, SignalingMailbox};

/// Spin the router up on an ephemeral port, returning its base URL
async fn start_relay() -> (String, std::sync::Arc<SignalingMailbox>) {
    let mailbox = SignalingMailbox::new(MailboxConfig::default());
    let state = RelayState {
        mailbox: mailbox.clone(),
        join_base_url: "http://clinic.test".to_string(),
    };
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), mailbox)
}

fn create_body(id: &str) -> serde_json::Value {
    let now = Utc::now();
    serde_json::json!({
        "session_id": id,
        "participant_a": "clinician-1",
        "participant_b": "patient-1",
        "scheduled_start": now,
        "scheduled_end": now + Duration::minutes(30),
    })
}

#[tokio::test]
async fn push_then_drain_round_trip() {
    let (base, _mailbox) = start_relay().await;
    let http = reqwest::Client::new();

    let created = http
        .post(format!("{}/sessions", base))
        .json(&create_body("visit-1"))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), 201);
    let body: serde_json::Value = created.json().await.unwrap();
    assert_eq!(body["join_url"], "http://clinic.test/telemedicine/visit-1");

    let pushed = http
        .post(format!("{}/sessions/visit-1/messages", base))
        .json(&serde_json::json!({
            "type": "offer",
            "payload": { "sdp": "v=0\r\no=- 0 0 IN IP4 0.0.0.0\r\n" },
            "from": "clinician-1",
            "to": "patient-1",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(pushed.status(), 201);

    let drained: Vec<serde_json::Value> = http
        .get(format!("{}/sessions/visit-1/messages", base))
        .query(&[("participant", "patient-1")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(drained.len(), 1);
    assert_eq!(drained[0]["type"], "offer");
    assert_eq!(drained[0]["from"], "clinician-1");

    // Draining implicitly consumed the message
    let again: Vec<serde_json::Value> = http
        .get(format!("{}/sessions/visit-1/messages", base))
        .query(&[("participant", "patient-1")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(again.is_empty());
}

#[tokio::test]
async fn unknown_session_is_404_ended_session_is_410() {
    let (base, mailbox) = start_relay().await;
    let http = reqwest::Client::new();

    let missing = http
        .get(format!("{}/sessions/ghost/messages", base))
        .query(&[("participant", "patient-1")])
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);

    http.post(format!("{}/sessions", base))
        .json(&create_body("visit-2"))
        .send()
        .await
        .unwrap();
    let ended = http
        .post(format!("{}/sessions/visit-2/end", base))
        .send()
        .await
        .unwrap();
    assert_eq!(ended.status(), 204);

    let push = http
        .post(format!("{}/sessions/visit-2/messages", base))
        .json(&serde_json::json!({
            "type": "answer",
            "payload": {},
            "from": "patient-1",
            "to": "clinician-1",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(push.status(), 410);

    // Purge makes the id unknown again: 410 becomes 404
    let later = Utc::now() + Duration::hours(2);
    mailbox.sweep(later);
    let drained = http
        .get(format!("{}/sessions/visit-2/messages", base))
        .query(&[("participant", "patient-1")])
        .send()
        .await
        .unwrap();
    assert_eq!(drained.status(), 404);
    assert!(mailbox.get_session(&SessionId::from("visit-2")).is_err());
}

#[tokio::test]
async fn outsider_participant_is_rejected() {
    let (base, _mailbox) = start_relay().await;
    let http = reqwest::Client::new();
    http.post(format!("{}/sessions", base))
        .json(&create_body("visit-3"))
        .send()
        .await
        .unwrap();

    let drained = http
        .get(format!("{}/sessions/visit-3/messages", base))
        .query(&[("participant", "receptionist-9")])
        .send()
        .await
        .unwrap();
    assert_eq!(drained.status(), 403);
}

#[tokio::test]
async fn activate_transitions_and_duplicates_conflict() {
    let (base, _mailbox) = start_relay().await;
    let http = reqwest::Client::new();
    http.post(format!("{}/sessions", base))
        .json(&create_body("visit-4"))
        .send()
        .await
        .unwrap();

    let dup = http
        .post(format!("{}/sessions", base))
        .json(&create_body("visit-4"))
        .send()
        .await
        .unwrap();
    assert_eq!(dup.status(), 409);

    assert_eq!(
        http.post(format!("{}/sessions/visit-4/activate", base))
            .send()
            .await
            .unwrap()
            .status(),
        204
    );
    let session: serde_json::Value = http
        .get(format!("{}/sessions/visit-4", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(session["status"], "active");

    // Ended is terminal; re-activating conflicts
    http.post(format!("{}/sessions/visit-4/end", base))
        .send()
        .await
        .unwrap();
    assert_eq!(
        http.post(format!("{}/sessions/visit-4/activate", base))
            .send()
            .await
            .unwrap()
            .status(),
        409
    );
}
