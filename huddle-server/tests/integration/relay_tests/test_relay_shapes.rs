use huddle_core::UserId;
use huddle_server::{Audience, Error};
use serde_json::json;
use std::time::Duration;

use crate::integration::init_tracing;
use crate::utils::{TestServer, user};

async fn lobby_with(server: &TestServer, ids: &[u64]) -> String {
    let room = server.public_room("Lobby").await;
    let key = room.id.to_string();
    for id in ids {
        server.huddle.join(&user(*id), &key).await.unwrap();
    }
    server.push.clear().await;
    key
}

#[tokio::test]
async fn test_batched_events_keep_order() {
    init_tracing();

    let server = TestServer::new(Duration::from_secs(60));
    let key = lobby_with(&server, &[1, 2]).await;

    let payload = json!({
        "recipient_id": 2,
        "events": {
            "1": { "type": "candidate", "candidate": { "candidate": "c1" } },
            "0": { "type": "offer", "sdp": "v=0" },
            "2": { "type": "candidate", "candidate": { "candidate": "c2" } }
        }
    });
    server.huddle.signal(&user(1), &key, &payload).await.unwrap();

    let kinds: Vec<String> = server
        .push
        .signals()
        .await
        .iter()
        .map(|(_, data, _)| data["type"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(kinds, vec!["offer", "candidate", "candidate"]);
}

#[tokio::test]
async fn test_grouped_messages_fan_out_per_recipient() {
    init_tracing();

    let server = TestServer::new(Duration::from_secs(60));
    let key = lobby_with(&server, &[1, 2, 3]).await;

    let payload = json!({
        "messages": [
            { "recipient_id": 2, "events": [{ "type": "answer", "sdp": "a" }] },
            { "recipient_id": 3, "events": [
                { "type": "candidate", "candidate": { "candidate": "x" } },
                { "type": "candidate", "candidate": { "candidate": "y" } }
            ] }
        ]
    });
    let delivered = server.huddle.signal(&user(1), &key, &payload).await.unwrap();
    assert_eq!(delivered, 3);

    assert_eq!(server.push.delivered_to(UserId(2)).await.len(), 1);
    assert_eq!(server.push.delivered_to(UserId(3)).await.len(), 2);
    assert!(server.push.delivered_to(UserId(1)).await.is_empty());
}

#[tokio::test]
async fn test_member_of_private_room_is_a_known_recipient() {
    init_tracing();

    let server = TestServer::new(Duration::from_secs(60));
    let room = server.private_room("Standup", 1, &[4]).await;
    let key = room.id.to_string();

    // 4 has not joined yet; membership alone makes them addressable.
    let payload = json!({ "recipient_id": 4, "type": "offer", "sdp": "v=0" });
    server.huddle.signal(&user(1), &key, &payload).await.unwrap();

    let signals = server.push.signals().await;
    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0].2, Audience::Users(vec![UserId(4)]));
}

#[tokio::test]
async fn test_unknown_recipient_rejects_whole_payload() {
    init_tracing();

    let server = TestServer::new(Duration::from_secs(60));
    let key = lobby_with(&server, &[1, 2]).await;

    let payload = json!({
        "messages": [
            { "recipient_id": 2, "events": [{ "type": "offer", "sdp": "a" }] },
            { "recipient_id": 9, "events": [{ "type": "offer", "sdp": "b" }] }
        ]
    });
    let err = server.huddle.signal(&user(1), &key, &payload).await.unwrap_err();

    assert!(matches!(err, Error::Validation(_)));
    assert!(server.push.all().await.is_empty());
}

#[tokio::test]
async fn test_empty_payload_is_a_validation_error() {
    init_tracing();

    let server = TestServer::new(Duration::from_secs(60));
    let key = lobby_with(&server, &[1, 2]).await;

    for payload in [json!({}), json!({ "recipient_id": 2 }), json!({ "messages": [] })] {
        let err = server.huddle.signal(&user(1), &key, &payload).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "payload {}", payload);
    }
}

#[tokio::test]
async fn test_outsider_cannot_signal_private_room() {
    init_tracing();

    let server = TestServer::new(Duration::from_secs(60));
    let room = server.private_room("Standup", 1, &[2]).await;

    let payload = json!({ "recipient_id": 2, "type": "offer", "sdp": "v=0" });
    let err = server
        .huddle
        .signal(&user(8), &room.id.to_string(), &payload)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Forbidden(_)));
}

#[tokio::test]
async fn test_push_failure_is_surfaced_to_sender() {
    init_tracing();

    let server = TestServer::new(Duration::from_secs(60));
    let key = lobby_with(&server, &[1, 2]).await;
    server.push.set_failing(true);

    let payload = json!({ "recipient_id": 2, "type": "offer", "sdp": "v=0" });
    let err = server.huddle.signal(&user(1), &key, &payload).await.unwrap_err();

    assert!(matches!(err, Error::Unavailable(_)));
}
