use huddle_core::UserId;
use huddle_core::utils::room_channel;
use huddle_server::Audience;
use serde_json::json;
use std::time::Duration;

use crate::integration::init_tracing;
use crate::utils::{TestServer, user};

#[tokio::test]
async fn test_inline_candidate_reaches_only_its_recipient() {
    init_tracing();

    let server = TestServer::new(Duration::from_secs(60));
    let room = server.public_room("Lobby").await;
    let key = room.id.to_string();

    server.huddle.join(&user(5), &key).await.unwrap();
    server.huddle.join(&user(7), &key).await.unwrap();
    server.push.clear().await;

    let payload = json!({
        "type": "candidate",
        "candidate": { "candidate": "candidate:1 1 udp 1 10.0.0.1 5000 typ host", "sdpMid": "0" },
        "recipient_id": 7
    });
    let delivered = server.huddle.signal(&user(5), &key, &payload).await.unwrap();
    assert_eq!(delivered, 1);

    let published = server.push.all().await;
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].channel, room_channel(room.id));
    assert_eq!(published[0].audience, Audience::Users(vec![UserId(7)]));

    let signals = server.push.signals().await;
    let (sender, data, _) = &signals[0];
    assert_eq!(*sender, UserId(5));
    assert_eq!(data["type"], "candidate");
    assert_eq!(data["candidate"]["sdpMid"], "0");
    assert!(data.get("recipient_id").is_none());

    assert!(server.push.delivered_to(UserId(6)).await.is_empty());
}
