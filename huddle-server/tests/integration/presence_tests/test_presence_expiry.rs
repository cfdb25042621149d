use huddle_core::{RoomId, UserId};
use huddle_server::{MemoryPresenceStore, PresenceStore};
use std::time::Duration;

use crate::integration::init_tracing;
use crate::utils::{TestServer, user};

#[tokio::test(start_paused = true)]
async fn test_lapsed_member_is_not_listed() {
    init_tracing();

    let store = MemoryPresenceStore::new(Duration::from_secs(30));
    store.add(RoomId(42), UserId(1)).await.unwrap();

    tokio::time::advance(Duration::from_secs(61)).await;

    assert!(!store.list(RoomId(42)).await.unwrap().contains(&UserId(1)));
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_join_keeps_member_listed() {
    init_tracing();

    let server = TestServer::new(Duration::from_secs(30));
    let room = server.public_room("Lobby").await;
    let key = room.id.to_string();
    let alice = user(1);
    let bob = user(2);

    server.huddle.join(&alice, &key).await.unwrap();
    server.huddle.join(&bob, &key).await.unwrap();

    for _ in 0..4 {
        tokio::time::advance(Duration::from_secs(20)).await;
        server.huddle.join(&alice, &key).await.unwrap();
    }

    let listed: Vec<UserId> = server
        .huddle
        .participants(&alice, &key)
        .await
        .unwrap()
        .iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(listed, vec![UserId(1)]);
}

#[tokio::test(start_paused = true)]
async fn test_leave_removes_immediately() {
    init_tracing();

    let server = TestServer::new(Duration::from_secs(30));
    let room = server.public_room("Lobby").await;
    let key = room.slug.clone();

    server.huddle.join(&user(3), &key).await.unwrap();
    server.huddle.leave(&user(3), &key).await.unwrap();

    assert!(server.presence.list(room.id).await.unwrap().is_empty());
    assert_eq!(server.push.snapshots().await.last(), Some(&Vec::new()));
}
