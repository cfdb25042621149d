use huddle_client::{
    EngineConfig, RoomSession, SessionConfig, SessionState, TokioRuntime, TransportError,
};
use huddle_core::utils::room_channel;
use huddle_core::{PushFrame, RoomMessage, UserId};
use serde_json::json;
use std::rc::Rc;
use std::time::Duration;
use tokio::task::LocalSet;

use crate::integration::init_tracing;
use crate::utils::{
    MockLinkFactory, MockRoomApi, MockTransport, ROOM, batcher, participants, settle,
};

fn session(api: &MockRoomApi, links: &MockLinkFactory, transport: &MockTransport) -> RoomSession {
    RoomSession::new(
        UserId(5),
        Rc::new(api.clone()),
        Rc::new(links.clone()),
        batcher(transport),
        TokioRuntime::shared(),
        SessionConfig::new("http://localhost:3000", "token-5"),
        EngineConfig::default(),
    )
}

fn frame(message: &RoomMessage) -> PushFrame {
    PushFrame {
        channel: room_channel(message.room_id()),
        data: serde_json::to_value(message).unwrap(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_join_negotiates_with_everyone_present() {
    init_tracing();

    LocalSet::new()
        .run_until(async {
            let api = MockRoomApi::new(ROOM, participants(&[5, 9, 12]));
            let links = MockLinkFactory::new(5);
            let transport = MockTransport::new();
            let session = session(&api, &links, &transport);
            assert_eq!(session.state(), SessionState::Idle);

            let room = session.join("watercooler").await.unwrap();
            settle().await;

            assert_eq!(room.id, ROOM);
            assert_eq!(session.state(), SessionState::Joined);
            let engine = session.engine().unwrap();
            assert_eq!(engine.peers(), vec![UserId(9), UserId(12)]);
            assert_eq!(transport.events_to(9)[0].kind(), "offer");
            assert_eq!(transport.events_to(12)[0].kind(), "offer");
            assert_eq!(session.roster().len(), 3);

            // Joining again only renews presence.
            session.join("watercooler").await.unwrap();
            settle().await;
            assert_eq!(api.joins(), 2);
            assert_eq!(links.count(9), 1);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_unknown_room_leaves_session_idle() {
    init_tracing();

    LocalSet::new()
        .run_until(async {
            let api = MockRoomApi::new(ROOM, participants(&[5]));
            let session = session(&api, &MockLinkFactory::new(5), &MockTransport::new());

            let err = session.join("nowhere").await.unwrap_err();
            assert!(matches!(err, TransportError::Rejected { status: 404, .. }));
            assert_eq!(session.state(), SessionState::Idle);
            assert!(session.engine().is_none());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_renews_presence_and_membership() {
    init_tracing();

    LocalSet::new()
        .run_until(async {
            let api = MockRoomApi::new(ROOM, participants(&[5, 9]));
            let links = MockLinkFactory::new(5);
            let transport = MockTransport::new();
            let session = session(&api, &links, &transport);
            session.join("watercooler").await.unwrap();

            api.set_participants(participants(&[5, 12]));
            tokio::time::sleep(Duration::from_secs(19)).await;
            assert_eq!(api.joins(), 1);

            tokio::time::sleep(Duration::from_secs(2)).await;
            assert_eq!(api.joins(), 2);
            assert_eq!(session.engine().unwrap().peers(), vec![UserId(12)]);
            assert!(links.latest(9).is_closed());

            tokio::time::sleep(Duration::from_secs(20)).await;
            assert_eq!(api.joins(), 3);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_rejected_heartbeat_ends_the_session() {
    init_tracing();

    LocalSet::new()
        .run_until(async {
            let api = MockRoomApi::new(ROOM, participants(&[5, 9]));
            let links = MockLinkFactory::new(5);
            let transport = MockTransport::new();
            let session = session(&api, &links, &transport);
            session.join("watercooler").await.unwrap();
            settle().await;

            // Server trouble is retried on the next beat.
            api.fail_joins(TransportError::Rejected {
                status: 503,
                message: "unavailable".into(),
            });
            tokio::time::sleep(Duration::from_secs(20)).await;
            assert_eq!(api.joins(), 2);
            assert_eq!(session.state(), SessionState::Joined);

            api.fail_joins(TransportError::Rejected {
                status: 403,
                message: "forbidden".into(),
            });
            tokio::time::sleep(Duration::from_secs(20)).await;
            assert_eq!(api.joins(), 3);
            assert_eq!(session.state(), SessionState::Rejected);
            assert!(session.engine().is_none());
            assert!(links.latest(9).is_closed());

            tokio::time::sleep(Duration::from_secs(60)).await;
            assert_eq!(api.joins(), 3);

            // Nothing is left to leave.
            session.leave().await.unwrap();
            assert!(api.leaves().is_empty());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_push_frames_drive_the_engine() {
    init_tracing();

    LocalSet::new()
        .run_until(async {
            let api = MockRoomApi::new(ROOM, participants(&[5]));
            let links = MockLinkFactory::new(5);
            let transport = MockTransport::new();
            let session = session(&api, &links, &transport);
            session.join("watercooler").await.unwrap();

            session.handle_push(&frame(&RoomMessage::Participants {
                room_id: ROOM,
                participants: participants(&[3, 5]),
            }));
            session.handle_push(&frame(&RoomMessage::Signal {
                room_id: ROOM,
                sender_id: UserId(3),
                data: json!({ "type": "offer", "sdp": "offer-from-3" }),
            }));
            settle().await;

            let engine = session.engine().unwrap();
            assert_eq!(engine.peers(), vec![UserId(3)]);
            assert_eq!(links.latest(3).labels(), vec!["remote_offer", "answer"]);
            assert_eq!(transport.events_to(3)[0].kind(), "answer");

            // Other channels and unreadable frames are ignored.
            session.handle_push(&PushFrame {
                channel: room_channel(huddle_core::RoomId(7)),
                data: serde_json::to_value(RoomMessage::Participants {
                    room_id: huddle_core::RoomId(7),
                    participants: participants(&[5, 8]),
                })
                .unwrap(),
            });
            session.handle_push(&PushFrame {
                channel: room_channel(ROOM),
                data: json!({ "type": "weather" }),
            });
            settle().await;
            assert_eq!(engine.peers(), vec![UserId(3)]);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_kick_tears_the_session_down() {
    init_tracing();

    LocalSet::new()
        .run_until(async {
            let api = MockRoomApi::new(ROOM, participants(&[5, 9]));
            let links = MockLinkFactory::new(5);
            let transport = MockTransport::new();
            let session = session(&api, &links, &transport);
            session.join("watercooler").await.unwrap();
            settle().await;
            let engine = session.engine().unwrap();

            session.handle_push(&frame(&RoomMessage::Kicked { room_id: ROOM }));
            settle().await;

            assert_eq!(session.state(), SessionState::Kicked);
            assert!(session.engine().is_none());
            assert!(session.room().is_none());
            assert!(!engine.is_active());
            assert!(links.latest(9).is_closed());

            tokio::time::sleep(Duration::from_secs(60)).await;
            assert_eq!(api.joins(), 1);
            assert!(api.leaves().is_empty());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_leave_notifies_server_once() {
    init_tracing();

    LocalSet::new()
        .run_until(async {
            let api = MockRoomApi::new(ROOM, participants(&[5, 9]));
            let links = MockLinkFactory::new(5);
            let transport = MockTransport::new();
            let session = session(&api, &links, &transport);
            session.join("watercooler").await.unwrap();
            session.set_muted(true);
            settle().await;

            let me = session.roster().into_iter().find(|entry| entry.id() == UserId(5));
            assert!(me.is_some_and(|entry| entry.is_muted));

            session.leave().await.unwrap();
            session.leave().await.unwrap();
            settle().await;

            assert_eq!(session.state(), SessionState::Left);
            assert_eq!(api.leaves(), vec![ROOM]);
            assert!(session.roster().is_empty());
            assert!(links.latest(9).is_closed());

            tokio::time::sleep(Duration::from_secs(60)).await;
            assert_eq!(api.joins(), 1);
        })
        .await;
}
