use huddle_client::{EngineConfig, PeerState};
use huddle_core::{RoomMessage, UserId};
use serde_json::json;
use std::time::Duration;
use tokio::task::LocalSet;

use crate::integration::init_tracing;
use crate::utils::{
    LinkOp, MockLinkFactory, MockTransport, ROOM, candidate, participants, settle, solo_engine,
};

#[tokio::test(start_paused = true)]
async fn test_departed_user_is_closed_and_forgotten() {
    init_tracing();

    LocalSet::new()
        .run_until(async {
            let transport = MockTransport::new();
            let links = MockLinkFactory::new(5);
            let five = solo_engine(5, EngineConfig::default(), &links, &transport);

            five.handle_participants(&participants(&[5, 9, 12]));
            settle().await;
            assert_eq!(five.peers(), vec![UserId(9), UserId(12)]);

            five.handle_participants(&participants(&[5, 9]));
            settle().await;

            assert_eq!(five.peers(), vec![UserId(9)]);
            assert!(five.peer_status(UserId(12)).is_none());
            assert!(links.latest(12).is_closed());
            assert!(!links.latest(9).is_closed());
            assert_eq!(
                five.roster().iter().map(|entry| entry.id()).collect::<Vec<_>>(),
                vec![UserId(5), UserId(9)]
            );

            // A later signal from the departed user starts from scratch.
            five.handle_signal(UserId(12), &candidate("late"));
            settle().await;
            assert_eq!(five.peers(), vec![UserId(9), UserId(12)]);
            assert_eq!(five.peer_status(UserId(12)).unwrap().queued_candidates, 1);
            assert_eq!(links.count(12), 1);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_room_messages_are_routed_by_room() {
    init_tracing();

    LocalSet::new()
        .run_until(async {
            let transport = MockTransport::new();
            let links = MockLinkFactory::new(9);
            let nine = solo_engine(9, EngineConfig::default(), &links, &transport);

            let elsewhere = RoomMessage::Participants {
                room_id: huddle_core::RoomId(7),
                participants: participants(&[1, 9]),
            };
            assert!(!nine.handle_message(&elsewhere));

            let snapshot = RoomMessage::Participants {
                room_id: ROOM,
                participants: participants(&[5, 9]),
            };
            assert!(nine.handle_message(&snapshot));

            let offer = RoomMessage::Signal {
                room_id: ROOM,
                sender_id: UserId(5),
                data: json!({ "type": "offer", "sdp": "offer-from-5" }),
            };
            assert!(nine.handle_message(&offer));
            assert!(!nine.handle_message(&RoomMessage::Kicked { room_id: ROOM }));
            settle().await;

            assert_eq!(nine.peers(), vec![UserId(5)]);
            assert_eq!(nine.peer_state(UserId(5)), Some(PeerState::Connected));

            // Our own echo and unreadable data are dropped.
            nine.handle_signal(UserId(9), &json!({ "type": "offer", "sdp": "echo" }));
            nine.handle_signal(UserId(5), &json!({ "type": "bogus" }));
            settle().await;
            assert_eq!(nine.peers(), vec![UserId(5)]);
            assert_eq!(links.latest(5).labels(), vec!["remote_offer", "answer"]);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_mute_applies_to_current_and_future_links() {
    init_tracing();

    LocalSet::new()
        .run_until(async {
            let transport = MockTransport::new();
            let links = MockLinkFactory::new(5);
            let five = solo_engine(5, EngineConfig::default(), &links, &transport);
            five.handle_participants(&participants(&[5, 9]));
            settle().await;

            five.set_muted(true);
            five.handle_participants(&participants(&[5, 9, 12]));
            settle().await;

            assert!(five.is_muted());
            assert!(links.latest(9).ops().contains(&LinkOp::SetAudio(false)));
            assert_eq!(links.latest(12).ops().first(), Some(&LinkOp::SetAudio(false)));

            let me = five.roster().into_iter().find(|entry| entry.id() == UserId(5));
            assert!(me.is_some_and(|entry| entry.is_muted));

            five.set_muted(false);
            settle().await;
            assert_eq!(
                links.latest(9).ops().last(),
                Some(&LinkOp::SetAudio(true))
            );
            assert!(!five.roster()[0].is_muted);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_audio_levels_drive_speaking_flags() {
    init_tracing();

    LocalSet::new()
        .run_until(async {
            let transport = MockTransport::new();
            let links = MockLinkFactory::new(5);
            let five = solo_engine(5, EngineConfig::default(), &links, &transport);
            five.handle_participants(&participants(&[5, 9]));
            settle().await;

            let speaking = |engine: &huddle_client::NegotiationEngine| {
                engine
                    .roster()
                    .into_iter()
                    .find(|entry| entry.id() == UserId(9))
                    .is_some_and(|entry| entry.is_speaking)
            };

            links.latest(9).emit_level(0.3);
            settle().await;
            assert!(speaking(&five));

            links.latest(9).emit_level(0.01);
            settle().await;
            assert!(!speaking(&five));
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_closes_links_and_drops_queued_signals() {
    init_tracing();

    LocalSet::new()
        .run_until(async {
            let transport = MockTransport::new();
            let links = MockLinkFactory::new(5).without_auto_connect();
            let five = solo_engine(5, EngineConfig::default(), &links, &transport);
            five.handle_participants(&participants(&[5, 9, 12]));
            settle().await;

            links.latest(9).emit_candidate("never-sent");
            tokio::time::sleep(Duration::from_millis(10)).await;
            five.shutdown();
            settle().await;

            assert!(!five.is_active());
            assert!(five.peers().is_empty());
            assert!(five.roster().is_empty());
            assert!(links.latest(9).is_closed());
            assert!(links.latest(12).is_closed());
            assert!(transport.events_to(9).iter().all(|event| !event.is_candidate()));

            // Nothing restarts once the room is left.
            five.handle_participants(&participants(&[5, 9]));
            tokio::time::sleep(Duration::from_secs(60)).await;
            assert!(five.peers().is_empty());
            assert_eq!(links.count(9), 1);
        })
        .await;
}
