use huddle_client::TransportError;
use huddle_core::{IceCandidate, SignalEvent, SignalPayload, UserId};
use std::time::Duration;
use tokio::task::LocalSet;

use crate::integration::init_tracing;
use crate::utils::{MockTransport, ROOM, batcher};

fn ice(tag: &str) -> SignalEvent {
    SignalEvent::Candidate {
        candidate: IceCandidate::new(tag),
    }
}

fn offer(sdp: &str) -> SignalEvent {
    SignalEvent::Offer { sdp: sdp.into() }
}

#[tokio::test(start_paused = true)]
async fn test_candidates_wait_for_a_quiet_period() {
    init_tracing();

    LocalSet::new()
        .run_until(async {
            let transport = MockTransport::new();
            let batcher = batcher(&transport);

            let first = batcher.enqueue(ROOM, UserId(9), ice("c1"));
            tokio::time::sleep(Duration::from_millis(30)).await;
            let second = batcher.enqueue(ROOM, UserId(9), ice("c2"));
            tokio::time::sleep(Duration::from_millis(30)).await;

            // Each candidate restarts the quiet period.
            assert!(transport.requests().is_empty());
            assert_eq!(batcher.pending(ROOM, UserId(9)), 2);

            tokio::time::sleep(Duration::from_millis(40)).await;
            assert_eq!(batcher.pending(ROOM, UserId(9)), 0);
            assert_eq!(transport.requests().len(), 1);
            assert!(matches!(
                &transport.payloads()[0],
                SignalPayload::Batch { recipient_id, events }
                    if *recipient_id == UserId(9) && events.len() == 2
            ));

            assert_eq!(first.await, Ok(()));
            assert_eq!(second.await, Ok(()));
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_full_batch_goes_out_without_waiting() {
    init_tracing();

    LocalSet::new()
        .run_until(async {
            let transport = MockTransport::new();
            let batcher = batcher(&transport);

            for n in 0..11 {
                let _ = batcher.enqueue(ROOM, UserId(9), ice(&format!("c{}", n)));
            }
            tokio::time::sleep(Duration::from_millis(20)).await;

            assert_eq!(transport.requests().len(), 1);
            assert_eq!(transport.payloads()[0].event_count(), 10);
            assert_eq!(batcher.pending(ROOM, UserId(9)), 1);

            tokio::time::sleep(Duration::from_millis(100)).await;
            assert_eq!(transport.requests().len(), 2);
            assert_eq!(transport.events_to(9).len(), 11);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_offer_carries_queued_candidates_ahead_of_it() {
    init_tracing();

    LocalSet::new()
        .run_until(async {
            let transport = MockTransport::new();
            let batcher = batcher(&transport);

            let _ = batcher.enqueue(ROOM, UserId(9), ice("early"));
            let sent = batcher.enqueue(ROOM, UserId(9), offer("v=0"));
            assert_eq!(sent.await, Ok(()));

            assert_eq!(transport.requests().len(), 1);
            let kinds: Vec<&str> = transport.events_to(9).iter().map(|e| e.kind()).collect();
            assert_eq!(kinds, vec!["candidate", "offer"]);

            // The candidate's quiet period was cleared along with it.
            tokio::time::sleep(Duration::from_millis(200)).await;
            assert_eq!(transport.requests().len(), 1);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_recipients_flushing_together_share_a_request() {
    init_tracing();

    LocalSet::new()
        .run_until(async {
            let transport = MockTransport::new();
            let batcher = batcher(&transport);

            let _ = batcher.enqueue(ROOM, UserId(9), ice("a"));
            let _ = batcher.enqueue(ROOM, UserId(12), ice("b"));
            let _ = batcher.enqueue(ROOM, UserId(12), ice("c"));
            tokio::time::sleep(Duration::from_millis(100)).await;

            assert_eq!(transport.requests().len(), 1);
            let SignalPayload::Groups(groups) = &transport.payloads()[0] else {
                panic!("expected a grouped payload");
            };
            let mut shape: Vec<(UserId, usize)> = groups
                .iter()
                .map(|group| (group.recipient_id, group.events.len()))
                .collect();
            shape.sort();
            assert_eq!(shape, vec![(UserId(9), 1), (UserId(12), 2)]);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_failed_request_rejects_every_event_it_carried() {
    init_tracing();

    LocalSet::new()
        .run_until(async {
            let transport = MockTransport::new();
            transport.set_failing(true);
            let batcher = batcher(&transport);

            let candidate = batcher.enqueue(ROOM, UserId(9), ice("a"));
            let answer = batcher.enqueue(ROOM, UserId(9), SignalEvent::Answer { sdp: "v=0".into() });

            assert!(matches!(answer.await, Err(TransportError::Network(_))));
            assert!(matches!(candidate.await, Err(TransportError::Network(_))));

            // The room is usable again afterwards.
            transport.set_failing(false);
            assert_eq!(batcher.enqueue(ROOM, UserId(9), offer("v=1")).await, Ok(()));
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_room_never_sends() {
    init_tracing();

    LocalSet::new()
        .run_until(async {
            let transport = MockTransport::new();
            let batcher = batcher(&transport);
            let other_room = huddle_core::RoomId(7);

            let dropped = batcher.enqueue(ROOM, UserId(9), ice("a"));
            let kept = batcher.enqueue(other_room, UserId(9), ice("b"));
            batcher.cancel_room(ROOM);

            assert_eq!(dropped.await, Err(TransportError::Cancelled));
            assert_eq!(kept.await, Ok(()));
            assert_eq!(transport.requests().len(), 1);
            assert_eq!(transport.requests()[0].0, other_room);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_one_request_in_flight_per_room() {
    init_tracing();

    LocalSet::new()
        .run_until(async {
            let transport = MockTransport::new();
            transport.set_latency(Duration::from_millis(100));
            let batcher = batcher(&transport);

            let first = batcher.enqueue(ROOM, UserId(9), offer("v=0"));
            tokio::time::sleep(Duration::from_millis(10)).await;
            let second = batcher.enqueue(ROOM, UserId(12), offer("v=0"));
            let third = batcher.enqueue(ROOM, UserId(9), ice("a"));
            tokio::time::sleep(Duration::from_millis(50)).await;

            assert_eq!(transport.requests().len(), 1);

            assert_eq!(first.await, Ok(()));
            assert_eq!(second.await, Ok(()));
            assert_eq!(third.await, Ok(()));

            // Everything queued behind the first request leaves in one go.
            let payloads = transport.payloads();
            assert_eq!(payloads.len(), 2);
            let SignalPayload::Groups(groups) = &payloads[1] else {
                panic!("expected a grouped payload");
            };
            let recipients: Vec<UserId> = groups.iter().map(|group| group.recipient_id).collect();
            assert_eq!(recipients, vec![UserId(12), UserId(9)]);
            let kinds: Vec<&str> = transport.events_to(9).iter().map(|e| e.kind()).collect();
            assert_eq!(kinds, vec!["offer", "candidate"]);
        })
        .await;
}
