use crate::{BatchConfig, SharedRuntime, SignalTransport, Timer, TransportError};
use futures::channel::oneshot;
use huddle_core::{EventData, RoomId, SignalEvent, SignalGroup, SignalPayload, UserId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::rc::{Rc, Weak};
use tracing::{debug, warn};

type Waiter = oneshot::Sender<Result<(), TransportError>>;

#[derive(Default)]
struct RecipientQueue {
    events: Vec<SignalEvent>,
    waiters: Vec<Waiter>,
    debounce: Option<Timer>,
}

/// Flushed groups of one room waiting to go out in a single request.
#[derive(Default)]
struct Outbox {
    groups: Vec<(UserId, Vec<SignalEvent>)>,
    waiters: Vec<Waiter>,
    coalesce: Option<Timer>,
    in_flight: bool,
    resend: bool,
}

#[derive(Default)]
struct BatcherState {
    queues: HashMap<(RoomId, UserId), RecipientQueue>,
    outboxes: HashMap<RoomId, Outbox>,
}

struct BatcherShared {
    state: RefCell<BatcherState>,
    runtime: SharedRuntime,
    transport: Rc<dyn SignalTransport>,
    config: BatchConfig,
}

/// Batches outbound signal events per (room, recipient).
///
/// Candidates wait for a quiet period or a full batch. Offers and answers
/// flush whatever is queued for their recipient ahead of them and go out
/// right away. Requests for one room are sent one at a time, so events for
/// a peer reach the relay in the order they were queued.
#[derive(Clone)]
pub struct SignalBatcher {
    shared: Rc<BatcherShared>,
}

impl SignalBatcher {
    pub fn new(
        runtime: SharedRuntime,
        transport: Rc<dyn SignalTransport>,
        config: BatchConfig,
    ) -> Self {
        Self {
            shared: Rc::new(BatcherShared {
                state: RefCell::new(BatcherState::default()),
                runtime,
                transport,
                config,
            }),
        }
    }

    fn from_weak(weak: &Weak<BatcherShared>) -> Option<Self> {
        weak.upgrade().map(|shared| Self { shared })
    }

    /// Queues `event` for `recipient`. The returned future resolves with the
    /// result of the request that carried it.
    pub fn enqueue(
        &self,
        room_id: RoomId,
        recipient: UserId,
        event: SignalEvent,
    ) -> impl Future<Output = Result<(), TransportError>> + 'static {
        let (tx, rx) = oneshot::channel();
        let is_candidate = event.is_candidate();

        let flush_now = {
            let mut state = self.shared.state.borrow_mut();
            let queue = state.queues.entry((room_id, recipient)).or_default();
            queue.events.push(event);
            queue.waiters.push(tx);

            if !is_candidate || queue.events.len() >= self.shared.config.max_batch {
                true
            } else {
                let weak = Rc::downgrade(&self.shared);
                queue.debounce = Some(Timer::start(
                    &self.shared.runtime,
                    self.shared.config.candidate_debounce,
                    move || {
                        if let Some(batcher) = Self::from_weak(&weak) {
                            batcher.flush_recipient(room_id, recipient, false);
                        }
                    },
                ));
                false
            }
        };

        if flush_now {
            self.flush_recipient(room_id, recipient, !is_candidate);
        }

        async move { rx.await.unwrap_or(Err(TransportError::Cancelled)) }
    }

    /// Number of events queued for `recipient` and not yet handed to the outbox.
    pub fn pending(&self, room_id: RoomId, recipient: UserId) -> usize {
        self.shared
            .state
            .borrow()
            .queues
            .get(&(room_id, recipient))
            .map_or(0, |queue| queue.events.len())
    }

    /// Drops everything queued for the room. Waiting callers get [`TransportError::Cancelled`].
    pub fn cancel_room(&self, room_id: RoomId) {
        let waiters: Vec<Waiter> = {
            let mut state = self.shared.state.borrow_mut();
            let keys: Vec<(RoomId, UserId)> = state
                .queues
                .keys()
                .filter(|(room, _)| *room == room_id)
                .copied()
                .collect();
            let mut waiters = Vec::new();
            for key in keys {
                if let Some(queue) = state.queues.remove(&key) {
                    waiters.extend(queue.waiters);
                }
            }
            if let Some(outbox) = state.outboxes.remove(&room_id) {
                waiters.extend(outbox.waiters);
            }
            waiters
        };

        if !waiters.is_empty() {
            debug!("Cancelled {} queued signal(s) for room {}", waiters.len(), room_id);
        }
        for waiter in waiters {
            let _ = waiter.send(Err(TransportError::Cancelled));
        }
    }

    fn flush_recipient(&self, room_id: RoomId, recipient: UserId, immediate: bool) {
        let arm_coalesce = {
            let mut state = self.shared.state.borrow_mut();
            let Some(queue) = state.queues.remove(&(room_id, recipient)) else {
                return;
            };
            if queue.events.is_empty() {
                return;
            }

            let outbox = state.outboxes.entry(room_id).or_default();
            match outbox.groups.iter_mut().find(|(to, _)| *to == recipient) {
                Some((_, events)) => events.extend(queue.events),
                None => outbox.groups.push((recipient, queue.events)),
            }
            outbox.waiters.extend(queue.waiters);

            if !immediate && outbox.coalesce.is_none() {
                let weak = Rc::downgrade(&self.shared);
                outbox.coalesce = Some(Timer::start(
                    &self.shared.runtime,
                    self.shared.config.coalesce_window,
                    move || {
                        if let Some(batcher) = Self::from_weak(&weak) {
                            batcher.send_room(room_id);
                        }
                    },
                ));
            }
            !immediate
        };

        if !arm_coalesce {
            self.send_room(room_id);
        }
    }

    fn send_room(&self, room_id: RoomId) {
        let (groups, waiters) = {
            let mut state = self.shared.state.borrow_mut();
            let Some(outbox) = state.outboxes.get_mut(&room_id) else {
                return;
            };
            outbox.coalesce = None;
            if outbox.in_flight {
                outbox.resend = true;
                return;
            }
            if outbox.groups.is_empty() {
                return;
            }
            outbox.in_flight = true;
            (
                std::mem::take(&mut outbox.groups),
                std::mem::take(&mut outbox.waiters),
            )
        };

        let groups = groups
            .into_iter()
            .map(|(recipient_id, events)| SignalGroup {
                recipient_id,
                events: events.iter().map(EventData::from_event).collect(),
            })
            .collect();
        let Some(payload) = SignalPayload::from_groups(groups) else {
            for waiter in waiters {
                let _ = waiter.send(Ok(()));
            }
            self.finish_send(room_id);
            return;
        };

        let batcher = self.clone();
        self.shared.runtime.spawn(Box::pin(async move {
            let count = payload.event_count();
            let result = batcher.shared.transport.send(room_id, payload).await;
            match &result {
                Ok(()) => debug!("Sent {} signal event(s) to room {}", count, room_id),
                Err(e) => warn!(
                    "Signal request with {} event(s) to room {} failed: {}",
                    count, room_id, e
                ),
            }
            for waiter in waiters {
                let _ = waiter.send(result.clone());
            }
            batcher.finish_send(room_id);
        }));
    }

    fn finish_send(&self, room_id: RoomId) {
        let resend = {
            let mut state = self.shared.state.borrow_mut();
            let Some(outbox) = state.outboxes.get_mut(&room_id) else {
                return;
            };
            outbox.in_flight = false;
            let resend = std::mem::take(&mut outbox.resend);
            if outbox.groups.is_empty() && outbox.coalesce.is_none() {
                state.outboxes.remove(&room_id);
                return;
            }
            resend
        };

        if resend {
            self.send_room(room_id);
        }
    }
}
