use crate::{
    EngineConfig, LinkFactory, Roster, RosterEntry, SharedRuntime, SignalBatcher,
};
use futures::channel::mpsc;
use huddle_core::{Participant, RoomId, RoomMessage, SignalEvent, UserId};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;
use tracing::{debug, info, warn};

mod backoff;
mod health_impl;
mod negotiate_impl;
mod peer_event;
mod peer_record;
mod peer_task;

pub(crate) use peer_event::{PeerEvent, TimerKind};
pub use peer_event::RestartReason;
pub(crate) use peer_record::{ArmedTimer, Health, PeerConnectionRecord};
pub use peer_record::{PeerState, PeerStatus, SignalingState};
use peer_task::PeerTask;

/// Shared by the engine and every peer task of one room.
pub(crate) struct PeerContext {
    pub(crate) room_id: RoomId,
    pub(crate) local_id: UserId,
    pub(crate) config: EngineConfig,
    pub(crate) runtime: SharedRuntime,
    pub(crate) factory: Rc<dyn LinkFactory>,
    pub(crate) batcher: SignalBatcher,
    pub(crate) roster: RefCell<Roster>,
    pub(crate) muted: Cell<bool>,
    pub(crate) active: Cell<bool>,
}

impl PeerContext {
    /// Hands `event` to the batcher and logs if it never reaches the relay.
    pub(crate) fn send(&self, recipient: UserId, event: SignalEvent) {
        if !self.active.get() {
            return;
        }
        let kind = event.kind();
        let room_id = self.room_id;
        let delivery = self.batcher.enqueue(room_id, recipient, event);
        self.runtime.spawn(Box::pin(async move {
            if let Err(e) = delivery.await {
                warn!(
                    "{} for user {} in room {} not delivered: {}",
                    kind, recipient, room_id, e
                );
            }
        }));
    }
}

struct PeerHandle {
    tx: mpsc::UnboundedSender<PeerEvent>,
    status: Rc<RefCell<PeerStatus>>,
}

impl PeerHandle {
    fn send(&self, event: PeerEvent) {
        let _ = self.tx.unbounded_send(event);
    }
}

struct EngineInner {
    peers: HashMap<UserId, PeerHandle>,
}

/// Peer connections of the local user inside one room.
///
/// Every remote user gets its own task consuming an ordered event queue;
/// the engine only routes membership diffs, inbound signals and mute
/// changes into those queues.
#[derive(Clone)]
pub struct NegotiationEngine {
    inner: Rc<RefCell<EngineInner>>,
    ctx: Rc<PeerContext>,
}

impl NegotiationEngine {
    pub fn new(
        room_id: RoomId,
        local_id: UserId,
        config: EngineConfig,
        runtime: SharedRuntime,
        factory: Rc<dyn LinkFactory>,
        batcher: SignalBatcher,
    ) -> Self {
        Self {
            inner: Rc::new(RefCell::new(EngineInner {
                peers: HashMap::new(),
            })),
            ctx: Rc::new(PeerContext {
                room_id,
                local_id,
                config,
                runtime,
                factory,
                batcher,
                roster: RefCell::new(Roster::default()),
                muted: Cell::new(false),
                active: Cell::new(true),
            }),
        }
    }

    pub fn room_id(&self) -> RoomId {
        self.ctx.room_id
    }

    pub fn local_id(&self) -> UserId {
        self.ctx.local_id
    }

    pub fn is_active(&self) -> bool {
        self.ctx.active.get()
    }

    fn spawn_peer(&self, remote: UserId) -> PeerHandle {
        let (tx, status) = PeerTask::spawn(self.ctx.clone(), remote);
        PeerHandle { tx, status }
    }

    /// Applies a participant snapshot: departed users are closed, new users
    /// start negotiating, everyone else is re-evaluated.
    pub fn handle_participants(&self, participants: &[Participant]) {
        if !self.is_active() {
            return;
        }
        let present: BTreeSet<UserId> = participants
            .iter()
            .map(|participant| participant.id)
            .filter(|id| *id != self.ctx.local_id)
            .collect();

        {
            let mut inner = self.inner.borrow_mut();
            let departed: Vec<UserId> = inner
                .peers
                .keys()
                .filter(|id| !present.contains(id))
                .copied()
                .collect();
            for id in departed {
                if let Some(handle) = inner.peers.remove(&id) {
                    info!("User {} left room {}", id, self.ctx.room_id);
                    handle.send(PeerEvent::Close);
                }
            }

            for id in present {
                match inner.peers.get(&id) {
                    Some(handle) => handle.send(PeerEvent::Reevaluate),
                    None => {
                        debug!("User {} joined room {}", id, self.ctx.room_id);
                        let handle = self.spawn_peer(id);
                        handle.send(PeerEvent::Start);
                        inner.peers.insert(id, handle);
                    }
                }
            }
        }

        let mut roster = self.ctx.roster.borrow_mut();
        roster.set_participants(participants);
        roster.set_muted(self.ctx.local_id, self.ctx.muted.get());
    }

    /// Routes one relayed event from `sender` to its peer task.
    pub fn handle_signal(&self, sender: UserId, data: &Value) {
        if !self.is_active() || sender == self.ctx.local_id {
            return;
        }
        let event: SignalEvent = match serde_json::from_value(data.clone()) {
            Ok(event) => event,
            Err(e) => {
                warn!("Unreadable signal from user {}: {}", sender, e);
                return;
            }
        };

        let mut inner = self.inner.borrow_mut();
        if !inner.peers.contains_key(&sender) {
            let handle = self.spawn_peer(sender);
            inner.peers.insert(sender, handle);
        }
        if let Some(handle) = inner.peers.get(&sender) {
            handle.send(PeerEvent::Signal(event));
        }
    }

    /// Handles `participants` and `signal` messages of this room. Returns
    /// false for anything else.
    pub fn handle_message(&self, message: &RoomMessage) -> bool {
        if message.room_id() != self.ctx.room_id {
            return false;
        }
        match message {
            RoomMessage::Participants { participants, .. } => {
                self.handle_participants(participants);
                true
            }
            RoomMessage::Signal {
                sender_id, data, ..
            } => {
                self.handle_signal(*sender_id, data);
                true
            }
            RoomMessage::Kicked { .. } => false,
        }
    }

    /// Enables or disables outbound audio on every link, current and future.
    pub fn set_muted(&self, muted: bool) {
        self.ctx.muted.set(muted);
        self.ctx
            .roster
            .borrow_mut()
            .set_muted(self.ctx.local_id, muted);
        for handle in self.inner.borrow().peers.values() {
            handle.send(PeerEvent::SetMuted(muted));
        }
    }

    pub fn is_muted(&self) -> bool {
        self.ctx.muted.get()
    }

    pub fn peers(&self) -> Vec<UserId> {
        let mut peers: Vec<UserId> = self.inner.borrow().peers.keys().copied().collect();
        peers.sort();
        peers
    }

    pub fn peer_status(&self, peer: UserId) -> Option<PeerStatus> {
        self.inner
            .borrow()
            .peers
            .get(&peer)
            .map(|handle| handle.status.borrow().clone())
    }

    pub fn peer_state(&self, peer: UserId) -> Option<PeerState> {
        self.peer_status(peer).map(|status| status.state)
    }

    pub fn unreachable_peers(&self) -> Vec<UserId> {
        let inner = self.inner.borrow();
        let mut peers: Vec<UserId> = inner
            .peers
            .iter()
            .filter(|(_, handle)| handle.status.borrow().unreachable)
            .map(|(id, _)| *id)
            .collect();
        peers.sort();
        peers
    }

    pub fn roster(&self) -> Vec<RosterEntry> {
        self.ctx.roster.borrow().entries().to_vec()
    }

    /// Tears down one peer. Returns false if there was none.
    pub fn close_peer(&self, peer: UserId) -> bool {
        match self.inner.borrow_mut().peers.remove(&peer) {
            Some(handle) => {
                handle.send(PeerEvent::Close);
                true
            }
            None => false,
        }
    }

    /// Closes every peer and drops the room's queued signals.
    pub fn shutdown(&self) {
        if !self.ctx.active.replace(false) {
            return;
        }
        let peers: Vec<PeerHandle> = self
            .inner
            .borrow_mut()
            .peers
            .drain()
            .map(|(_, handle)| handle)
            .collect();
        for handle in &peers {
            handle.send(PeerEvent::Close);
        }
        self.ctx.roster.borrow_mut().clear();
        self.ctx.batcher.cancel_room(self.ctx.room_id);
        info!(
            "Left room {}, closed {} peer(s)",
            self.ctx.room_id,
            peers.len()
        );
    }
}
