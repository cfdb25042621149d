use crate::engine::TimerKind;
use crate::{PeerLink, Timer};
use huddle_core::IceCandidate;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalingState {
    Stable,
    HaveLocalOffer,
    HaveRemoteOffer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Connecting(SignalingState),
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// Snapshot of one peer, refreshed after every event the peer handles.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerStatus {
    pub state: PeerState,
    pub unreachable: bool,
    pub restart_attempts: u32,
    pub offer_attempts: u32,
    pub queued_candidates: usize,
    /// Increments each time the link is replaced.
    pub link_epoch: u64,
}

impl Default for PeerStatus {
    fn default() -> Self {
        Self {
            state: PeerState::Connecting(SignalingState::Stable),
            unreachable: false,
            restart_attempts: 0,
            offer_attempts: 0,
            queued_candidates: 0,
            link_epoch: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Health {
    Pending,
    Connected,
    Disconnected,
    Failed,
}

pub(crate) struct ArmedTimer {
    pub(crate) seq: u64,
    pub(crate) _timer: Timer,
}

/// Negotiation state of one remote user, owned by that user's peer task.
pub(crate) struct PeerConnectionRecord {
    pub(crate) link: Option<Box<dyn PeerLink>>,
    pub(crate) epoch: u64,
    pub(crate) signaling: SignalingState,
    pub(crate) health: Health,
    /// Remote candidates that arrived before the remote description.
    pub(crate) pending_candidates: VecDeque<IceCandidate>,
    pub(crate) remote_description_set: bool,
    /// `a=ice-ufrag` of the applied remote description, when it carries one.
    pub(crate) remote_ufrag: Option<String>,
    pub(crate) negotiated: bool,
    pub(crate) started: bool,
    pub(crate) restart_attempts: u32,
    pub(crate) offer_attempts: u32,
    pub(crate) offers_exhausted: bool,
    pub(crate) unreachable: bool,
    pub(crate) closed: bool,
    pub(crate) connect_deadline: Option<ArmedTimer>,
    pub(crate) offer_retry: Option<ArmedTimer>,
    pub(crate) restart: Option<ArmedTimer>,
}

impl PeerConnectionRecord {
    pub(crate) fn new() -> Self {
        Self {
            link: None,
            epoch: 0,
            signaling: SignalingState::Stable,
            health: Health::Pending,
            pending_candidates: VecDeque::new(),
            remote_description_set: false,
            remote_ufrag: None,
            negotiated: false,
            started: false,
            restart_attempts: 0,
            offer_attempts: 0,
            offers_exhausted: false,
            unreachable: false,
            closed: false,
            connect_deadline: None,
            offer_retry: None,
            restart: None,
        }
    }

    pub(crate) fn timer_slot(&mut self, kind: TimerKind) -> &mut Option<ArmedTimer> {
        match kind {
            TimerKind::ConnectDeadline => &mut self.connect_deadline,
            TimerKind::OfferRetry => &mut self.offer_retry,
            TimerKind::Restart => &mut self.restart,
        }
    }

    /// Clears the slot if `seq` is the timer currently armed in it.
    /// Returns false for timers that were re-armed or cancelled meanwhile.
    pub(crate) fn take_timer(&mut self, kind: TimerKind, seq: u64) -> bool {
        let slot = self.timer_slot(kind);
        if slot.as_ref().is_some_and(|armed| armed.seq == seq) {
            *slot = None;
            true
        } else {
            false
        }
    }

    pub(crate) fn clear_timers(&mut self) {
        self.connect_deadline = None;
        self.offer_retry = None;
        self.restart = None;
    }

    pub(crate) fn state(&self) -> PeerState {
        if self.closed {
            return PeerState::Closed;
        }
        match self.health {
            Health::Pending => PeerState::Connecting(self.signaling),
            Health::Connected => PeerState::Connected,
            Health::Disconnected => PeerState::Disconnected,
            Health::Failed => PeerState::Failed,
        }
    }

    pub(crate) fn status(&self) -> PeerStatus {
        PeerStatus {
            state: self.state(),
            unreachable: self.unreachable,
            restart_attempts: self.restart_attempts,
            offer_attempts: self.offer_attempts,
            queued_candidates: self.pending_candidates.len(),
            link_epoch: self.epoch,
        }
    }
}
