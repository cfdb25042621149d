use crate::LinkEvent;
use huddle_core::SignalEvent;

/// Everything a peer's state machine reacts to, in arrival order.
#[derive(Debug)]
pub(crate) enum PeerEvent {
    Start,
    Reevaluate,
    Signal(SignalEvent),
    Link { epoch: u64, event: LinkEvent },
    Timer { seq: u64, kind: TimerKind },
    SetMuted(bool),
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerKind {
    ConnectDeadline,
    OfferRetry,
    Restart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
    Failed,
    Disconnected,
    Timeout,
}
