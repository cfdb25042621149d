use crate::LinkError;
use crate::engine::PeerEvent;
use async_trait::async_trait;
use futures::channel::mpsc;
use huddle_core::{IceCandidate, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpKind {
    Offer,
    Answer,
}

/// Connection state reported by the native peer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    LocalCandidate(IceCandidate),
    StateChanged(LinkState),
    /// Normalized RMS of the remote audio, `0.0..=1.0`.
    AudioLevel(f32),
}

/// Sink for native callbacks of one link.
///
/// Every event is tagged with the epoch of the link that produced it, so
/// callbacks still firing on a replaced link are dropped by the peer's queue.
#[derive(Debug, Clone)]
pub struct LinkEvents {
    tx: mpsc::UnboundedSender<PeerEvent>,
    epoch: u64,
}

impl LinkEvents {
    pub(crate) fn new(tx: mpsc::UnboundedSender<PeerEvent>, epoch: u64) -> Self {
        Self { tx, epoch }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Returns false once the peer has been closed.
    pub fn emit(&self, event: LinkEvent) -> bool {
        self.tx
            .unbounded_send(PeerEvent::Link {
                epoch: self.epoch,
                event,
            })
            .is_ok()
    }
}

/// One native peer connection to a remote user.
#[async_trait(?Send)]
pub trait PeerLink {
    /// Creates an offer and applies it as the local description.
    async fn create_offer(&self) -> Result<String, LinkError>;

    /// Creates an answer to the applied remote offer and applies it locally.
    async fn create_answer(&self) -> Result<String, LinkError>;

    async fn set_remote_description(&self, kind: SdpKind, sdp: &str) -> Result<(), LinkError>;

    /// Drops a pending local offer. Links without rollback return
    /// [`LinkError::Unsupported`] and get replaced instead.
    async fn rollback(&self) -> Result<(), LinkError>;

    async fn add_ice_candidate(&self, candidate: &IceCandidate) -> Result<(), LinkError>;

    async fn set_audio_enabled(&self, enabled: bool) -> Result<(), LinkError>;

    async fn close(&self);
}

#[async_trait(?Send)]
pub trait LinkFactory {
    async fn create(&self, peer: UserId, events: LinkEvents)
    -> Result<Box<dyn PeerLink>, LinkError>;
}
