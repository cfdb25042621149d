mod payload;
mod push;
mod room;
mod signaling;
mod user;

pub use payload::{EventData, NormalizeError, SignalGroup, SignalPayload};
pub use push::{DirectoryAction, DirectoryMessage, PushFrame, RoomMessage};
pub use room::{RoomId, RoomSummary};
pub use signaling::{IceCandidate, IceServerConfig, SignalEvent};
pub use user::{Participant, UserId};
