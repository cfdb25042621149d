use crate::TransportError;
use async_trait::async_trait;
use huddle_core::{IceServerConfig, Participant, RoomId, RoomSummary, SignalPayload};

/// Delivers one signal request to the relay.
#[async_trait(?Send)]
pub trait SignalTransport {
    async fn send(&self, room_id: RoomId, payload: SignalPayload) -> Result<(), TransportError>;
}

/// Room presence calls of the server API.
#[async_trait(?Send)]
pub trait RoomApi {
    /// Marks the caller present and returns the room with its live participants.
    /// `room` is the numeric id or the slug.
    async fn join(&self, room: &str) -> Result<RoomSummary, TransportError>;

    async fn leave(&self, room_id: RoomId) -> Result<(), TransportError>;

    async fn participants(&self, room_id: RoomId) -> Result<Vec<Participant>, TransportError>;

    async fn ice_servers(&self) -> Result<Vec<IceServerConfig>, TransportError>;
}
