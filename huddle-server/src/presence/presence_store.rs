use async_trait::async_trait;
use huddle_core::{RoomId, UserId};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum PresenceError {
    #[error("presence backend unavailable: {0}")]
    Unavailable(String),
}

/// Who is currently in which room.
///
/// Every entry carries a time-to-live; an entry that is not refreshed by
/// another `add` before it lapses disappears on its own. Rooms are
/// independent of each other.
#[async_trait]
pub trait PresenceStore: Send + Sync {
    /// Inserts or refreshes the entry and restarts its TTL.
    async fn add(&self, room_id: RoomId, user_id: UserId) -> Result<(), PresenceError>;

    async fn remove(&self, room_id: RoomId, user_id: UserId) -> Result<(), PresenceError>;

    /// Live members of the room. Order is unspecified.
    async fn list(&self, room_id: RoomId) -> Result<Vec<UserId>, PresenceError>;

    async fn clear(&self, room_id: RoomId) -> Result<(), PresenceError>;

    /// Rooms holding at least one live entry, plus rooms whose last entry
    /// lapsed since the previous call.
    async fn active_rooms(&self) -> Result<Vec<RoomId>, PresenceError>;

    /// Like [`add`](Self::add), unless the room already holds `cap` other
    /// live members. Renewals always succeed. Returns false when full.
    ///
    /// Stores that can check and insert atomically should override this.
    async fn add_capped(
        &self,
        room_id: RoomId,
        user_id: UserId,
        cap: usize,
    ) -> Result<bool, PresenceError> {
        let present = self.list(room_id).await?;
        if !present.contains(&user_id) && present.len() >= cap {
            return Ok(false);
        }
        self.add(room_id, user_id).await?;
        Ok(true)
    }

    async fn contains(&self, room_id: RoomId, user_id: UserId) -> Result<bool, PresenceError> {
        Ok(self.list(room_id).await?.contains(&user_id))
    }
}
