use crate::directory::{Room, RoomDraft};
use async_trait::async_trait;
use dashmap::DashMap;
use huddle_core::RoomId;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Persistent room registry owned by the room-management side.
#[async_trait]
pub trait RoomDirectory: Send + Sync {
    async fn room(&self, room_id: RoomId) -> Option<Room>;

    /// All rooms in creation order.
    async fn rooms(&self) -> Vec<Room>;

    async fn create(&self, draft: RoomDraft) -> Room;

    async fn remove(&self, room_id: RoomId) -> Option<Room>;

    /// Looks a room up by numeric id first, then by slug.
    async fn find(&self, key: &str) -> Option<Room> {
        if let Ok(room_id) = key.parse::<RoomId>()
            && let Some(room) = self.room(room_id).await
        {
            return Some(room);
        }
        self.rooms().await.into_iter().find(|room| room.slug == key)
    }
}

#[derive(Clone, Default)]
pub struct MemoryRoomDirectory {
    rooms: Arc<DashMap<RoomId, Room>>,
    next_id: Arc<AtomicU64>,
}

impl MemoryRoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces a room wholesale, as an update from the management side would.
    pub fn update(&self, room: Room) {
        self.rooms.insert(room.id, room);
    }
}

#[async_trait]
impl RoomDirectory for MemoryRoomDirectory {
    async fn room(&self, room_id: RoomId) -> Option<Room> {
        self.rooms.get(&room_id).map(|room| room.clone())
    }

    async fn rooms(&self) -> Vec<Room> {
        let mut rooms: Vec<Room> = self.rooms.iter().map(|entry| entry.value().clone()).collect();
        rooms.sort_by_key(|room| room.id);
        rooms
    }

    async fn create(&self, draft: RoomDraft) -> Room {
        let id = RoomId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let mut room = Room::from_draft(id, draft);

        if self.rooms.iter().any(|entry| entry.slug == room.slug) {
            room.slug = format!("{}-{}", room.slug, id);
        }

        self.rooms.insert(id, room.clone());
        room
    }

    async fn remove(&self, room_id: RoomId) -> Option<Room> {
        self.rooms.remove(&room_id).map(|(_, room)| room)
    }
}
