use crate::presence::{PresenceError, PresenceStore};
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use huddle_core::{RoomId, UserId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// In-process presence store. Expired entries are pruned lazily on read.
#[derive(Clone)]
pub struct MemoryPresenceStore {
    rooms: Arc<DashMap<RoomId, HashMap<UserId, Instant>>>,
    /// Rooms emptied by expiry that no sweep has reported yet.
    lapsed: Arc<DashSet<RoomId>>,
    ttl: Duration,
}

impl MemoryPresenceStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            lapsed: Arc::new(DashSet::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Drops lapsed entries of one room and returns the survivors.
    fn live_members(&self, room_id: RoomId) -> Vec<UserId> {
        let now = Instant::now();

        let Some(mut entries) = self.rooms.get_mut(&room_id) else {
            return Vec::new();
        };
        let before = entries.len();
        entries.retain(|user_id, expires_at| {
            let live = *expires_at > now;
            if !live {
                debug!("presence of user {} in room {} lapsed", user_id, room_id);
            }
            live
        });

        let mut members: Vec<UserId> = entries.keys().copied().collect();
        let empty = entries.is_empty();
        let pruned = entries.len() < before;
        drop(entries);

        if empty {
            self.rooms.remove_if(&room_id, |_, entries| entries.is_empty());
            if pruned {
                self.lapsed.insert(room_id);
            }
        }

        members.sort();
        members
    }
}

#[async_trait]
impl PresenceStore for MemoryPresenceStore {
    async fn add(&self, room_id: RoomId, user_id: UserId) -> Result<(), PresenceError> {
        let expires_at = Instant::now() + self.ttl;
        self.rooms
            .entry(room_id)
            .or_default()
            .insert(user_id, expires_at);
        Ok(())
    }

    async fn add_capped(
        &self,
        room_id: RoomId,
        user_id: UserId,
        cap: usize,
    ) -> Result<bool, PresenceError> {
        let now = Instant::now();
        // The entry guard holds the room's shard lock for the whole check.
        let mut entries = self.rooms.entry(room_id).or_default();
        let renewal = entries.get(&user_id).is_some_and(|expires_at| *expires_at > now);
        let live = entries.values().filter(|expires_at| **expires_at > now).count();
        if !renewal && live >= cap {
            return Ok(false);
        }
        entries.insert(user_id, now + self.ttl);
        Ok(true)
    }

    async fn remove(&self, room_id: RoomId, user_id: UserId) -> Result<(), PresenceError> {
        if let Some(mut entries) = self.rooms.get_mut(&room_id) {
            entries.remove(&user_id);
        }
        self.rooms.remove_if(&room_id, |_, entries| entries.is_empty());
        Ok(())
    }

    async fn list(&self, room_id: RoomId) -> Result<Vec<UserId>, PresenceError> {
        Ok(self.live_members(room_id))
    }

    async fn clear(&self, room_id: RoomId) -> Result<(), PresenceError> {
        self.rooms.remove(&room_id);
        self.lapsed.remove(&room_id);
        Ok(())
    }

    async fn active_rooms(&self) -> Result<Vec<RoomId>, PresenceError> {
        let candidates: Vec<RoomId> = self.rooms.iter().map(|entry| *entry.key()).collect();

        let mut active: Vec<RoomId> = candidates
            .into_iter()
            .filter(|room_id| !self.live_members(*room_id).is_empty())
            .collect();

        let lapsed: Vec<RoomId> = self.lapsed.iter().map(|room_id| *room_id).collect();
        for room_id in lapsed {
            self.lapsed.remove(&room_id);
            if !active.contains(&room_id) {
                active.push(room_id);
            }
        }
        active.sort();
        Ok(active)
    }
}
