use crate::broadcast::{DirectoryBroadcaster, PresenceBroadcaster};
use crate::directory::{Accounts, Room, RoomDirectory, RoomDraft, User};
use crate::error::{Error, Result};
use crate::presence::PresenceStore;
use crate::push::PushChannel;
use crate::relay::SignalRelay;
use huddle_core::{
    DirectoryAction, IceServerConfig, Participant, RoomId, RoomSummary, UserId,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

#[derive(Debug, Clone)]
pub struct HuddleSettings {
    /// Cap for rooms without their own `max_participants`.
    pub default_max_participants: u32,
    pub ice_servers: Vec<IceServerConfig>,
}

impl Default for HuddleSettings {
    fn default() -> Self {
        Self {
            default_max_participants: 25,
            ice_servers: Vec::new(),
        }
    }
}

struct HuddleInner {
    presence: Arc<dyn PresenceStore>,
    rooms: Arc<dyn RoomDirectory>,
    accounts: Arc<dyn Accounts>,
    relay: SignalRelay,
    broadcaster: PresenceBroadcaster,
    directory: DirectoryBroadcaster,
    settings: HuddleSettings,
}

/// Room presence and signaling service. Every request handler goes through
/// this type; it owns no transport and can be instantiated freely.
#[derive(Clone)]
pub struct Huddle {
    inner: Arc<HuddleInner>,
}

impl Huddle {
    pub fn new(
        presence: Arc<dyn PresenceStore>,
        push: Arc<dyn PushChannel>,
        rooms: Arc<dyn RoomDirectory>,
        accounts: Arc<dyn Accounts>,
        settings: HuddleSettings,
    ) -> Self {
        let relay = SignalRelay::new(presence.clone(), push.clone());
        let broadcaster = PresenceBroadcaster::new(
            presence.clone(),
            push.clone(),
            rooms.clone(),
            accounts.clone(),
        );
        let directory = DirectoryBroadcaster::new(push);

        Self {
            inner: Arc::new(HuddleInner {
                presence,
                rooms,
                accounts,
                relay,
                broadcaster,
                directory,
                settings,
            }),
        }
    }

    pub fn broadcaster(&self) -> &PresenceBroadcaster {
        &self.inner.broadcaster
    }

    pub fn ice_servers(&self) -> Vec<IceServerConfig> {
        self.inner.settings.ice_servers.clone()
    }

    pub async fn authenticate(&self, token: &str) -> Result<User> {
        self.inner
            .accounts
            .authenticate(token)
            .await
            .ok_or(Error::Unauthenticated)
    }

    /// Resolves a room by id or slug.
    pub async fn room(&self, key: &str) -> Result<Room> {
        self.inner.rooms.find(key).await.ok_or(Error::NotFound)
    }

    pub async fn visible_rooms(&self, user: &User) -> Vec<RoomSummary> {
        let mut visible = Vec::new();
        for room in self.inner.rooms.rooms().await {
            if room.can_see(user) {
                let participants = self.inner.broadcaster.snapshot(room.id).await;
                visible.push(room.summary(participants));
            }
        }
        visible
    }

    pub async fn show(&self, user: &User, key: &str) -> Result<RoomSummary> {
        let room = self.room(key).await?;
        if !room.can_see(user) {
            return Err(Error::Forbidden("see this room"));
        }
        let participants = self.inner.broadcaster.snapshot(room.id).await;
        Ok(room.summary(participants))
    }

    /// Marks the caller present, or renews their presence. Also the heartbeat.
    pub async fn join(&self, user: &User, key: &str) -> Result<RoomSummary> {
        let room = self.joinable(user, key).await?;

        let cap = room
            .max_participants
            .unwrap_or(self.inner.settings.default_max_participants) as usize;
        if !self.inner.presence.add_capped(room.id, user.id, cap).await? {
            info!("user {} rejected from full room {}", user.id, room.id);
            return Err(Error::RoomFull);
        }

        self.inner.broadcaster.publish_participants(&room).await;

        let participants = self.inner.broadcaster.snapshot(room.id).await;
        Ok(room.summary(participants))
    }

    pub async fn leave(&self, user: &User, key: &str) -> Result<()> {
        let room = self.joinable(user, key).await?;
        self.inner.presence.remove(room.id, user.id).await?;
        self.inner.broadcaster.publish_participants(&room).await;
        Ok(())
    }

    pub async fn participants(&self, user: &User, key: &str) -> Result<Vec<Participant>> {
        let room = self.joinable(user, key).await?;
        let ids = self.inner.presence.list(room.id).await?;
        Ok(self.inner.broadcaster.participants(&ids).await)
    }

    /// Relays a signal payload from the caller. Returns the delivered count.
    pub async fn signal(&self, user: &User, key: &str, payload: &Value) -> Result<usize> {
        let room = self.joinable(user, key).await?;
        self.inner.relay.publish(&room, user.id, payload).await
    }

    pub async fn kick(&self, actor: &User, key: &str, target: UserId) -> Result<()> {
        let room = self.room(key).await?;
        if !room.can_manage(actor) {
            return Err(Error::Forbidden("manage this room"));
        }

        info!("user {} kicked {} from room {}", actor.id, target, room.id);
        self.inner.presence.remove(room.id, target).await?;
        self.inner.broadcaster.publish_kick(&room, target).await;
        self.inner.broadcaster.publish_participants(&room).await;
        Ok(())
    }

    pub async fn room_created(&self, room: &Room) {
        self.inner
            .directory
            .broadcast(DirectoryAction::Created, room, Vec::new())
            .await;
    }

    pub async fn room_updated(&self, room: &Room) {
        let participants = self.inner.broadcaster.snapshot(room.id).await;
        self.inner
            .directory
            .broadcast(DirectoryAction::Updated, room, participants)
            .await;
    }

    /// Drops a room from the directory, clears its presence and announces it.
    pub async fn room_destroyed(&self, room_id: RoomId) -> Result<()> {
        let room = self.inner.rooms.remove(room_id).await.ok_or(Error::NotFound)?;
        self.inner.presence.clear(room_id).await?;
        self.inner
            .directory
            .broadcast(DirectoryAction::Destroyed, &room, Vec::new())
            .await;
        Ok(())
    }

    /// Creates a room and announces it.
    pub async fn create_room(&self, draft: RoomDraft) -> Room {
        let room = self.inner.rooms.create(draft).await;
        self.room_created(&room).await;
        room
    }

    /// Creates a public room named `name` when the directory is empty.
    pub async fn seed_default_room(&self, name: &str) -> Option<Room> {
        if !self.inner.rooms.rooms().await.is_empty() {
            return None;
        }
        info!("seeding default room '{}'", name);
        let room = self
            .create_room(RoomDraft {
                name: name.to_string(),
                description: Some("Drop in and say hi.".into()),
                public: true,
                ..Default::default()
            })
            .await;
        Some(room)
    }

    pub fn spawn_sweep(&self, every: Duration) -> JoinHandle<()> {
        self.inner.broadcaster.spawn_sweep(every)
    }

    async fn joinable(&self, user: &User, key: &str) -> Result<Room> {
        let room = self.room(key).await?;
        if !room.can_join(user) {
            return Err(Error::Forbidden("join this room"));
        }
        Ok(room)
    }
}
