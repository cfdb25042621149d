use crate::config::ServerConfig;
use crate::directory::{MemoryAccounts, MemoryRoomDirectory, RoomDraft, User};
use crate::huddle::{Huddle, HuddleSettings};
use crate::presence::MemoryPresenceStore;
use crate::push::PushHub;
use huddle_core::UserId;
use std::sync::Arc;
use tracing::info;

/// Shared state of the HTTP layer.
#[derive(Clone)]
pub struct AppState {
    pub huddle: Huddle,
    pub hub: PushHub,
}

impl AppState {
    pub fn new(huddle: Huddle, hub: PushHub) -> Self {
        Self { huddle, hub }
    }

    /// Wires the in-memory collaborators from `config` and seeds its
    /// accounts and rooms.
    pub async fn from_config(config: &ServerConfig) -> Self {
        let hub = PushHub::new();
        let presence = MemoryPresenceStore::new(config.presence.ttl());
        let rooms = MemoryRoomDirectory::new();
        let accounts = MemoryAccounts::new();

        for account in &config.accounts {
            accounts.insert(
                account.token.clone(),
                User {
                    id: UserId(account.id),
                    username: account.username.clone(),
                    name: account.name.clone(),
                    avatar_template: account.avatar_template.clone(),
                    staff: account.staff,
                },
            );
        }

        let huddle = Huddle::new(
            Arc::new(presence),
            Arc::new(hub.clone()),
            Arc::new(rooms),
            Arc::new(accounts),
            HuddleSettings {
                default_max_participants: config.rooms.default_max_participants,
                ice_servers: config.effective_ice_servers(),
            },
        );

        for room in &config.static_rooms {
            let created = huddle
                .create_room(RoomDraft {
                    name: room.name.clone(),
                    slug: room.slug.clone(),
                    description: room.description.clone(),
                    public: room.public,
                    max_participants: room.max_participants,
                    creator_id: room.creator.map(UserId),
                    member_ids: room.members.iter().copied().map(UserId).collect(),
                    moderator_ids: room.moderators.iter().copied().map(UserId).collect(),
                })
                .await;
            info!("configured room {} ({})", created.id, created.slug);
        }

        if config.rooms.seed_default_room {
            huddle
                .seed_default_room(&config.rooms.default_room_name)
                .await;
        }

        Self { huddle, hub }
    }
}
