use crate::directory::{Accounts, Room, RoomDirectory};
use crate::presence::PresenceStore;
use crate::push::{Audience, PushChannel};
use huddle_core::utils::room_channel;
use huddle_core::{Participant, RoomId, RoomMessage, UserId};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Pushes participant snapshots to the subscribers of a room.
///
/// Snapshots go out after every join, leave and kick, and periodically for
/// every occupied room so clients converge once entries expire on their own.
#[derive(Clone)]
pub struct PresenceBroadcaster {
    presence: Arc<dyn PresenceStore>,
    push: Arc<dyn PushChannel>,
    rooms: Arc<dyn RoomDirectory>,
    accounts: Arc<dyn Accounts>,
}

impl PresenceBroadcaster {
    pub fn new(
        presence: Arc<dyn PresenceStore>,
        push: Arc<dyn PushChannel>,
        rooms: Arc<dyn RoomDirectory>,
        accounts: Arc<dyn Accounts>,
    ) -> Self {
        Self {
            presence,
            push,
            rooms,
            accounts,
        }
    }

    /// Current participants. A failing presence backend yields an empty list.
    pub async fn snapshot(&self, room_id: RoomId) -> Vec<Participant> {
        let ids = match self.presence.list(room_id).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("presence of room {} unavailable: {}", room_id, e);
                return Vec::new();
            }
        };
        self.participants(&ids).await
    }

    pub async fn participants(&self, ids: &[UserId]) -> Vec<Participant> {
        if ids.is_empty() {
            return Vec::new();
        }
        self.accounts
            .users(ids)
            .await
            .iter()
            .map(|user| user.participant())
            .collect()
    }

    pub async fn publish_participants(&self, room: &Room) {
        let participants = self.snapshot(room.id).await;
        debug!(
            "publishing {} participants of room {}",
            participants.len(),
            room.id
        );

        let message = RoomMessage::Participants {
            room_id: room.id,
            participants,
        };
        self.send(room, &message, room.audience()).await;
    }

    /// Tells `user_id`, and nobody else, that they were removed.
    pub async fn publish_kick(&self, room: &Room, user_id: UserId) {
        let message = RoomMessage::Kicked { room_id: room.id };
        self.send(room, &message, Audience::single(user_id)).await;
    }

    /// Republishes every occupied room. Presence of rooms that no longer
    /// exist is dropped. Returns the number of rooms published.
    pub async fn sweep(&self) -> usize {
        let active = match self.presence.active_rooms().await {
            Ok(active) => active,
            Err(e) => {
                warn!("presence sweep skipped: {}", e);
                return 0;
            }
        };

        let mut published = 0;
        for room_id in active {
            match self.rooms.room(room_id).await {
                Some(room) => {
                    self.publish_participants(&room).await;
                    published += 1;
                }
                None => {
                    info!("dropping presence of removed room {}", room_id);
                    if let Err(e) = self.presence.clear(room_id).await {
                        warn!("failed to clear presence of room {}: {}", room_id, e);
                    }
                }
            }
        }
        published
    }

    /// Runs [`sweep`](Self::sweep) every `every` until the handle is aborted.
    pub fn spawn_sweep(&self, every: Duration) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let published = this.sweep().await;
                debug!("presence sweep published {} rooms", published);
            }
        })
    }

    async fn send(&self, room: &Room, message: &RoomMessage, audience: Audience) {
        let data = match serde_json::to_value(message) {
            Ok(data) => data,
            Err(e) => {
                error!("failed to encode room message: {}", e);
                return;
            }
        };
        if let Err(e) = self
            .push
            .publish(&room_channel(room.id), data, audience)
            .await
        {
            warn!("failed to publish to room {}: {}", room.id, e);
        }
    }
}
