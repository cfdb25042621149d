use crate::directory::Room;
use crate::push::PushChannel;
use huddle_core::utils::ROOM_INDEX_CHANNEL;
use huddle_core::{DirectoryAction, DirectoryMessage, Participant};
use std::sync::Arc;
use tracing::{info, warn};

/// Announces room lifecycle changes on the room index channel, scoped by
/// the room's visibility.
#[derive(Clone)]
pub struct DirectoryBroadcaster {
    push: Arc<dyn PushChannel>,
}

impl DirectoryBroadcaster {
    pub fn new(push: Arc<dyn PushChannel>) -> Self {
        Self { push }
    }

    pub async fn broadcast(
        &self,
        action: DirectoryAction,
        room: &Room,
        participants: Vec<Participant>,
    ) {
        info!("room {} {:?}", room.id, action);

        let message = DirectoryMessage {
            action,
            room: room.summary(participants),
        };
        let data = match serde_json::to_value(&message) {
            Ok(data) => data,
            Err(e) => {
                warn!("failed to encode directory message: {}", e);
                return;
            }
        };

        if let Err(e) = self
            .push
            .publish(ROOM_INDEX_CHANNEL, data, room.audience())
            .await
        {
            warn!("failed to publish directory change of room {}: {}", room.id, e);
        }
    }
}
