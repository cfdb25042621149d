use crate::directory::Room;
use crate::error::{Error, Result};
use crate::presence::PresenceStore;
use crate::push::{Audience, PushChannel};
use huddle_core::utils::room_channel;
use huddle_core::{RoomMessage, SignalPayload, UserId};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Forwards signaling events between participants of a room.
///
/// Every event goes to exactly one recipient. The relay never inspects SDP
/// or candidates beyond the event fields it forwards.
#[derive(Clone)]
pub struct SignalRelay {
    presence: Arc<dyn PresenceStore>,
    push: Arc<dyn PushChannel>,
}

impl SignalRelay {
    pub fn new(presence: Arc<dyn PresenceStore>, push: Arc<dyn PushChannel>) -> Self {
        Self { presence, push }
    }

    /// Normalizes `raw`, checks every recipient and publishes each event to
    /// its recipient. Nothing is published unless the whole payload is valid.
    /// Returns the number of delivered events.
    pub async fn publish(&self, room: &Room, sender_id: UserId, raw: &Value) -> Result<usize> {
        let payload = SignalPayload::from_value(raw)?;
        let deliveries = payload.into_deliveries();

        let known = self.known_participants(room).await?;
        if let Some((unknown, _)) = deliveries.iter().find(|(to, _)| !known.contains(to)) {
            warn!(
                "user {} signaled unknown recipient {} in room {}",
                sender_id, unknown, room.id
            );
            return Err(Error::Validation(format!(
                "recipient {} is not a participant of this room",
                unknown
            )));
        }

        let channel = room_channel(room.id);
        let count = deliveries.len();

        for (recipient_id, event) in deliveries {
            debug!(
                "relaying {} from {} to {} in room {}",
                event.kind().unwrap_or("event"),
                sender_id,
                recipient_id,
                room.id
            );

            let message = RoomMessage::Signal {
                room_id: room.id,
                sender_id,
                data: event.into_value(),
            };
            let data = serde_json::to_value(&message)
                .map_err(|e| Error::Validation(format!("unencodable signal: {}", e)))?;

            self.push
                .publish(&channel, data, Audience::single(recipient_id))
                .await?;
        }

        Ok(count)
    }

    async fn known_participants(&self, room: &Room) -> Result<BTreeSet<UserId>> {
        let mut known: BTreeSet<UserId> = self.presence.list(room.id).await?.into_iter().collect();
        known.extend(room.member_ids.iter().copied());
        Ok(known)
    }
}
