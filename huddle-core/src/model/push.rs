use crate::model::room::{RoomId, RoomSummary};
use crate::model::user::{Participant, UserId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Messages published on a room channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoomMessage {
    Participants {
        room_id: RoomId,
        participants: Vec<Participant>,
    },
    /// `data` is the relayed event object, untouched.
    Signal {
        room_id: RoomId,
        sender_id: UserId,
        data: Value,
    },
    Kicked {
        room_id: RoomId,
    },
}

impl RoomMessage {
    pub fn room_id(&self) -> RoomId {
        match self {
            RoomMessage::Participants { room_id, .. }
            | RoomMessage::Signal { room_id, .. }
            | RoomMessage::Kicked { room_id } => *room_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectoryAction {
    Created,
    Updated,
    Destroyed,
}

/// Message published on the room index channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryMessage {
    #[serde(rename = "type")]
    pub action: DirectoryAction,
    pub room: RoomSummary,
}

/// One frame on a subscriber's push stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushFrame {
    pub channel: String,
    pub data: Value,
}
