use crate::model::RoomId;

pub const DEFAULT_STUN_ADDR: &str = "stun:stun.l.google.com:19302";
pub const DEFAULT_STUN_ADDR_2: &str = "stun:stun1.l.google.com:19302";
pub const DEFAULT_STUN_ADDR_3: &str = "stun:global.stun.twilio.com:3478?transport=udp";
pub const DEFAULT_STUN_ADDR_4: &str = "stun:stun.cloudflare.com:3478";

/// Push channel carrying room create/update/destroy notifications.
pub const ROOM_INDEX_CHANNEL: &str = "/rooms/index";

const ROOM_CHANNEL_PREFIX: &str = "/rooms";

/// Push channel of a single room (participant snapshots, signals, kicks).
pub fn room_channel(room_id: RoomId) -> String {
    format!("{}/{}", ROOM_CHANNEL_PREFIX, room_id)
}
