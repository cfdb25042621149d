//! Server configuration.
//!
//! Loaded from a TOML file at startup. Every field has a default, so the
//! server runs without any configuration file at all.

use huddle_core::IceServerConfig;
use huddle_core::utils::{DEFAULT_STUN_ADDR, DEFAULT_STUN_ADDR_2};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Allowed range for a room participant cap.
pub const PARTICIPANT_CAP_RANGE: std::ops::RangeInclusive<u32> = 2..=50;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub http: HttpSettings,
    pub presence: PresenceSettings,
    pub rooms: RoomSettings,
    pub ice_servers: Vec<IceServerConfig>,
    pub logging: LoggingSettings,
    /// Static accounts for the in-memory account store (`[[account]]`).
    #[serde(rename = "account")]
    pub accounts: Vec<AccountConfig>,
    /// Rooms created at startup (`[[room]]`).
    #[serde(rename = "room")]
    pub static_rooms: Vec<RoomConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub bind: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceSettings {
    /// Lifetime of a presence entry without a renewing join.
    pub ttl_secs: u64,
    /// Period of the participant snapshot sweep.
    pub sweep_interval_secs: u64,
}

impl Default for PresenceSettings {
    fn default() -> Self {
        Self {
            ttl_secs: 60,
            sweep_interval_secs: 60,
        }
    }
}

impl PresenceSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomSettings {
    /// Cap applied to rooms that do not set their own.
    pub default_max_participants: u32,
    /// Create a public room when the directory starts out empty.
    pub seed_default_room: bool,
    pub default_room_name: String,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            default_max_participants: 25,
            seed_default_room: true,
            default_room_name: "Watercooler".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// "trace", "debug", "info", "warn" or "error"
    pub level: String,
    /// "text" or "json"
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    pub token: String,
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_template: Option<String>,
    #[serde(default)]
    pub staff: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_public")]
    pub public: bool,
    #[serde(default)]
    pub max_participants: Option<u32>,
    #[serde(default)]
    pub creator: Option<u64>,
    #[serde(default)]
    pub members: Vec<u64>,
    #[serde(default)]
    pub moderators: Vec<u64>,
}

fn default_public() -> bool {
    true
}

impl ServerConfig {
    /// Loads the configuration from a TOML file, falling back to defaults
    /// when the file does not exist.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let config: Self = toml::from_str(&content)
                    .map_err(|e| anyhow::anyhow!("invalid configuration in '{path}': {e}"))?;
                config.validate()?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = path, "configuration file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!("cannot read configuration '{path}': {e}")),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.presence.ttl_secs == 0 {
            anyhow::bail!("presence.ttl_secs must be positive");
        }
        if self.presence.sweep_interval_secs == 0 {
            anyhow::bail!("presence.sweep_interval_secs must be positive");
        }
        if !PARTICIPANT_CAP_RANGE.contains(&self.rooms.default_max_participants) {
            anyhow::bail!(
                "rooms.default_max_participants must be within {:?}",
                PARTICIPANT_CAP_RANGE
            );
        }
        for room in &self.static_rooms {
            if let Some(cap) = room.max_participants
                && !PARTICIPANT_CAP_RANGE.contains(&cap)
            {
                anyhow::bail!(
                    "room '{}': max_participants must be within {:?}",
                    room.name,
                    PARTICIPANT_CAP_RANGE
                );
            }
        }
        Ok(())
    }

    /// Configured ICE servers, or the public STUN set when none are given.
    pub fn effective_ice_servers(&self) -> Vec<IceServerConfig> {
        if !self.ice_servers.is_empty() {
            return self.ice_servers.clone();
        }
        vec![IceServerConfig {
            urls: vec![DEFAULT_STUN_ADDR.into(), DEFAULT_STUN_ADDR_2.into()],
            username: None,
            credential: None,
        }]
    }
}
