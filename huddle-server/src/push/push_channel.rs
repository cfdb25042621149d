use async_trait::async_trait;
use huddle_core::UserId;
use serde_json::Value;
use thiserror::Error;

/// Who may receive a published message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    /// Every authenticated subscriber.
    Everyone,
    /// Only these users.
    Users(Vec<UserId>),
}

impl Audience {
    pub fn single(user_id: UserId) -> Self {
        Self::Users(vec![user_id])
    }

    pub fn includes(&self, user_id: UserId) -> bool {
        match self {
            Audience::Everyone => true,
            Audience::Users(ids) => ids.contains(&user_id),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum PushError {
    #[error("push message could not be encoded: {0}")]
    Encode(String),
    #[error("push backend unavailable: {0}")]
    Unavailable(String),
}

/// Outbound side of the push transport (WebSocket hub, message bus, ...).
/// Services publish through this trait and never see connections.
#[async_trait]
pub trait PushChannel: Send + Sync {
    async fn publish(&self, channel: &str, data: Value, audience: Audience)
    -> Result<(), PushError>;
}
