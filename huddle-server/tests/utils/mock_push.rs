use async_trait::async_trait;
use huddle_core::{RoomMessage, UserId};
use huddle_server::{Audience, PushChannel, PushError};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    pub channel: String,
    pub data: Value,
    pub audience: Audience,
}

impl Published {
    pub fn message(&self) -> Option<RoomMessage> {
        serde_json::from_value(self.data.clone()).ok()
    }
}

/// Mock PushChannel that records everything published.
#[derive(Clone, Default)]
pub struct MockPushChannel {
    published: Arc<Mutex<Vec<Published>>>,
    failing: Arc<AtomicBool>,
}

impl MockPushChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following publish fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn all(&self) -> Vec<Published> {
        self.published.lock().await.clone()
    }

    pub async fn clear(&self) {
        self.published.lock().await.clear();
    }

    /// Messages `user_id` would receive.
    pub async fn delivered_to(&self, user_id: UserId) -> Vec<Published> {
        self.published
            .lock()
            .await
            .iter()
            .filter(|p| p.audience.includes(user_id))
            .cloned()
            .collect()
    }

    /// `(sender, data)` of every signal published.
    pub async fn signals(&self) -> Vec<(UserId, Value, Audience)> {
        self.published
            .lock()
            .await
            .iter()
            .filter_map(|p| match p.message() {
                Some(RoomMessage::Signal {
                    sender_id, data, ..
                }) => Some((sender_id, data, p.audience.clone())),
                _ => None,
            })
            .collect()
    }

    /// Participant id lists of every snapshot published, oldest first.
    pub async fn snapshots(&self) -> Vec<Vec<UserId>> {
        self.published
            .lock()
            .await
            .iter()
            .filter_map(|p| match p.message() {
                Some(RoomMessage::Participants { participants, .. }) => {
                    Some(participants.iter().map(|p| p.id).collect())
                }
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl PushChannel for MockPushChannel {
    async fn publish(
        &self,
        channel: &str,
        data: Value,
        audience: Audience,
    ) -> Result<(), PushError> {
        tracing::debug!("[MockPush] publish on {}", channel);

        if self.failing.load(Ordering::SeqCst) {
            return Err(PushError::Unavailable("mock push failure".into()));
        }

        self.published.lock().await.push(Published {
            channel: channel.to_string(),
            data,
            audience,
        });
        Ok(())
    }
}
