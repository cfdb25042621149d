use crate::push::{Audience, PushChannel, PushError};
use async_trait::async_trait;
use axum::extract::ws::Message;
use dashmap::DashMap;
use huddle_core::{PushFrame, UserId};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

struct Subscriber {
    id: Uuid,
    tx: mpsc::UnboundedSender<Message>,
}

struct PushHubInner {
    subscribers: DashMap<UserId, Vec<Subscriber>>,
}

/// Fan-out of push frames to the WebSocket connections of each user.
/// A user may hold several connections (tabs, devices).
#[derive(Clone)]
pub struct PushHub {
    inner: Arc<PushHubInner>,
}

impl Default for PushHub {
    fn default() -> Self {
        Self::new()
    }
}

impl PushHub {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(PushHubInner {
                subscribers: DashMap::new(),
            }),
        }
    }

    pub fn subscribe(&self, user_id: UserId) -> (Uuid, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();

        self.inner
            .subscribers
            .entry(user_id)
            .or_default()
            .push(Subscriber { id, tx });

        (id, rx)
    }

    pub fn unsubscribe(&self, user_id: UserId, subscription: Uuid) {
        if let Some(mut subs) = self.inner.subscribers.get_mut(&user_id) {
            subs.retain(|sub| sub.id != subscription);
        }
        self.inner
            .subscribers
            .remove_if(&user_id, |_, subs| subs.is_empty());
    }

    pub fn is_connected(&self, user_id: UserId) -> bool {
        self.inner.subscribers.contains_key(&user_id)
    }

    fn deliver(&self, user_id: UserId, text: &str) {
        let Some(subs) = self.inner.subscribers.get(&user_id) else {
            debug!("no push connection for user {}", user_id);
            return;
        };
        for sub in subs.iter() {
            if let Err(e) = sub.tx.send(Message::Text(text.to_owned().into())) {
                warn!("failed to queue push frame for user {}: {:?}", user_id, e);
            }
        }
    }
}

#[async_trait]
impl PushChannel for PushHub {
    async fn publish(
        &self,
        channel: &str,
        data: Value,
        audience: Audience,
    ) -> Result<(), PushError> {
        let frame = PushFrame {
            channel: channel.to_owned(),
            data,
        };
        let text = serde_json::to_string(&frame).map_err(|e| PushError::Encode(e.to_string()))?;

        match audience {
            Audience::Everyone => {
                let users: Vec<UserId> = self
                    .inner
                    .subscribers
                    .iter()
                    .map(|entry| *entry.key())
                    .collect();
                for user_id in users {
                    self.deliver(user_id, &text);
                }
            }
            Audience::Users(users) => {
                for user_id in users {
                    self.deliver(user_id, &text);
                }
            }
        }

        Ok(())
    }
}
