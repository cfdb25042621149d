use crate::directory::User;
use async_trait::async_trait;
use dashmap::DashMap;
use huddle_core::UserId;
use std::sync::Arc;

/// Account lookup owned by the host application.
#[async_trait]
pub trait Accounts: Send + Sync {
    async fn authenticate(&self, token: &str) -> Option<User>;

    /// Known users among `ids`, in the order given. Unknown ids are skipped.
    async fn users(&self, ids: &[UserId]) -> Vec<User>;
}

#[derive(Clone, Default)]
pub struct MemoryAccounts {
    tokens: Arc<DashMap<String, UserId>>,
    users: Arc<DashMap<UserId, User>>,
}

impl MemoryAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, token: impl Into<String>, user: User) {
        self.tokens.insert(token.into(), user.id);
        self.users.insert(user.id, user);
    }
}

#[async_trait]
impl Accounts for MemoryAccounts {
    async fn authenticate(&self, token: &str) -> Option<User> {
        let user_id = *self.tokens.get(token)?;
        self.users.get(&user_id).map(|user| user.clone())
    }

    async fn users(&self, ids: &[UserId]) -> Vec<User> {
        ids.iter()
            .filter_map(|id| self.users.get(id).map(|user| user.clone()))
            .collect()
    }
}
