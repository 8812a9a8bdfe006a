//! InMemory User Repository 実装

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{RepositoryError, UserId, UserRecord, UserRepository};

/// インメモリ User Repository 実装（表示名の解決のみ）
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<UserId, UserRecord>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, user: UserRecord) {
        self.users.write().await.insert(user.id.clone(), user);
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, user_id: &UserId) -> Result<Option<UserRecord>, RepositoryError> {
        Ok(self.users.read().await.get(user_id).cloned())
    }
}
