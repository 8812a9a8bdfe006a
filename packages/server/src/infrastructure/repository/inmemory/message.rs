//! InMemory Message Repository 実装
//!
//! ID（UUID v4）とタイムスタンプはこのリポジトリが採番する。
//! ルームごとに挿入順（= 時刻順）で保持する。

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chatroom_shared::time::Clock;
use tokio::sync::RwLock;

use crate::domain::{
    HistoryQuery, MessageRecord, MessageRepository, NewMessage, RepositoryError, RoomId,
};

/// インメモリ Message Repository 実装
pub struct InMemoryMessageRepository {
    messages: RwLock<HashMap<RoomId, Vec<MessageRecord>>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryMessageRepository {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            messages: RwLock::new(HashMap::new()),
            clock,
        }
    }

    pub async fn count(&self, room_id: &RoomId) -> usize {
        self.messages
            .read()
            .await
            .get(room_id)
            .map_or(0, |messages| messages.len())
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn create(&self, message: NewMessage) -> Result<MessageRecord, RepositoryError> {
        let record = MessageRecord {
            id: uuid::Uuid::new_v4().to_string(),
            room_id: message.room_id,
            user_id: message.user_id,
            content: message.content.into_string(),
            kind: message.kind,
            created_at: self.clock.now(),
        };
        let mut messages = self.messages.write().await;
        messages
            .entry(record.room_id.clone())
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn find_by_room(
        &self,
        room_id: &RoomId,
        query: HistoryQuery,
    ) -> Result<Vec<MessageRecord>, RepositoryError> {
        let messages = self.messages.read().await;
        let Some(room_messages) = messages.get(room_id) else {
            return Ok(Vec::new());
        };

        // before より古いものから新しい順に limit 件を取り、古い順に並べ直す
        let mut page: Vec<MessageRecord> = room_messages
            .iter()
            .rev()
            .filter(|message| query.before.is_none_or(|before| message.created_at < before))
            .take(query.limit)
            .cloned()
            .collect();
        page.reverse();
        Ok(page)
    }
}
