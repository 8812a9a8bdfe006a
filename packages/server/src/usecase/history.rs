//! UseCase: メッセージ履歴の取得

use std::{collections::HashMap, sync::Arc};

use crate::domain::{
    HistoryQuery, MessageRecord, MessageRepository, RoomId, RoomRepository, UserId, UserRecord,
    UserRepository,
};

use super::error::HistoryError;

/// 投稿者を解決済みのメッセージ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub message: MessageRecord,
    /// 削除済みユーザーなどで解決できなければ `None`
    pub author: Option<UserRecord>,
}

/// メッセージ履歴取得のユースケース
pub struct MessageHistoryUseCase {
    room_repository: Arc<dyn RoomRepository>,
    message_repository: Arc<dyn MessageRepository>,
    user_repository: Arc<dyn UserRepository>,
}

impl MessageHistoryUseCase {
    pub fn new(
        room_repository: Arc<dyn RoomRepository>,
        message_repository: Arc<dyn MessageRepository>,
        user_repository: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            room_repository,
            message_repository,
            user_repository,
        }
    }

    /// ルームの履歴を古い順に返す
    pub async fn execute(
        &self,
        room_id: &RoomId,
        query: HistoryQuery,
    ) -> Result<Vec<HistoryEntry>, HistoryError> {
        if self.room_repository.find_by_id(room_id).await?.is_none() {
            return Err(HistoryError::RoomNotFound(room_id.to_string()));
        }
        let messages = self.message_repository.find_by_room(room_id, query).await?;

        let mut authors: HashMap<UserId, Option<UserRecord>> = HashMap::new();
        for message in &messages {
            if authors.contains_key(&message.user_id) {
                continue;
            }
            let author = match self.user_repository.find_by_id(&message.user_id).await {
                Ok(author) => author,
                Err(e) => {
                    tracing::warn!(user_id = %message.user_id, "author lookup failed: {}", e);
                    None
                }
            };
            authors.insert(message.user_id.clone(), author);
        }

        Ok(messages
            .into_iter()
            .map(|message| {
                let author = authors.get(&message.user_id).cloned().flatten();
                HistoryEntry { message, author }
            })
            .collect())
    }
}
