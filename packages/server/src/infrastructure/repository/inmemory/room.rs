//! InMemory Room Repository 実装
//!
//! ドメイン層が定義する RoomRepository trait の具体的な実装。
//! HashMap をインメモリ DB として使用します。
//! アクセスコードは Argon2id のハッシュとしてのみ保持し、外へは出さない。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    domain::{RepositoryError, RoomId, RoomRecord, RoomRepository, RoomStatus},
    infrastructure::auth::access_code::{hash_access_code, verify_access_code},
};

/// 保存されたルーム（レコード + アクセスコードのハッシュ）
#[derive(Debug, Clone)]
struct StoredRoom {
    record: RoomRecord,
    access_code_hash: Option<String>,
}

/// インメモリ Room Repository 実装
#[derive(Default)]
pub struct InMemoryRoomRepository {
    rooms: RwLock<HashMap<RoomId, StoredRoom>>,
}

impl InMemoryRoomRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// ルームを保存する（平文のアクセスコードはここでハッシュ化する）
    pub async fn insert(
        &self,
        mut record: RoomRecord,
        access_code: Option<String>,
    ) -> Result<RoomRecord, RepositoryError> {
        let access_code_hash = match access_code {
            Some(code) => Some(
                tokio::task::spawn_blocking(move || hash_access_code(&code))
                    .await
                    .map_err(|e| RepositoryError::Hashing(e.to_string()))??,
            ),
            None => None,
        };
        record.has_access_code = access_code_hash.is_some();

        let mut rooms = self.rooms.write().await;
        rooms.insert(
            record.id.clone(),
            StoredRoom {
                record: record.clone(),
                access_code_hash,
            },
        );
        tracing::debug!(room_id = %record.id, "room stored");
        Ok(record)
    }
}

#[async_trait]
impl RoomRepository for InMemoryRoomRepository {
    async fn find_by_id(&self, room_id: &RoomId) -> Result<Option<RoomRecord>, RepositoryError> {
        let rooms = self.rooms.read().await;
        Ok(rooms.get(room_id).map(|stored| stored.record.clone()))
    }

    async fn compare_access_code(
        &self,
        room_id: &RoomId,
        candidate: &str,
    ) -> Result<bool, RepositoryError> {
        let hash = {
            let rooms = self.rooms.read().await;
            let stored = rooms
                .get(room_id)
                .ok_or_else(|| RepositoryError::NotFound(room_id.to_string()))?;
            match &stored.access_code_hash {
                Some(hash) => hash.clone(),
                None => return Ok(true),
            }
        };
        let candidate = candidate.to_string();
        tokio::task::spawn_blocking(move || verify_access_code(&candidate, &hash))
            .await
            .map_err(|e| RepositoryError::Hashing(e.to_string()))?
    }

    async fn update_status(
        &self,
        room_id: &RoomId,
        status: RoomStatus,
    ) -> Result<RoomRecord, RepositoryError> {
        let mut rooms = self.rooms.write().await;
        let stored = rooms
            .get_mut(room_id)
            .ok_or_else(|| RepositoryError::NotFound(room_id.to_string()))?;
        stored.record.status = status;
        Ok(stored.record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserId;
    use chrono::Utc;

    fn record(id: &str, is_private: bool) -> RoomRecord {
        RoomRecord {
            id: RoomId::new(id.to_string()).unwrap(),
            name: "Room".to_string(),
            description: None,
            is_private,
            status: RoomStatus::Inactive,
            creator_id: UserId::new("owner".to_string()).unwrap(),
            max_participants: 10,
            has_access_code: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_hashes_access_code() {
        // テスト項目: アクセスコード付きで保存すると照合できる
        // given (前提条件):
        let repository = InMemoryRoomRepository::new();
        let stored = repository
            .insert(record("r1", true), Some("1234".to_string()))
            .await
            .unwrap();
        let room_id = stored.id.clone();

        // when (操作):
        let correct = repository.compare_access_code(&room_id, "1234").await;
        let wrong = repository.compare_access_code(&room_id, "4321").await;

        // then (期待する結果):
        assert!(stored.has_access_code);
        assert_eq!(correct, Ok(true));
        assert_eq!(wrong, Ok(false));
    }

    #[tokio::test]
    async fn test_compare_access_code_unknown_room() {
        // テスト項目: 存在しないルームの照合は NotFound になる
        // given (前提条件):
        let repository = InMemoryRoomRepository::new();
        let room_id = RoomId::new("ghost".to_string()).unwrap();

        // when (操作):
        let result = repository.compare_access_code(&room_id, "1234").await;

        // then (期待する結果):
        assert_eq!(result, Err(RepositoryError::NotFound("ghost".to_string())));
    }

    #[tokio::test]
    async fn test_update_status() {
        // テスト項目: 状態を更新すると以降の取得に反映される
        // given (前提条件):
        let repository = InMemoryRoomRepository::new();
        let stored = repository.insert(record("r1", false), None).await.unwrap();

        // when (操作):
        let updated = repository
            .update_status(&stored.id, RoomStatus::Live)
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(updated.status, RoomStatus::Live);
        let found = repository.find_by_id(&stored.id).await.unwrap().unwrap();
        assert_eq!(found.status, RoomStatus::Live);
    }
}
