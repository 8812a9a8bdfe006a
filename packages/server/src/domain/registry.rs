//! ConnectionRegistry
//!
//! 接続 ID → 認証済みアイデンティティ・現在のルームの対応表。
//! アイデンティティ（表示名）の唯一の情報源であり、RoomDirectory は接続 ID しか持たない。

use std::sync::Arc;

use chatroom_shared::time::Clock;
use dashmap::{DashMap, mapref::entry::Entry};

use super::{
    entity::ConnectionInfo,
    error::RegistryError,
    value_object::{ConnectionId, RoomId, UserId},
};

/// 接続レジストリ
///
/// 操作はすべて DashMap のシャード単位ロックで完結し、await を跨がない。
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, ConnectionInfo>,
    clock: Arc<dyn Clock>,
}

impl ConnectionRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            connections: DashMap::new(),
            clock,
        }
    }

    /// 接続を登録（同じ ID が既にあれば `DuplicateConnection`）
    pub fn register(
        &self,
        connection_id: ConnectionId,
        user_id: UserId,
        display_name: String,
    ) -> Result<ConnectionInfo, RegistryError> {
        match self.connections.entry(connection_id.clone()) {
            Entry::Occupied(_) => Err(RegistryError::DuplicateConnection(
                connection_id.into_string(),
            )),
            Entry::Vacant(vacant) => {
                let info = ConnectionInfo {
                    connection_id,
                    user_id,
                    display_name,
                    room_id: None,
                    in_lobby: false,
                    connected_at: self.clock.now(),
                };
                vacant.insert(info.clone());
                tracing::debug!(connection_id = %info.connection_id, user_id = %info.user_id, "connection registered");
                Ok(info)
            }
        }
    }

    pub fn lookup(&self, connection_id: &ConnectionId) -> Option<ConnectionInfo> {
        self.connections
            .get(connection_id)
            .map(|entry| entry.value().clone())
    }

    /// 所属ルームを設定（メンバーとして。`None` でルームなし）
    pub fn set_room(
        &self,
        connection_id: &ConnectionId,
        room_id: Option<RoomId>,
    ) -> Result<(), RegistryError> {
        let mut entry = self
            .connections
            .get_mut(connection_id)
            .ok_or_else(|| RegistryError::UnknownConnection(connection_id.to_string()))?;
        entry.room_id = room_id;
        entry.in_lobby = false;
        Ok(())
    }

    /// ロビー待機中として所属ルームを設定
    pub fn set_lobby(
        &self,
        connection_id: &ConnectionId,
        room_id: RoomId,
    ) -> Result<(), RegistryError> {
        let mut entry = self
            .connections
            .get_mut(connection_id)
            .ok_or_else(|| RegistryError::UnknownConnection(connection_id.to_string()))?;
        entry.room_id = Some(room_id);
        entry.in_lobby = true;
        Ok(())
    }

    /// 接続を削除し、削除前の状態を返す（2 回目以降は `None`）
    pub fn unregister(&self, connection_id: &ConnectionId) -> Option<ConnectionInfo> {
        let removed = self.connections.remove(connection_id).map(|(_, info)| info);
        if removed.is_some() {
            tracing::debug!(connection_id = %connection_id, "connection unregistered");
        }
        removed
    }

    /// ユーザーが保持している接続の一覧（複数デバイス）
    pub fn connections_of_user(&self, user_id: &UserId) -> Vec<ConnectionId> {
        self.connections
            .iter()
            .filter(|entry| &entry.user_id == user_id)
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
