//! UseCase テスト用の共通部品
//!
//! - `RecordingPusher`: 送信されたイベントを記録する MessagePusher
//! - `TestWorld`: レジストリ・ディレクトリ・インメモリリポジトリ一式

use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use chatroom_shared::time::SystemClock;
use chrono::Utc;

use crate::{
    domain::{
        ConnectionId, ConnectionRegistry, MessagePushError, MessagePusher, PusherChannel,
        RoomDirectory, RoomId, RoomRecord, RoomStatus, ServerEvent, UserId,
    },
    infrastructure::repository::{InMemoryMessageRepository, InMemoryRoomRepository},
};

/// 送信されたイベントを記録する MessagePusher
#[derive(Default)]
pub struct RecordingPusher {
    sent: Mutex<Vec<(ConnectionId, ServerEvent)>>,
    dead: Mutex<HashSet<ConnectionId>>,
}

impl RecordingPusher {
    /// 以降この接続への送信を失敗させる
    pub fn kill(&self, connection_id: &ConnectionId) {
        self.dead.lock().unwrap().insert(connection_id.clone());
    }

    pub fn events_for(&self, connection_id: &ConnectionId) -> Vec<ServerEvent> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(target, _)| target == connection_id)
            .map(|(_, event)| event.clone())
            .collect()
    }

    pub fn names_for(&self, connection_id: &ConnectionId) -> Vec<&'static str> {
        self.events_for(connection_id)
            .iter()
            .map(|event| event.name())
            .collect()
    }

    pub fn total(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl MessagePusher for RecordingPusher {
    async fn register_client(&self, _connection_id: ConnectionId, _sender: PusherChannel) {}

    async fn unregister_client(&self, connection_id: &ConnectionId) {
        self.kill(connection_id);
    }

    async fn push_to(
        &self,
        connection_id: &ConnectionId,
        event: &ServerEvent,
    ) -> Result<(), MessagePushError> {
        if self.dead.lock().unwrap().contains(connection_id) {
            return Err(MessagePushError::QueueClosed(connection_id.to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((connection_id.clone(), event.clone()));
        Ok(())
    }

    async fn broadcast(&self, targets: &[ConnectionId], event: &ServerEvent) -> usize {
        let mut delivered = 0;
        for target in targets {
            if self.push_to(target, event).await.is_ok() {
                delivered += 1;
            }
        }
        delivered
    }
}

pub fn conn(id: &str) -> ConnectionId {
    ConnectionId::new(id.to_string()).unwrap()
}

pub fn user(id: &str) -> UserId {
    UserId::new(id.to_string()).unwrap()
}

pub fn room_id(id: &str) -> RoomId {
    RoomId::new(id.to_string()).unwrap()
}

pub fn room_record(id: &str, status: RoomStatus, capacity: usize) -> RoomRecord {
    RoomRecord {
        id: room_id(id),
        name: format!("Room {id}"),
        description: None,
        is_private: false,
        status,
        creator_id: user("creator"),
        max_participants: capacity,
        has_access_code: false,
        created_at: Utc::now(),
    }
}

/// UseCase テスト用の共有状態一式
pub struct TestWorld {
    pub registry: Arc<ConnectionRegistry>,
    pub directory: Arc<RoomDirectory>,
    pub rooms: Arc<InMemoryRoomRepository>,
    pub messages: Arc<InMemoryMessageRepository>,
    pub pusher: Arc<RecordingPusher>,
}

impl TestWorld {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(ConnectionRegistry::new(Arc::new(SystemClock))),
            directory: Arc::new(RoomDirectory::new()),
            rooms: Arc::new(InMemoryRoomRepository::new()),
            messages: Arc::new(InMemoryMessageRepository::new(Arc::new(SystemClock))),
            pusher: Arc::new(RecordingPusher::default()),
        }
    }

    pub async fn add_room(&self, record: RoomRecord, access_code: Option<&str>) -> RoomRecord {
        self.rooms
            .insert(record, access_code.map(str::to_string))
            .await
            .unwrap()
    }

    /// 接続を登録する（接続 ID とユーザー ID は同じ文字列、表示名は先頭を大文字にしたもの）
    pub fn connect(&self, id: &str) -> ConnectionId {
        self.connect_as(id, id)
    }

    pub fn connect_as(&self, connection: &str, user_id: &str) -> ConnectionId {
        let mut display_name = user_id.to_string();
        if let Some(first) = display_name.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        self.registry
            .register(conn(connection), user(user_id), display_name)
            .unwrap();
        conn(connection)
    }
}
