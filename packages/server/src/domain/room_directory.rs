//! RoomDirectory
//!
//! 稼働中ルームのメモリ上の正本（メンバー集合・ロビーキュー・状態・入力中ユーザー）。
//!
//! ## 排他制御
//!
//! ルームごとに `tokio::sync::Mutex` を 1 つ持ち、ルームの状態を変更する操作は
//! すべて `RoomGuard`（ロック取得済みのハンドル）経由で行う。
//! ガードを持たずにルームの状態へ触れる手段はないため、同一ルームへの操作は
//! 常に直列化され、異なるルームへの操作は並行に進む。
//!
//! 2 つのルームのロックを同時に保持してはならない（ルーム移動は退室 → 入室の順）。

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use dashmap::DashMap;
use tokio::{
    sync::{Mutex, OwnedMutexGuard},
    time::Instant,
};

use super::{
    entity::{LiveRoomView, RoomRecord, RoomStatus},
    error::DirectoryError,
    value_object::{ConnectionId, RoomId, UserId},
};

/// ロビーの待機エントリ
#[derive(Debug, Clone)]
struct LobbyEntry {
    connection_id: ConnectionId,
    /// 到着順の通し番号（同時刻の待機でも順序が決まる）
    sequence: u64,
}

/// 入力中（typing）のエントリ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingEntry {
    pub connection_id: ConnectionId,
    pub deadline: Instant,
}

/// 稼働中ルームの状態
#[derive(Debug)]
struct LiveRoom {
    record: RoomRecord,
    members: HashSet<ConnectionId>,
    lobby: VecDeque<LobbyEntry>,
    typing: HashMap<UserId, TypingEntry>,
    /// ディレクトリから外された後に残ったハンドルを無効にする
    evicted: bool,
}

impl LiveRoom {
    fn new(record: RoomRecord) -> Self {
        Self {
            record,
            members: HashSet::new(),
            lobby: VecDeque::new(),
            typing: HashMap::new(),
            evicted: false,
        }
    }

    fn capacity(&self) -> usize {
        self.record.max_participants.max(1)
    }
}

/// ロック取得済みのルーム
///
/// ドロップでロックが解放される。
pub struct RoomGuard {
    handle: Arc<Mutex<LiveRoom>>,
    room: OwnedMutexGuard<LiveRoom>,
    lobby_sequence: Arc<AtomicU64>,
}

impl RoomGuard {
    pub fn room_id(&self) -> &RoomId {
        &self.room.record.id
    }

    /// 現在の状態を反映したルームレコード
    pub fn record(&self) -> &RoomRecord {
        &self.room.record
    }

    /// 永続化層から読み直したレコードで置き換える
    pub fn refresh_record(&mut self, record: RoomRecord) {
        debug_assert_eq!(record.id, self.room.record.id);
        self.room.record = record;
    }

    pub fn status(&self) -> RoomStatus {
        self.room.record.status
    }

    pub fn capacity(&self) -> usize {
        self.room.capacity()
    }

    pub fn access_code_required(&self) -> bool {
        self.room.record.requires_access_code()
    }

    pub fn member_count(&self) -> usize {
        self.room.members.len()
    }

    pub fn has_capacity(&self) -> bool {
        self.room.members.len() < self.room.capacity()
    }

    pub fn is_member(&self, connection_id: &ConnectionId) -> bool {
        self.room.members.contains(connection_id)
    }

    pub fn is_queued(&self, connection_id: &ConnectionId) -> bool {
        self.room
            .lobby
            .iter()
            .any(|entry| &entry.connection_id == connection_id)
    }

    pub fn is_empty(&self) -> bool {
        self.room.members.is_empty() && self.room.lobby.is_empty()
    }

    /// ロビーの末尾に追加し、1 始まりの待機順を返す
    pub fn admit_to_lobby(&mut self, connection_id: ConnectionId) -> Result<usize, DirectoryError> {
        if self.is_member(&connection_id) {
            return Err(DirectoryError::AlreadyMember);
        }
        if self.is_queued(&connection_id) {
            return Err(DirectoryError::AlreadyQueued);
        }
        let sequence = self.lobby_sequence.fetch_add(1, Ordering::Relaxed);
        self.room.lobby.push_back(LobbyEntry {
            connection_id,
            sequence,
        });
        Ok(self.room.lobby.len())
    }

    /// ロビーの先頭をメンバーへ昇格させる
    ///
    /// ルームが `live` かつ空きがある場合のみ。呼び出し側はロビーが空になるか
    /// 満員になるまで繰り返す。
    pub fn promote_from_lobby(&mut self) -> Option<ConnectionId> {
        if self.status() != RoomStatus::Live || !self.has_capacity() {
            return None;
        }
        let entry = self.room.lobby.pop_front()?;
        tracing::trace!(room_id = %self.room.record.id, sequence = entry.sequence, "promoting lobby entry");
        self.room.members.insert(entry.connection_id.clone());
        Some(entry.connection_id)
    }

    /// 定員を確認してメンバーに追加する（ロビーにいれば取り除く）
    pub fn admit_member(&mut self, connection_id: ConnectionId) -> Result<(), DirectoryError> {
        if self.is_member(&connection_id) {
            return Err(DirectoryError::AlreadyMember);
        }
        if !self.has_capacity() {
            return Err(DirectoryError::RoomFull);
        }
        self.room
            .lobby
            .retain(|entry| entry.connection_id != connection_id);
        self.room.members.insert(connection_id);
        Ok(())
    }

    /// メンバー集合・ロビーの両方から取り除く（存在しなければ false）
    pub fn remove_member(&mut self, connection_id: &ConnectionId) -> bool {
        let was_member = self.room.members.remove(connection_id);
        let queued_before = self.room.lobby.len();
        self.room
            .lobby
            .retain(|entry| &entry.connection_id != connection_id);
        was_member || self.room.lobby.len() != queued_before
    }

    /// 状態を変更し、変更前の状態を返す
    pub fn set_status(&mut self, status: RoomStatus) -> RoomStatus {
        std::mem::replace(&mut self.room.record.status, status)
    }

    /// ファンアウト用のメンバー一覧
    pub fn snapshot_members(&self) -> Vec<ConnectionId> {
        let mut members: Vec<ConnectionId> = self.room.members.iter().cloned().collect();
        members.sort();
        members
    }

    /// 入力中としてマークする（新たに入力中になった場合 true）
    pub fn mark_typing(&mut self, user_id: UserId, entry: TypingEntry) -> bool {
        self.room.typing.insert(user_id, entry).is_none()
    }

    pub fn clear_typing(&mut self, user_id: &UserId) -> Option<TypingEntry> {
        self.room.typing.remove(user_id)
    }

    /// 指定接続が立てた入力中フラグをすべて外す
    pub fn clear_typing_of_connection(
        &mut self,
        connection_id: &ConnectionId,
    ) -> Vec<(UserId, TypingEntry)> {
        self.drain_typing(|entry| &entry.connection_id == connection_id)
    }

    /// 期限切れの入力中フラグを外す
    pub fn expire_typing(&mut self, now: Instant) -> Vec<(UserId, TypingEntry)> {
        self.drain_typing(|entry| entry.deadline <= now)
    }

    pub fn is_typing(&self, user_id: &UserId) -> bool {
        self.room.typing.contains_key(user_id)
    }

    fn drain_typing(
        &mut self,
        predicate: impl Fn(&TypingEntry) -> bool,
    ) -> Vec<(UserId, TypingEntry)> {
        let expired: Vec<UserId> = self
            .room
            .typing
            .iter()
            .filter(|(_, entry)| predicate(entry))
            .map(|(user_id, _)| user_id.clone())
            .collect();
        expired
            .into_iter()
            .filter_map(|user_id| {
                self.room
                    .typing
                    .remove(&user_id)
                    .map(|entry| (user_id, entry))
            })
            .collect()
    }

    pub fn view(&self) -> LiveRoomView {
        LiveRoomView {
            room_id: self.room.record.id.clone(),
            status: self.status(),
            capacity: self.capacity(),
            access_code_required: self.access_code_required(),
            members: self.snapshot_members(),
            lobby: self
                .room
                .lobby
                .iter()
                .map(|entry| entry.connection_id.clone())
                .collect(),
        }
    }
}

/// 稼働中ルームのディレクトリ
#[derive(Default)]
pub struct RoomDirectory {
    rooms: DashMap<RoomId, Arc<Mutex<LiveRoom>>>,
    lobby_sequence: Arc<AtomicU64>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 稼働中ルームを取得（なければ作成）してロックする
    ///
    /// 永続化層は参照しない。呼び出し側がルームの存在を確認済みであること。
    pub async fn get_or_create_live(&self, record: &RoomRecord) -> RoomGuard {
        loop {
            let handle = self
                .rooms
                .entry(record.id.clone())
                .or_insert_with(|| {
                    tracing::debug!(room_id = %record.id, "live room created");
                    Arc::new(Mutex::new(LiveRoom::new(record.clone())))
                })
                .value()
                .clone();
            if let Some(guard) = self.lock_handle(handle).await {
                return guard;
            }
        }
    }

    /// 稼働中ルームがあればロックして返す
    pub async fn get_live(&self, room_id: &RoomId) -> Option<RoomGuard> {
        loop {
            let handle = self.rooms.get(room_id)?.value().clone();
            if let Some(guard) = self.lock_handle(handle).await {
                return Some(guard);
            }
        }
    }

    async fn lock_handle(&self, handle: Arc<Mutex<LiveRoom>>) -> Option<RoomGuard> {
        let room = handle.clone().lock_owned().await;
        if room.evicted {
            // ロック待ちの間に退去済みになったハンドル。取り直す
            return None;
        }
        Some(RoomGuard {
            handle,
            room,
            lobby_sequence: self.lobby_sequence.clone(),
        })
    }

    /// メンバーもロビーも空ならディレクトリから取り除く
    pub fn evict_if_empty(&self, guard: &mut RoomGuard) -> bool {
        if !guard.is_empty() {
            return false;
        }
        guard.room.evicted = true;
        guard.room.typing.clear();
        let handle = guard.handle.clone();
        let removed = self
            .rooms
            .remove_if(guard.room_id(), |_, current| Arc::ptr_eq(current, &handle))
            .is_some();
        if removed {
            tracing::debug!(room_id = %guard.room_id(), "live room evicted");
        }
        removed
    }

    pub fn live_room_ids(&self) -> Vec<RoomId> {
        self.rooms.iter().map(|entry| entry.key().clone()).collect()
    }

    pub async fn view(&self, room_id: &RoomId) -> Option<LiveRoomView> {
        self.get_live(room_id).await.map(|guard| guard.view())
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(id: &str, status: RoomStatus, capacity: usize) -> RoomRecord {
        RoomRecord {
            id: RoomId::new(id.to_string()).unwrap(),
            name: format!("Room {id}"),
            description: None,
            is_private: false,
            status,
            creator_id: UserId::new("creator".to_string()).unwrap(),
            max_participants: capacity,
            has_access_code: false,
            created_at: Utc::now(),
        }
    }

    fn conn(id: &str) -> ConnectionId {
        ConnectionId::new(id.to_string()).unwrap()
    }

    #[tokio::test]
    async fn test_admit_to_lobby_returns_positions() {
        // テスト項目: ロビーへの追加は 1 始まりの待機順を返す
        // given (前提条件):
        let directory = RoomDirectory::new();
        let mut room = directory
            .get_or_create_live(&record("r1", RoomStatus::Inactive, 2))
            .await;

        // when (操作):
        let first = room.admit_to_lobby(conn("x")).unwrap();
        let second = room.admit_to_lobby(conn("y")).unwrap();

        // then (期待する結果):
        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }

    #[tokio::test]
    async fn test_admit_to_lobby_rejects_duplicates() {
        // テスト項目: 同じルームのロビー・メンバーにいる接続の再追加は拒否される
        // given (前提条件):
        let directory = RoomDirectory::new();
        let mut room = directory
            .get_or_create_live(&record("r1", RoomStatus::Live, 2))
            .await;
        room.admit_to_lobby(conn("x")).unwrap();
        room.admit_member(conn("m")).unwrap();

        // when (操作):
        let queued_again = room.admit_to_lobby(conn("x"));
        let member_queued = room.admit_to_lobby(conn("m"));

        // then (期待する結果):
        assert_eq!(queued_again, Err(DirectoryError::AlreadyQueued));
        assert_eq!(member_queued, Err(DirectoryError::AlreadyMember));
    }

    #[tokio::test]
    async fn test_promote_from_lobby_is_fifo_and_capacity_gated() {
        // テスト項目: live 化したルームのロビーは FIFO で定員まで昇格する
        // given (前提条件):
        let directory = RoomDirectory::new();
        let mut room = directory
            .get_or_create_live(&record("r1", RoomStatus::Inactive, 2))
            .await;
        for id in ["a", "b", "c"] {
            room.admit_to_lobby(conn(id)).unwrap();
        }

        // when (操作):
        let before_live = room.promote_from_lobby();
        room.set_status(RoomStatus::Live);
        let mut promoted = Vec::new();
        while let Some(connection_id) = room.promote_from_lobby() {
            promoted.push(connection_id);
        }

        // then (期待する結果):
        assert_eq!(before_live, None);
        assert_eq!(promoted, vec![conn("a"), conn("b")]);
        assert_eq!(room.member_count(), 2);
        assert_eq!(room.view().lobby, vec![conn("c")]);
    }

    #[tokio::test]
    async fn test_admit_member_respects_capacity() {
        // テスト項目: 満員のルームへの追加は RoomFull、既存メンバーは AlreadyMember
        // given (前提条件):
        let directory = RoomDirectory::new();
        let mut room = directory
            .get_or_create_live(&record("r1", RoomStatus::Live, 1))
            .await;
        room.admit_member(conn("a")).unwrap();

        // when (操作):
        let again = room.admit_member(conn("a"));
        let full = room.admit_member(conn("b"));

        // then (期待する結果):
        assert_eq!(again, Err(DirectoryError::AlreadyMember));
        assert_eq!(full, Err(DirectoryError::RoomFull));
        assert_eq!(room.member_count(), 1);
    }

    #[tokio::test]
    async fn test_remove_member_is_idempotent() {
        // テスト項目: 存在しない接続の削除は false を返す
        // given (前提条件):
        let directory = RoomDirectory::new();
        let mut room = directory
            .get_or_create_live(&record("r1", RoomStatus::Live, 2))
            .await;
        room.admit_member(conn("a")).unwrap();
        room.admit_to_lobby(conn("b")).unwrap();

        // when (操作):
        let member_removed = room.remove_member(&conn("a"));
        let queued_removed = room.remove_member(&conn("b"));
        let absent_removed = room.remove_member(&conn("a"));

        // then (期待する結果):
        assert!(member_removed);
        assert!(queued_removed);
        assert!(!absent_removed);
        assert!(room.is_empty());
    }

    #[tokio::test]
    async fn test_evict_if_empty_removes_room() {
        // テスト項目: 空のルームは退去し、再取得すると新しい状態で作り直される
        // given (前提条件):
        let directory = RoomDirectory::new();
        let record = record("r1", RoomStatus::Live, 2);
        {
            let mut room = directory.get_or_create_live(&record).await;
            room.admit_member(conn("a")).unwrap();
            assert!(!directory.evict_if_empty(&mut room));
            room.remove_member(&conn("a"));

            // when (操作):
            let evicted = directory.evict_if_empty(&mut room);

            // then (期待する結果):
            assert!(evicted);
        }
        assert!(directory.get_live(&record.id).await.is_none());
        assert!(directory.is_empty());
        let room = directory.get_or_create_live(&record).await;
        assert_eq!(room.member_count(), 0);
    }

    #[tokio::test]
    async fn test_waiter_on_evicted_room_gets_fresh_room() {
        // テスト項目: 退去中のルームのロックを待っていた操作は新しいルームを取得する
        // given (前提条件):
        let directory = Arc::new(RoomDirectory::new());
        let record = record("r1", RoomStatus::Live, 2);
        let mut room = directory.get_or_create_live(&record).await;
        room.admit_member(conn("a")).unwrap();

        let waiter = {
            let directory = directory.clone();
            let record = record.clone();
            tokio::spawn(async move {
                let mut room = directory.get_or_create_live(&record).await;
                room.admit_member(conn("b")).unwrap();
                room.snapshot_members()
            })
        };
        tokio::task::yield_now().await;

        // when (操作):
        room.remove_member(&conn("a"));
        directory.evict_if_empty(&mut room);
        drop(room);

        // then (期待する結果):
        let members = waiter.await.unwrap();
        assert_eq!(members, vec![conn("b")]);
        assert_eq!(directory.len(), 1);
    }

    #[tokio::test]
    async fn test_expire_typing_only_removes_stale_entries() {
        // テスト項目: 期限を過ぎた入力中フラグだけが外れる
        // given (前提条件):
        let directory = RoomDirectory::new();
        let mut room = directory
            .get_or_create_live(&record("r1", RoomStatus::Live, 2))
            .await;
        let now = Instant::now();
        let stale_user = UserId::new("stale".to_string()).unwrap();
        let fresh_user = UserId::new("fresh".to_string()).unwrap();
        room.mark_typing(
            stale_user.clone(),
            TypingEntry {
                connection_id: conn("a"),
                deadline: now,
            },
        );
        room.mark_typing(
            fresh_user.clone(),
            TypingEntry {
                connection_id: conn("b"),
                deadline: now + std::time::Duration::from_secs(10),
            },
        );

        // when (操作):
        let expired = room.expire_typing(now);

        // then (期待する結果):
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].0, stale_user);
        assert!(room.is_typing(&fresh_user));
    }

    #[tokio::test]
    async fn test_concurrent_joins_never_exceed_capacity() {
        // テスト項目: 同時に入室しても定員を超えない
        // given (前提条件):
        let directory = Arc::new(RoomDirectory::new());
        let record = record("r1", RoomStatus::Live, 3);

        // when (操作):
        let mut handles = Vec::new();
        for i in 0..20 {
            let directory = directory.clone();
            let record = record.clone();
            handles.push(tokio::spawn(async move {
                let mut room = directory.get_or_create_live(&record).await;
                let connection_id = conn(&format!("c{i}"));
                if room.admit_member(connection_id.clone()).is_err() {
                    room.admit_to_lobby(connection_id).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // then (期待する結果):
        let view = directory.view(&record.id).await.unwrap();
        assert_eq!(view.members.len(), 3);
        assert_eq!(view.lobby.len(), 17);
    }
}
