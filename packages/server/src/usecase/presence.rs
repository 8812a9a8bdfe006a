//! UseCase: 入退室・ロビー・ルーム状態の遷移（PresenceCoordinator）
//!
//! 接続とルームの組ごとの状態遷移は `NONE → LOBBY → MEMBER → NONE`。
//! ルームの状態変更とイベント送信はすべてルームのロック（`RoomGuard`）を
//! 保持したまま行うため、同じルームのメンバーにはイベントが操作の直列化順に届く。
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - join: 直接入室 / ロビー待機 / アクセスコード / 二重入室 / ルーム移動
//! - leave: 通知・入力中表示の解除・空ルームの退去・欠員補充・冪等性
//! - set_status: live 化でのロビーの FIFO 排出（定員まで）と状態変更通知
//! - disconnect_cleanup: 冪等性
//!
//! ### どのような状況を想定しているか
//! - 正常系：定員 2 のルームでのロビー → live 化 → 満員後の入室
//! - 異常系：存在しないルーム、アクセスコード不一致、永続化層の障害
//! - エッジケース：待機中に切断された接続の昇格スキップ

use std::sync::Arc;

use crate::domain::{
    ConnectionId, ConnectionInfo, ConnectionRegistry, DirectoryError, MessagePusher, Participant,
    RoomDirectory, RoomGuard, RoomId, RoomRepository, RoomStatus, ServerEvent,
};

use super::error::PresenceError;

/// 入室の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// メンバーとして入室した
    Member { participant_count: usize },
    /// ロビーで待機中（position は 1 始まり）
    Lobby { position: usize },
}

/// 退室の理由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveReason {
    /// `room:leave` による明示的な退室
    Requested,
    /// 別のルームへの移動
    Switched,
    /// 切断
    Disconnected,
}

/// 状態変更の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    /// 稼働中ルームがあった場合の変更前の状態
    pub previous: Option<RoomStatus>,
    /// ロビーから昇格した接続（昇格順）
    pub promoted: Vec<ConnectionId>,
}

/// 入退室のユースケース
pub struct PresenceCoordinator {
    registry: Arc<ConnectionRegistry>,
    directory: Arc<RoomDirectory>,
    room_repository: Arc<dyn RoomRepository>,
    message_pusher: Arc<dyn MessagePusher>,
}

impl PresenceCoordinator {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        directory: Arc<RoomDirectory>,
        room_repository: Arc<dyn RoomRepository>,
        message_pusher: Arc<dyn MessagePusher>,
    ) -> Self {
        Self {
            registry,
            directory,
            room_repository,
            message_pusher,
        }
    }

    /// ルームへの入室
    ///
    /// ルームが `live` で空きがあればメンバーに、そうでなければロビーに入る。
    /// 別のルームにいる場合は先にそのルームから退室する。
    pub async fn join(
        &self,
        connection_id: &ConnectionId,
        room_id: &RoomId,
        access_code: Option<&str>,
    ) -> Result<JoinOutcome, PresenceError> {
        let info = self
            .registry
            .lookup(connection_id)
            .ok_or_else(|| PresenceError::ConnectionNotFound(connection_id.to_string()))?;
        if info.room_id.as_ref() == Some(room_id) {
            return Err(PresenceError::AlreadyInRoom(room_id.to_string()));
        }

        let room = self
            .room_repository
            .find_by_id(room_id)
            .await?
            .ok_or_else(|| PresenceError::RoomNotFound(room_id.to_string()))?;
        if room.requires_access_code() {
            let candidate = access_code.unwrap_or_default();
            if !self
                .room_repository
                .compare_access_code(room_id, candidate)
                .await?
            {
                tracing::info!(connection_id = %connection_id, room_id = %room_id, "access code mismatch");
                return Err(PresenceError::InvalidAccessCode);
            }
        }

        if let Some(current) = &info.room_id {
            self.leave_as(&info, current, LeaveReason::Switched).await;
        }

        let mut guard = self.directory.get_or_create_live(&room).await;
        if guard.is_empty() {
            // 状態の更新はルームのロック下でしか行われないため、ロック取得後に読み直す
            match self.room_repository.find_by_id(room_id).await {
                Ok(Some(current)) => guard.refresh_record(current),
                Ok(None) => {
                    self.directory.evict_if_empty(&mut guard);
                    return Err(PresenceError::RoomNotFound(room_id.to_string()));
                }
                Err(e) => {
                    self.directory.evict_if_empty(&mut guard);
                    return Err(e.into());
                }
            }
        }
        if guard.status() == RoomStatus::Live && guard.has_capacity() {
            guard
                .admit_member(connection_id.clone())
                .map_err(|e| directory_error(e, room_id))?;
            if self
                .registry
                .set_room(connection_id, Some(room_id.clone()))
                .is_err()
            {
                // 入室処理中に切断された
                guard.remove_member(connection_id);
                self.directory.evict_if_empty(&mut guard);
                return Err(PresenceError::ConnectionNotFound(connection_id.to_string()));
            }
            self.announce_member(&guard, &info.participant()).await;
            tracing::info!(connection_id = %connection_id, room_id = %room_id, "joined room as member");
            Ok(JoinOutcome::Member {
                participant_count: guard.member_count(),
            })
        } else {
            let position = guard
                .admit_to_lobby(connection_id.clone())
                .map_err(|e| directory_error(e, room_id))?;
            if self
                .registry
                .set_lobby(connection_id, room_id.clone())
                .is_err()
            {
                guard.remove_member(connection_id);
                self.directory.evict_if_empty(&mut guard);
                return Err(PresenceError::ConnectionNotFound(connection_id.to_string()));
            }
            self.push(
                connection_id,
                &ServerEvent::RoomWaitingInLobby {
                    room_id: room_id.clone(),
                    position,
                },
            )
            .await;
            tracing::info!(connection_id = %connection_id, room_id = %room_id, position, "waiting in lobby");
            Ok(JoinOutcome::Lobby { position })
        }
    }

    /// ルームからの退室（そのルームにいなければ何もせず false）
    pub async fn leave(&self, connection_id: &ConnectionId, room_id: &RoomId) -> bool {
        match self.registry.lookup(connection_id) {
            Some(info) => self.leave_as(&info, room_id, LeaveReason::Requested).await,
            None => false,
        }
    }

    /// ルームの状態変更
    ///
    /// 作成者かどうかの確認は呼び出し側の責務。永続化層の更新はルームのロックを
    /// 保持したまま行い、失敗した場合は稼働中ルームに触れない。
    pub async fn set_status(
        &self,
        room_id: &RoomId,
        status: RoomStatus,
    ) -> Result<StatusChange, PresenceError> {
        let room = self
            .room_repository
            .find_by_id(room_id)
            .await?
            .ok_or_else(|| PresenceError::RoomNotFound(room_id.to_string()))?;
        let mut guard = self.directory.get_or_create_live(&room).await;
        // 空の稼働中ルームは残らないため、空なら今作成したもの
        let was_live = !guard.is_empty();
        if let Err(e) = self.room_repository.update_status(room_id, status).await {
            self.directory.evict_if_empty(&mut guard);
            return Err(e.into());
        }

        if !was_live {
            self.directory.evict_if_empty(&mut guard);
            tracing::info!(room_id = %room_id, status = status.as_str(), "status changed (no live room)");
            return Ok(StatusChange {
                previous: None,
                promoted: Vec::new(),
            });
        }

        let previous = guard.set_status(status);
        let promoted = if status == RoomStatus::Live {
            self.drain_lobby(&mut guard).await
        } else {
            Vec::new()
        };

        if previous != status {
            self.message_pusher
                .broadcast(
                    &guard.snapshot_members(),
                    &ServerEvent::RoomStatusChanged {
                        room_id: room_id.clone(),
                        status,
                    },
                )
                .await;
        }
        tracing::info!(
            room_id = %room_id,
            from = previous.as_str(),
            to = status.as_str(),
            promoted = promoted.len(),
            "room status changed"
        );
        Ok(StatusChange {
            previous: Some(previous),
            promoted,
        })
    }

    /// 切断時の後始末（2 回目以降は何もせず `None`）
    pub async fn disconnect_cleanup(&self, connection_id: &ConnectionId) -> Option<ConnectionInfo> {
        let info = self.registry.lookup(connection_id)?;
        if let Some(room_id) = &info.room_id {
            self.leave_as(&info, room_id, LeaveReason::Disconnected)
                .await;
        }
        self.registry.unregister(connection_id)
    }

    async fn leave_as(&self, info: &ConnectionInfo, room_id: &RoomId, reason: LeaveReason) -> bool {
        let connection_id = &info.connection_id;
        let Some(mut guard) = self.directory.get_live(room_id).await else {
            return false;
        };
        let was_member = guard.is_member(connection_id);
        if !guard.remove_member(connection_id) {
            return false;
        }
        if reason != LeaveReason::Disconnected {
            // 切断時は直後に unregister されるため更新不要
            let _ = self.registry.set_room(connection_id, None);
            self.push(
                connection_id,
                &ServerEvent::RoomLeft {
                    room_id: room_id.clone(),
                },
            )
            .await;
        }

        if was_member {
            let remaining = guard.snapshot_members();
            let typing_cleared = guard.clear_typing_of_connection(connection_id);
            if !typing_cleared.is_empty() {
                let own = self.registry.connections_of_user(&info.user_id);
                let watchers: Vec<ConnectionId> = remaining
                    .iter()
                    .filter(|id| !own.contains(id))
                    .cloned()
                    .collect();
                for (user_id, _) in typing_cleared {
                    self.message_pusher
                        .broadcast(
                            &watchers,
                            &ServerEvent::ChatUserStoppedTyping {
                                user_id,
                                room_id: room_id.clone(),
                            },
                        )
                        .await;
                }
            }
            self.message_pusher
                .broadcast(
                    &remaining,
                    &ServerEvent::RoomUserLeft {
                        user_id: info.user_id.clone(),
                        connection_id: connection_id.clone(),
                        room_id: room_id.clone(),
                    },
                )
                .await;
            self.message_pusher
                .broadcast(
                    &remaining,
                    &ServerEvent::WebrtcUserLeft {
                        user_id: info.user_id.clone(),
                        connection_id: connection_id.clone(),
                    },
                )
                .await;
            // 欠員補充
            self.drain_lobby(&mut guard).await;
        }

        self.directory.evict_if_empty(&mut guard);
        tracing::info!(connection_id = %connection_id, room_id = %room_id, ?reason, "left room");
        true
    }

    /// ロビーを FIFO で定員まで昇格させる
    async fn drain_lobby(&self, guard: &mut RoomGuard) -> Vec<ConnectionId> {
        let room_id = guard.room_id().clone();
        let mut promoted = Vec::new();
        while let Some(connection_id) = guard.promote_from_lobby() {
            let Some(info) = self.registry.lookup(&connection_id) else {
                // 待機中に切断された接続
                guard.remove_member(&connection_id);
                continue;
            };
            if self
                .registry
                .set_room(&connection_id, Some(room_id.clone()))
                .is_err()
            {
                guard.remove_member(&connection_id);
                continue;
            }
            self.push(
                &connection_id,
                &ServerEvent::RoomMovedFromLobby {
                    room_id: room_id.clone(),
                },
            )
            .await;
            self.announce_member(guard, &info.participant()).await;
            tracing::info!(connection_id = %connection_id, room_id = %room_id, "promoted from lobby");
            promoted.push(connection_id);
        }
        promoted
    }

    /// 新メンバーへ `room:joined`、既存メンバーへ `room:user-joined` を送る
    async fn announce_member(&self, guard: &RoomGuard, joiner: &Participant) {
        let members = guard.snapshot_members();
        let users: Vec<Participant> = members
            .iter()
            .filter_map(|id| self.registry.lookup(id))
            .map(|info| info.participant())
            .collect();
        self.push(
            &joiner.connection_id,
            &ServerEvent::RoomJoined {
                room: guard.record().clone(),
                participant_count: members.len(),
                users,
            },
        )
        .await;

        let others: Vec<ConnectionId> = members
            .into_iter()
            .filter(|id| id != &joiner.connection_id)
            .collect();
        self.message_pusher
            .broadcast(
                &others,
                &ServerEvent::RoomUserJoined {
                    user: joiner.clone(),
                    room_id: guard.room_id().clone(),
                },
            )
            .await;
    }

    async fn push(&self, connection_id: &ConnectionId, event: &ServerEvent) {
        if let Err(e) = self.message_pusher.push_to(connection_id, event).await {
            tracing::debug!(connection_id = %connection_id, event = event.name(), "event not delivered: {}", e);
        }
    }
}

fn directory_error(error: DirectoryError, room_id: &RoomId) -> PresenceError {
    match error {
        DirectoryError::AlreadyQueued | DirectoryError::AlreadyMember => {
            PresenceError::AlreadyInRoom(room_id.to_string())
        }
        DirectoryError::RoomFull => PresenceError::RoomFull(room_id.to_string()),
    }
}
