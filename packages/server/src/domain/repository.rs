//! Repository trait 定義
//!
//! 永続化層（ユーザー・ルーム・メッセージ）へのインターフェースを定義します。
//! 具体的な実装は Infrastructure 層が提供します（依存性の逆転）。

use async_trait::async_trait;

use super::{
    entity::{HistoryQuery, MessageRecord, NewMessage, RoomRecord, RoomStatus, UserRecord},
    error::RepositoryError,
    value_object::{RoomId, UserId},
};

/// Room Repository trait
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoomRepository: Send + Sync {
    /// ルームを取得（存在しなければ `None`）
    async fn find_by_id(&self, room_id: &RoomId) -> Result<Option<RoomRecord>, RepositoryError>;

    /// アクセスコードを保存済みハッシュと照合する
    ///
    /// ハッシュ比較は実装側の責務（定数時間比較）。
    async fn compare_access_code(
        &self,
        room_id: &RoomId,
        candidate: &str,
    ) -> Result<bool, RepositoryError>;

    /// ルームの状態を更新し、更新後のレコードを返す
    async fn update_status(
        &self,
        room_id: &RoomId,
        status: RoomStatus,
    ) -> Result<RoomRecord, RepositoryError>;
}

/// Message Repository trait
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// メッセージを永続化する（ID とタイムスタンプを採番）
    async fn create(&self, message: NewMessage) -> Result<MessageRecord, RepositoryError>;

    /// ルームのメッセージ履歴を古い順に取得
    async fn find_by_room(
        &self,
        room_id: &RoomId,
        query: HistoryQuery,
    ) -> Result<Vec<MessageRecord>, RepositoryError>;
}

/// User Repository trait
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, user_id: &UserId) -> Result<Option<UserRecord>, RepositoryError>;
}
