//! エンティティ
//!
//! 接続・ルーム・メッセージなど、コア層が扱うデータ構造を定義します。
//! 永続化されたレコード（`RoomRecord` など）は外部リポジトリが所有し、
//! コア層は読み取り専用のスナップショットとして受け取ります。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::value_object::{ConnectionId, MessageContent, RoomId, UserId};

/// ルームの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    #[default]
    Inactive,
    Live,
}

impl RoomStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomStatus::Inactive => "inactive",
            RoomStatus::Live => "live",
        }
    }
}

/// 接続情報（ConnectionRegistry が排他的に所有する）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub connection_id: ConnectionId,
    pub user_id: UserId,
    pub display_name: String,
    /// 現在所属しているルーム（メンバーまたはロビー）
    pub room_id: Option<RoomId>,
    /// ロビーで待機中かどうか
    pub in_lobby: bool,
    pub connected_at: DateTime<Utc>,
}

impl ConnectionInfo {
    /// 指定ルームのメンバー（ロビーではない）かどうか
    pub fn is_member_of(&self, room_id: &RoomId) -> bool {
        !self.in_lobby && self.room_id.as_ref() == Some(room_id)
    }

    pub fn participant(&self) -> Participant {
        Participant {
            connection_id: self.connection_id.clone(),
            user_id: self.user_id.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

/// ルームの参加者（公開情報）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub connection_id: ConnectionId,
    pub user_id: UserId,
    pub display_name: String,
}

/// 永続化されたルーム
///
/// アクセスコードのハッシュはリポジトリ内部に留まり、ここには含まれない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomRecord {
    pub id: RoomId,
    pub name: String,
    pub description: Option<String>,
    pub is_private: bool,
    pub status: RoomStatus,
    pub creator_id: UserId,
    pub max_participants: usize,
    pub has_access_code: bool,
    pub created_at: DateTime<Utc>,
}

impl RoomRecord {
    /// 入室時にアクセスコードの照合が必要か
    pub fn requires_access_code(&self) -> bool {
        self.is_private && self.has_access_code
    }
}

/// 永続化されたユーザー（表示名の解決に使う）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: UserId,
    pub display_name: String,
}

/// メッセージ種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    System,
}

/// 永続化前のメッセージ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub content: MessageContent,
    pub kind: MessageKind,
}

/// 永続化済みメッセージ（ID とタイムスタンプはリポジトリが採番する）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    pub id: String,
    pub room_id: RoomId,
    pub user_id: UserId,
    pub content: String,
    pub kind: MessageKind,
    pub created_at: DateTime<Utc>,
}

/// メッセージ履歴の取得条件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryQuery {
    pub limit: usize,
    pub before: Option<DateTime<Utc>>,
}

impl HistoryQuery {
    pub const DEFAULT_LIMIT: usize = 20;
    pub const MAX_LIMIT: usize = 100;

    pub fn new(limit: Option<usize>, before: Option<DateTime<Utc>>) -> Self {
        Self {
            limit: limit
                .unwrap_or(Self::DEFAULT_LIMIT)
                .clamp(1, Self::MAX_LIMIT),
            before,
        }
    }
}

/// WebRTC シグナリングメッセージの種別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

/// 稼働中ルームのスナップショット（デバッグ・テスト用）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveRoomView {
    pub room_id: RoomId,
    pub status: RoomStatus,
    pub capacity: usize,
    pub access_code_required: bool,
    pub members: Vec<ConnectionId>,
    /// 待機順（先頭が次に昇格する）
    pub lobby: Vec<ConnectionId>,
}
