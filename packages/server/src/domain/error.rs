//! ドメイン層のエラー型

use thiserror::Error;

/// 値オブジェクト生成時のバリデーションエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueObjectError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },
}

/// ConnectionRegistry のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("connection '{0}' is already registered")]
    DuplicateConnection(String),

    #[error("connection '{0}' is not registered")]
    UnknownConnection(String),
}

/// RoomDirectory のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error("connection is already queued in this room's lobby")]
    AlreadyQueued,

    #[error("connection is already a member of this room")]
    AlreadyMember,

    #[error("room is full")]
    RoomFull,
}

/// 外部リポジトリ（永続化層）のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("repository unavailable: {0}")]
    Unavailable(String),

    #[error("access code hashing failed: {0}")]
    Hashing(String),
}

/// 接続時の認証エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("no authentication token provided")]
    MissingToken,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("user not found: {0}")]
    UnknownUser(String),

    #[error("identity lookup failed: {0}")]
    Lookup(String),
}

/// メッセージ送信（通知）のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessagePushError {
    #[error("connection '{0}' has no outbound queue")]
    ConnectionNotFound(String),

    #[error("outbound queue of '{0}' is closed")]
    QueueClosed(String),

    #[error("outbound queue of '{0}' overflowed; connection dropped")]
    QueueOverflow(String),

    #[error("failed to encode event: {0}")]
    Encode(String),
}
