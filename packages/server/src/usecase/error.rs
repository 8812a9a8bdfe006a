//! UseCase 層のエラー型
//!
//! 各エラーはエラー分類（`ErrorKind`）とワイヤ上のエラーコード（`code()`）を持つ。
//! ディスパッチ境界で `error` イベントに変換され、発信元の接続にだけ送られる。

use thiserror::Error;

use crate::domain::{AuthError, RegistryError, RepositoryError};

/// エラー分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    AuthenticationFailure,
    ValidationFailure,
    NotAuthorized,
    NotFound,
    Conflict,
    InvalidAccessCode,
    Internal,
}

/// 入退室・状態変更のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PresenceError {
    #[error("connection '{0}' is not registered")]
    ConnectionNotFound(String),

    #[error("room '{0}' not found")]
    RoomNotFound(String),

    #[error("invalid access code")]
    InvalidAccessCode,

    #[error("already in room '{0}'")]
    AlreadyInRoom(String),

    #[error("room '{0}' is full")]
    RoomFull(String),

    #[error("room lookup failed: {0}")]
    Repository(String),
}

impl PresenceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PresenceError::ConnectionNotFound(_) | PresenceError::RoomNotFound(_) => {
                ErrorKind::NotFound
            }
            PresenceError::InvalidAccessCode => ErrorKind::InvalidAccessCode,
            PresenceError::AlreadyInRoom(_) | PresenceError::RoomFull(_) => ErrorKind::Conflict,
            PresenceError::Repository(_) => ErrorKind::Internal,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            PresenceError::ConnectionNotFound(_) => "INTERNAL_ERROR",
            PresenceError::RoomNotFound(_) => "ROOM_NOT_FOUND",
            PresenceError::InvalidAccessCode => "INVALID_ACCESS_CODE",
            PresenceError::AlreadyInRoom(_) => "ALREADY_IN_ROOM",
            PresenceError::RoomFull(_) => "ROOM_FULL",
            PresenceError::Repository(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<RepositoryError> for PresenceError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound(room_id) => PresenceError::RoomNotFound(room_id),
            other => PresenceError::Repository(other.to_string()),
        }
    }
}

/// チャット送信・入力中表示のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("message must not be empty")]
    MessageEmpty,

    #[error("message must be at most {max} characters")]
    MessageTooLong { max: usize },

    #[error("not a member of room '{0}'")]
    NotInRoom(String),

    #[error("failed to persist message: {0}")]
    Persistence(String),
}

impl ChatError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChatError::MessageEmpty | ChatError::MessageTooLong { .. } => {
                ErrorKind::ValidationFailure
            }
            ChatError::NotInRoom(_) => ErrorKind::NotAuthorized,
            ChatError::Persistence(_) => ErrorKind::Internal,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ChatError::MessageEmpty => "MESSAGE_EMPTY",
            ChatError::MessageTooLong { .. } => "MESSAGE_TOO_LONG",
            ChatError::NotInRoom(_) => "NOT_IN_ROOM",
            ChatError::Persistence(_) => "INTERNAL_ERROR",
        }
    }
}

/// シグナリング中継のエラー（送信者にだけ報告される）
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalingError {
    #[error("connection '{to}' is not in the same room")]
    NotInSameRoom { to: String },
}

impl SignalingError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::NotAuthorized
    }

    pub fn code(&self) -> &'static str {
        "NOT_IN_SAME_ROOM"
    }
}

/// メッセージ履歴取得のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("room '{0}' not found")]
    RoomNotFound(String),

    #[error("history lookup failed: {0}")]
    Repository(String),
}

impl HistoryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HistoryError::RoomNotFound(_) => ErrorKind::NotFound,
            HistoryError::Repository(_) => ErrorKind::Internal,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            HistoryError::RoomNotFound(_) => "ROOM_NOT_FOUND",
            HistoryError::Repository(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<RepositoryError> for HistoryError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound(room_id) => HistoryError::RoomNotFound(room_id),
            other => HistoryError::Repository(other.to_string()),
        }
    }
}

/// 接続受け入れ時のエラー（接続は終了する）
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmitError {
    #[error("authentication failed: {0}")]
    Authentication(#[from] AuthError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl AdmitError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AdmitError::Authentication(_) => ErrorKind::AuthenticationFailure,
            AdmitError::Registry(_) => ErrorKind::Conflict,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AdmitError::Authentication(_) => "AUTHENTICATION_FAILED",
            AdmitError::Registry(_) => "DUPLICATE_CONNECTION",
        }
    }
}

/// イベントディスパッチのエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("invalid event payload: {0}")]
    Validation(String),

    #[error("only the room creator can change its status")]
    NotRoomCreator,

    #[error(transparent)]
    Presence(#[from] PresenceError),

    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error(transparent)]
    Signaling(#[from] SignalingError),
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::Validation(_) => ErrorKind::ValidationFailure,
            DispatchError::NotRoomCreator => ErrorKind::NotAuthorized,
            DispatchError::Presence(e) => e.kind(),
            DispatchError::Chat(e) => e.kind(),
            DispatchError::Signaling(e) => e.kind(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            DispatchError::Validation(_) => "VALIDATION_ERROR",
            DispatchError::NotRoomCreator => "NOT_ROOM_CREATOR",
            DispatchError::Presence(e) => e.code(),
            DispatchError::Chat(e) => e.code(),
            DispatchError::Signaling(e) => e.code(),
        }
    }
}
