//! ドメイン層
//!
//! - 値オブジェクト・エンティティ・イベント
//! - 外部協調者のインターフェース（Repository / MessagePusher / IdentityVerifier）
//! - 共有状態（ConnectionRegistry / RoomDirectory）

pub mod auth;
pub mod entity;
pub mod error;
pub mod event;
pub mod message_pusher;
pub mod registry;
pub mod repository;
pub mod room_directory;
pub mod value_object;

pub use auth::IdentityVerifier;
pub use entity::{
    ConnectionInfo, HistoryQuery, LiveRoomView, MessageKind, MessageRecord, NewMessage,
    Participant, RoomRecord, RoomStatus, SignalKind, UserRecord,
};
pub use error::{
    AuthError, DirectoryError, MessagePushError, RegistryError, RepositoryError, ValueObjectError,
};
pub use event::{ClientCommand, ServerEvent};
pub use message_pusher::{MessagePusher, PusherChannel};
pub use registry::ConnectionRegistry;
pub use repository::{MessageRepository, RoomRepository, UserRepository};
pub use room_directory::{RoomDirectory, RoomGuard, TypingEntry};
pub use value_object::{ConnectionId, MessageContent, RoomId, UserId};
