//! インメモリ実装（開発・テスト用）

pub mod message;
pub mod room;
pub mod user;

pub use message::InMemoryMessageRepository;
pub use room::InMemoryRoomRepository;
pub use user::InMemoryUserRepository;
