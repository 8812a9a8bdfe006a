//! Repository の具体的な実装
//!
//! - `inmemory`: HashMap を使ったインメモリ実装
//! - `fixtures`: JSON ファイルからの初期データ投入

pub mod fixtures;
pub mod inmemory;

pub use inmemory::{InMemoryMessageRepository, InMemoryRoomRepository, InMemoryUserRepository};
