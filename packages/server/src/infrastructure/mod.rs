//! Infrastructure 層
//!
//! ドメイン層のインターフェースに対する具体的な実装を提供します。

pub mod auth;
pub mod dto;
pub mod message_pusher;
pub mod repository;
