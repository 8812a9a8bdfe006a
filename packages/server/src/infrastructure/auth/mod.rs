//! 認証まわりの実装
//!
//! - `jwt`: 接続時のアイデンティティトークン検証
//! - `access_code`: ルームのアクセスコードのハッシュ化と照合

pub mod access_code;
pub mod jwt;

pub use jwt::JwtIdentityVerifier;
