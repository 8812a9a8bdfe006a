//! 接続時の認証
//!
//! トークンの検証は外部（JWT 実装など）に委譲し、コア層は検証済みの `UserId` だけを受け取る。

use super::{error::AuthError, value_object::UserId};

/// アイデンティティトークンの検証
pub trait IdentityVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<UserId, AuthError>;
}
