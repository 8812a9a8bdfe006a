//! ルームのアクセスコードのハッシュ化（Argon2id）
//!
//! 照合は `PasswordVerifier` による定数時間比較。
//! CPU を占有するため、非同期コンテキストからは `spawn_blocking` 経由で呼ぶ。

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::domain::RepositoryError;

/// アクセスコードは短い共有秘密なので、パスワードより軽いパラメータを使う
fn argon2_instance() -> Result<Argon2<'static>, RepositoryError> {
    let params = Params::new(
        8 * 1024, // m_cost: 8 MiB
        2,        // t_cost
        1,        // p_cost
        None,
    )
    .map_err(|e| RepositoryError::Hashing(e.to_string()))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// アクセスコードをハッシュ化し、PHC 文字列を返す
pub fn hash_access_code(access_code: &str) -> Result<String, RepositoryError> {
    let salt = SaltString::generate(&mut OsRng);
    argon2_instance()?
        .hash_password(access_code.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| RepositoryError::Hashing(e.to_string()))
}

/// 候補のアクセスコードを保存済みハッシュと照合する
pub fn verify_access_code(candidate: &str, hash: &str) -> Result<bool, RepositoryError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| RepositoryError::Hashing(format!("invalid hash format: {e}")))?;
    match argon2_instance()?.verify_password(candidate.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(RepositoryError::Hashing(e.to_string())),
    }
}
