//! 値オブジェクト
//!
//! 接続 ID・ユーザー ID・ルーム ID・メッセージ本文など、
//! 生成時にバリデーションを行い、以降は不変として扱う値を定義します。

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::ValueObjectError;

/// メッセージ本文の最小文字数
pub const MESSAGE_MIN_LENGTH: usize = 1;
/// メッセージ本文の最大文字数（REST 側と同じ上限）
pub const MESSAGE_MAX_LENGTH: usize = 1000;
/// ID 文字列の最大長
const ID_MAX_LENGTH: usize = 128;

/// 文字列ベースの ID 型を定義する
///
/// 空文字・空白のみ・長すぎる値は拒否する。
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// 新しい ID を作成（空文字・長すぎる値はエラー）
            pub fn new(value: String) -> Result<Self, ValueObjectError> {
                if value.trim().is_empty() {
                    return Err(ValueObjectError::Empty { field: $field });
                }
                if value.len() > ID_MAX_LENGTH {
                    return Err(ValueObjectError::TooLong {
                        field: $field,
                        max: ID_MAX_LENGTH,
                    });
                }
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValueObjectError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// 接続 ID（トランスポートセッションごとに一意）
    ConnectionId,
    "connection_id"
);

string_id!(
    /// ユーザー ID（認証済みアイデンティティ）
    UserId,
    "user_id"
);

string_id!(
    /// ルーム ID
    RoomId,
    "room_id"
);

impl ConnectionId {
    /// UUID v4 で新しい接続 ID を生成
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// チャットメッセージ本文
///
/// 1〜1000 文字（バイト数ではなく文字数）。空白のみは空とみなす。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageContent(String);

impl MessageContent {
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        if value.trim().chars().count() < MESSAGE_MIN_LENGTH {
            return Err(ValueObjectError::Empty { field: "content" });
        }
        if value.chars().count() > MESSAGE_MAX_LENGTH {
            return Err(ValueObjectError::TooLong {
                field: "content",
                max: MESSAGE_MAX_LENGTH,
            });
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for MessageContent {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}
