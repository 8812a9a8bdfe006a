//! JSON フィクスチャからの初期データ投入
//!
//! ```json
//! {
//!   "users": [{ "id": "alice", "displayName": "Alice" }],
//!   "rooms": [{ "id": "lounge", "name": "Lounge", "isPrivate": true,
//!               "creatorId": "alice", "maxParticipants": 4, "accessCode": "1234" }]
//! }
//! ```

use std::path::Path;

use chatroom_shared::time::Clock;
use serde::Deserialize;
use thiserror::Error;

use crate::domain::{
    RepositoryError, RoomId, RoomRecord, RoomStatus, UserId, UserRecord, ValueObjectError,
};

use super::inmemory::{InMemoryRoomRepository, InMemoryUserRepository};

pub const DEFAULT_MAX_PARTICIPANTS: usize = 10;
pub const MAX_PARTICIPANTS_LIMIT: usize = 50;
const ACCESS_CODE_MIN_LENGTH: usize = 4;
const ACCESS_CODE_MAX_LENGTH: usize = 20;

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("failed to read fixtures: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse fixtures: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid fixture value: {0}")]
    Invalid(String),

    #[error(transparent)]
    Id(#[from] ValueObjectError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Fixtures {
    #[serde(default)]
    pub users: Vec<UserFixture>,
    #[serde(default)]
    pub rooms: Vec<RoomFixture>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFixture {
    pub id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomFixture {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub status: RoomStatus,
    pub creator_id: String,
    #[serde(default = "default_max_participants")]
    pub max_participants: usize,
    /// 平文。投入時にハッシュ化される
    #[serde(default)]
    pub access_code: Option<String>,
}

fn default_max_participants() -> usize {
    DEFAULT_MAX_PARTICIPANTS
}

impl Fixtures {
    pub fn from_json(json: &str) -> Result<Self, FixtureError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// リポジトリへ投入する
    pub async fn seed(
        self,
        rooms: &InMemoryRoomRepository,
        users: &InMemoryUserRepository,
        clock: &dyn Clock,
    ) -> Result<(), FixtureError> {
        for user in self.users {
            if user.display_name.trim().is_empty() {
                return Err(FixtureError::Invalid(format!(
                    "user '{}' has an empty displayName",
                    user.id
                )));
            }
            users
                .insert(UserRecord {
                    id: UserId::new(user.id)?,
                    display_name: user.display_name,
                })
                .await;
        }

        for room in self.rooms {
            if !(1..=MAX_PARTICIPANTS_LIMIT).contains(&room.max_participants) {
                return Err(FixtureError::Invalid(format!(
                    "room '{}' maxParticipants must be within 1..={}",
                    room.id, MAX_PARTICIPANTS_LIMIT
                )));
            }
            if let Some(code) = &room.access_code {
                let length = code.chars().count();
                if !(ACCESS_CODE_MIN_LENGTH..=ACCESS_CODE_MAX_LENGTH).contains(&length) {
                    return Err(FixtureError::Invalid(format!(
                        "room '{}' accessCode must be {}..={} characters",
                        room.id, ACCESS_CODE_MIN_LENGTH, ACCESS_CODE_MAX_LENGTH
                    )));
                }
            }
            let record = RoomRecord {
                id: RoomId::new(room.id)?,
                name: room.name,
                description: room.description,
                is_private: room.is_private,
                status: room.status,
                creator_id: UserId::new(room.creator_id)?,
                max_participants: room.max_participants,
                has_access_code: false,
                created_at: clock.now(),
            };
            let stored = rooms.insert(record, room.access_code).await?;
            tracing::info!(room_id = %stored.id, private = stored.is_private, "seeded room");
        }
        Ok(())
    }
}
