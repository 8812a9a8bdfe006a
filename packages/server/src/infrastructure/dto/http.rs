//! HTTP API response DTOs.

use serde::{Deserialize, Serialize};

use crate::domain::RoomStatus;

pub use super::websocket::MessageWithUserDto;

/// `GET /api/health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthDto {
    pub status: String,
    pub connections: usize,
}

/// Query of `GET /api/rooms/{room_id}/messages`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<usize>,
    /// RFC 3339 timestamp; only messages strictly older are returned
    pub before: Option<String>,
}

/// `GET /api/rooms/{room_id}/live`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveRoomDto {
    pub room_id: String,
    pub status: RoomStatus,
    pub capacity: usize,
    pub access_code_required: bool,
    pub members: Vec<String>,
    pub lobby: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponseDto {
    pub message: String,
    pub code: String,
}
