//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};

use crate::{
    domain::{HistoryQuery, RoomId},
    infrastructure::dto::{
        conversion::message_with_user,
        http::{ErrorResponseDto, HealthDto, HistoryParams, LiveRoomDto, MessageWithUserDto},
        websocket::PublicUserDto,
    },
    ui::state::AppState,
    usecase::HistoryError,
};

type ApiError = (StatusCode, Json<ErrorResponseDto>);

fn api_error(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponseDto {
            message: message.into(),
            code: code.to_string(),
        }),
    )
}

fn parse_room_id(room_id: String) -> Result<RoomId, ApiError> {
    RoomId::new(room_id)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string()))
}

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthDto> {
    Json(HealthDto {
        status: "ok".to_string(),
        connections: state.registry.len(),
    })
}

/// Persisted message history of a room (oldest first)
pub async fn get_room_messages(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<MessageWithUserDto>>, ApiError> {
    let room_id = parse_room_id(room_id)?;
    let before = params
        .before
        .as_deref()
        .map(|before| {
            DateTime::parse_from_rfc3339(before)
                .map(|before| before.with_timezone(&Utc))
                .map_err(|e| {
                    api_error(
                        StatusCode::BAD_REQUEST,
                        "VALIDATION_ERROR",
                        format!("invalid 'before' timestamp: {e}"),
                    )
                })
        })
        .transpose()?;

    let entries = state
        .history
        .execute(&room_id, HistoryQuery::new(params.limit, before))
        .await
        .map_err(|e| {
            let status = match e {
                HistoryError::RoomNotFound(_) => StatusCode::NOT_FOUND,
                HistoryError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            api_error(status, e.code(), e.to_string())
        })?;

    // Domain Model から DTO への変換
    Ok(Json(
        entries
            .iter()
            .map(|entry| {
                message_with_user(&entry.message, entry.author.as_ref().map(PublicUserDto::from))
            })
            .collect(),
    ))
}

/// Live view of a room: status, capacity, members and lobby order (for debugging)
pub async fn get_live_room(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<Json<LiveRoomDto>, ApiError> {
    let room_id = parse_room_id(room_id)?;
    match state.directory.view(&room_id).await {
        Some(view) => Ok(Json(LiveRoomDto::from(&view))),
        None => Err(api_error(
            StatusCode::NOT_FOUND,
            "ROOM_NOT_FOUND",
            format!("room '{room_id}' is not live"),
        )),
    }
}
