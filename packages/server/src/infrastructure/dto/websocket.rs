//! WebSocket message DTOs.
//!
//! Every frame is a JSON object `{"event": "<name>", "data": {...}}`.
//! Field names are camelCase to match the browser client.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{ClientCommand, ConnectionId, RoomId, RoomStatus, SignalKind};

// ========================================
// Inbound (client → server)
// ========================================

/// Envelope of every inbound frame; `data` is decoded per event name.
#[derive(Debug, Deserialize)]
pub struct InboundEnvelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomPayload {
    pub room_id: RoomId,
    #[serde(default)]
    pub access_code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomPayload {
    pub room_id: RoomId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetRoomStatusPayload {
    pub room_id: RoomId,
    pub status: RoomStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    pub room_id: RoomId,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct OfferPayload {
    #[serde(alias = "payload")]
    pub offer: Value,
    pub to: ConnectionId,
}

#[derive(Debug, Deserialize)]
pub struct AnswerPayload {
    #[serde(alias = "payload")]
    pub answer: Value,
    pub to: ConnectionId,
}

#[derive(Debug, Deserialize)]
pub struct IceCandidatePayload {
    #[serde(alias = "payload")]
    pub candidate: Value,
    pub to: ConnectionId,
}

/// Why an inbound frame could not be turned into a [`ClientCommand`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("frame is not a valid event envelope: {0}")]
    Malformed(String),

    #[error("unknown event '{0}'")]
    UnknownEvent(String),

    #[error("invalid payload for '{event}': {reason}")]
    InvalidPayload { event: String, reason: String },
}

/// Decode one inbound text frame.
pub fn decode_client_command(text: &str) -> Result<ClientCommand, DecodeError> {
    let envelope: InboundEnvelope =
        serde_json::from_str(text).map_err(|e| DecodeError::Malformed(e.to_string()))?;
    let InboundEnvelope { event, data } = envelope;

    let command = match event.as_str() {
        "room:join" => payload::<JoinRoomPayload>(&event, data).map(|p| {
            ClientCommand::JoinRoom {
                room_id: p.room_id,
                access_code: p.access_code,
            }
        })?,
        "room:leave" => payload::<RoomPayload>(&event, data)
            .map(|p| ClientCommand::LeaveRoom { room_id: p.room_id })?,
        "room:set-status" => payload::<SetRoomStatusPayload>(&event, data).map(|p| {
            ClientCommand::SetRoomStatus {
                room_id: p.room_id,
                status: p.status,
            }
        })?,
        "chat:send-message" => payload::<SendMessagePayload>(&event, data).map(|p| {
            ClientCommand::SendMessage {
                room_id: p.room_id,
                content: p.content,
            }
        })?,
        "chat:typing-start" => payload::<RoomPayload>(&event, data)
            .map(|p| ClientCommand::TypingStart { room_id: p.room_id })?,
        "chat:typing-stop" => payload::<RoomPayload>(&event, data)
            .map(|p| ClientCommand::TypingStop { room_id: p.room_id })?,
        "webrtc:offer" => payload::<OfferPayload>(&event, data).map(|p| ClientCommand::Signal {
            kind: SignalKind::Offer,
            to: p.to,
            payload: p.offer,
        })?,
        "webrtc:answer" => payload::<AnswerPayload>(&event, data).map(|p| ClientCommand::Signal {
            kind: SignalKind::Answer,
            to: p.to,
            payload: p.answer,
        })?,
        "webrtc:ice-candidate" => {
            payload::<IceCandidatePayload>(&event, data).map(|p| ClientCommand::Signal {
                kind: SignalKind::IceCandidate,
                to: p.to,
                payload: p.candidate,
            })?
        }
        "webrtc:ready" => ClientCommand::WebrtcReady,
        _ => return Err(DecodeError::UnknownEvent(event)),
    };

    Ok(command)
}

fn payload<T: serde::de::DeserializeOwned>(event: &str, data: Value) -> Result<T, DecodeError> {
    serde_json::from_value(data).map_err(|e| DecodeError::InvalidPayload {
        event: event.to_string(),
        reason: e.to_string(),
    })
}

// ========================================
// Outbound (server → client)
// ========================================

/// Outbound frame; serializes as `{"event": ..., "data": ...}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum OutboundMessage {
    #[serde(rename = "room:joined")]
    RoomJoined(RoomJoinedPayload),
    #[serde(rename = "room:left")]
    RoomLeft(RoomRefPayload),
    #[serde(rename = "room:status-changed")]
    RoomStatusChanged(RoomStatusChangedPayload),
    #[serde(rename = "room:user-joined")]
    RoomUserJoined(RoomUserJoinedPayload),
    #[serde(rename = "room:user-left")]
    RoomUserLeft(RoomUserLeftPayload),
    #[serde(rename = "room:waiting-in-lobby")]
    RoomWaitingInLobby(WaitingInLobbyPayload),
    #[serde(rename = "room:moved-from-lobby")]
    RoomMovedFromLobby(RoomRefPayload),
    #[serde(rename = "chat:message")]
    ChatMessage(MessageWithUserDto),
    #[serde(rename = "chat:user-typing")]
    ChatUserTyping(UserTypingPayload),
    #[serde(rename = "chat:user-stopped-typing")]
    ChatUserStoppedTyping(UserStoppedTypingPayload),
    #[serde(rename = "webrtc:user-joined")]
    WebrtcUserJoined(PeerJoinedPayload),
    #[serde(rename = "webrtc:user-left")]
    WebrtcUserLeft(PeerLeftPayload),
    #[serde(rename = "webrtc:offer")]
    WebrtcOffer(RelayedOfferPayload),
    #[serde(rename = "webrtc:answer")]
    WebrtcAnswer(RelayedAnswerPayload),
    #[serde(rename = "webrtc:ice-candidate")]
    WebrtcIceCandidate(RelayedIceCandidatePayload),
    #[serde(rename = "error")]
    Error(ErrorPayload),
    #[serde(rename = "auth:error")]
    AuthError(AuthErrorPayload),
}

/// Room as seen by clients (the access-code hash never leaves the repository).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicRoomDto {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_private: bool,
    pub status: RoomStatus,
    pub creator_id: String,
    pub participant_count: usize,
    pub max_participants: usize,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUserDto {
    #[serde(rename = "_id")]
    pub id: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomJoinedPayload {
    pub room: PublicRoomDto,
    pub users: Vec<PublicUserDto>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomRefPayload {
    pub room_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStatusChangedPayload {
    pub room_id: String,
    pub status: RoomStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomUserJoinedPayload {
    pub user: PublicUserDto,
    pub room_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomUserLeftPayload {
    pub user_id: String,
    pub connection_id: String,
    pub room_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitingInLobbyPayload {
    pub room_id: String,
    pub position: usize,
}

/// Persisted message with its author, as broadcast in `chat:message`
/// and returned by the history endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageWithUserDto {
    #[serde(rename = "_id")]
    pub id: String,
    pub room_id: String,
    pub user_id: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: crate::domain::MessageKind,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<PublicUserDto>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTypingPayload {
    pub user_id: String,
    pub display_name: String,
    pub room_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStoppedTypingPayload {
    pub user_id: String,
    pub room_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerJoinedPayload {
    pub user_id: String,
    pub display_name: String,
    pub connection_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerLeftPayload {
    pub user_id: String,
    pub connection_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelayedOfferPayload {
    pub offer: Value,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelayedAnswerPayload {
    pub answer: Value,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelayedIceCandidatePayload {
    pub candidate: Value,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub message: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthErrorPayload {
    pub message: String,
}
