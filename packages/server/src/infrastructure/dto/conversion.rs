//! Conversion logic between domain events/entities and wire DTOs.

use chatroom_shared::time::to_rfc3339_millis;

use crate::domain::{
    LiveRoomView, MessageRecord, MessagePushError, Participant, RoomRecord, ServerEvent,
    SignalKind, UserRecord,
};
use crate::infrastructure::dto::{http, websocket as dto};

// ========================================
// Domain Entity → DTO
// ========================================

impl From<&Participant> for dto::PublicUserDto {
    fn from(participant: &Participant) -> Self {
        Self {
            id: participant.user_id.to_string(),
            display_name: participant.display_name.clone(),
            connection_id: Some(participant.connection_id.to_string()),
        }
    }
}

impl From<&UserRecord> for dto::PublicUserDto {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id.to_string(),
            display_name: user.display_name.clone(),
            connection_id: None,
        }
    }
}

/// Build the public room view with the current live participant count.
pub fn public_room(room: &RoomRecord, participant_count: usize) -> dto::PublicRoomDto {
    dto::PublicRoomDto {
        id: room.id.to_string(),
        name: room.name.clone(),
        description: room.description.clone(),
        is_private: room.is_private,
        status: room.status,
        creator_id: room.creator_id.to_string(),
        participant_count,
        max_participants: room.max_participants,
        created_at: to_rfc3339_millis(room.created_at),
    }
}

/// Attach the author (if known) to a persisted message.
pub fn message_with_user(
    message: &MessageRecord,
    user: Option<dto::PublicUserDto>,
) -> dto::MessageWithUserDto {
    dto::MessageWithUserDto {
        id: message.id.clone(),
        room_id: message.room_id.to_string(),
        user_id: message.user_id.to_string(),
        content: message.content.clone(),
        kind: message.kind,
        created_at: to_rfc3339_millis(message.created_at),
        user,
    }
}

impl From<&LiveRoomView> for http::LiveRoomDto {
    fn from(view: &LiveRoomView) -> Self {
        Self {
            room_id: view.room_id.to_string(),
            status: view.status,
            capacity: view.capacity,
            access_code_required: view.access_code_required,
            members: view.members.iter().map(|id| id.to_string()).collect(),
            lobby: view.lobby.iter().map(|id| id.to_string()).collect(),
        }
    }
}

impl From<&ServerEvent> for dto::OutboundMessage {
    fn from(event: &ServerEvent) -> Self {
        match event {
            ServerEvent::RoomJoined {
                room,
                participant_count,
                users,
            } => dto::OutboundMessage::RoomJoined(dto::RoomJoinedPayload {
                room: public_room(room, *participant_count),
                users: users.iter().map(dto::PublicUserDto::from).collect(),
            }),
            ServerEvent::RoomLeft { room_id } => {
                dto::OutboundMessage::RoomLeft(dto::RoomRefPayload {
                    room_id: room_id.to_string(),
                })
            }
            ServerEvent::RoomStatusChanged { room_id, status } => {
                dto::OutboundMessage::RoomStatusChanged(dto::RoomStatusChangedPayload {
                    room_id: room_id.to_string(),
                    status: *status,
                })
            }
            ServerEvent::RoomUserJoined { user, room_id } => {
                dto::OutboundMessage::RoomUserJoined(dto::RoomUserJoinedPayload {
                    user: user.into(),
                    room_id: room_id.to_string(),
                })
            }
            ServerEvent::RoomUserLeft {
                user_id,
                connection_id,
                room_id,
            } => dto::OutboundMessage::RoomUserLeft(dto::RoomUserLeftPayload {
                user_id: user_id.to_string(),
                connection_id: connection_id.to_string(),
                room_id: room_id.to_string(),
            }),
            ServerEvent::RoomWaitingInLobby { room_id, position } => {
                dto::OutboundMessage::RoomWaitingInLobby(dto::WaitingInLobbyPayload {
                    room_id: room_id.to_string(),
                    position: *position,
                })
            }
            ServerEvent::RoomMovedFromLobby { room_id } => {
                dto::OutboundMessage::RoomMovedFromLobby(dto::RoomRefPayload {
                    room_id: room_id.to_string(),
                })
            }
            ServerEvent::ChatMessage {
                message,
                display_name,
            } => {
                let author = dto::PublicUserDto {
                    id: message.user_id.to_string(),
                    display_name: display_name.clone(),
                    connection_id: None,
                };
                dto::OutboundMessage::ChatMessage(message_with_user(message, Some(author)))
            }
            ServerEvent::ChatUserTyping {
                user_id,
                display_name,
                room_id,
            } => dto::OutboundMessage::ChatUserTyping(dto::UserTypingPayload {
                user_id: user_id.to_string(),
                display_name: display_name.clone(),
                room_id: room_id.to_string(),
            }),
            ServerEvent::ChatUserStoppedTyping { user_id, room_id } => {
                dto::OutboundMessage::ChatUserStoppedTyping(dto::UserStoppedTypingPayload {
                    user_id: user_id.to_string(),
                    room_id: room_id.to_string(),
                })
            }
            ServerEvent::WebrtcUserJoined {
                user_id,
                display_name,
                connection_id,
            } => dto::OutboundMessage::WebrtcUserJoined(dto::PeerJoinedPayload {
                user_id: user_id.to_string(),
                display_name: display_name.clone(),
                connection_id: connection_id.to_string(),
            }),
            ServerEvent::WebrtcUserLeft {
                user_id,
                connection_id,
            } => dto::OutboundMessage::WebrtcUserLeft(dto::PeerLeftPayload {
                user_id: user_id.to_string(),
                connection_id: connection_id.to_string(),
            }),
            ServerEvent::WebrtcSignal {
                kind,
                payload,
                from,
                to,
            } => {
                let (from, to) = (from.to_string(), to.to_string());
                match kind {
                    SignalKind::Offer => {
                        dto::OutboundMessage::WebrtcOffer(dto::RelayedOfferPayload {
                            offer: payload.clone(),
                            from,
                            to,
                        })
                    }
                    SignalKind::Answer => {
                        dto::OutboundMessage::WebrtcAnswer(dto::RelayedAnswerPayload {
                            answer: payload.clone(),
                            from,
                            to,
                        })
                    }
                    SignalKind::IceCandidate => dto::OutboundMessage::WebrtcIceCandidate(
                        dto::RelayedIceCandidatePayload {
                            candidate: payload.clone(),
                            from,
                            to,
                        },
                    ),
                }
            }
            ServerEvent::Error { message, code } => {
                dto::OutboundMessage::Error(dto::ErrorPayload {
                    message: message.clone(),
                    code: (*code).to_string(),
                })
            }
            ServerEvent::AuthError { message } => {
                dto::OutboundMessage::AuthError(dto::AuthErrorPayload {
                    message: message.clone(),
                })
            }
        }
    }
}

/// Serialize an event into the text frame sent over the socket.
pub fn encode_event(event: &ServerEvent) -> Result<String, MessagePushError> {
    serde_json::to_string(&dto::OutboundMessage::from(event))
        .map_err(|e| MessagePushError::Encode(e.to_string()))
}
