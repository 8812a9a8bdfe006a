//! リアルタイムイベント
//!
//! - `ServerEvent`: サーバーから接続へ送るイベント（ワイヤ形式は DTO 層が決める）
//! - `ClientCommand`: 接続から受け取り、検証済みのコマンド

use serde_json::Value;

use super::{
    entity::{MessageRecord, Participant, RoomRecord, RoomStatus, SignalKind},
    value_object::{ConnectionId, RoomId, UserId},
};

/// サーバー → クライアントのイベント
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// 入室完了（参加者本人へ）
    RoomJoined {
        room: RoomRecord,
        participant_count: usize,
        users: Vec<Participant>,
    },
    /// 明示的な退室完了（本人へ）
    RoomLeft { room_id: RoomId },
    RoomStatusChanged {
        room_id: RoomId,
        status: RoomStatus,
    },
    RoomUserJoined {
        user: Participant,
        room_id: RoomId,
    },
    RoomUserLeft {
        user_id: UserId,
        connection_id: ConnectionId,
        room_id: RoomId,
    },
    /// ロビー待機（position は 1 始まり）
    RoomWaitingInLobby { room_id: RoomId, position: usize },
    RoomMovedFromLobby { room_id: RoomId },
    ChatMessage {
        message: MessageRecord,
        display_name: String,
    },
    ChatUserTyping {
        user_id: UserId,
        display_name: String,
        room_id: RoomId,
    },
    ChatUserStoppedTyping { user_id: UserId, room_id: RoomId },
    WebrtcUserJoined {
        user_id: UserId,
        display_name: String,
        connection_id: ConnectionId,
    },
    WebrtcUserLeft {
        user_id: UserId,
        connection_id: ConnectionId,
    },
    /// 中継されるシグナリングメッセージ（payload は解釈しない）
    WebrtcSignal {
        kind: SignalKind,
        payload: Value,
        from: ConnectionId,
        to: ConnectionId,
    },
    Error {
        message: String,
        code: &'static str,
    },
    AuthError { message: String },
}

impl ServerEvent {
    /// ワイヤ上のイベント名
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::RoomJoined { .. } => "room:joined",
            ServerEvent::RoomLeft { .. } => "room:left",
            ServerEvent::RoomStatusChanged { .. } => "room:status-changed",
            ServerEvent::RoomUserJoined { .. } => "room:user-joined",
            ServerEvent::RoomUserLeft { .. } => "room:user-left",
            ServerEvent::RoomWaitingInLobby { .. } => "room:waiting-in-lobby",
            ServerEvent::RoomMovedFromLobby { .. } => "room:moved-from-lobby",
            ServerEvent::ChatMessage { .. } => "chat:message",
            ServerEvent::ChatUserTyping { .. } => "chat:user-typing",
            ServerEvent::ChatUserStoppedTyping { .. } => "chat:user-stopped-typing",
            ServerEvent::WebrtcUserJoined { .. } => "webrtc:user-joined",
            ServerEvent::WebrtcUserLeft { .. } => "webrtc:user-left",
            ServerEvent::WebrtcSignal { kind, .. } => match kind {
                SignalKind::Offer => "webrtc:offer",
                SignalKind::Answer => "webrtc:answer",
                SignalKind::IceCandidate => "webrtc:ice-candidate",
            },
            ServerEvent::Error { .. } => "error",
            ServerEvent::AuthError { .. } => "auth:error",
        }
    }
}

/// クライアント → サーバーのコマンド（デコード済み）
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCommand {
    JoinRoom {
        room_id: RoomId,
        access_code: Option<String>,
    },
    LeaveRoom {
        room_id: RoomId,
    },
    SetRoomStatus {
        room_id: RoomId,
        status: RoomStatus,
    },
    /// 本文の長さ検証は ChatFanout が行うため、ここでは生の文字列のまま保持する
    SendMessage {
        room_id: RoomId,
        content: String,
    },
    TypingStart {
        room_id: RoomId,
    },
    TypingStop {
        room_id: RoomId,
    },
    Signal {
        kind: SignalKind,
        to: ConnectionId,
        payload: Value,
    },
    WebrtcReady,
}

impl ClientCommand {
    pub fn name(&self) -> &'static str {
        match self {
            ClientCommand::JoinRoom { .. } => "room:join",
            ClientCommand::LeaveRoom { .. } => "room:leave",
            ClientCommand::SetRoomStatus { .. } => "room:set-status",
            ClientCommand::SendMessage { .. } => "chat:send-message",
            ClientCommand::TypingStart { .. } => "chat:typing-start",
            ClientCommand::TypingStop { .. } => "chat:typing-stop",
            ClientCommand::Signal { kind, .. } => match kind {
                SignalKind::Offer => "webrtc:offer",
                SignalKind::Answer => "webrtc:answer",
                SignalKind::IceCandidate => "webrtc:ice-candidate",
            },
            ClientCommand::WebrtcReady => "webrtc:ready",
        }
    }
}
