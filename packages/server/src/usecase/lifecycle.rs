//! UseCase: 接続のライフサイクル管理（ConnectionLifecycleManager）
//!
//! - admit: トークン検証 → ユーザー解決 → レジストリ登録 → 送信キュー登録
//! - dispatch: デコード済みコマンドを各ユースケースへ振り分け、失敗は発信元へ `error` で返す
//! - close: 切断時の後始末（何度呼ばれても 1 回だけ効く）
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - 認証失敗（トークンなし・不正・未知のユーザー）で登録されないこと
//! - ディスパッチ境界でのエラー変換（発信元にだけ届く）
//! - 作成者以外の状態変更の拒否
//! - close の冪等性
//!
//! ### どのような状況を想定しているか
//! - 正常系：入室 → チャット → 切断
//! - 異常系：認証失敗、権限のない状態変更、存在しないルーム
//! - エッジケース：close の多重呼び出し

use std::sync::Arc;

use crate::domain::{
    AuthError, ClientCommand, ConnectionId, ConnectionInfo, ConnectionRegistry, IdentityVerifier,
    MessagePusher, PusherChannel, RoomId, RoomRepository, ServerEvent, UserRepository,
};

use super::{
    chat::ChatFanout,
    error::{AdmitError, DispatchError, PresenceError},
    presence::PresenceCoordinator,
    signaling::SignalingRelay,
};

/// 接続ライフサイクルのユースケース
pub struct ConnectionLifecycleManager {
    registry: Arc<ConnectionRegistry>,
    identity_verifier: Arc<dyn IdentityVerifier>,
    user_repository: Arc<dyn UserRepository>,
    room_repository: Arc<dyn RoomRepository>,
    message_pusher: Arc<dyn MessagePusher>,
    presence: Arc<PresenceCoordinator>,
    chat: Arc<ChatFanout>,
    signaling: Arc<SignalingRelay>,
}

impl ConnectionLifecycleManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        identity_verifier: Arc<dyn IdentityVerifier>,
        user_repository: Arc<dyn UserRepository>,
        room_repository: Arc<dyn RoomRepository>,
        message_pusher: Arc<dyn MessagePusher>,
        presence: Arc<PresenceCoordinator>,
        chat: Arc<ChatFanout>,
        signaling: Arc<SignalingRelay>,
    ) -> Self {
        Self {
            registry,
            identity_verifier,
            user_repository,
            room_repository,
            message_pusher,
            presence,
            chat,
            signaling,
        }
    }

    /// 新しい接続を受け入れる
    ///
    /// 成功した場合のみレジストリと送信キューに登録される。
    pub async fn admit(
        &self,
        connection_id: ConnectionId,
        token: Option<&str>,
        sender: PusherChannel,
    ) -> Result<ConnectionInfo, AdmitError> {
        // 1. トークン検証
        let token = token
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingToken)?;
        let user_id = self.identity_verifier.verify(token)?;

        // 2. 表示名の解決
        let user = self
            .user_repository
            .find_by_id(&user_id)
            .await
            .map_err(|e| AuthError::Lookup(e.to_string()))?
            .ok_or_else(|| AuthError::UnknownUser(user_id.to_string()))?;

        // 3. 登録
        let info = self
            .registry
            .register(connection_id.clone(), user.id, user.display_name)?;
        self.message_pusher
            .register_client(connection_id.clone(), sender)
            .await;

        tracing::info!(connection_id = %connection_id, user_id = %info.user_id, "connection admitted");
        Ok(info)
    }

    /// コマンドを処理する（失敗は発信元にだけ `error` として返し、接続は維持する）
    pub async fn dispatch(&self, connection_id: &ConnectionId, command: ClientCommand) {
        let event = command.name();
        if let Err(error) = self.handle(connection_id, command).await {
            tracing::info!(connection_id = %connection_id, event, code = error.code(), "command failed: {}", error);
            self.report(connection_id, &error).await;
        }
    }

    /// エラーを発信元へ `error` イベントとして送る
    pub async fn report(&self, connection_id: &ConnectionId, error: &DispatchError) {
        let event = ServerEvent::Error {
            message: error.to_string(),
            code: error.code(),
        };
        if let Err(e) = self.message_pusher.push_to(connection_id, &event).await {
            tracing::debug!(connection_id = %connection_id, "error event not delivered: {}", e);
        }
    }

    /// コマンドを対応するユースケースへ振り分ける
    pub async fn handle(
        &self,
        connection_id: &ConnectionId,
        command: ClientCommand,
    ) -> Result<(), DispatchError> {
        match command {
            ClientCommand::JoinRoom {
                room_id,
                access_code,
            } => {
                self.presence
                    .join(connection_id, &room_id, access_code.as_deref())
                    .await?;
            }
            ClientCommand::LeaveRoom { room_id } => {
                self.presence.leave(connection_id, &room_id).await;
            }
            ClientCommand::SetRoomStatus { room_id, status } => {
                self.authorize_creator(connection_id, &room_id).await?;
                self.presence.set_status(&room_id, status).await?;
            }
            ClientCommand::SendMessage { room_id, content } => {
                self.chat
                    .send_message(&room_id, connection_id, content)
                    .await?;
            }
            ClientCommand::TypingStart { room_id } => {
                self.chat.start_typing(&room_id, connection_id).await?;
            }
            ClientCommand::TypingStop { room_id } => {
                self.chat.stop_typing(&room_id, connection_id).await?;
            }
            ClientCommand::Signal { kind, to, payload } => {
                self.signaling
                    .relay(kind, connection_id, &to, payload)
                    .await?;
            }
            ClientCommand::WebrtcReady => {
                self.signaling.announce_ready(connection_id).await;
            }
        }
        Ok(())
    }

    /// 切断時の後始末（2 回目以降は何もせず false）
    pub async fn close(&self, connection_id: &ConnectionId) -> bool {
        let cleaned = self.presence.disconnect_cleanup(connection_id).await;
        self.message_pusher.unregister_client(connection_id).await;
        match cleaned {
            Some(info) => {
                tracing::info!(connection_id = %connection_id, user_id = %info.user_id, "connection closed");
                true
            }
            None => false,
        }
    }

    async fn authorize_creator(
        &self,
        connection_id: &ConnectionId,
        room_id: &RoomId,
    ) -> Result<(), DispatchError> {
        let info = self
            .registry
            .lookup(connection_id)
            .ok_or_else(|| PresenceError::ConnectionNotFound(connection_id.to_string()))?;
        let room = self
            .room_repository
            .find_by_id(room_id)
            .await
            .map_err(PresenceError::from)?
            .ok_or_else(|| PresenceError::RoomNotFound(room_id.to_string()))?;
        if room.creator_id != info.user_id {
            return Err(DispatchError::NotRoomCreator);
        }
        Ok(())
    }
}
