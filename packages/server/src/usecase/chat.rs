//! UseCase: チャットメッセージと入力中表示のファンアウト（ChatFanout）
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - send_message: 検証 → 永続化 → 送信者を含む全メンバーへの配信
//! - start_typing / stop_typing: 送信者以外への通知と重複抑止
//! - sweep_idle_typing: 一定時間更新のない入力中表示の自動解除
//!
//! ### なぜこのテストが必要か
//! - 永続化に失敗したメッセージが配信されないことを保証する
//! - ロビー待機中の接続がチャットに参加できないことを保証する
//!
//! ### どのような状況を想定しているか
//! - 正常系：メンバー 2 人のルームでの送受信
//! - 異常系：空・長すぎる本文、非メンバーからの送信、永続化層の障害
//! - エッジケース：入力中のまま送信、タイムアウトによる解除

use std::{sync::Arc, time::Duration};

use tokio::{task::JoinHandle, time::Instant};

use crate::domain::{
    ConnectionId, ConnectionInfo, ConnectionRegistry, MessageContent, MessageKind,
    MessagePusher, MessageRecord, MessageRepository, NewMessage, RoomDirectory, RoomGuard,
    RoomId, ServerEvent, TypingEntry, UserId, ValueObjectError,
};

use super::error::ChatError;

/// 入力中表示の既定の有効期間
pub const DEFAULT_TYPING_TIMEOUT: Duration = Duration::from_secs(10);

/// チャットのユースケース
pub struct ChatFanout {
    registry: Arc<ConnectionRegistry>,
    directory: Arc<RoomDirectory>,
    message_repository: Arc<dyn MessageRepository>,
    message_pusher: Arc<dyn MessagePusher>,
    typing_timeout: Duration,
}

impl ChatFanout {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        directory: Arc<RoomDirectory>,
        message_repository: Arc<dyn MessageRepository>,
        message_pusher: Arc<dyn MessagePusher>,
        typing_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            directory,
            message_repository,
            message_pusher,
            typing_timeout,
        }
    }

    /// メッセージ送信
    ///
    /// 永続化に成功したメッセージだけを、送信者を含むルームの全メンバーへ配信する。
    pub async fn send_message(
        &self,
        room_id: &RoomId,
        connection_id: &ConnectionId,
        content: String,
    ) -> Result<MessageRecord, ChatError> {
        // 1. 本文の検証
        let content = MessageContent::new(content).map_err(|e| match e {
            ValueObjectError::TooLong { max, .. } => ChatError::MessageTooLong { max },
            ValueObjectError::Empty { .. } => ChatError::MessageEmpty,
        })?;

        // 2. 送信者がメンバーであることを確認
        let (info, mut guard) = self.member_guard(room_id, connection_id).await?;

        // 3. 永続化（ロックを保持したまま行い、配信順を永続化順に揃える）
        let message = self
            .message_repository
            .create(NewMessage {
                room_id: room_id.clone(),
                user_id: info.user_id.clone(),
                content,
                kind: MessageKind::Text,
            })
            .await
            .map_err(|e| {
                tracing::error!(room_id = %room_id, connection_id = %connection_id, "failed to persist message: {}", e);
                ChatError::Persistence(e.to_string())
            })?;

        // 4. 送信したので入力中表示を解除
        if guard.clear_typing(&info.user_id).is_some() {
            self.broadcast_stopped_typing(&guard, &info.user_id).await;
        }

        // 5. 全メンバーへ配信
        let delivered = self
            .message_pusher
            .broadcast(
                &guard.snapshot_members(),
                &ServerEvent::ChatMessage {
                    message: message.clone(),
                    display_name: info.display_name.clone(),
                },
            )
            .await;
        tracing::debug!(room_id = %room_id, message_id = %message.id, delivered, "chat message fanned out");
        Ok(message)
    }

    /// 入力開始（既に入力中なら期限だけ延長し、通知はしない）
    pub async fn start_typing(
        &self,
        room_id: &RoomId,
        connection_id: &ConnectionId,
    ) -> Result<(), ChatError> {
        let (info, mut guard) = self.member_guard(room_id, connection_id).await?;
        let newly_typing = guard.mark_typing(
            info.user_id.clone(),
            TypingEntry {
                connection_id: connection_id.clone(),
                deadline: Instant::now() + self.typing_timeout,
            },
        );
        if newly_typing {
            self.message_pusher
                .broadcast(
                    &self.others(&guard, &info.user_id),
                    &ServerEvent::ChatUserTyping {
                        user_id: info.user_id,
                        display_name: info.display_name,
                        room_id: room_id.clone(),
                    },
                )
                .await;
        }
        Ok(())
    }

    /// 入力終了（入力中でなければ何もしない）
    pub async fn stop_typing(
        &self,
        room_id: &RoomId,
        connection_id: &ConnectionId,
    ) -> Result<(), ChatError> {
        let (info, mut guard) = self.member_guard(room_id, connection_id).await?;
        if guard.clear_typing(&info.user_id).is_some() {
            self.broadcast_stopped_typing(&guard, &info.user_id).await;
        }
        Ok(())
    }

    /// 期限切れの入力中表示を解除し、解除した件数を返す
    pub async fn sweep_idle_typing(&self, now: Instant) -> usize {
        let mut expired_total = 0;
        for room_id in self.directory.live_room_ids() {
            let Some(mut guard) = self.directory.get_live(&room_id).await else {
                continue;
            };
            for (user_id, entry) in guard.expire_typing(now) {
                tracing::debug!(room_id = %room_id, user_id = %user_id, connection_id = %entry.connection_id, "typing indicator expired");
                self.broadcast_stopped_typing(&guard, &user_id).await;
                expired_total += 1;
            }
        }
        expired_total
    }

    /// 入力中表示の掃除を定期実行するタスクを起動する
    pub fn spawn_typing_sweeper(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                self.sweep_idle_typing(Instant::now()).await;
            }
        })
    }

    async fn member_guard(
        &self,
        room_id: &RoomId,
        connection_id: &ConnectionId,
    ) -> Result<(ConnectionInfo, RoomGuard), ChatError> {
        let not_in_room = || ChatError::NotInRoom(room_id.to_string());
        let info = self.registry.lookup(connection_id).ok_or_else(not_in_room)?;
        let guard = self
            .directory
            .get_live(room_id)
            .await
            .ok_or_else(not_in_room)?;
        if !guard.is_member(connection_id) {
            return Err(not_in_room());
        }
        Ok((info, guard))
    }

    async fn broadcast_stopped_typing(&self, guard: &RoomGuard, user_id: &UserId) {
        self.message_pusher
            .broadcast(
                &self.others(guard, user_id),
                &ServerEvent::ChatUserStoppedTyping {
                    user_id: user_id.clone(),
                    room_id: guard.room_id().clone(),
                },
            )
            .await;
    }

    /// 入力中のユーザー本人（全デバイス）を除いたメンバー
    fn others(&self, guard: &RoomGuard, user_id: &UserId) -> Vec<ConnectionId> {
        let own = self.registry.connections_of_user(user_id);
        guard
            .snapshot_members()
            .into_iter()
            .filter(|id| !own.contains(id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RepositoryError, RoomStatus, repository::MockMessageRepository};
    use crate::usecase::{
        presence::PresenceCoordinator,
        test_support::{TestWorld, room_id, room_record},
    };

    struct Fixture {
        world: TestWorld,
        chat: ChatFanout,
        alice: ConnectionId,
        bob: ConnectionId,
    }

    /// alice と bob がメンバーの live ルーム "r1"
    async fn fixture_with(message_repository: Option<Arc<dyn MessageRepository>>) -> Fixture {
        let world = TestWorld::new();
        world
            .add_room(room_record("r1", RoomStatus::Live, 3), None)
            .await;
        let presence = PresenceCoordinator::new(
            world.registry.clone(),
            world.directory.clone(),
            world.rooms.clone(),
            world.pusher.clone(),
        );
        let alice = world.connect("alice");
        let bob = world.connect("bob");
        presence.join(&alice, &room_id("r1"), None).await.unwrap();
        presence.join(&bob, &room_id("r1"), None).await.unwrap();
        world.pusher.clear();

        let chat = ChatFanout::new(
            world.registry.clone(),
            world.directory.clone(),
            message_repository.unwrap_or_else(|| world.messages.clone() as Arc<dyn MessageRepository>),
            world.pusher.clone(),
            DEFAULT_TYPING_TIMEOUT,
        );
        Fixture {
            world,
            chat,
            alice,
            bob,
        }
    }

    async fn fixture() -> Fixture {
        fixture_with(None).await
    }

    #[tokio::test]
    async fn test_send_message_reaches_every_member_including_sender() {
        // テスト項目: 永続化されたメッセージが送信者を含む全メンバーに届く
        // given (前提条件):
        let f = fixture().await;

        // when (操作):
        let message = f
            .chat
            .send_message(&room_id("r1"), &f.alice, "hello".to_string())
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(message.content, "hello");
        assert_eq!(f.world.messages.count(&room_id("r1")).await, 1);
        for target in [&f.alice, &f.bob] {
            match &f.world.pusher.events_for(target)[..] {
                [ServerEvent::ChatMessage {
                    message: delivered,
                    display_name,
                }] => {
                    assert_eq!(delivered.id, message.id);
                    assert_eq!(display_name, "Alice");
                }
                other => panic!("unexpected events: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_send_message_validates_length() {
        // テスト項目: 空白のみ・1000 文字超の本文は拒否され、永続化されない
        // given (前提条件):
        let f = fixture().await;

        // when (操作):
        let empty = f
            .chat
            .send_message(&room_id("r1"), &f.alice, "   ".to_string())
            .await;
        let too_long = f
            .chat
            .send_message(&room_id("r1"), &f.alice, "あ".repeat(1001))
            .await;
        let max = f
            .chat
            .send_message(&room_id("r1"), &f.alice, "あ".repeat(1000))
            .await;

        // then (期待する結果):
        assert_eq!(empty, Err(ChatError::MessageEmpty));
        assert_eq!(too_long, Err(ChatError::MessageTooLong { max: 1000 }));
        assert!(max.is_ok());
        assert_eq!(f.world.messages.count(&room_id("r1")).await, 1);
    }

    #[tokio::test]
    async fn test_send_message_from_lobby_is_rejected() {
        // テスト項目: ロビー待機中の接続はメッセージを送れない
        // given (前提条件):
        let f = fixture().await;
        f.world
            .add_room(room_record("stage", RoomStatus::Inactive, 3), None)
            .await;
        let presence = PresenceCoordinator::new(
            f.world.registry.clone(),
            f.world.directory.clone(),
            f.world.rooms.clone(),
            f.world.pusher.clone(),
        );
        let carol = f.world.connect("carol");
        presence.join(&carol, &room_id("stage"), None).await.unwrap();

        // when (操作):
        let result = f
            .chat
            .send_message(&room_id("stage"), &carol, "hi".to_string())
            .await;

        // then (期待する結果):
        assert_eq!(result, Err(ChatError::NotInRoom("stage".to_string())));
        assert_eq!(f.world.messages.count(&room_id("stage")).await, 0);
    }

    #[tokio::test]
    async fn test_send_message_persistence_failure_is_not_broadcast() {
        // テスト項目: 永続化に失敗したメッセージは誰にも配信されない
        // given (前提条件):
        let mut repository = MockMessageRepository::new();
        repository
            .expect_create()
            .returning(|_| Err(RepositoryError::Unavailable("disk full".to_string())));
        let f = fixture_with(Some(Arc::new(repository))).await;

        // when (操作):
        let result = f
            .chat
            .send_message(&room_id("r1"), &f.alice, "hello".to_string())
            .await;

        // then (期待する結果):
        assert!(matches!(result, Err(ChatError::Persistence(_))));
        assert_eq!(f.world.pusher.total(), 0);
    }

    #[tokio::test]
    async fn test_typing_start_is_sent_to_others_once() {
        // テスト項目: 入力開始は送信者以外に 1 回だけ通知され、繰り返しても重複しない
        // given (前提条件):
        let f = fixture().await;

        // when (操作):
        f.chat.start_typing(&room_id("r1"), &f.alice).await.unwrap();
        f.chat.start_typing(&room_id("r1"), &f.alice).await.unwrap();

        // then (期待する結果):
        assert_eq!(f.world.pusher.names_for(&f.bob), vec!["chat:user-typing"]);
        assert!(f.world.pusher.names_for(&f.alice).is_empty());
    }

    #[tokio::test]
    async fn test_typing_is_not_echoed_to_own_devices() {
        // テスト項目: 同じユーザーの別デバイスには自分の入力開始・終了が通知されない
        // given (前提条件):
        let f = fixture().await;
        let presence = PresenceCoordinator::new(
            f.world.registry.clone(),
            f.world.directory.clone(),
            f.world.rooms.clone(),
            f.world.pusher.clone(),
        );
        let alice_phone = f.world.connect_as("alice-phone", "alice");
        presence
            .join(&alice_phone, &room_id("r1"), None)
            .await
            .unwrap();
        f.world.pusher.clear();

        // when (操作):
        f.chat.start_typing(&room_id("r1"), &f.alice).await.unwrap();
        f.chat.stop_typing(&room_id("r1"), &f.alice).await.unwrap();

        // then (期待する結果):
        assert_eq!(
            f.world.pusher.names_for(&f.bob),
            vec!["chat:user-typing", "chat:user-stopped-typing"]
        );
        assert!(f.world.pusher.names_for(&alice_phone).is_empty());
        assert!(f.world.pusher.names_for(&f.alice).is_empty());
    }

    #[tokio::test]
    async fn test_send_message_clears_typing() {
        // テスト項目: 入力中のまま送信すると入力終了が先に通知される
        // given (前提条件):
        let f = fixture().await;
        f.chat.start_typing(&room_id("r1"), &f.alice).await.unwrap();

        // when (操作):
        f.chat
            .send_message(&room_id("r1"), &f.alice, "done".to_string())
            .await
            .unwrap();
        f.chat.stop_typing(&room_id("r1"), &f.alice).await.unwrap();

        // then (期待する結果):
        assert_eq!(
            f.world.pusher.names_for(&f.bob),
            vec!["chat:user-typing", "chat:user-stopped-typing", "chat:message"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_typing_expires() {
        // テスト項目: 期限を過ぎた入力中表示は掃除で解除され、期限前は残る
        // given (前提条件):
        let f = fixture().await;
        f.chat.start_typing(&room_id("r1"), &f.alice).await.unwrap();

        // when (操作):
        tokio::time::advance(Duration::from_secs(5)).await;
        let early = f.chat.sweep_idle_typing(Instant::now()).await;
        tokio::time::advance(Duration::from_secs(6)).await;
        let late = f.chat.sweep_idle_typing(Instant::now()).await;

        // then (期待する結果):
        assert_eq!(early, 0);
        assert_eq!(late, 1);
        assert_eq!(
            f.world.pusher.names_for(&f.bob),
            vec!["chat:user-typing", "chat:user-stopped-typing"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_typing_sweeper_task_expires_in_background() {
        // テスト項目: バックグラウンドの掃除タスクが期限切れの入力中表示を解除する
        // given (前提条件):
        let f = fixture().await;
        let chat = Arc::new(f.chat);
        let sweeper = chat.clone().spawn_typing_sweeper(Duration::from_secs(1));
        chat.start_typing(&room_id("r1"), &f.alice).await.unwrap();

        // when (操作):
        tokio::time::sleep(Duration::from_secs(12)).await;

        // then (期待する結果):
        assert_eq!(
            f.world.pusher.names_for(&f.bob),
            vec!["chat:user-typing", "chat:user-stopped-typing"]
        );
        sweeper.abort();
    }
}
