//! WebSocket を使った MessagePusher 実装
//!
//! ## 責務
//!
//! - 接続ごとの有界送信キュー（`PusherChannel`）を管理
//! - イベントを JSON にエンコードしてキューへ投入（push_to, broadcast）
//!
//! ## 設計ノート
//!
//! WebSocket への書き込みは UI 層の `pusher_loop` が行います。
//! この実装はキューへの投入だけを行い、決して await で待たない（`try_send`）。
//! キューが満杯の接続はその場で登録を外し、切断トークンを発火させる。
//! セッションは残りのフレームを送らずに終了し、接続は切断処理へ進む。
//! これにより、遅い・死んだ接続が他のメンバーへの配送を止めることはない。

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc::error::TrySendError;

use crate::{
    domain::{ConnectionId, MessagePushError, MessagePusher, PusherChannel, ServerEvent},
    infrastructure::dto::conversion::encode_event,
};

/// WebSocket を使った MessagePusher 実装
#[derive(Default)]
pub struct WebSocketMessagePusher {
    /// 接続中のクライアントの送信キュー
    clients: DashMap<ConnectionId, PusherChannel>,
}

impl WebSocketMessagePusher {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登録済みの送信キューの数
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// エンコード済みのフレームを 1 つのキューへ投入する
    fn enqueue(&self, connection_id: &ConnectionId, frame: String) -> Result<(), MessagePushError> {
        // DashMap の参照を保持したまま remove するとデッドロックするため、先に複製する
        let sender = self
            .clients
            .get(connection_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| MessagePushError::ConnectionNotFound(connection_id.to_string()))?;

        match sender.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                tracing::warn!(connection_id = %connection_id, "outbound queue full; dropping connection");
                self.clients
                    .remove_if(connection_id, |_, current| current.same_channel(&sender));
                sender.request_disconnect();
                Err(MessagePushError::QueueOverflow(connection_id.to_string()))
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(connection_id = %connection_id, "outbound queue closed; message dropped");
                self.clients
                    .remove_if(connection_id, |_, current| current.same_channel(&sender));
                Err(MessagePushError::QueueClosed(connection_id.to_string()))
            }
        }
    }
}

#[async_trait]
impl MessagePusher for WebSocketMessagePusher {
    async fn register_client(&self, connection_id: ConnectionId, sender: PusherChannel) {
        tracing::debug!(connection_id = %connection_id, "client registered to MessagePusher");
        self.clients.insert(connection_id, sender);
    }

    async fn unregister_client(&self, connection_id: &ConnectionId) {
        if self.clients.remove(connection_id).is_some() {
            tracing::debug!(connection_id = %connection_id, "client unregistered from MessagePusher");
        }
    }

    async fn push_to(
        &self,
        connection_id: &ConnectionId,
        event: &ServerEvent,
    ) -> Result<(), MessagePushError> {
        let frame = encode_event(event)?;
        self.enqueue(connection_id, frame)?;
        tracing::trace!(connection_id = %connection_id, event = event.name(), "pushed event");
        Ok(())
    }

    async fn broadcast(&self, targets: &[ConnectionId], event: &ServerEvent) -> usize {
        if targets.is_empty() {
            return 0;
        }
        let frame = match encode_event(event) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(event = event.name(), "failed to encode broadcast: {}", e);
                return 0;
            }
        };

        // ブロードキャストでは一部の送信失敗を許容
        let mut delivered = 0;
        for target in targets {
            match self.enqueue(target, frame.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::debug!(connection_id = %target, "skipping broadcast target: {}", e);
                }
            }
        }
        tracing::trace!(event = event.name(), delivered, total = targets.len(), "broadcasted event");
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RoomId;

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - push_to: 特定の接続への送信
    // - broadcast: 複数接続への送信と部分失敗の許容
    // - 有界キューが溢れた接続の切り離し
    //
    // 【なぜこのテストが必要か】
    // - 1 つの遅い接続が他のメンバーへの配送を止めないことを保証する
    // - 切り離された接続に切断が要求され、切断処理へ進めることを保証する
    // ========================================

    fn conn(id: &str) -> ConnectionId {
        ConnectionId::new(id.to_string()).unwrap()
    }

    fn moved_event() -> ServerEvent {
        ServerEvent::RoomMovedFromLobby {
            room_id: RoomId::new("r1".to_string()).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_push_to_success() {
        // テスト項目: 登録済みの接続にエンコード済みのイベントが届く
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new();
        let (tx, mut rx, _disconnect) = PusherChannel::bounded(4);
        pusher.register_client(conn("alice"), tx).await;

        // when (操作):
        let result = pusher.push_to(&conn("alice"), &moved_event()).await;

        // then (期待する結果):
        assert!(result.is_ok());
        assert_eq!(
            rx.recv().await,
            Some(r#"{"event":"room:moved-from-lobby","data":{"roomId":"r1"}}"#.to_string())
        );
    }

    #[tokio::test]
    async fn test_push_to_connection_not_found() {
        // テスト項目: 未登録の接続への送信は ConnectionNotFound になる
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new();

        // when (操作):
        let result = pusher.push_to(&conn("ghost"), &moved_event()).await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(MessagePushError::ConnectionNotFound("ghost".to_string()))
        );
    }

    #[tokio::test]
    async fn test_overflow_drops_connection_but_not_others() {
        // テスト項目: キューが溢れた接続は切り離されて切断が要求され、他の接続への配送は続く
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new();
        let (slow_tx, _slow_rx, slow_disconnect) = PusherChannel::bounded(1);
        let (fast_tx, mut fast_rx, fast_disconnect) = PusherChannel::bounded(8);
        pusher.register_client(conn("slow"), slow_tx).await;
        pusher.register_client(conn("fast"), fast_tx).await;
        let targets = vec![conn("slow"), conn("fast")];

        // when (操作):
        let first = pusher.broadcast(&targets, &moved_event()).await;
        let after_first = slow_disconnect.is_cancelled();
        let second = pusher.broadcast(&targets, &moved_event()).await;
        let third = pusher.broadcast(&targets, &moved_event()).await;

        // then (期待する結果):
        assert_eq!(first, 2);
        assert_eq!(second, 1);
        assert_eq!(third, 1);
        assert_eq!(pusher.len(), 1);
        assert!(!after_first);
        assert!(slow_disconnect.is_cancelled());
        assert!(!fast_disconnect.is_cancelled());
        for _ in 0..3 {
            assert!(fast_rx.recv().await.is_some());
        }
    }

    #[tokio::test]
    async fn test_closed_queue_is_unregistered() {
        // テスト項目: 受信側が閉じた接続への送信は QueueClosed になり登録が外れる
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new();
        let (tx, rx, _disconnect) = PusherChannel::bounded(4);
        pusher.register_client(conn("gone"), tx).await;
        drop(rx);

        // when (操作):
        let result = pusher.push_to(&conn("gone"), &moved_event()).await;

        // then (期待する結果):
        assert_eq!(result, Err(MessagePushError::QueueClosed("gone".to_string())));
        assert!(pusher.is_empty());
    }

    #[tokio::test]
    async fn test_broadcast_empty_targets() {
        // テスト項目: 空のターゲットリストでもエラーにならない
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new();

        // when (操作):
        let delivered = pusher.broadcast(&[], &moved_event()).await;

        // then (期待する結果):
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_unregister_client() {
        // テスト項目: 登録解除後の送信は ConnectionNotFound になる
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new();
        let (tx, _rx, _disconnect) = PusherChannel::bounded(4);
        pusher.register_client(conn("alice"), tx).await;

        // when (操作):
        pusher.unregister_client(&conn("alice")).await;
        let result = pusher.push_to(&conn("alice"), &moved_event()).await;

        // then (期待する結果):
        assert!(matches!(
            result,
            Err(MessagePushError::ConnectionNotFound(_))
        ));
    }
}
