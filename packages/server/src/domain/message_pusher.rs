//! MessagePusher trait 定義
//!
//! 接続へのイベント送信を抽象化します。
//! UseCase 層はこの trait に依存し、WebSocket などの具体的な送信手段には依存しない。

use async_trait::async_trait;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;

use super::{error::MessagePushError, event::ServerEvent, value_object::ConnectionId};

/// 接続ごとの送信キュー（有界）
///
/// キューが溢れた接続は切断される（他の接続への配送を止めないため）。
/// 切断要求は `disconnect` のトークンでセッションへ即座に伝わり、
/// キューに残ったフレームは送られない。
#[derive(Debug, Clone)]
pub struct PusherChannel {
    sender: mpsc::Sender<String>,
    disconnect: CancellationToken,
}

impl PusherChannel {
    pub fn new(sender: mpsc::Sender<String>, disconnect: CancellationToken) -> Self {
        Self { sender, disconnect }
    }

    /// 容量 `capacity` のキューを作り、受信側と切断トークンも返す
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<String>, CancellationToken) {
        let (sender, receiver) = mpsc::channel(capacity);
        let disconnect = CancellationToken::new();
        (Self::new(sender, disconnect.clone()), receiver, disconnect)
    }

    /// 待たずにキューへ投入する
    pub fn try_send(&self, frame: String) -> Result<(), TrySendError<String>> {
        self.sender.try_send(frame)
    }

    pub fn same_channel(&self, other: &Self) -> bool {
        self.sender.same_channel(&other.sender)
    }

    /// セッションに即時の切断を要求する
    pub fn request_disconnect(&self) {
        self.disconnect.cancel();
    }
}

/// イベント送信の抽象化
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessagePusher: Send + Sync {
    /// 接続の送信キューを登録
    async fn register_client(&self, connection_id: ConnectionId, sender: PusherChannel);

    /// 接続の送信キューを削除（未登録なら何もしない）
    async fn unregister_client(&self, connection_id: &ConnectionId);

    /// 特定の接続にイベントを送信
    async fn push_to(
        &self,
        connection_id: &ConnectionId,
        event: &ServerEvent,
    ) -> Result<(), MessagePushError>;

    /// 複数の接続にイベントを送信
    ///
    /// 一部の送信失敗は許容し、配送できた接続数を返す。
    async fn broadcast(&self, targets: &[ConnectionId], event: &ServerEvent) -> usize;
}
