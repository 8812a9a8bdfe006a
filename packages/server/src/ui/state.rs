//! Shared application state.

use std::sync::Arc;

use crate::{
    domain::{ConnectionRegistry, RoomDirectory},
    usecase::{ConnectionLifecycleManager, MessageHistoryUseCase},
};

/// Shared application state
pub struct AppState {
    /// ConnectionLifecycleManager（接続の受け入れ・ディスパッチ・切断）
    pub lifecycle: Arc<ConnectionLifecycleManager>,
    /// MessageHistoryUseCase（メッセージ履歴の取得）
    pub history: Arc<MessageHistoryUseCase>,
    /// 接続数の参照用
    pub registry: Arc<ConnectionRegistry>,
    /// 稼働中ルームのスナップショット参照用
    pub directory: Arc<RoomDirectory>,
    /// 接続ごとの送信キューの容量
    pub outbound_queue_capacity: usize,
}
