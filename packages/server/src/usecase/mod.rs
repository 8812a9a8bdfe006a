//! UseCase 層
//!
//! ドメイン層の共有状態（ConnectionRegistry / RoomDirectory）とポートを組み合わせて、
//! 入退室・チャット・シグナリング・接続ライフサイクルの各操作を提供します。

pub mod chat;
pub mod error;
pub mod history;
pub mod lifecycle;
pub mod presence;
pub mod signaling;

#[cfg(test)]
pub mod test_support;

pub use chat::{ChatFanout, DEFAULT_TYPING_TIMEOUT};
pub use error::{
    AdmitError, ChatError, DispatchError, ErrorKind, HistoryError, PresenceError, SignalingError,
};
pub use history::{HistoryEntry, MessageHistoryUseCase};
pub use lifecycle::ConnectionLifecycleManager;
pub use presence::{JoinOutcome, LeaveReason, PresenceCoordinator, StatusChange};
pub use signaling::{RelayOutcome, SignalingRelay};
