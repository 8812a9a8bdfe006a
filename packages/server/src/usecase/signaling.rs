//! UseCase: WebRTC シグナリングの中継（SignalingRelay）
//!
//! offer / answer / ICE candidate は中身を解釈せず、同じルームのメンバー同士に限って
//! 宛先の接続へそのまま転送する。宛先が既に切断済みの場合は黙って破棄する。

use std::sync::Arc;

use serde_json::Value;

use crate::domain::{
    ConnectionId, ConnectionRegistry, MessagePusher, RoomDirectory, ServerEvent, SignalKind,
};

use super::error::SignalingError;

/// 中継の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    Delivered,
    /// 宛先が存在しない・送信キューが閉じている
    Dropped,
}

/// シグナリング中継のユースケース
pub struct SignalingRelay {
    registry: Arc<ConnectionRegistry>,
    directory: Arc<RoomDirectory>,
    message_pusher: Arc<dyn MessagePusher>,
}

impl SignalingRelay {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        directory: Arc<RoomDirectory>,
        message_pusher: Arc<dyn MessagePusher>,
    ) -> Self {
        Self {
            registry,
            directory,
            message_pusher,
        }
    }

    /// シグナリングメッセージを宛先へ転送する
    pub async fn relay(
        &self,
        kind: SignalKind,
        from: &ConnectionId,
        to: &ConnectionId,
        payload: Value,
    ) -> Result<RelayOutcome, SignalingError> {
        let Some(target) = self.registry.lookup(to) else {
            tracing::debug!(from = %from, to = %to, ?kind, "signal target gone, dropped");
            return Ok(RelayOutcome::Dropped);
        };
        let sender = self.registry.lookup(from);
        let shared_room = match (sender, target.room_id) {
            (Some(sender), Some(room_id))
                if !sender.in_lobby && !target.in_lobby && sender.is_member_of(&room_id) =>
            {
                Some(room_id)
            }
            _ => None,
        };
        let not_in_same_room = || SignalingError::NotInSameRoom { to: to.to_string() };
        let room_id = shared_room.ok_or_else(not_in_same_room)?;

        // レジストリは補助情報なので、最終判断はルームのメンバー集合で行う
        let guard = self
            .directory
            .get_live(&room_id)
            .await
            .ok_or_else(not_in_same_room)?;
        if !guard.is_member(from) || !guard.is_member(to) {
            return Err(not_in_same_room());
        }

        let event = ServerEvent::WebrtcSignal {
            kind,
            payload,
            from: from.clone(),
            to: to.clone(),
        };
        match self.message_pusher.push_to(to, &event).await {
            Ok(()) => Ok(RelayOutcome::Delivered),
            Err(e) => {
                tracing::debug!(from = %from, to = %to, ?kind, "signal dropped: {}", e);
                Ok(RelayOutcome::Dropped)
            }
        }
    }

    /// 音声の準備完了を同じルームの他メンバーへ知らせ、通知した数を返す
    pub async fn announce_ready(&self, connection_id: &ConnectionId) -> usize {
        let Some(info) = self.registry.lookup(connection_id) else {
            return 0;
        };
        let Some(room_id) = info.room_id.as_ref().filter(|_| !info.in_lobby) else {
            return 0;
        };
        let Some(guard) = self.directory.get_live(room_id).await else {
            return 0;
        };
        if !guard.is_member(connection_id) {
            return 0;
        }
        let others: Vec<ConnectionId> = guard
            .snapshot_members()
            .into_iter()
            .filter(|id| id != connection_id)
            .collect();
        self.message_pusher
            .broadcast(
                &others,
                &ServerEvent::WebrtcUserJoined {
                    user_id: info.user_id.clone(),
                    display_name: info.display_name.clone(),
                    connection_id: connection_id.clone(),
                },
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RoomStatus;
    use crate::usecase::{
        presence::PresenceCoordinator,
        test_support::{TestWorld, conn, room_id, room_record},
    };
    use serde_json::json;

    async fn world_with_members(members: &[&str]) -> (TestWorld, PresenceCoordinator) {
        let world = TestWorld::new();
        world
            .add_room(room_record("r1", RoomStatus::Live, 4), None)
            .await;
        world
            .add_room(room_record("r2", RoomStatus::Live, 4), None)
            .await;
        let presence = PresenceCoordinator::new(
            world.registry.clone(),
            world.directory.clone(),
            world.rooms.clone(),
            world.pusher.clone(),
        );
        for member in members {
            let id = world.connect(member);
            presence.join(&id, &room_id("r1"), None).await.unwrap();
        }
        world.pusher.clear();
        (world, presence)
    }

    fn relay(world: &TestWorld) -> SignalingRelay {
        SignalingRelay::new(
            world.registry.clone(),
            world.directory.clone(),
            world.pusher.clone(),
        )
    }

    #[tokio::test]
    async fn test_offer_is_forwarded_opaque_to_target_only() {
        // テスト項目: offer の payload は解釈されずに宛先にだけ届き、from は送信者の接続 ID
        // given (前提条件):
        let (world, _presence) = world_with_members(&["alice", "bob", "carol"]).await;
        let payload = json!({"type": "offer", "sdp": "v=0\r\n..."});

        // when (操作):
        let outcome = relay(&world)
            .relay(SignalKind::Offer, &conn("alice"), &conn("bob"), payload.clone())
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(outcome, RelayOutcome::Delivered);
        assert_eq!(
            world.pusher.events_for(&conn("bob")),
            vec![ServerEvent::WebrtcSignal {
                kind: SignalKind::Offer,
                payload,
                from: conn("alice"),
                to: conn("bob"),
            }]
        );
        assert_eq!(world.pusher.total(), 1);
    }

    #[tokio::test]
    async fn test_signal_to_other_room_is_rejected() {
        // テスト項目: 別のルームにいる接続への中継は NotInSameRoom になり、何も届かない
        // given (前提条件):
        let (world, presence) = world_with_members(&["alice"]).await;
        let dave = world.connect("dave");
        presence.join(&dave, &room_id("r2"), None).await.unwrap();
        world.pusher.clear();

        // when (操作):
        let result = relay(&world)
            .relay(SignalKind::Answer, &conn("alice"), &dave, json!({}))
            .await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(SignalingError::NotInSameRoom {
                to: "dave".to_string()
            })
        );
        assert_eq!(world.pusher.total(), 0);
    }

    #[tokio::test]
    async fn test_signal_from_lobby_is_rejected() {
        // テスト項目: ロビー待機中の接続は同じルームのメンバーとみなさない
        // given (前提条件):
        let (world, presence) = world_with_members(&["alice"]).await;
        world
            .add_room(room_record("stage", RoomStatus::Inactive, 4), None)
            .await;
        let x = world.connect("x");
        let y = world.connect("y");
        presence.join(&x, &room_id("stage"), None).await.unwrap();
        presence.join(&y, &room_id("stage"), None).await.unwrap();

        // when (操作):
        let result = relay(&world)
            .relay(SignalKind::IceCandidate, &x, &y, json!({"candidate": "c"}))
            .await;

        // then (期待する結果):
        assert!(matches!(result, Err(SignalingError::NotInSameRoom { .. })));
    }

    #[tokio::test]
    async fn test_signal_to_departed_connection_is_dropped() {
        // テスト項目: 宛先が切断済みなら送信者にエラーを返さず破棄する
        // given (前提条件):
        let (world, presence) = world_with_members(&["alice", "bob"]).await;
        presence.disconnect_cleanup(&conn("bob")).await;

        // when (操作):
        let outcome = relay(&world)
            .relay(SignalKind::Offer, &conn("alice"), &conn("bob"), json!({}))
            .await;

        // then (期待する結果):
        assert_eq!(outcome, Ok(RelayOutcome::Dropped));
    }

    #[tokio::test]
    async fn test_signal_with_closed_queue_is_dropped() {
        // テスト項目: 宛先の送信キューが閉じていれば Dropped になる
        // given (前提条件):
        let (world, _presence) = world_with_members(&["alice", "bob"]).await;
        world.pusher.kill(&conn("bob"));

        // when (操作):
        let outcome = relay(&world)
            .relay(SignalKind::Offer, &conn("alice"), &conn("bob"), json!({}))
            .await;

        // then (期待する結果):
        assert_eq!(outcome, Ok(RelayOutcome::Dropped));
    }

    #[tokio::test]
    async fn test_ready_is_announced_to_other_members() {
        // テスト項目: 準備完了は自分以外のメンバーに通知され、非メンバーは何もしない
        // given (前提条件):
        let (world, _presence) = world_with_members(&["alice", "bob", "carol"]).await;
        let outsider = world.connect("outsider");
        let relay = relay(&world);

        // when (操作):
        let notified = relay.announce_ready(&conn("alice")).await;
        let ignored = relay.announce_ready(&outsider).await;

        // then (期待する結果):
        assert_eq!(notified, 2);
        assert_eq!(ignored, 0);
        assert_eq!(world.pusher.names_for(&conn("bob")), vec!["webrtc:user-joined"]);
        assert!(world.pusher.names_for(&conn("alice")).is_empty());
    }
}
