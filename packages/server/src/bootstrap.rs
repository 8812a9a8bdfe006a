//! Composition root: wires the in-memory collaborators, the shared state and
//! the use cases into an [`AppState`].

use std::sync::Arc;

use chatroom_shared::time::{Clock, SystemClock};
use tokio::task::JoinHandle;

use crate::{
    config::ServerConfig,
    domain::{ConnectionRegistry, RoomDirectory},
    infrastructure::{
        auth::JwtIdentityVerifier,
        message_pusher::WebSocketMessagePusher,
        repository::{
            InMemoryMessageRepository, InMemoryRoomRepository, InMemoryUserRepository,
            fixtures::{FixtureError, Fixtures},
        },
    },
    ui::{Server, state::AppState},
    usecase::{
        ChatFanout, ConnectionLifecycleManager, MessageHistoryUseCase, PresenceCoordinator,
        SignalingRelay,
    },
};

/// Every long-lived component of a running server.
pub struct Application {
    pub config: ServerConfig,
    pub clock: Arc<dyn Clock>,
    pub registry: Arc<ConnectionRegistry>,
    pub directory: Arc<RoomDirectory>,
    pub rooms: Arc<InMemoryRoomRepository>,
    pub users: Arc<InMemoryUserRepository>,
    pub messages: Arc<InMemoryMessageRepository>,
    pub identity_verifier: Arc<JwtIdentityVerifier>,
    pub lifecycle: Arc<ConnectionLifecycleManager>,
    pub history: Arc<MessageHistoryUseCase>,
    chat: Arc<ChatFanout>,
}

impl Application {
    /// Initialize dependencies in order:
    /// 1. Shared state (registry / directory)
    /// 2. Repositories and identity verifier
    /// 3. MessagePusher
    /// 4. UseCases
    pub fn new(config: ServerConfig) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        // 1. Shared state
        let registry = Arc::new(ConnectionRegistry::new(clock.clone()));
        let directory = Arc::new(RoomDirectory::new());

        // 2. Repositories (in-memory database) and identity verifier
        let rooms = Arc::new(InMemoryRoomRepository::new());
        let users = Arc::new(InMemoryUserRepository::new());
        let messages = Arc::new(InMemoryMessageRepository::new(clock.clone()));
        let identity_verifier = Arc::new(JwtIdentityVerifier::new(config.jwt_secret.as_bytes()));

        // 3. MessagePusher (WebSocket implementation)
        let message_pusher = Arc::new(WebSocketMessagePusher::new());

        // 4. UseCases
        let presence = Arc::new(PresenceCoordinator::new(
            registry.clone(),
            directory.clone(),
            rooms.clone(),
            message_pusher.clone(),
        ));
        let chat = Arc::new(ChatFanout::new(
            registry.clone(),
            directory.clone(),
            messages.clone(),
            message_pusher.clone(),
            config.typing_timeout,
        ));
        let signaling = Arc::new(SignalingRelay::new(
            registry.clone(),
            directory.clone(),
            message_pusher.clone(),
        ));
        let lifecycle = Arc::new(ConnectionLifecycleManager::new(
            registry.clone(),
            identity_verifier.clone(),
            users.clone(),
            rooms.clone(),
            message_pusher,
            presence,
            chat.clone(),
            signaling,
        ));
        let history = Arc::new(MessageHistoryUseCase::new(
            rooms.clone(),
            messages.clone(),
            users.clone(),
        ));

        Self {
            config,
            clock,
            registry,
            directory,
            rooms,
            users,
            messages,
            identity_verifier,
            lifecycle,
            history,
            chat,
        }
    }

    /// Seed the repositories from the configured fixtures file, if any
    pub async fn seed_from_config(&self) -> Result<(), FixtureError> {
        let Some(path) = &self.config.fixtures else {
            return Ok(());
        };
        tracing::info!("Seeding fixtures from {}", path.display());
        self.seed(Fixtures::load(path)?).await
    }

    pub async fn seed(&self, fixtures: Fixtures) -> Result<(), FixtureError> {
        fixtures
            .seed(&self.rooms, &self.users, self.clock.as_ref())
            .await
    }

    /// Start the idle-typing sweeper
    pub fn spawn_background_tasks(&self) -> JoinHandle<()> {
        self.chat
            .clone()
            .spawn_typing_sweeper(self.config.typing_sweep_interval)
    }

    pub fn server(&self) -> Server {
        Server::new(AppState {
            lifecycle: self.lifecycle.clone(),
            history: self.history.clone(),
            registry: self.registry.clone(),
            directory: self.directory.clone(),
            outbound_queue_capacity: self.config.outbound_queue_capacity,
        })
    }
}
