//! Room coordination server.
//!
//! Run with:
//! ```not_rust
//! JWT_SECRET=... cargo run --bin chatroom-server
//! cargo run --bin chatroom-server -- --host 0.0.0.0 --port 3001 --fixtures fixtures.json
//! ```

use chatroom_server::{
    bootstrap::Application,
    config::{Args, ServerConfig},
};
use chatroom_shared::logger::setup_logger;
use clap::Parser;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), &args.log_level);

    let config = match ServerConfig::try_from(args) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };

    let app = Application::new(config);
    if let Err(e) = app.seed_from_config().await {
        tracing::error!("Failed to seed fixtures: {}", e);
        std::process::exit(1);
    }
    let sweeper = app.spawn_background_tasks();

    let (host, port) = (app.config.host.clone(), app.config.port);
    let result = app.server().run(&host, port).await;
    sweeper.abort();
    if let Err(e) = result {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
