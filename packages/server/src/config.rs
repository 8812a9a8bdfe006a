//! Command line / environment configuration.
//!
//! Every option can also be given through an environment variable, e.g.
//! `JWT_SECRET=... PORT=3001 chatroom-server`.

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use thiserror::Error;

use crate::infrastructure::auth::jwt::MIN_SECRET_LENGTH;

#[derive(Parser, Debug, Clone)]
#[command(name = "chatroom-server")]
#[command(about = "Real-time room coordination and WebRTC signaling relay", long_about = None)]
pub struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, env = "HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, env = "PORT", default_value = "3001")]
    pub port: u16,

    /// HS256 secret used to verify identity tokens (at least 32 bytes)
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    /// Seconds without a typing-start refresh before a typing indicator is cleared
    #[arg(long, env = "TYPING_TIMEOUT_SECS", default_value = "10")]
    pub typing_timeout_secs: u64,

    /// Interval of the idle-typing sweeper in milliseconds
    #[arg(long, env = "TYPING_SWEEP_MILLIS", default_value = "1000")]
    pub typing_sweep_millis: u64,

    /// Per-connection outbound queue size; a connection whose queue overflows is dropped
    #[arg(long, env = "OUTBOUND_QUEUE_CAPACITY", default_value = "64")]
    pub outbound_queue_capacity: usize,

    /// JSON file with users and rooms to seed the in-memory repositories
    #[arg(long, env = "FIXTURES_PATH")]
    pub fixtures: Option<PathBuf>,

    /// Default log level (overridden by RUST_LOG)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("jwt secret must be at least {min} bytes")]
    SecretTooShort { min: usize },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Validated server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub typing_timeout: Duration,
    pub typing_sweep_interval: Duration,
    pub outbound_queue_capacity: usize,
    pub fixtures: Option<PathBuf>,
    pub log_level: String,
}

impl TryFrom<Args> for ServerConfig {
    type Error = ConfigError;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
        if args.jwt_secret.len() < MIN_SECRET_LENGTH {
            return Err(ConfigError::SecretTooShort {
                min: MIN_SECRET_LENGTH,
            });
        }
        if args.typing_timeout_secs == 0 {
            return Err(ConfigError::Zero("typing-timeout-secs"));
        }
        if args.typing_sweep_millis == 0 {
            return Err(ConfigError::Zero("typing-sweep-millis"));
        }
        if args.outbound_queue_capacity == 0 {
            return Err(ConfigError::Zero("outbound-queue-capacity"));
        }
        Ok(Self {
            host: args.host,
            port: args.port,
            jwt_secret: args.jwt_secret,
            typing_timeout: Duration::from_secs(args.typing_timeout_secs),
            typing_sweep_interval: Duration::from_millis(args.typing_sweep_millis),
            outbound_queue_capacity: args.outbound_queue_capacity,
            fixtures: args.fixtures,
            log_level: args.log_level,
        })
    }
}

impl ServerConfig {
    /// Configuration for tests and embedding: loopback, ephemeral port, defaults elsewhere.
    pub fn local(jwt_secret: impl Into<String>) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            jwt_secret: jwt_secret.into(),
            typing_timeout: Duration::from_secs(10),
            typing_sweep_interval: Duration::from_millis(1000),
            outbound_queue_capacity: 64,
            fixtures: None,
            log_level: "info".to_string(),
        }
    }
}
