//! Real-time room coordination and WebRTC signaling relay.
//!
//! Connections authenticate with a JWT, join rooms (directly or through a
//! lobby), chat, and exchange opaque WebRTC signaling messages with the other
//! members of their room.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

// composition
pub mod bootstrap;
pub mod config;
