//! Shared utilities for the chat room server and its tests.

pub mod logger;
pub mod time;
