//! Relay server
//!
//! Accepts TCP connections, upgrades them to WebSocket and hands each one to
//! a session handler backed by the shared registry.

pub mod config;
pub mod listener;
mod socket;

pub use config::ServerConfig;
pub use listener::RelayServer;
