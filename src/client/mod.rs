//! Relay client implementation
//!
//! Provides a client speaking the relay's sub-protocol, for devices that
//! publish audio and for connections requesting it.

pub mod relay_client;

pub use relay_client::RelayClient;
