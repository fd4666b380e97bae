//! Error types
//!
//! Crate-level error returned by the server, socket driver and client.

use std::time::Duration;

use crate::connection::TransportError;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Socket-level I/O failure (bind, accept, configure)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket protocol or stream failure
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The WebSocket upgrade did not finish in time
    #[error("WebSocket handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    /// Failure on a single relay connection
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Client operation attempted without an open socket
    #[error("not connected")]
    NotConnected,
}
