//! Real-time audio relay
//!
//! Devices connect over WebSocket, identify themselves with their first
//! message and then stream audio. Every payload a device sends is fanned out
//! to all connections that have streamed under the same identity. Other
//! connections can ask for a device with `REQUEST_AUDIO:<device>`, which
//! notifies that device's members.
//!
//! # Architecture
//!
//! ```text
//!   TCP accept ──► RelayServer ──► socket task (one per connection)
//!                                     │
//!                       read loop ────┤──── writer task ◄── mpsc ◄── Connection
//!                                     ▼
//!                               SessionHandler
//!                                     │ ensure / join / snapshot / leave
//!                                     ▼
//!                             Arc<StreamRegistry>
//! ```
//!
//! Nothing is stored: audio that arrives while a device has no members is
//! dropped.
//!
//! # Example
//!
//! ```no_run
//! use audio_relay::{RelayServer, ServerConfig};
//!
//! # async fn example() -> audio_relay::error::Result<()> {
//! let server = RelayServer::new(ServerConfig::default().port(8080));
//! server.run_until(async {
//!     let _ = tokio::signal::ctrl_c().await;
//! }).await
//! # }
//! ```

pub mod client;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;
pub mod stats;

pub use client::RelayClient;
pub use connection::{Connection, ConnectionId, TransportError};
pub use error::{Error, Result};
pub use protocol::RelayFrame;
pub use registry::{DeviceId, StreamRegistry};
pub use server::{RelayServer, ServerConfig};
pub use session::{SessionHandler, SessionPhase};
