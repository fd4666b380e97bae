//! Relay wire protocol
//!
//! The relay imposes no framing beyond WebSocket messages. The first message
//! on a connection is the device identity, `REQUEST_AUDIO:<device>` is the only
//! control message, and everything else is opaque payload.

pub mod constants;
pub mod message;

pub use message::{Inbound, RelayFrame};
