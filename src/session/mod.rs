//! Relay session management
//!
//! Each accepted connection gets a [`SessionHandler`] that interprets its
//! messages and drives the shared registry. Close and error events are
//! handled by the lifecycle methods in [`lifecycle`].

pub mod handler;
pub mod lifecycle;
pub mod state;

pub use handler::SessionHandler;
pub use state::{generate_stream_session_id, SessionPhase, SessionState};
