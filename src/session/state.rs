//! Session state machine
//!
//! Tracks one relay connection from accept to close:
//! `Unidentified → Identified → Streaming`, with `Closed` reachable from
//! every phase.

use rand::Rng;

use crate::connection::ConnectionId;
use crate::protocol::constants::STREAM_SESSION_ID_LEN;
use crate::registry::DeviceId;

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Connected, waiting for the identity message
    Unidentified,
    /// Identity received, no payload sent yet
    Identified,
    /// At least one payload sent; member of its own device's set
    Streaming,
    /// Connection closed or failed
    Closed,
}

/// Complete session state
#[derive(Debug)]
pub struct SessionState {
    /// Connection this session is bound to
    pub conn_id: ConnectionId,

    /// Current phase
    pub phase: SessionPhase,

    /// Identity from the first message
    pub device: Option<DeviceId>,

    /// Stream-session id minted on the first payload
    pub stream_session: Option<String>,
}

impl SessionState {
    /// Create a new session state
    pub fn new(conn_id: ConnectionId) -> Self {
        Self {
            conn_id,
            phase: SessionPhase::Unidentified,
            device: None,
            stream_session: None,
        }
    }

    /// Record the connection's identity
    pub fn identify(&mut self, device: DeviceId) {
        if self.phase == SessionPhase::Unidentified {
            self.device = Some(device);
            self.phase = SessionPhase::Identified;
        }
    }

    /// Start streaming under a freshly minted session id
    ///
    /// Returns the new id, or `None` if the session is not in the
    /// `Identified` phase.
    pub fn start_streaming(&mut self) -> Option<&str> {
        if self.phase != SessionPhase::Identified {
            return None;
        }

        self.phase = SessionPhase::Streaming;
        Some(
            self.stream_session
                .insert(generate_stream_session_id())
                .as_str(),
        )
    }

    /// Move to `Closed`
    ///
    /// Returns the identity that needs registry cleanup the first time it is
    /// called on an identified session, `None` otherwise.
    pub fn close(&mut self) -> Option<DeviceId> {
        if self.phase == SessionPhase::Closed {
            return None;
        }

        self.phase = SessionPhase::Closed;
        self.device.clone()
    }

    /// Device identity, if identified
    pub fn device(&self) -> Option<&DeviceId> {
        self.device.as_ref()
    }

    /// Check if session is closed
    pub fn is_closed(&self) -> bool {
        self.phase == SessionPhase::Closed
    }
}

/// Mint a random stream-session id of lowercase base-36 characters
pub fn generate_stream_session_id() -> String {
    let mut rng = rand::rng();

    (0..STREAM_SESSION_ID_LEN)
        .map(|_| char::from_digit(rng.random_range(0..36), 36).unwrap_or('0'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_lifecycle() {
        let mut state = SessionState::new(ConnectionId(1));
        assert_eq!(state.phase, SessionPhase::Unidentified);

        state.identify(DeviceId::new("dev1"));
        assert_eq!(state.phase, SessionPhase::Identified);
        assert_eq!(state.device(), Some(&DeviceId::new("dev1")));

        let session = state.start_streaming().map(str::to_owned);
        assert_eq!(state.phase, SessionPhase::Streaming);
        assert_eq!(session.as_deref(), state.stream_session.as_deref());

        assert_eq!(state.close(), Some(DeviceId::new("dev1")));
        assert!(state.is_closed());
    }

    #[test]
    fn test_identify_only_once() {
        let mut state = SessionState::new(ConnectionId(1));
        state.identify(DeviceId::new("first"));
        state.identify(DeviceId::new("second"));

        assert_eq!(state.device(), Some(&DeviceId::new("first")));
    }

    #[test]
    fn test_stream_session_minted_once() {
        let mut state = SessionState::new(ConnectionId(1));
        assert!(state.start_streaming().is_none());

        state.identify(DeviceId::new("dev1"));
        let first = state.start_streaming().map(str::to_owned);
        assert!(first.is_some());
        assert!(state.start_streaming().is_none());
        assert_eq!(state.stream_session, first);
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut state = SessionState::new(ConnectionId(1));
        state.identify(DeviceId::new("dev1"));

        assert!(state.close().is_some());
        assert!(state.close().is_none());
    }

    #[test]
    fn test_close_unidentified_needs_no_cleanup() {
        let mut state = SessionState::new(ConnectionId(1));
        assert!(state.close().is_none());
        assert!(state.is_closed());
    }

    #[test]
    fn test_stream_session_id_shape() {
        let id = generate_stream_session_id();
        assert_eq!(id.len(), STREAM_SESSION_ID_LEN);
        assert!(id
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }
}
