//! Relay sub-protocol constants

/// Prefix of the control message asking for a device's audio
pub const REQUEST_AUDIO_PREFIX: &str = "REQUEST_AUDIO:";

/// Acknowledgement sent after the identity message
pub const WELCOME_PREFIX: &str = "Welcome device ";

/// Notice broadcast to a device's members when someone requests its audio
pub const STREAMING_NOTICE_PREFIX: &str = "Streaming audio for device: ";

/// Length of a minted stream-session id
pub const STREAM_SESSION_ID_LEN: usize = 9;

/// Default listen port
pub const DEFAULT_PORT: u16 = 8080;
