//! Relay frames and inbound message classification

use std::borrow::Cow;
use std::sync::Arc;

use bytes::Bytes;
use tokio_tungstenite::tungstenite::Message;

use super::constants::{REQUEST_AUDIO_PREFIX, STREAMING_NOTICE_PREFIX, WELCOME_PREFIX};
use crate::registry::DeviceId;

/// A single WebSocket data message as seen by the relay
///
/// Cheap to clone: text is shared behind an `Arc` and binary data is
/// reference-counted by `Bytes`, so broadcasting to many members never copies
/// the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayFrame {
    /// UTF-8 text message
    Text(Arc<str>),
    /// Binary message (audio data)
    Binary(Bytes),
}

impl RelayFrame {
    /// Create a text frame
    pub fn text(text: impl Into<Arc<str>>) -> Self {
        RelayFrame::Text(text.into())
    }

    /// Create a binary frame
    pub fn binary(data: impl Into<Bytes>) -> Self {
        RelayFrame::Binary(data.into())
    }

    /// Raw bytes of the frame
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            RelayFrame::Text(text) => text.as_bytes(),
            RelayFrame::Binary(data) => data,
        }
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Whether the frame carries no bytes
    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    /// Frame content as text, replacing invalid UTF-8 sequences
    pub fn to_text_lossy(&self) -> Cow<'_, str> {
        match self {
            RelayFrame::Text(text) => Cow::Borrowed(text.as_ref()),
            RelayFrame::Binary(data) => String::from_utf8_lossy(data),
        }
    }

    /// Convert an incoming WebSocket message
    ///
    /// Returns `None` for control messages (ping, pong, close, raw frames),
    /// which the transport handles itself.
    pub fn from_message(message: Message) -> Option<Self> {
        match message {
            Message::Text(text) => Some(RelayFrame::Text(Arc::from(text.as_str()))),
            Message::Binary(data) => Some(RelayFrame::Binary(data)),
            Message::Ping(_) | Message::Pong(_) | Message::Close(_) | Message::Frame(_) => None,
        }
    }

    /// Convert into an outgoing WebSocket message, preserving the frame kind
    pub fn into_message(self) -> Message {
        match self {
            RelayFrame::Text(text) => Message::text(text.to_string()),
            RelayFrame::Binary(data) => Message::Binary(data),
        }
    }
}

/// Classification of a message received after the identity message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// `REQUEST_AUDIO:<target>` control message
    RequestAudio {
        /// Everything after the prefix, taken verbatim
        target: DeviceId,
    },
    /// Anything else, forwarded byte-for-byte
    Payload,
}

impl Inbound {
    /// Classify a frame received on an identified connection
    ///
    /// Binary frames are matched on their bytes, so a binary message that
    /// happens to start with the control prefix is still a request.
    pub fn classify(frame: &RelayFrame) -> Self {
        let prefix = REQUEST_AUDIO_PREFIX.as_bytes();
        match frame.as_bytes().strip_prefix(prefix) {
            Some(rest) => Inbound::RequestAudio {
                target: DeviceId::new(String::from_utf8_lossy(rest)),
            },
            None => Inbound::Payload,
        }
    }
}

/// Acknowledgement for an identity message
pub fn welcome(device: &DeviceId) -> RelayFrame {
    RelayFrame::text(format!("{}{}", WELCOME_PREFIX, device))
}

/// Reply to a request for a device that was never seen
pub fn device_unavailable(device: &DeviceId) -> RelayFrame {
    RelayFrame::text(format!("Device {} is not available.", device))
}

/// Notice broadcast to a device's members after a request for its audio
pub fn streaming_notice(device: &DeviceId) -> RelayFrame {
    RelayFrame::text(format!("{}{}", STREAMING_NOTICE_PREFIX, device))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_request() {
        let frame = RelayFrame::text("REQUEST_AUDIO:deviceA");
        assert_eq!(
            Inbound::classify(&frame),
            Inbound::RequestAudio {
                target: DeviceId::new("deviceA")
            }
        );
    }

    #[test]
    fn test_classify_request_keeps_later_colons() {
        let frame = RelayFrame::text("REQUEST_AUDIO:room:mic:1");
        assert_eq!(
            Inbound::classify(&frame),
            Inbound::RequestAudio {
                target: DeviceId::new("room:mic:1")
            }
        );
    }

    #[test]
    fn test_classify_empty_target() {
        let frame = RelayFrame::text("REQUEST_AUDIO:");
        assert_eq!(
            Inbound::classify(&frame),
            Inbound::RequestAudio {
                target: DeviceId::new("")
            }
        );
    }

    #[test]
    fn test_classify_binary_request() {
        let frame = RelayFrame::binary(Bytes::from_static(b"REQUEST_AUDIO:dev1"));
        assert_eq!(
            Inbound::classify(&frame),
            Inbound::RequestAudio {
                target: DeviceId::new("dev1")
            }
        );
    }

    #[test]
    fn test_classify_payload() {
        let audio = RelayFrame::binary(Bytes::from_static(&[0x01, 0x02, 0x03]));
        assert_eq!(Inbound::classify(&audio), Inbound::Payload);

        // Prefix must match exactly, including case
        let text = RelayFrame::text("request_audio:dev1");
        assert_eq!(Inbound::classify(&text), Inbound::Payload);

        let empty = RelayFrame::binary(Bytes::new());
        assert_eq!(Inbound::classify(&empty), Inbound::Payload);
    }

    #[test]
    fn test_reply_texts() {
        let device = DeviceId::new("dev1");
        assert_eq!(welcome(&device), RelayFrame::text("Welcome device dev1"));
        assert_eq!(
            device_unavailable(&device),
            RelayFrame::text("Device dev1 is not available.")
        );
        assert_eq!(
            streaming_notice(&device),
            RelayFrame::text("Streaming audio for device: dev1")
        );
    }

    #[test]
    fn test_lossy_text() {
        let frame = RelayFrame::binary(vec![b'a', 0xFF, b'b']);
        assert_eq!(frame.to_text_lossy(), "a\u{FFFD}b");
        assert_eq!(frame.len(), 3);
    }

    #[test]
    fn test_message_conversion_preserves_kind() {
        let text = RelayFrame::text("hello");
        assert!(matches!(text.clone().into_message(), Message::Text(_)));
        assert_eq!(RelayFrame::from_message(text.into_message()), Some(RelayFrame::text("hello")));

        let bin = RelayFrame::binary(Bytes::from_static(&[9, 8, 7]));
        assert_eq!(RelayFrame::from_message(bin.clone().into_message()), Some(bin));

        assert_eq!(RelayFrame::from_message(Message::Ping(Bytes::new())), None);
    }
}
