//! Relay client
//!
//! High-level API for talking to an audio relay over WebSocket.

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::{Error, Result};
use crate::protocol::constants::REQUEST_AUDIO_PREFIX;
use crate::protocol::RelayFrame;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Relay client
///
/// # Example
/// ```no_run
/// use audio_relay::client::RelayClient;
///
/// # async fn example() -> audio_relay::error::Result<()> {
/// let mut device = RelayClient::connect("ws://localhost:8080").await?;
/// device.identify("kitchen-mic").await?;
/// let welcome = device.recv().await?;
///
/// device.send_audio(vec![0x01, 0x02, 0x03]).await?;
/// # Ok(())
/// # }
/// ```
pub struct RelayClient {
    socket: Option<WsStream>,
}

impl RelayClient {
    /// Connect to a relay at `url` (e.g. `ws://127.0.0.1:8080`)
    pub async fn connect(url: &str) -> Result<Self> {
        let (socket, _response) = connect_async(url).await?;
        tracing::debug!(url = url, "Connected to relay");

        Ok(Self {
            socket: Some(socket),
        })
    }

    /// Send the identity message; must be the first message sent
    pub async fn identify(&mut self, device: &str) -> Result<()> {
        self.send(RelayFrame::text(device)).await
    }

    /// Ask the relay to notify `device`'s members
    pub async fn request_audio(&mut self, device: &str) -> Result<()> {
        self.send(RelayFrame::text(format!("{}{}", REQUEST_AUDIO_PREFIX, device)))
            .await
    }

    /// Send a binary audio payload
    pub async fn send_audio(&mut self, data: impl Into<Bytes>) -> Result<()> {
        self.send(RelayFrame::binary(data)).await
    }

    /// Send any frame
    pub async fn send(&mut self, frame: RelayFrame) -> Result<()> {
        let socket = self.socket.as_mut().ok_or(Error::NotConnected)?;
        socket.send(frame.into_message()).await?;
        Ok(())
    }

    /// Receive the next data frame
    ///
    /// Ping/pong frames are skipped. Returns `None` once the relay closes the
    /// connection.
    pub async fn recv(&mut self) -> Result<Option<RelayFrame>> {
        let socket = self.socket.as_mut().ok_or(Error::NotConnected)?;

        while let Some(message) = socket.next().await {
            match message? {
                Message::Close(_) => break,
                message => {
                    if let Some(frame) = RelayFrame::from_message(message) {
                        return Ok(Some(frame));
                    }
                }
            }
        }

        self.socket = None;
        Ok(None)
    }

    /// Close the connection
    pub async fn close(&mut self) -> Result<()> {
        if let Some(mut socket) = self.socket.take() {
            socket.close(None).await?;
        }
        Ok(())
    }

    /// Check if the socket is still open
    pub fn is_connected(&self) -> bool {
        self.socket.is_some()
    }
}
