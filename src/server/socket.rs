//! Per-socket driver
//!
//! Upgrades an accepted TCP stream to WebSocket, then runs two halves:
//! a writer task draining the connection's outbound queue into the socket,
//! and a read loop feeding every inbound message to the session handler.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;

use crate::connection::{Connection, ConnectionId};
use crate::error::{Error, Result};
use crate::protocol::RelayFrame;
use crate::registry::StreamRegistry;
use crate::server::config::ServerConfig;
use crate::session::SessionHandler;

/// Connections currently open on a server
pub(crate) type OpenConnections = Arc<RwLock<HashMap<ConnectionId, Connection>>>;

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsSource = SplitStream<WebSocketStream<TcpStream>>;

/// Drive one accepted socket until it closes
pub(crate) async fn serve_socket(
    id: ConnectionId,
    socket: TcpStream,
    peer_addr: SocketAddr,
    config: ServerConfig,
    registry: Arc<StreamRegistry>,
    open: OpenConnections,
    shutdown: CancellationToken,
) -> Result<()> {
    let mut ws_config = WebSocketConfig::default();
    ws_config.max_message_size = Some(config.max_message_size);
    ws_config.max_frame_size = Some(config.max_message_size);

    let handshake = tokio::time::timeout(
        config.handshake_timeout,
        tokio_tungstenite::accept_async_with_config(socket, Some(ws_config)),
    );

    let ws = tokio::select! {
        _ = shutdown.cancelled() => {
            tracing::debug!(conn_id = %id, peer = %peer_addr, "Handshake abandoned on shutdown");
            return Ok(());
        }
        ws = handshake => ws.map_err(|_| Error::HandshakeTimeout(config.handshake_timeout))??,
    };

    let (conn, outbound) = Connection::channel(id, config.send_queue_capacity);
    {
        // Checked under the lock so shutdown either sees this connection or
        // this task sees the cancellation
        let mut registered = open.write().await;
        if shutdown.is_cancelled() {
            tracing::debug!(conn_id = %id, peer = %peer_addr, "Connection dropped on shutdown");
            return Ok(());
        }
        registered.insert(id, conn.clone());
    }

    tracing::debug!(conn_id = %id, peer = %peer_addr, "WebSocket established");

    let (sink, source) = ws.split();
    let writer = tokio::spawn(write_loop(
        sink,
        outbound,
        conn.clone(),
        config.send_timeout,
    ));

    let mut handler = SessionHandler::new(conn.clone(), registry);
    read_loop(source, &mut handler).await;

    open.write().await.remove(&id);
    if let Err(e) = writer.await {
        tracing::debug!(conn_id = %id, error = %e, "Writer task aborted");
    }

    Ok(())
}

async fn read_loop(mut source: WsSource, handler: &mut SessionHandler) {
    let conn = handler.connection().clone();

    loop {
        tokio::select! {
            _ = conn.closed() => {
                // Closed locally: server shutdown or a failed write
                handler.on_close().await;
                return;
            }
            message = source.next() => match message {
                Some(Ok(Message::Close(_))) | None => {
                    handler.on_close().await;
                    return;
                }
                Some(Ok(message)) => {
                    if let Some(frame) = RelayFrame::from_message(message) {
                        handler.on_message(frame).await;
                    }
                }
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => {
                    handler.on_close().await;
                    return;
                }
                Some(Err(e)) => {
                    handler.on_error(&e).await;
                    return;
                }
            }
        }
    }
}

async fn write_loop(
    mut sink: WsSink,
    mut outbound: mpsc::Receiver<RelayFrame>,
    conn: Connection,
    send_timeout: Duration,
) {
    let id = conn.identity();

    loop {
        tokio::select! {
            biased;
            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    break;
                };

                match tokio::time::timeout(send_timeout, sink.send(frame.into_message())).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::warn!(conn_id = %id, error = %e, "Write failed, closing connection");
                        conn.close();
                        return;
                    }
                    Err(_) => {
                        tracing::warn!(
                            conn_id = %id,
                            timeout_ms = send_timeout.as_millis() as u64,
                            "Write timed out, closing connection"
                        );
                        conn.close();
                        return;
                    }
                }
            }
            _ = conn.closed() => break,
        }
    }

    // Best-effort close frame; the peer may already be gone
    let _ = tokio::time::timeout(send_timeout, sink.send(Message::Close(None))).await;
    let _ = tokio::time::timeout(send_timeout, sink.close()).await;
}
