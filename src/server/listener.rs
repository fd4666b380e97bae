//! Relay server listener
//!
//! Handles the TCP accept loop, spawns one task per connection and performs
//! shutdown.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::connection::ConnectionId;
use crate::error::Result;
use crate::registry::StreamRegistry;
use crate::server::config::ServerConfig;
use crate::server::socket::{serve_socket, OpenConnections};

/// Audio relay server
pub struct RelayServer {
    config: ServerConfig,
    registry: Arc<StreamRegistry>,
    next_connection_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
    open: OpenConnections,
    tasks: TaskTracker,
    shutdown: CancellationToken,
}

impl RelayServer {
    /// Create a new server with its own registry
    pub fn new(config: ServerConfig) -> Self {
        Self::with_registry(config, Arc::new(StreamRegistry::new()))
    }

    /// Create a new server sharing an existing registry
    pub fn with_registry(config: ServerConfig, registry: Arc<StreamRegistry>) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            config,
            registry,
            next_connection_id: AtomicU64::new(1),
            connection_semaphore,
            open: OpenConnections::default(),
            tasks: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Get a reference to the stream registry
    pub fn registry(&self) -> &Arc<StreamRegistry> {
        &self.registry
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Number of connections with an established WebSocket
    pub async fn connection_count(&self) -> usize {
        self.open.read().await.len()
    }

    /// Run the server until the process is stopped
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Bind the configured address and run until `shutdown` completes
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Run on an already bound listener until `shutdown` completes
    ///
    /// On shutdown the server stops accepting, closes every open connection
    /// and waits up to `shutdown_timeout` for connection tasks to finish.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let local_addr = listener.local_addr()?;
        tracing::info!(addr = %local_addr, "Audio relay listening");

        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
            }
            _ = self.accept_loop(&listener) => {}
        }

        drop(listener);
        self.shutdown().await;

        Ok(())
    }

    async fn accept_loop(&self, listener: &TcpListener) {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let id = ConnectionId(self.next_connection_id.fetch_add(1, Ordering::Relaxed));

        tracing::debug!(conn_id = %id, peer = %peer_addr, "New connection");

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::error!(conn_id = %id, error = %e, "Failed to configure socket");
                return;
            }
        }

        let config = self.config.clone();
        let registry = Arc::clone(&self.registry);
        let open = Arc::clone(&self.open);
        let shutdown = self.shutdown.child_token();

        self.tasks.spawn(async move {
            let _permit = permit;

            let result = serve_socket(id, socket, peer_addr, config, registry, open, shutdown);
            if let Err(e) = result.await {
                tracing::debug!(conn_id = %id, error = %e, "Connection error");
            }

            tracing::debug!(conn_id = %id, "Connection closed");
        });
    }

    async fn shutdown(&self) {
        // Sockets still in the handshake see this and never register
        self.shutdown.cancel();

        let open: Vec<_> = self.open.read().await.values().cloned().collect();
        tracing::info!(connections = open.len(), "Closing open connections");

        for conn in &open {
            conn.close();
        }

        self.tasks.close();
        if tokio::time::timeout(self.config.shutdown_timeout, self.tasks.wait())
            .await
            .is_err()
        {
            tracing::warn!(
                remaining = self.tasks.len(),
                "Shutdown timed out waiting for connections"
            );
        }

        tracing::info!("Audio relay stopped");
    }
}
