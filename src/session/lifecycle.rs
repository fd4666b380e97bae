//! Connection lifecycle
//!
//! Close and transport errors end a session the same way: the connection
//! leaves its device's member set and the session moves to `Closed`. Errors
//! are additionally logged with their detail. Neither path affects any other
//! connection.

use std::fmt;

use super::handler::SessionHandler;

impl SessionHandler {
    /// Handle a clean close of the connection
    pub async fn on_close(&mut self) {
        self.finish(None).await;
    }

    /// Handle a transport error on the connection
    pub async fn on_error(&mut self, error: &(dyn fmt::Display + Sync)) {
        tracing::warn!(
            conn_id = %self.conn.identity(),
            device = ?self.state.device().map(|d| d.as_str()),
            error = %error,
            "Connection error"
        );

        self.finish(Some(error)).await;
    }

    async fn finish(&mut self, error: Option<&(dyn fmt::Display + Sync)>) {
        if self.state.is_closed() {
            return;
        }

        let device = self.state.close();
        self.conn.close();

        let Some(device) = device else {
            if error.is_none() {
                tracing::debug!(conn_id = %self.conn.identity(), "Unidentified connection closed");
            }
            return;
        };

        let removed = self.registry.remove_connection(&device, &self.conn).await;

        tracing::info!(
            device = %device,
            conn_id = %self.conn.identity(),
            memberships = removed,
            "Device disconnected"
        );
        tracing::debug!(
            device = %device,
            duration_ms = self.stats.duration().as_millis() as u64,
            messages = self.stats.messages_received,
            bytes = self.stats.bytes_received,
            bitrate_bps = self.stats.bitrate(),
            forwarded = self.stats.payloads_forwarded,
            deliveries = self.stats.deliveries,
            failed_deliveries = self.stats.failed_deliveries,
            "Session stats"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::mpsc;

    use crate::connection::{Connection, ConnectionId, TransportError};
    use crate::protocol::RelayFrame;
    use crate::registry::{DeviceId, StreamRegistry};
    use crate::session::{SessionHandler, SessionPhase};

    fn session(
        id: u64,
        registry: &Arc<StreamRegistry>,
    ) -> (SessionHandler, mpsc::Receiver<RelayFrame>) {
        let (conn, rx) = Connection::channel(ConnectionId(id), 32);
        (SessionHandler::new(conn, Arc::clone(registry)), rx)
    }

    #[tokio::test]
    async fn test_close_removes_membership() {
        let registry = Arc::new(StreamRegistry::new());
        let device = DeviceId::new("dev1");
        let (mut a, _rx_a) = session(1, &registry);
        let (mut b, mut rx_b) = session(2, &registry);

        a.on_message(RelayFrame::text("dev1")).await;
        a.on_message(RelayFrame::binary(vec![1u8])).await;
        b.on_message(RelayFrame::text("dev1")).await;
        b.on_message(RelayFrame::binary(vec![2u8])).await;
        assert_eq!(registry.member_count(&device).await, 2);

        a.on_close().await;

        assert_eq!(a.phase(), SessionPhase::Closed);
        assert!(a.connection().is_closed());
        assert_eq!(registry.subscribers_of(&device).await, vec![b.connection().clone()]);
        assert!(registry.device_exists(&device).await);

        // Later broadcasts never reach the closed connection
        while rx_b.try_recv().is_ok() {}
        b.on_message(RelayFrame::binary(vec![3u8])).await;
        assert_eq!(b.stats().failed_deliveries, 0);
        assert_eq!(rx_b.try_recv().unwrap(), RelayFrame::binary(vec![3u8]));
    }

    #[tokio::test]
    async fn test_error_cleans_up_like_close() {
        let registry = Arc::new(StreamRegistry::new());
        let device = DeviceId::new("dev1");
        let (mut a, _rx) = session(1, &registry);

        a.on_message(RelayFrame::text("dev1")).await;
        a.on_message(RelayFrame::binary(vec![1u8])).await;

        let error = TransportError::Closed(ConnectionId(1));
        a.on_error(&error).await;

        assert_eq!(a.phase(), SessionPhase::Closed);
        assert_eq!(registry.member_count(&device).await, 0);
    }

    #[tokio::test]
    async fn test_close_unidentified_touches_nothing() {
        let registry = Arc::new(StreamRegistry::new());
        let (mut a, _rx) = session(1, &registry);

        a.on_close().await;

        assert_eq!(a.phase(), SessionPhase::Closed);
        assert_eq!(registry.device_count().await, 0);
    }

    #[tokio::test]
    async fn test_close_then_error_is_single_cleanup() {
        let registry = Arc::new(StreamRegistry::new());
        let (mut a, _rx) = session(1, &registry);

        a.on_message(RelayFrame::text("dev1")).await;
        a.on_close().await;
        a.on_error(&"late failure").await;
        a.on_message(RelayFrame::binary(vec![9u8])).await;

        assert_eq!(a.phase(), SessionPhase::Closed);
        assert_eq!(registry.member_count(&DeviceId::new("dev1")).await, 0);
    }

    #[tokio::test]
    async fn test_close_leaves_other_devices_alone() {
        let registry = Arc::new(StreamRegistry::new());
        let (mut a, _rx_a) = session(1, &registry);
        let (mut b, _rx_b) = session(2, &registry);

        a.on_message(RelayFrame::text("devA")).await;
        a.on_message(RelayFrame::binary(vec![1u8])).await;
        b.on_message(RelayFrame::text("devB")).await;
        b.on_message(RelayFrame::binary(vec![1u8])).await;

        a.on_close().await;

        assert_eq!(registry.member_count(&DeviceId::new("devA")).await, 0);
        assert_eq!(registry.member_count(&DeviceId::new("devB")).await, 1);
        assert!(!b.connection().is_closed());
    }
}
