//! Session protocol handler
//!
//! One `SessionHandler` is bound to each connection at accept time. It
//! classifies every inbound message according to the session phase and drives
//! the registry:
//!
//! | Phase          | Message              | Action                                   |
//! |----------------|----------------------|------------------------------------------|
//! | `Unidentified` | anything             | identify, `ensure_device`, welcome reply |
//! | identified     | `REQUEST_AUDIO:<d>`  | notice to `d`'s members, or unavailable  |
//! | `Identified`   | anything else        | mint session, join own set, forward      |
//! | `Streaming`    | anything else        | forward to own set (sender included)     |

use std::sync::Arc;

use crate::connection::Connection;
use crate::protocol::message::{device_unavailable, streaming_notice, welcome};
use crate::protocol::{Inbound, RelayFrame};
use crate::registry::{DeviceId, StreamRegistry};
use crate::stats::SessionStats;

use super::state::{SessionPhase, SessionState};

/// Per-connection protocol state machine
pub struct SessionHandler {
    pub(super) conn: Connection,
    pub(super) registry: Arc<StreamRegistry>,
    pub(super) state: SessionState,
    pub(super) stats: SessionStats,
}

impl SessionHandler {
    /// Bind a handler to a freshly accepted connection
    pub fn new(conn: Connection, registry: Arc<StreamRegistry>) -> Self {
        let state = SessionState::new(conn.identity());

        Self {
            conn,
            registry,
            state,
            stats: SessionStats::new(),
        }
    }

    /// Connection this handler drives
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Current session state
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Current phase
    pub fn phase(&self) -> SessionPhase {
        self.state.phase
    }

    /// Counters for this session
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Handle one inbound message
    ///
    /// Messages are processed to completion in arrival order; nothing is
    /// buffered between calls.
    pub async fn on_message(&mut self, frame: RelayFrame) {
        self.stats.record_received(frame.len());

        match self.state.phase {
            SessionPhase::Closed => {
                tracing::debug!(
                    conn_id = %self.conn.identity(),
                    "Message after close ignored"
                );
            }
            SessionPhase::Unidentified => self.identify(&frame).await,
            SessionPhase::Identified | SessionPhase::Streaming => match Inbound::classify(&frame) {
                Inbound::RequestAudio { target } => self.request_audio(&target).await,
                Inbound::Payload => self.forward(frame).await,
            },
        }
    }

    async fn identify(&mut self, frame: &RelayFrame) {
        let device = DeviceId::new(frame.to_text_lossy());

        self.registry.ensure_device(&device).await;
        self.state.identify(device.clone());

        tracing::info!(
            device = %device,
            conn_id = %self.conn.identity(),
            "Device connected"
        );

        if let Err(e) = self.conn.send(welcome(&device)) {
            tracing::warn!(
                device = %device,
                error = %e,
                "Failed to send welcome"
            );
        }
    }

    async fn request_audio(&mut self, target: &DeviceId) {
        if !self.registry.device_exists(target).await {
            tracing::debug!(
                requested = %target,
                conn_id = %self.conn.identity(),
                "Requested device not available"
            );

            if let Err(e) = self.conn.send(device_unavailable(target)) {
                tracing::warn!(requested = %target, error = %e, "Failed to send unavailable notice");
            }
            return;
        }

        // Notify the device's current members; the requester is not added
        let members = self.registry.subscribers_of(target).await;
        tracing::info!(
            requested = %target,
            conn_id = %self.conn.identity(),
            members = members.len(),
            "Audio requested"
        );

        self.broadcast(&members, streaming_notice(target));
    }

    async fn forward(&mut self, frame: RelayFrame) {
        let Some(device) = self.state.device().cloned() else {
            return;
        };

        if self.state.phase == SessionPhase::Identified {
            if let Some(session) = self.state.start_streaming().map(str::to_owned) {
                self.registry
                    .add_subscriber(&device, &session, &self.conn)
                    .await;

                tracing::info!(
                    device = %device,
                    session = %session,
                    conn_id = %self.conn.identity(),
                    "New stream created"
                );
            }
        }

        let members = self.registry.subscribers_of(&device).await;
        tracing::debug!(
            device = %device,
            session = self.state.stream_session.as_deref().unwrap_or_default(),
            bytes = frame.len(),
            members = members.len(),
            "Forwarding audio data"
        );

        self.broadcast(&members, frame);
        self.stats.payloads_forwarded += 1;
    }

    /// Queue `frame` on every member
    ///
    /// A failing member is logged and skipped; it never stops delivery to the
    /// rest and never surfaces to the sender.
    fn broadcast(&mut self, members: &[Connection], frame: RelayFrame) {
        let mut delivered = 0;
        let mut failed = 0;

        for member in members {
            match member.send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    failed += 1;
                    tracing::debug!(
                        from = %self.conn.identity(),
                        to = %member.identity(),
                        error = %e,
                        "Delivery failed, skipping member"
                    );
                }
            }
        }

        if failed > 0 {
            tracing::warn!(
                from = %self.conn.identity(),
                delivered = delivered,
                failed = failed,
                "Broadcast skipped failing members"
            );
        }

        self.stats.record_broadcast(delivered, failed);
    }
}
