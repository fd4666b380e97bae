//! Statistics and metrics for relay sessions

use std::time::{Duration, Instant};

/// Per-connection counters
#[derive(Debug, Clone)]
pub struct SessionStats {
    /// When the connection was accepted
    pub connected_at: Instant,
    /// Messages received, including identity and control messages
    pub messages_received: u64,
    /// Bytes received across all messages
    pub bytes_received: u64,
    /// Payload messages fanned out to the device's members
    pub payloads_forwarded: u64,
    /// Frames successfully queued to members (payloads and notices)
    pub deliveries: u64,
    /// Frames that could not be queued to a member
    pub failed_deliveries: u64,
}

impl SessionStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self {
            connected_at: Instant::now(),
            messages_received: 0,
            bytes_received: 0,
            payloads_forwarded: 0,
            deliveries: 0,
            failed_deliveries: 0,
        }
    }

    /// Record one inbound message
    pub fn record_received(&mut self, len: usize) {
        self.messages_received += 1;
        self.bytes_received += len as u64;
    }

    /// Record the outcome of one broadcast round
    pub fn record_broadcast(&mut self, delivered: usize, failed: usize) {
        self.deliveries += delivered as u64;
        self.failed_deliveries += failed as u64;
    }

    /// Time since the connection was accepted
    pub fn duration(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Average inbound rate in bits per second
    pub fn bitrate(&self) -> u64 {
        let secs = self.duration().as_secs();
        if secs > 0 {
            (self.bytes_received * 8) / secs
        } else {
            0
        }
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry-wide snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegistryStats {
    /// Known device identities
    pub device_count: usize,
    /// Memberships across all devices
    pub member_count: usize,
    /// Devices whose member set is empty
    pub idle_device_count: usize,
}
