//! Stream registry implementation
//!
//! The central registry that records which connections belong to which
//! device identity.

use std::collections::HashMap;

use tokio::sync::RwLock;

use super::device::DeviceId;
use super::entry::DeviceEntry;
use crate::connection::Connection;
use crate::stats::RegistryStats;

/// Central registry for all device identities
///
/// Thread-safe via a single `RwLock`. Every operation holds the lock only for
/// the map access itself and never across a send.
pub struct StreamRegistry {
    /// Map of device identity to its entry
    devices: RwLock<HashMap<DeviceId, DeviceEntry>>,
}

impl StreamRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            devices: RwLock::new(HashMap::new()),
        }
    }

    /// Create an entry for the device if it does not exist yet
    pub async fn ensure_device(&self, device: &DeviceId) {
        let mut devices = self.devices.write().await;

        if !devices.contains_key(device) {
            devices.insert(device.clone(), DeviceEntry::new());
            tracing::debug!(device = %device, "Device entry created");
        }
    }

    /// Snapshot of the device's member connections
    ///
    /// Empty when the device is unknown or has no members. The returned list
    /// is a copy; later joins or leaves do not affect it.
    pub async fn subscribers_of(&self, device: &DeviceId) -> Vec<Connection> {
        let devices = self.devices.read().await;

        devices
            .get(device)
            .map(DeviceEntry::snapshot)
            .unwrap_or_default()
    }

    /// Add a (session, connection) membership to an existing device
    ///
    /// No-op when the device has no entry. Returns whether the member was
    /// added.
    pub async fn add_subscriber(
        &self,
        device: &DeviceId,
        session_id: &str,
        conn: &Connection,
    ) -> bool {
        let mut devices = self.devices.write().await;

        match devices.get_mut(device) {
            Some(entry) => {
                entry.push(session_id.to_owned(), conn.clone());

                tracing::debug!(
                    device = %device,
                    conn_id = %conn.identity(),
                    session = session_id,
                    members = entry.member_count(),
                    "Member added"
                );
                true
            }
            None => {
                tracing::warn!(
                    device = %device,
                    conn_id = %conn.identity(),
                    "Member add ignored, device not registered"
                );
                false
            }
        }
    }

    /// Remove every membership the connection holds under the device
    ///
    /// The entry itself stays, even when its member set becomes empty.
    /// Returns the number of memberships removed.
    pub async fn remove_connection(&self, device: &DeviceId, conn: &Connection) -> usize {
        let mut devices = self.devices.write().await;

        let Some(entry) = devices.get_mut(device) else {
            return 0;
        };

        let removed = entry.remove(conn);
        if removed > 0 {
            tracing::debug!(
                device = %device,
                conn_id = %conn.identity(),
                removed = removed,
                members = entry.member_count(),
                "Member removed"
            );
        }

        removed
    }

    /// Check whether the device has ever identified
    pub async fn device_exists(&self, device: &DeviceId) -> bool {
        self.devices.read().await.contains_key(device)
    }

    /// Number of members currently registered under the device
    pub async fn member_count(&self, device: &DeviceId) -> usize {
        let devices = self.devices.read().await;
        devices.get(device).map_or(0, DeviceEntry::member_count)
    }

    /// Number of known device identities
    pub async fn device_count(&self) -> usize {
        self.devices.read().await.len()
    }

    /// Registry-wide counts
    pub async fn stats(&self) -> RegistryStats {
        let devices = self.devices.read().await;

        RegistryStats {
            device_count: devices.len(),
            member_count: devices.values().map(DeviceEntry::member_count).sum(),
            idle_device_count: devices
                .values()
                .filter(|entry| entry.member_count() == 0)
                .count(),
        }
    }
}

impl Default for StreamRegistry {
    fn default() -> Self {
        Self::new()
    }
}
