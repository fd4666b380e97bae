//! Registry entry types
//!
//! This module defines the per-device state stored in the registry.

use crate::connection::Connection;

/// One member of a device's broadcast set
#[derive(Debug, Clone)]
pub struct Member {
    /// Stream-session id minted by the member on its first payload
    pub session_id: String,
    /// Member connection
    pub conn: Connection,
}

/// Entry for a single device identity
///
/// Created on the first identify for the device and never removed, even
/// once the member set is empty.
#[derive(Debug)]
pub struct DeviceEntry {
    /// Connections that have streamed under this identity, in join order
    pub(super) members: Vec<Member>,
}

impl DeviceEntry {
    pub(super) fn new() -> Self {
        Self {
            members: Vec::new(),
        }
    }

    /// Number of members
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Add a member
    pub(super) fn push(&mut self, session_id: String, conn: Connection) {
        self.members.push(Member { session_id, conn });
    }

    /// Remove every membership held by `conn`, returning how many were dropped
    pub(super) fn remove(&mut self, conn: &Connection) -> usize {
        let before = self.members.len();
        self.members.retain(|member| member.conn != *conn);
        before - self.members.len()
    }

    /// Copy of the member connections
    pub(super) fn snapshot(&self) -> Vec<Connection> {
        self.members.iter().map(|member| member.conn.clone()).collect()
    }
}
