//! Stream registry for device-to-member routing
//!
//! The registry maps each device identity to the set of connections that have
//! streamed under it. It is the only state shared between connections.
//!
//! # Architecture
//!
//! ```text
//!                          Arc<StreamRegistry>
//!                     ┌──────────────────────────┐
//!                     │ devices: HashMap<Device, │
//!                     │   DeviceEntry {          │
//!                     │     members: Vec<Member> │
//!                     │   }                      │
//!                     │ >                        │
//!                     └────────────┬─────────────┘
//!                                  │ subscribers_of() snapshot
//!         ┌────────────────────────┼────────────────────────┐
//!         ▼                        ▼                        ▼
//!   [Connection]             [Connection]             [Connection]
//!   send() ──► mpsc ──► writer task ──► WebSocket
//! ```
//!
//! Broadcasts iterate a snapshot taken under the lock, never the live map,
//! so members can join or leave while a broadcast is in flight.

pub mod device;
pub mod entry;
pub mod store;

pub use device::DeviceId;
pub use entry::{DeviceEntry, Member};
pub use store::StreamRegistry;
