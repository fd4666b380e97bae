//! Statistics for relay sessions and the registry

pub mod metrics;

pub use metrics::{RegistryStats, SessionStats};
