//! Data models for dashboard entities.
//!
//! - `WireguardConfiguration`, `DataUsage`, `Protocol`: interface configurations
//! - `ConfigStatusSnapshot`: running flags pushed by the status stream
//! - `PeerRateLimit`, `SchedulerType`, `InterfaceScheduler`: traffic shaping

pub mod configuration;
pub mod rate_limit;

pub use configuration::{ConfigStatusSnapshot, DataUsage, Protocol, WireguardConfiguration};
pub use rate_limit::{InterfaceScheduler, PeerRateLimit, SchedulerType};
