//! Core library for wgdash.
//!
//! This crate contains the client side of a WireGuard/AmneziaWG dashboard:
//!
//! - `api`: the `ApiClient` wrapping every GET/POST to the dashboard server
//! - `session`: CSRF token cache, session-expired flag and the interval registry
//! - `navigation` / `messages`: sinks for the client's observable side effects
//! - `models`: configuration, rate limit and scheduler types
//! - `dashboard`: store-style operations built on the client
//! - `stream`: the configuration status Server-Sent-Events consumer
//! - `config`: persisted client configuration
//! - `validation`: WireGuard key, IP and CIDR checks

pub mod api;
pub mod config;
pub mod dashboard;
pub mod messages;
pub mod models;
pub mod navigation;
pub mod session;
pub mod stream;
pub mod validation;

pub use api::{ApiClient, ApiError, ApiResponse, RemoteTarget};
pub use config::{Config, CrossServer};
pub use dashboard::Dashboard;
pub use messages::{Message, MessageKind, MessageQueue, Notifier};
pub use navigation::{NavigationHistory, Navigator, Route};
pub use session::{IntervalHandle, IntervalId, SessionContext};
