//! Session lifecycle state.
//!
//! This module provides:
//! - `SessionContext`: CSRF token cache, session-expired flag, single-flight token fetch slot
//! - `IntervalRegistry`: recurring polls that get stopped when the session expires

pub mod context;
pub mod intervals;

pub use context::SessionContext;
pub use intervals::{IntervalHandle, IntervalId, IntervalRegistry};
