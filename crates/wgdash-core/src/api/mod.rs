//! REST API client module for the dashboard server.
//!
//! This module provides the `ApiClient` for communicating with the
//! dashboard backend. Sessions are cookie based; state-changing requests
//! additionally carry a CSRF token fetched from `/api/csrf-token`.

pub mod client;
pub mod endpoints;
pub mod error;
pub mod response;

pub use client::{ApiClient, RemoteTarget, NO_QUERY};
pub use error::ApiError;
pub use response::ApiResponse;
