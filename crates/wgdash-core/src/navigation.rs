//! Navigation side effects.
//!
//! The client does not own a view tree. When a response means the user has to
//! go somewhere else (sign in again, wait out a rate limit) the client hands a
//! `Route` to whatever `Navigator` the front end installed.

use std::fmt;
use std::sync::Mutex;

/// A navigation target requested by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// The sign-in view.
    SignIn,
    /// The rate-limited view, optionally carrying the server's retry hint in seconds.
    RateLimited { retry_after: Option<u64> },
}

impl Route {
    pub fn path(&self) -> String {
        match self {
            Route::SignIn => "/signin".to_string(),
            Route::RateLimited { retry_after: Some(secs) } => format!("/429?retry_after={}", secs),
            Route::RateLimited { retry_after: None } => "/429".to_string(),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Receives navigation requests from the client.
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

/// Navigator that records every route it is sent.
#[derive(Debug, Default)]
pub struct NavigationHistory {
    routes: Mutex<Vec<Route>>,
}

impl NavigationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recent route, if any.
    pub fn current(&self) -> Option<Route> {
        self.lock().last().cloned()
    }

    pub fn history(&self) -> Vec<Route> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Route>> {
        self.routes.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Navigator for NavigationHistory {
    fn navigate(&self, route: Route) {
        tracing::debug!(route = %route, "Navigating");
        self.lock().push(route);
    }
}
