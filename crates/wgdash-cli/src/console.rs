//! Terminal sinks for the client's navigation and notification side effects.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;
use wgdash_core::{Message, MessageKind, Navigator, Notifier, Route};

/// Prints messages and redirects to stderr so stdout stays machine-readable.
#[derive(Debug, Default)]
pub struct Console {
    redirected: AtomicBool,
    quiet: AtomicBool,
}

impl Console {
    pub fn new() -> Self {
        Self::default()
    }

    /// While quiet, redirects are recorded but nothing is printed.
    pub fn set_quiet(&self, quiet: bool) {
        self.quiet.store(quiet, Ordering::SeqCst);
    }

    /// Whether the client asked to leave the current view since the last reset.
    pub fn take_redirect(&self) -> bool {
        self.redirected.swap(false, Ordering::SeqCst)
    }
}

impl Navigator for Console {
    fn navigate(&self, route: Route) {
        debug!(route = %route, "Navigation requested");
        self.redirected.store(true, Ordering::SeqCst);
        if self.quiet.load(Ordering::SeqCst) {
            return;
        }
        match route {
            Route::SignIn => eprintln!("Signed out. Run the command again to sign in."),
            Route::RateLimited { retry_after: Some(secs) } => {
                eprintln!("Rate limited by the server, retry in {}s.", secs)
            }
            Route::RateLimited { retry_after: None } => {
                eprintln!("Rate limited by the server, retry later.")
            }
        }
    }
}

impl Notifier for Console {
    fn notify(&self, message: Message) {
        if self.quiet.load(Ordering::SeqCst) {
            debug!(from = %message.from, content = %message.content, "Notification suppressed");
            return;
        }
        let tag = match message.kind {
            MessageKind::Danger => "error",
            MessageKind::Warning => "warn",
            MessageKind::Success => "ok",
            MessageKind::Info => "info",
        };
        eprintln!("[{}] {}: {}", tag, message.from, message.content);
    }
}
