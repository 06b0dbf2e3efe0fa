//! Session state shared by every request made through one client.
//!
//! `SessionContext` owns the cached CSRF token, the session-expired flag and
//! the interval registry. It is passed to the `ApiClient` explicitly, so two
//! clients built over two contexts never see each other's session.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use super::intervals::{IntervalHandle, IntervalId, IntervalRegistry};

/// A token fetch that any number of callers can await.
pub(crate) type TokenFetch = Shared<BoxFuture<'static, Option<String>>>;

struct PendingFetch {
    generation: u64,
    fetch: TokenFetch,
}

#[derive(Default)]
pub struct SessionContext {
    expired: AtomicBool,
    token: Mutex<Option<String>>,
    pending: Mutex<Option<PendingFetch>>,
    fetch_generation: AtomicU64,
    intervals: IntervalRegistry,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    // ===== Session-expired flag =====

    pub fn is_expired(&self) -> bool {
        self.expired.load(Ordering::SeqCst)
    }

    /// Mark the session expired and stop every registered interval.
    ///
    /// Only the first call while the session is live does anything; later
    /// calls return `false` without touching the registry.
    pub fn handle_session_expiration(&self) -> bool {
        if self
            .expired
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        *self.pending_slot() = None;
        *self.token_slot() = None;
        let stopped = self.intervals.stop_all();
        warn!(stopped_intervals = stopped, "Session expired, background polling stopped");
        true
    }

    /// Clear the expired flag after a successful sign-in.
    pub fn reset_session_expired(&self) {
        if self.expired.swap(false, Ordering::SeqCst) {
            debug!("Session expired flag reset");
        }
    }

    // ===== CSRF token =====

    pub fn token(&self) -> Option<String> {
        self.token_slot().clone()
    }

    pub fn set_token(&self, token: String) {
        *self.token_slot() = Some(token);
    }

    /// Drop the cached token and forget any fetch in flight.
    pub fn clear_token(&self) {
        *self.token_slot() = None;
        *self.pending_slot() = None;
    }

    /// Join the fetch in flight, or start one with `start`.
    ///
    /// `start` receives the generation of the new fetch, which the fetch must
    /// pass back to `complete_token_fetch` when done.
    pub(crate) fn join_or_start_token_fetch<F>(&self, start: F) -> TokenFetch
    where
        F: FnOnce(u64) -> BoxFuture<'static, Option<String>>,
    {
        let mut pending = self.pending_slot();
        if let Some(ref in_flight) = *pending {
            debug!("Joining CSRF token fetch in flight");
            return in_flight.fetch.clone();
        }

        let generation = self.fetch_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let fetch = start(generation).shared();
        *pending = Some(PendingFetch {
            generation,
            fetch: fetch.clone(),
        });
        fetch
    }

    /// Release the single-flight slot and cache `token`.
    ///
    /// Returns `false` and leaves the cache alone when the fetch was dropped
    /// (cleared, refreshed or expired) or a newer fetch owns the slot.
    pub(crate) fn complete_token_fetch(&self, generation: u64, token: Option<String>) -> bool {
        let mut pending = self.pending_slot();
        if pending.as_ref().map(|p| p.generation) != Some(generation) || self.is_expired() {
            return false;
        }
        *pending = None;
        // Written under the slot lock so a concurrent clear cannot interleave
        *self.token_slot() = token;
        true
    }

    // ===== Intervals =====

    pub fn intervals(&self) -> &IntervalRegistry {
        &self.intervals
    }

    /// Track a recurring timer. A handle registered after the session expired
    /// is cancelled straight away and never stays in the set.
    pub fn register_interval(&self, handle: IntervalHandle) -> IntervalId {
        let id = self.intervals.register(handle);
        if self.is_expired() {
            debug!(interval = %id, "Session already expired, cancelling new interval");
            self.intervals.stop(id);
        }
        id
    }

    pub fn unregister_interval(&self, id: IntervalId) -> bool {
        self.intervals.unregister(id)
    }

    pub fn stop_interval(&self, id: IntervalId) -> bool {
        self.intervals.stop(id)
    }

    pub fn stop_all_intervals(&self) -> usize {
        self.intervals.stop_all()
    }

    /// Register cleanup for recurring work owned outside the registry.
    pub fn register_cleanup_hook<F>(&self, hook: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.intervals.add_cleanup_hook(hook);
    }

    /// Spawn a poll that runs `task` every `period` and register it.
    ///
    /// The first run happens one period after the call. Must be called from
    /// within a tokio runtime.
    pub fn spawn_polling<F, Fut>(&self, period: Duration, mut task: F) -> IntervalId
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                task().await;
            }
        });
        self.register_interval(IntervalHandle::from_abort(join.abort_handle()))
    }

    fn token_slot(&self) -> MutexGuard<'_, Option<String>> {
        self.token.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn pending_slot(&self) -> MutexGuard<'_, Option<PendingFetch>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("expired", &self.is_expired())
            .field("has_token", &self.token_slot().is_some())
            .field("intervals", &self.intervals)
            .finish()
    }
}
