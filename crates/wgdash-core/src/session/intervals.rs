//! Registry of recurring background work.
//!
//! Anything that polls the server on a timer registers its handle here so
//! that a session expiration can stop every poll at once. Components that
//! keep their own timers outside the registry add a cleanup hook instead.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::AbortHandle;

/// Identifier handed out when a handle is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IntervalId(u64);

impl fmt::Display for IntervalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A one-shot cancel action for a recurring timer.
pub struct IntervalHandle {
    cancel: Box<dyn FnOnce() + Send>,
}

impl IntervalHandle {
    pub fn new<F>(cancel: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            cancel: Box::new(cancel),
        }
    }

    /// Handle that aborts a spawned tokio task.
    pub fn from_abort(handle: AbortHandle) -> Self {
        Self::new(move || handle.abort())
    }

    pub fn cancel(self) {
        (self.cancel)()
    }
}

impl fmt::Debug for IntervalHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntervalHandle").finish_non_exhaustive()
    }
}

type CleanupHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
pub struct IntervalRegistry {
    next_id: AtomicU64,
    handles: Mutex<BTreeMap<IntervalId, IntervalHandle>>,
    hooks: Mutex<Vec<CleanupHook>>,
}

impl IntervalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handle: IntervalHandle) -> IntervalId {
        let id = IntervalId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.handles().insert(id, handle);
        id
    }

    /// Forget a handle without cancelling it. The owner has already stopped it.
    pub fn unregister(&self, id: IntervalId) -> bool {
        self.handles().remove(&id).is_some()
    }

    /// Cancel one handle and remove it from the set.
    pub fn stop(&self, id: IntervalId) -> bool {
        // Released before cancelling so a cancel action may touch the registry.
        let handle = self.handles().remove(&id);
        match handle {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every registered handle exactly once, then run the cleanup hooks.
    /// Returns the number of handles cancelled.
    pub fn stop_all(&self) -> usize {
        let drained = std::mem::take(&mut *self.handles());
        let count = drained.len();
        for (_, handle) in drained {
            handle.cancel();
        }

        let hooks: Vec<CleanupHook> = self.hooks().clone();
        for hook in hooks {
            hook();
        }
        count
    }

    /// Register a callback run on every `stop_all`.
    pub fn add_cleanup_hook<F>(&self, hook: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.hooks().push(Arc::new(hook));
    }

    pub fn contains(&self, id: IntervalId) -> bool {
        self.handles().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.handles().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles().is_empty()
    }

    fn handles(&self) -> MutexGuard<'_, BTreeMap<IntervalId, IntervalHandle>> {
        self.handles.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn hooks(&self) -> MutexGuard<'_, Vec<CleanupHook>> {
        self.hooks.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl fmt::Debug for IntervalRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntervalRegistry")
            .field("registered", &self.len())
            .field("hooks", &self.hooks().len())
            .finish()
    }
}
