//! Per-key load deduplication (single-flight).
//!
//! When many callers miss on the same key concurrently, exactly one of them
//! (the leader) runs the load; everyone else blocks on the in-flight call
//! and receives the leader's result, value or error, verbatim.
//!
//! ```text
//!   caller A ──┐
//!   caller B ──┼─► calls: { key ─► CallSlot }     one slot per key
//!   caller C ──┘              │
//!                             ▼
//!              leader runs `work` (no locks held)
//!                             │
//!            result stored ─► slot removed ─► condvar broadcast
//! ```
//!
//! The slot is removed as soon as the call completes, so the next miss on
//! the key starts a fresh load. Waiters that arrive after the work finished
//! but before removal still observe the completed slot.
//!
//! Panics inside `work` are caught and surfaced as
//! [`CacheError::Loader`] so one bad load cannot poison later loads.
//!
//! Cancellation: a cancelled waiter returns [`CacheError::Cancelled`]
//! without affecting the shared call, which always runs to completion for
//! whoever is left. Waiters re-check their context on a short interval, so
//! cancellation is observed promptly even while the load is still running.

use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;
use std::hash::Hash;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::context::Context;
use crate::error::CacheError;

/// How often a blocked waiter re-checks its context for cancellation.
const CANCEL_CHECK_INTERVAL: Duration = Duration::from_millis(20);

/// One in-flight call: the eventual result plus the signal waiters block on.
struct CallSlot<V> {
    result: Mutex<Option<Result<V, CacheError>>>,
    done: Condvar,
}

impl<V: Clone> CallSlot<V> {
    fn new() -> Self {
        Self {
            result: Mutex::new(None),
            done: Condvar::new(),
        }
    }

    /// Blocks until the call completes or `ctx` is cancelled.
    fn wait(&self, ctx: &Context) -> Result<V, CacheError> {
        let mut guard = self.result.lock();
        loop {
            if let Some(result) = guard.as_ref() {
                return result.clone();
            }
            if ctx.is_cancelled() {
                return Err(CacheError::Cancelled);
            }
            self.done.wait_for(&mut guard, CANCEL_CHECK_INTERVAL);
        }
    }
}

/// Deduplicates concurrent calls per key.
///
/// Cloning is cheap; clones share the same in-flight call map.
pub struct LoadGroup<K, V> {
    calls: Arc<Mutex<FxHashMap<K, Arc<CallSlot<V>>>>>,
}

impl<K, V> Clone for LoadGroup<K, V> {
    fn clone(&self) -> Self {
        Self {
            calls: Arc::clone(&self.calls),
        }
    }
}

impl<K, V> Default for LoadGroup<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> LoadGroup<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + 'static,
{
    /// Creates a group with no calls in flight.
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(FxHashMap::default())),
        }
    }

    /// Runs `work` for `key` at most once concurrently.
    ///
    /// `probe` is consulted under the group lock before joining or starting
    /// a call; a `Some` value short-circuits the whole flight (another
    /// caller's completed load already produced the value).
    ///
    /// With `wait` set, joins an in-flight call (or leads a new one) and
    /// blocks for the result. With `wait` unset and a call already in
    /// flight, returns [`CacheError::NotFound`] immediately; with no call in
    /// flight, kicks `work` off on a background thread and returns
    /// [`CacheError::NotFound`], the miss-return semantics of a
    /// non-blocking read.
    pub fn execute<P, F>(
        &self,
        key: &K,
        ctx: &Context,
        wait: bool,
        probe: P,
        work: F,
    ) -> Result<V, CacheError>
    where
        P: FnOnce() -> Option<V>,
        F: FnOnce() -> Result<V, CacheError> + Send + 'static,
    {
        let slot = {
            let mut calls = self.calls.lock();
            if let Some(value) = probe() {
                return Ok(value);
            }
            if let Some(existing) = calls.get(key) {
                let slot = Arc::clone(existing);
                drop(calls);
                if !wait {
                    return Err(CacheError::NotFound);
                }
                return slot.wait(ctx);
            }
            let slot = Arc::new(CallSlot::new());
            calls.insert(key.clone(), Arc::clone(&slot));
            slot
        };

        if !wait {
            let group = self.clone();
            let key = key.clone();
            thread::spawn(move || {
                group.run(&key, &slot, work);
            });
            return Err(CacheError::NotFound);
        }
        self.run(key, &slot, work)
    }

    /// Leader path: runs `work`, publishes the result, retires the slot,
    /// and wakes every waiter.
    fn run<F>(&self, key: &K, slot: &CallSlot<V>, work: F) -> Result<V, CacheError>
    where
        F: FnOnce() -> Result<V, CacheError>,
    {
        let result = match panic::catch_unwind(AssertUnwindSafe(work)) {
            Ok(result) => result,
            Err(payload) => Err(CacheError::loader_panic(payload)),
        };

        *slot.result.lock() = Some(result.clone());
        self.calls.lock().remove(key);
        slot.done.notify_all();
        result
    }

    /// Number of calls currently in flight.
    pub fn in_flight(&self) -> usize {
        self.calls.lock().len()
    }
}
