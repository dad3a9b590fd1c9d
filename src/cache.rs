//! Thread-safe cache facade.
//!
//! [`Cache`] glues the selected eviction engine to the optional loader,
//! the serialize hooks, and the hit/miss counters. The engine sits behind a
//! `parking_lot::RwLock`: snapshot reads (`existed`, `keys`, `get_all`,
//! `len`) take the read lock; everything that touches policy metadata takes
//! the write lock, `get` included, since it reorders on hit.
//!
//! ## Loading
//!
//! With a loader configured, [`Cache::get`] falls back to it on a miss, and
//! the internal [`LoadGroup`] collapses concurrent misses on one key into a
//! single loader invocation. Lock discipline: the engine lock is never held
//! while waiting on the coordinator, and the loader itself runs with no
//! lock held at all; only the final insert briefly reacquires the engine
//! write lock.
//!
//! ## Example Usage
//!
//! ```
//! use polycache::builder::CacheBuilder;
//! use polycache::context::Context;
//!
//! let cache = CacheBuilder::new(128)
//!     .lru()
//!     .loader(|_ctx, key: &u64| Ok(key * 10))
//!     .build();
//!
//! let ctx = Context::background();
//! assert_eq!(cache.get(&ctx, &3).unwrap(), 30); // loaded
//! assert_eq!(cache.get(&ctx, &3).unwrap(), 30); // cached
//! assert_eq!(cache.miss_count(), 1);
//! assert_eq!(cache.hit_count(), 1);
//! ```

use parking_lot::RwLock;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use crate::context::Context;
use crate::error::{CacheError, DynError};
use crate::policy::{Engine, EngineKind};
use crate::singleflight::LoadGroup;
use crate::stats::CacheStats;

/// Loader returning a value plus an optional per-entry TTL that overrides
/// the cache-wide default (`None` falls back to it).
pub type LoaderExpireFn<K, V> =
    Arc<dyn Fn(&Context, &K) -> Result<(V, Option<Duration>), DynError> + Send + Sync>;

/// Thread-safe cache handle.
///
/// Cloning is cheap and clones share the same underlying cache.
pub struct Cache<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    engine: Arc<RwLock<EngineKind<K, V>>>,
    stats: Arc<CacheStats>,
    loader: Option<LoaderExpireFn<K, V>>,
    load_group: LoadGroup<K, V>,
}

impl<K, V> std::fmt::Debug for Cache<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache").finish_non_exhaustive()
    }
}

impl<K, V> Clone for Cache<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            stats: Arc::clone(&self.stats),
            loader: self.loader.clone(),
            load_group: self.load_group.clone(),
        }
    }
}

impl<K, V> Cache<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(
        engine: EngineKind<K, V>,
        stats: Arc<CacheStats>,
        loader: Option<LoaderExpireFn<K, V>>,
    ) -> Self {
        Self {
            engine: Arc::new(RwLock::new(engine)),
            stats,
            loader,
            load_group: LoadGroup::new(),
        }
    }

    /// Inserts or overwrites `key`, applying the default TTL if configured.
    pub fn set(&self, key: K, value: V) -> Result<(), CacheError> {
        self.engine.write().set(key, value)
    }

    /// Inserts or overwrites `key` with an explicit TTL.
    pub fn set_with_expire(&self, key: K, value: V, ttl: Duration) -> Result<(), CacheError> {
        self.engine.write().set_with_expire(key, value, ttl)
    }

    /// Reads `key`; on a miss, falls back to the loader (if configured),
    /// blocking until the (possibly shared) load completes.
    pub fn get(&self, ctx: &Context, key: &K) -> Result<V, CacheError> {
        let result = self.engine.write().get(key, false);
        match result {
            Err(CacheError::NotFound) => self.get_with_loader(ctx, key, true, true),
            other => other,
        }
    }

    /// Reads `key` without waiting for a loader. A miss returns
    /// [`CacheError::NotFound`] immediately, kicking off a background load
    /// when a loader is configured and none is in flight.
    pub fn get_if_present(&self, key: &K) -> Result<V, CacheError> {
        let result = self.engine.write().get(key, false);
        match result {
            Err(CacheError::NotFound) => {
                self.get_with_loader(&Context::background(), key, false, true)
            },
            other => other,
        }
    }

    /// Reloads `key` through the loader unconditionally, replacing any live
    /// entry with the fresh value.
    pub fn refresh(&self, ctx: &Context, key: &K) -> Result<V, CacheError> {
        self.get_with_loader(ctx, key, true, false)
    }

    /// Removes `key`; returns whether a mapping was removed.
    pub fn remove(&self, key: &K) -> bool {
        self.engine.write().remove(key)
    }

    /// Fires the purge visitor for every entry, then empties the cache.
    /// Hit/miss counters are untouched.
    pub fn purge(&self) {
        self.engine.write().purge()
    }

    /// Returns `true` iff `key` is present and not expired.
    pub fn existed(&self, key: &K) -> bool {
        self.engine.read().existed(key)
    }

    /// Snapshot of keys; with `check_expired`, excludes expired entries.
    pub fn keys(&self, check_expired: bool) -> Vec<K> {
        self.engine.read().keys(check_expired)
    }

    /// Snapshot of key/value pairs; with `check_expired`, excludes expired
    /// entries.
    pub fn get_all(&self, check_expired: bool) -> Vec<(K, V)> {
        self.engine.read().get_all(check_expired)
    }

    /// Entry count; with `check_expired`, excludes expired entries.
    pub fn len(&self, check_expired: bool) -> usize {
        self.engine.read().len(check_expired)
    }

    /// Returns `true` if the cache holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.len(false) == 0
    }

    /// Configured capacity in entries (0 = unbounded Simple cache).
    pub fn capacity(&self) -> usize {
        self.engine.read().capacity()
    }

    /// Number of user-initiated reads that hit.
    pub fn hit_count(&self) -> u64 {
        self.stats.hit_count()
    }

    /// Number of user-initiated reads that missed.
    pub fn miss_count(&self) -> u64 {
        self.stats.miss_count()
    }

    /// Total user-initiated reads.
    pub fn lookup_count(&self) -> u64 {
        self.stats.lookup_count()
    }

    /// Fraction of lookups that hit.
    pub fn hit_rate(&self) -> f64 {
        self.stats.hit_rate()
    }

    /// `probe_cache` re-checks the engine under the coordinator lock before
    /// joining or starting a flight, so a load that completed between the
    /// caller's miss and this call is observed instead of repeated. Refresh
    /// passes `false`: it must reload even over a live entry.
    fn get_with_loader(
        &self,
        ctx: &Context,
        key: &K,
        wait: bool,
        probe_cache: bool,
    ) -> Result<V, CacheError> {
        let Some(loader) = self.loader.clone() else {
            return Err(CacheError::NotFound);
        };

        let engine = Arc::clone(&self.engine);
        let ctx_owned = ctx.clone();
        let key_owned = key.clone();
        let work = move || -> Result<V, CacheError> {
            if ctx_owned.is_cancelled() {
                return Err(CacheError::Cancelled);
            }
            let (value, ttl) = loader(&ctx_owned, &key_owned).map_err(CacheError::loader)?;
            engine.write().store(key_owned.clone(), value.clone(), ttl)?;
            Ok(value)
        };
        let probe = || {
            if probe_cache {
                self.engine.write().get(key, true).ok()
            } else {
                None
            }
        };

        self.load_group.execute(key, ctx, wait, probe, work)
    }
}
