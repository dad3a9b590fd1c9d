//! Eviction engines and their shared contract.
//!
//! Each engine owns a key → entry map plus whatever ordering structure its
//! policy needs, and implements the [`Engine`] trait. Engines are not
//! thread-safe on their own; the [`Cache`](crate::cache::Cache) facade wraps
//! the selected engine in a `parking_lot::RwLock` and holds it in write mode
//! for every operation that mutates policy metadata (`get` included, since
//! LRU, LFU, and ARC all reorder on hit).
//!
//! Callbacks (`added`, `evicted`, `purge_visitor`) and the serialize hooks
//! run while the engine lock is held. They must not re-enter the cache that
//! invoked them, and they must not panic.
//!
//! ## Key Components
//!
//! - [`Engine`]: the common operation surface (store/lookup/remove/existed/
//!   keys/get_all/len/purge).
//! - [`EngineConfig`]: clock, capacity, default TTL, callbacks, hooks, and
//!   the stats counters shared with the facade.
//! - [`EngineKind`]: enum dispatch over the four engines, selected by the
//!   builder.
//!
//! ## Expiration
//!
//! Expiration is lazy: a read that encounters an expired entry evicts it
//! synchronously (firing `evicted`) and reports a miss. Writes to an
//! already-present key refresh the expiration only when an explicit TTL is
//! given or a cache-wide default is configured; otherwise the old deadline
//! is kept.

pub mod arc;
pub mod lfu;
pub mod lru;
pub mod simple;

use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::clock::{Clock, SystemClock};
use crate::error::{CacheError, DynError};
use crate::stats::CacheStats;

pub use arc::ArcEngine;
pub use lfu::LfuEngine;
pub use lru::LruEngine;
pub use simple::SimpleEngine;

/// Callback invoked with `(key, value)` on every successful store.
pub type AddedFn<K, V> = Arc<dyn Fn(&K, &V) + Send + Sync>;

/// Callback invoked with `(key, value)` whenever a value is evicted,
/// removed, or overwritten.
pub type EvictedFn<K, V> = Arc<dyn Fn(&K, &V) + Send + Sync>;

/// Callback invoked with `(key, value)` for every entry during a purge.
pub type PurgeVisitorFn<K, V> = Arc<dyn Fn(&K, &V) + Send + Sync>;

/// Fallible value transformer applied on store.
pub type SerializeFn<K, V> = Arc<dyn Fn(&K, V) -> Result<V, DynError> + Send + Sync>;

/// Fallible value transformer applied on read.
pub type DeserializeFn<K, V> = Arc<dyn Fn(&K, V) -> Result<V, DynError> + Send + Sync>;

// ---------------------------------------------------------------------------
// CacheEntry
// ---------------------------------------------------------------------------

/// A stored value with its optional expiration deadline.
///
/// Keys are owned by the engine's index and ordering structures, not
/// duplicated here.
#[derive(Debug, Clone)]
pub(crate) struct CacheEntry<V> {
    pub(crate) value: V,
    pub(crate) expiration: Option<Instant>,
}

impl<V> CacheEntry<V> {
    pub(crate) fn new(value: V, expiration: Option<Instant>) -> Self {
        Self { value, expiration }
    }

    pub(crate) fn is_expired(&self, now: Instant) -> bool {
        self.expiration.is_some_and(|at| at <= now)
    }
}

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Configuration shared by every engine: capacity, time source, default
/// TTL, callbacks, serialize hooks, and the hit/miss counters.
pub struct EngineConfig<K, V> {
    pub(crate) capacity: usize,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) expiration: Option<Duration>,
    pub(crate) stats: Arc<CacheStats>,
    pub(crate) added: Option<AddedFn<K, V>>,
    pub(crate) evicted: Option<EvictedFn<K, V>>,
    pub(crate) purge_visitor: Option<PurgeVisitorFn<K, V>>,
    pub(crate) serialize: Option<SerializeFn<K, V>>,
    pub(crate) deserialize: Option<DeserializeFn<K, V>>,
}

impl<K, V> EngineConfig<K, V> {
    /// Creates a config with the given capacity, the system clock, no
    /// default TTL, and no callbacks.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            clock: Arc::new(SystemClock::new()),
            expiration: None,
            stats: Arc::new(CacheStats::new()),
            added: None,
            evicted: None,
            purge_visitor: None,
            serialize: None,
            deserialize: None,
        }
    }

    /// Replaces the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the default per-entry TTL.
    pub fn with_expiration(mut self, ttl: Duration) -> Self {
        self.expiration = Some(ttl);
        self
    }

    /// Sets the added callback. Must not re-enter the cache.
    pub fn with_added_fn(mut self, f: impl Fn(&K, &V) + Send + Sync + 'static) -> Self {
        self.added = Some(Arc::new(f));
        self
    }

    /// Sets the evicted callback. Must not re-enter the cache.
    pub fn with_evicted_fn(mut self, f: impl Fn(&K, &V) + Send + Sync + 'static) -> Self {
        self.evicted = Some(Arc::new(f));
        self
    }

    /// Sets the purge visitor. Must not re-enter the cache.
    pub fn with_purge_visitor_fn(mut self, f: impl Fn(&K, &V) + Send + Sync + 'static) -> Self {
        self.purge_visitor = Some(Arc::new(f));
        self
    }

    /// Sets the store-side value transformer.
    pub fn with_serialize_fn(
        mut self,
        f: impl Fn(&K, V) -> Result<V, DynError> + Send + Sync + 'static,
    ) -> Self {
        self.serialize = Some(Arc::new(f));
        self
    }

    /// Sets the read-side value transformer.
    pub fn with_deserialize_fn(
        mut self,
        f: impl Fn(&K, V) -> Result<V, DynError> + Send + Sync + 'static,
    ) -> Self {
        self.deserialize = Some(Arc::new(f));
        self
    }

    /// Returns the hit/miss counters backing this engine.
    pub fn stats(&self) -> &Arc<CacheStats> {
        &self.stats
    }

    /// Returns the configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn now(&self) -> Instant {
        self.clock.now()
    }

    /// Deadline for a stored entry: an explicit TTL wins, else the default;
    /// `None` when neither applies.
    pub(crate) fn entry_expiration(&self, ttl: Option<Duration>) -> Option<Instant> {
        ttl.or(self.expiration).map(|d| self.now() + d)
    }

    pub(crate) fn apply_serialize(&self, key: &K, value: V) -> Result<V, CacheError> {
        match &self.serialize {
            Some(f) => f(key, value).map_err(CacheError::serialization),
            None => Ok(value),
        }
    }

    pub(crate) fn apply_deserialize(&self, key: &K, value: V) -> Result<V, CacheError> {
        match &self.deserialize {
            Some(f) => f(key, value).map_err(CacheError::serialization),
            None => Ok(value),
        }
    }

    pub(crate) fn notify_added(&self, key: &K, value: &V) {
        if let Some(f) = &self.added {
            f(key, value);
        }
    }

    pub(crate) fn notify_evicted(&self, key: &K, value: &V) {
        if let Some(f) = &self.evicted {
            f(key, value);
        }
    }

    pub(crate) fn notify_purge(&self, key: &K, value: &V) {
        if let Some(f) = &self.purge_visitor {
            f(key, value);
        }
    }
}

// ---------------------------------------------------------------------------
// Engine trait
// ---------------------------------------------------------------------------

/// Common operation surface of the four eviction engines.
///
/// `store`/`lookup`/`remove`/`purge` mutate policy metadata and require the
/// caller's write lock; `existed`/`keys`/`get_all`/`len` are read-only.
pub trait Engine<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    /// Returns the shared engine configuration.
    fn config(&self) -> &EngineConfig<K, V>;

    /// Inserts or overwrites `key`. `ttl` overrides the default expiration;
    /// `None` falls back to it. May evict one entry to make room.
    fn store(&mut self, key: K, value: V, ttl: Option<Duration>) -> Result<(), CacheError>;

    /// Policy-updating fetch of the raw stored value: updates recency or
    /// frequency metadata on a hit, evicts on an expired hit, and leaves
    /// stats and the deserialize hook to [`get`](Engine::get).
    fn lookup(&mut self, key: &K) -> Option<V>;

    /// Deletes `key`; fires `evicted` if a value was present. Returns
    /// whether anything was removed.
    fn remove(&mut self, key: &K) -> bool;

    /// Returns `true` iff `key` is present and not expired. No side effects.
    fn existed(&self, key: &K) -> bool;

    /// Snapshot of keys, optionally excluding expired entries.
    fn keys(&self, check_expired: bool) -> Vec<K>;

    /// Snapshot of key/value pairs, optionally excluding expired entries.
    fn get_all(&self, check_expired: bool) -> Vec<(K, V)>;

    /// Entry count; with `check_expired` set, excludes expired entries.
    fn len(&self, check_expired: bool) -> usize;

    /// Fires the purge visitor for every entry, then resets the engine to
    /// its initial state.
    fn purge(&mut self);

    /// Inserts or overwrites using the default expiration.
    fn set(&mut self, key: K, value: V) -> Result<(), CacheError> {
        self.store(key, value, None)
    }

    /// Inserts or overwrites with an explicit TTL.
    fn set_with_expire(&mut self, key: K, value: V, ttl: Duration) -> Result<(), CacheError> {
        self.store(key, value, Some(ttl))
    }

    /// Reads `key`, recording a hit or miss unless `on_load` marks this as a
    /// loader-internal read, and applying the deserialize hook on hit.
    fn get(&mut self, key: &K, on_load: bool) -> Result<V, CacheError> {
        match self.lookup(key) {
            Some(value) => {
                if !on_load {
                    self.config().stats.record_hit();
                }
                self.config().apply_deserialize(key, value)
            },
            None => {
                if !on_load {
                    self.config().stats.record_miss();
                }
                Err(CacheError::NotFound)
            },
        }
    }

    /// Returns the configured capacity.
    fn capacity(&self) -> usize {
        self.config().capacity
    }
}

// ---------------------------------------------------------------------------
// EngineKind
// ---------------------------------------------------------------------------

/// The engine selected at build time.
pub enum EngineKind<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    /// Unordered store; unbounded when capacity is 0.
    Simple(SimpleEngine<K, V>),
    /// Least-recently-used eviction.
    Lru(LruEngine<K, V>),
    /// Least-frequently-used eviction.
    Lfu(LfuEngine<K, V>),
    /// Adaptive replacement cache.
    Arc(ArcEngine<K, V>),
}

impl<K, V> Engine<K, V> for EngineKind<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    fn config(&self) -> &EngineConfig<K, V> {
        match self {
            EngineKind::Simple(engine) => engine.config(),
            EngineKind::Lru(engine) => engine.config(),
            EngineKind::Lfu(engine) => engine.config(),
            EngineKind::Arc(engine) => engine.config(),
        }
    }

    fn store(&mut self, key: K, value: V, ttl: Option<Duration>) -> Result<(), CacheError> {
        match self {
            EngineKind::Simple(engine) => engine.store(key, value, ttl),
            EngineKind::Lru(engine) => engine.store(key, value, ttl),
            EngineKind::Lfu(engine) => engine.store(key, value, ttl),
            EngineKind::Arc(engine) => engine.store(key, value, ttl),
        }
    }

    fn lookup(&mut self, key: &K) -> Option<V> {
        match self {
            EngineKind::Simple(engine) => engine.lookup(key),
            EngineKind::Lru(engine) => engine.lookup(key),
            EngineKind::Lfu(engine) => engine.lookup(key),
            EngineKind::Arc(engine) => engine.lookup(key),
        }
    }

    fn remove(&mut self, key: &K) -> bool {
        match self {
            EngineKind::Simple(engine) => engine.remove(key),
            EngineKind::Lru(engine) => engine.remove(key),
            EngineKind::Lfu(engine) => engine.remove(key),
            EngineKind::Arc(engine) => engine.remove(key),
        }
    }

    fn existed(&self, key: &K) -> bool {
        match self {
            EngineKind::Simple(engine) => engine.existed(key),
            EngineKind::Lru(engine) => engine.existed(key),
            EngineKind::Lfu(engine) => engine.existed(key),
            EngineKind::Arc(engine) => engine.existed(key),
        }
    }

    fn keys(&self, check_expired: bool) -> Vec<K> {
        match self {
            EngineKind::Simple(engine) => engine.keys(check_expired),
            EngineKind::Lru(engine) => engine.keys(check_expired),
            EngineKind::Lfu(engine) => engine.keys(check_expired),
            EngineKind::Arc(engine) => engine.keys(check_expired),
        }
    }

    fn get_all(&self, check_expired: bool) -> Vec<(K, V)> {
        match self {
            EngineKind::Simple(engine) => engine.get_all(check_expired),
            EngineKind::Lru(engine) => engine.get_all(check_expired),
            EngineKind::Lfu(engine) => engine.get_all(check_expired),
            EngineKind::Arc(engine) => engine.get_all(check_expired),
        }
    }

    fn len(&self, check_expired: bool) -> usize {
        match self {
            EngineKind::Simple(engine) => engine.len(check_expired),
            EngineKind::Lru(engine) => engine.len(check_expired),
            EngineKind::Lfu(engine) => engine.len(check_expired),
            EngineKind::Arc(engine) => engine.len(check_expired),
        }
    }

    fn purge(&mut self) {
        match self {
            EngineKind::Simple(engine) => engine.purge(),
            EngineKind::Lru(engine) => engine.purge(),
            EngineKind::Lfu(engine) => engine.purge(),
            EngineKind::Arc(engine) => engine.purge(),
        }
    }
}
