//! Fluent cache construction.
//!
//! ```
//! use polycache::builder::CacheBuilder;
//! use std::time::Duration;
//!
//! let cache = CacheBuilder::new(1024)
//!     .arc()
//!     .expiration(Duration::from_secs(60))
//!     .build();
//!
//! cache.set("session", "alice").unwrap();
//! assert_eq!(cache.get_if_present(&"session").unwrap(), "alice");
//! ```
//!
//! Invalid configuration (a zero capacity with a bounded policy) panics
//! in [`CacheBuilder::build`] (it is a programmer error) or surfaces as a
//! [`ConfigError`](crate::error::ConfigError) from
//! [`CacheBuilder::try_build`].

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{Cache, LoaderExpireFn};
use crate::clock::{Clock, SystemClock};
use crate::context::Context;
use crate::error::{ConfigError, DynError};
use crate::policy::{
    ArcEngine, EngineConfig, EngineKind, LfuEngine, LruEngine, SimpleEngine,
};

/// Available eviction policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionPolicy {
    /// Unordered store; capacity 0 means unbounded.
    Simple,
    /// Least recently used.
    Lru,
    /// Least frequently used.
    Lfu,
    /// Adaptive replacement cache.
    Arc,
}

/// Builder for [`Cache`] instances.
///
/// All callbacks run while the engine lock is held: they must not re-enter
/// the cache they are attached to, and they must not panic.
pub struct CacheBuilder<K, V> {
    capacity: usize,
    policy: EvictionPolicy,
    clock: Arc<dyn Clock>,
    expiration: Option<Duration>,
    loader: Option<LoaderExpireFn<K, V>>,
    added: Option<Arc<dyn Fn(&K, &V) + Send + Sync>>,
    evicted: Option<Arc<dyn Fn(&K, &V) + Send + Sync>>,
    purge_visitor: Option<Arc<dyn Fn(&K, &V) + Send + Sync>>,
    serialize: Option<Arc<dyn Fn(&K, V) -> Result<V, DynError> + Send + Sync>>,
    deserialize: Option<Arc<dyn Fn(&K, V) -> Result<V, DynError> + Send + Sync>>,
}

impl<K, V> CacheBuilder<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Starts a builder for a cache holding up to `capacity` entries.
    ///
    /// The policy defaults to [`EvictionPolicy::Simple`], the only policy
    /// that accepts a capacity of 0 (meaning unbounded).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            policy: EvictionPolicy::Simple,
            clock: Arc::new(SystemClock::new()),
            expiration: None,
            loader: None,
            added: None,
            evicted: None,
            purge_visitor: None,
            serialize: None,
            deserialize: None,
        }
    }

    /// Selects the eviction policy.
    pub fn eviction(mut self, policy: EvictionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Shortcut for [`EvictionPolicy::Simple`].
    pub fn simple(self) -> Self {
        self.eviction(EvictionPolicy::Simple)
    }

    /// Shortcut for [`EvictionPolicy::Lru`].
    pub fn lru(self) -> Self {
        self.eviction(EvictionPolicy::Lru)
    }

    /// Shortcut for [`EvictionPolicy::Lfu`].
    pub fn lfu(self) -> Self {
        self.eviction(EvictionPolicy::Lfu)
    }

    /// Shortcut for [`EvictionPolicy::Arc`].
    pub fn arc(self) -> Self {
        self.eviction(EvictionPolicy::Arc)
    }

    /// Injects a time source (tests use
    /// [`FakeClock`](crate::clock::FakeClock)).
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the default per-entry TTL.
    pub fn expiration(mut self, ttl: Duration) -> Self {
        self.expiration = Some(ttl);
        self
    }

    /// Sets a cache-aside loader invoked on `get` misses and by `refresh`.
    pub fn loader<F>(self, f: F) -> Self
    where
        F: Fn(&Context, &K) -> Result<V, DynError> + Send + Sync + 'static,
    {
        self.loader_with_expire(move |ctx, key| f(ctx, key).map(|value| (value, None)))
    }

    /// As [`loader`](CacheBuilder::loader), but the loader may return a
    /// per-entry TTL overriding the default (`None` keeps the default).
    pub fn loader_with_expire<F>(mut self, f: F) -> Self
    where
        F: Fn(&Context, &K) -> Result<(V, Option<Duration>), DynError> + Send + Sync + 'static,
    {
        self.loader = Some(Arc::new(f));
        self
    }

    /// Invoked with `(key, value)` on every successful store.
    pub fn added_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&K, &V) + Send + Sync + 'static,
    {
        self.added = Some(Arc::new(f));
        self
    }

    /// Invoked with `(key, value)` whenever a value is evicted, removed, or
    /// overwritten.
    pub fn evicted_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&K, &V) + Send + Sync + 'static,
    {
        self.evicted = Some(Arc::new(f));
        self
    }

    /// Invoked with `(key, value)` for every entry during a purge.
    pub fn purge_visitor_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&K, &V) + Send + Sync + 'static,
    {
        self.purge_visitor = Some(Arc::new(f));
        self
    }

    /// Transforms values on their way into the cache.
    pub fn serialize_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&K, V) -> Result<V, DynError> + Send + Sync + 'static,
    {
        self.serialize = Some(Arc::new(f));
        self
    }

    /// Transforms values on their way out of the cache.
    pub fn deserialize_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&K, V) -> Result<V, DynError> + Send + Sync + 'static,
    {
        self.deserialize = Some(Arc::new(f));
        self
    }

    /// Builds the cache, returning a [`ConfigError`] for invalid
    /// configuration.
    pub fn try_build(self) -> Result<Cache<K, V>, ConfigError> {
        if self.capacity == 0 && self.policy != EvictionPolicy::Simple {
            return Err(ConfigError::new(format!(
                "cache capacity must be > 0 for {:?} eviction",
                self.policy
            )));
        }

        let mut config = EngineConfig::new(self.capacity).with_clock(self.clock);
        config.expiration = self.expiration;
        config.added = self.added;
        config.evicted = self.evicted;
        config.purge_visitor = self.purge_visitor;
        config.serialize = self.serialize;
        config.deserialize = self.deserialize;
        let stats = Arc::clone(config.stats());

        let engine = match self.policy {
            EvictionPolicy::Simple => EngineKind::Simple(SimpleEngine::new(config)),
            EvictionPolicy::Lru => EngineKind::Lru(LruEngine::new(config)),
            EvictionPolicy::Lfu => EngineKind::Lfu(LfuEngine::new(config)),
            EvictionPolicy::Arc => EngineKind::Arc(ArcEngine::new(config)),
        };
        Ok(Cache::new(engine, stats, self.loader))
    }

    /// Builds the cache.
    ///
    /// # Panics
    ///
    /// Panics on invalid configuration; use
    /// [`try_build`](CacheBuilder::try_build) to handle it as an error.
    pub fn build(self) -> Cache<K, V> {
        match self.try_build() {
            Ok(cache) => cache,
            Err(err) => panic!("polycache: {err}"),
        }
    }
}
