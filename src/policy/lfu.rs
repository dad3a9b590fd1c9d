//! Least-frequently-used cache engine.
//!
//! Access counts live in a [`FrequencyBuckets`] structure: a linked list of
//! buckets sorted ascending by frequency, each holding the set of keys at
//! exactly that count. New keys enter the permanent frequency-0 head bucket;
//! a hit moves the key one bucket up, splicing a fresh bucket when needed.
//! Eviction walks buckets from the head, so the least-frequently-used key
//! goes first; ties are broken arbitrarily within a bucket.
//!
//! Buckets that drain empty are retained rather than pruned: the increment
//! path stays O(1) at the cost of bucket-count growth under monotonic
//! access patterns.

use rustc_hash::FxHashMap;
use std::hash::Hash;
use std::time::Duration;

use crate::ds::FrequencyBuckets;
use crate::error::CacheError;
use crate::policy::{CacheEntry, Engine, EngineConfig};

/// Frequency-ordered engine; the least-used entry is evicted first.
pub struct LfuEngine<K, V>
where
    K: Clone + Eq + Hash,
{
    config: EngineConfig<K, V>,
    items: FxHashMap<K, CacheEntry<V>>,
    frequencies: FrequencyBuckets<K>,
}

impl<K, V> LfuEngine<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    /// Creates an LFU engine from `config`.
    pub fn new(config: EngineConfig<K, V>) -> Self {
        let capacity = config.capacity;
        Self {
            items: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            frequencies: FrequencyBuckets::new(),
            config,
        }
    }

    /// Access count of `key`, if present. Stores count as 0 and each hit
    /// adds 1.
    pub fn frequency(&self, key: &K) -> Option<u64> {
        self.frequencies.frequency(key)
    }

    fn evict_one(&mut self) {
        if let Some(victim) = self.frequencies.pop_min() {
            if let Some(entry) = self.items.remove(&victim) {
                self.config.notify_evicted(&victim, &entry.value);
            }
        }
    }

    fn remove_entry(&mut self, key: &K) -> bool {
        match self.items.remove(key) {
            Some(entry) => {
                self.frequencies.remove(key);
                self.config.notify_evicted(key, &entry.value);
                true
            },
            None => false,
        }
    }
}

impl<K, V> Engine<K, V> for LfuEngine<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    fn config(&self) -> &EngineConfig<K, V> {
        &self.config
    }

    fn store(&mut self, key: K, value: V, ttl: Option<Duration>) -> Result<(), CacheError> {
        let value = self.config.apply_serialize(&key, value)?;
        let refreshed = self.config.entry_expiration(ttl);

        let overwritten = match self.items.get_mut(&key) {
            Some(entry) => {
                // frequency is untouched by an overwrite
                let old = std::mem::replace(&mut entry.value, value);
                if let Some(at) = refreshed {
                    entry.expiration = Some(at);
                }
                Some(old)
            },
            None => {
                if self.items.len() >= self.config.capacity {
                    self.evict_one();
                }
                self.frequencies.insert(key.clone());
                self.items
                    .insert(key.clone(), CacheEntry::new(value, refreshed));
                None
            },
        };

        if let Some(old) = overwritten {
            self.config.notify_evicted(&key, &old);
        }
        if let Some(entry) = self.items.get(&key) {
            self.config.notify_added(&key, &entry.value);
        }
        Ok(())
    }

    fn lookup(&mut self, key: &K) -> Option<V> {
        let now = self.config.now();
        match self.items.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                let value = entry.value.clone();
                self.frequencies.touch(key);
                Some(value)
            },
            Some(_) => {
                self.remove_entry(key);
                None
            },
            None => None,
        }
    }

    fn remove(&mut self, key: &K) -> bool {
        self.remove_entry(key)
    }

    fn existed(&self, key: &K) -> bool {
        let now = self.config.now();
        self.items
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    fn keys(&self, check_expired: bool) -> Vec<K> {
        let now = self.config.now();
        self.items
            .iter()
            .filter(|(_, entry)| !check_expired || !entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect()
    }

    fn get_all(&self, check_expired: bool) -> Vec<(K, V)> {
        let now = self.config.now();
        self.items
            .iter()
            .filter(|(_, entry)| !check_expired || !entry.is_expired(now))
            .map(|(key, entry)| (key.clone(), entry.value.clone()))
            .collect()
    }

    fn len(&self, check_expired: bool) -> usize {
        if !check_expired {
            return self.items.len();
        }
        let now = self.config.now();
        self.items
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }

    fn purge(&mut self) {
        for (key, entry) in &self.items {
            self.config.notify_purge(key, &entry.value);
        }
        self.items.clear();
        self.frequencies.clear();
    }
}
