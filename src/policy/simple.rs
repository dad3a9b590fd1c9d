//! Simple (unordered) cache engine.
//!
//! No access-order bookkeeping: just the entry map plus an insertion-order
//! list used only when a bounded instance must pick an eviction victim. The
//! victim choice is deterministic: the first expired entry in insertion
//! order, else the oldest entry.
//!
//! A capacity of 0 means unbounded: nothing is ever evicted, only expired
//! entries disappear (lazily, on read).

use rustc_hash::FxHashMap;
use std::hash::Hash;
use std::time::Duration;

use crate::ds::KeyList;
use crate::error::CacheError;
use crate::policy::{CacheEntry, Engine, EngineConfig};

/// Map-backed engine with no access ordering.
pub struct SimpleEngine<K, V>
where
    K: Clone + Eq + Hash,
{
    config: EngineConfig<K, V>,
    items: FxHashMap<K, CacheEntry<V>>,
    order: KeyList<K>,
}

impl<K, V> SimpleEngine<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    /// Creates a simple engine from `config`.
    pub fn new(config: EngineConfig<K, V>) -> Self {
        let capacity = config.capacity;
        Self {
            items: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            order: KeyList::with_capacity(capacity),
            config,
        }
    }

    /// Evicts one entry: the first expired entry in insertion order, else
    /// the oldest entry.
    fn evict_one(&mut self) {
        let now = self.config.now();
        let victim = self
            .order
            .iter()
            .find(|key| {
                self.items
                    .get(*key)
                    .is_some_and(|entry| entry.is_expired(now))
            })
            .cloned()
            .or_else(|| self.order.front().cloned());
        if let Some(key) = victim {
            self.remove_entry(&key);
        }
    }

    fn remove_entry(&mut self, key: &K) -> bool {
        match self.items.remove(key) {
            Some(entry) => {
                self.order.remove(key);
                self.config.notify_evicted(key, &entry.value);
                true
            },
            None => false,
        }
    }
}

impl<K, V> Engine<K, V> for SimpleEngine<K, V>
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
                let old = std::mem::replace(&mut entry.value, value);
                if let Some(at) = refreshed {
                    entry.expiration = Some(at);
                }
                Some(old)
            },
            None => {
                if self.config.capacity > 0 && self.items.len() >= self.config.capacity {
                    self.evict_one();
                }
                self.order.push_back(key.clone());
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
            Some(entry) if !entry.is_expired(now) => Some(entry.value.clone()),
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
        self.order.clear();
    }
}
