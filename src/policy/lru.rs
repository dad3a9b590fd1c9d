//! Least-recently-used cache engine.
//!
//! A recency [`KeyList`] (most recent at the front) over the entry map.
//! Stores insert at the front (an overwrite also promotes) and a capacity
//! breach evicts the tail. A hit moves the key to the front; a hit on an
//! expired entry evicts it instead. All operations are O(1).

use rustc_hash::FxHashMap;
use std::hash::Hash;
use std::time::Duration;

use crate::ds::KeyList;
use crate::error::CacheError;
use crate::policy::{CacheEntry, Engine, EngineConfig};

/// Recency-ordered engine; the coldest entry is evicted first.
pub struct LruEngine<K, V>
where
    K: Clone + Eq + Hash,
{
    config: EngineConfig<K, V>,
    items: FxHashMap<K, CacheEntry<V>>,
    recency: KeyList<K>,
}

impl<K, V> LruEngine<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    /// Creates an LRU engine from `config`.
    pub fn new(config: EngineConfig<K, V>) -> Self {
        let capacity = config.capacity;
        Self {
            items: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            recency: KeyList::with_capacity(capacity),
            config,
        }
    }

    /// Key currently at the cold end of the recency list.
    #[cfg(test)]
    fn coldest(&self) -> Option<&K> {
        self.recency.back()
    }

    fn evict_one(&mut self) {
        if let Some(victim) = self.recency.pop_back() {
            if let Some(entry) = self.items.remove(&victim) {
                self.config.notify_evicted(&victim, &entry.value);
            }
        }
    }

    fn remove_entry(&mut self, key: &K) -> bool {
        match self.items.remove(key) {
            Some(entry) => {
                self.recency.remove(key);
                self.config.notify_evicted(key, &entry.value);
                true
            },
            None => false,
        }
    }
}

impl<K, V> Engine<K, V> for LruEngine<K, V>
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
                if self.items.len() >= self.config.capacity {
                    self.evict_one();
                }
                self.items
                    .insert(key.clone(), CacheEntry::new(value, refreshed));
                None
            },
        };
        self.recency.push_front(key.clone());

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
                self.recency.touch(key);
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
        self.recency.clear();
    }
}
