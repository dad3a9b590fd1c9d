//! Adaptive Replacement Cache (ARC) engine.
//!
//! ARC partitions capacity between a recency side and a frequency side and
//! re-balances the split continuously, using two "ghost" lists of recently
//! evicted keys as the steering signal.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────────┐
//! │                         ArcEngine<K, V> layout                         │
//! │                                                                        │
//! │   items: FxHashMap<K, CacheEntry<V>>     (values for T1 ∪ T2 only)     │
//! │                                                                        │
//! │   T1 (seen once, recency)            T2 (seen twice+, frequency)       │
//! │   ┌──────────────────────┐           ┌──────────────────────┐          │
//! │   │ MRU ──────────► LRU  │           │ MRU ──────────► LRU  │          │
//! │   └──────────┬───────────┘           └──────────┬───────────┘          │
//! │              │ demote on eviction               │ demote on eviction   │
//! │              ▼                                  ▼                      │
//! │   B1 (ghost keys from T1)            B2 (ghost keys from T2)           │
//! │   ┌──────────────────────┐           ┌──────────────────────┐          │
//! │   │ keys only, no values │           │ keys only, no values │          │
//! │   └──────────────────────┘           └──────────────────────┘          │
//! │                                                                        │
//! │   p: target size of T1  (0 ≤ p ≤ capacity)                             │
//! │   • hit in B1 → p grows  (workload wants recency)                      │
//! │   • hit in B2 → p shrinks (workload wants frequency)                   │
//! │   • p is only adapted while the cache is full                          │
//! └────────────────────────────────────────────────────────────────────────┘
//!
//! Store flow (fresh key, no ghost hit)
//! ────────────────────────────────────
//!   1. |T1|+|B1| == N:
//!        |T1| < N → drop B1 tail, run replace
//!        |T1| == N → drop the T1 tail outright (value evicted, no ghost)
//!   2. else if |T1|+|B1|+|T2|+|B2| ≥ N:
//!        at 2N, drop the B2 tail (B1 if B2 is empty); run replace
//!   3. push key to T1 front
//!
//! Ghost hit (key in B1 or B2)
//! ───────────────────────────
//!   1. adapt p by max(|other ghost| / |this ghost|, 1), clamped to [0, N]
//!   2. run replace to make room
//!   3. move key from the ghost list to the T2 front (proven reuse)
//!
//! replace()
//! ─────────
//!   no-op unless full. Evicts the T1 tail into B1 when |T1| > p (or when
//!   the incoming key is a B2 ghost and |T1| == p); otherwise evicts the
//!   T2 tail into B2. The evicted value fires the `evicted` callback.
//!
//! Get flow
//! ────────
//!   T1 hit → promote to T2 front; T2 hit → move to T2 front. A hit on an
//!   expired entry evicts the value and pushes the key to the matching
//!   ghost list instead.
//! ```
//!
//! ## Invariants
//!
//! After every operation: `|T1| + |T2| ≤ N`, `|T1| + |B1| ≤ N`,
//! `|T2| + |B2| ≤ 2N`, the four lists are pairwise disjoint, `p ∈ [0, N]`,
//! and `items` covers exactly `T1 ∪ T2`. `debug_validate_invariants`
//! asserts all of these in debug/test builds.
//!
//! ## References
//!
//! - Megiddo & Modha, "ARC: A Self-Tuning, Low Overhead Replacement Cache",
//!   FAST 2003

use rustc_hash::FxHashMap;
use std::fmt;
use std::hash::Hash;
use std::time::Duration;

use crate::ds::KeyList;
use crate::error::CacheError;
use crate::policy::{CacheEntry, Engine, EngineConfig};

/// Adaptive engine balancing recency (T1) against frequency (T2).
pub struct ArcEngine<K, V>
where
    K: Clone + Eq + Hash,
{
    config: EngineConfig<K, V>,
    /// Values for keys resident in T1 ∪ T2.
    items: FxHashMap<K, CacheEntry<V>>,
    /// Seen exactly once; most recent at the front.
    t1: KeyList<K>,
    /// Seen at least twice; most recent at the front.
    t2: KeyList<K>,
    /// Ghost keys recently demoted from T1.
    b1: KeyList<K>,
    /// Ghost keys recently demoted from T2.
    b2: KeyList<K>,
    /// Target size of T1. Starts at 0; adapted only while full.
    p: usize,
}

impl<K, V> ArcEngine<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    /// Creates an ARC engine from `config`.
    pub fn new(config: EngineConfig<K, V>) -> Self {
        let capacity = config.capacity;
        Self {
            items: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            t1: KeyList::with_capacity(capacity),
            t2: KeyList::with_capacity(capacity),
            b1: KeyList::with_capacity(capacity),
            b2: KeyList::with_capacity(capacity),
            p: 0,
            config,
        }
    }

    /// Current target size of T1.
    pub fn p_value(&self) -> usize {
        self.p
    }

    /// Number of resident seen-once entries.
    pub fn t1_len(&self) -> usize {
        self.t1.len()
    }

    /// Number of resident seen-twice entries.
    pub fn t2_len(&self) -> usize {
        self.t2.len()
    }

    /// Number of ghost keys on the recency side.
    pub fn b1_len(&self) -> usize {
        self.b1.len()
    }

    /// Number of ghost keys on the frequency side.
    pub fn b2_len(&self) -> usize {
        self.b2.len()
    }

    fn is_full(&self) -> bool {
        self.t1.len() + self.t2.len() == self.config.capacity
    }

    /// Applies a new partition target; ignored unless the cache is full.
    fn set_partition(&mut self, p: usize) {
        if self.is_full() {
            self.p = p;
        }
    }

    /// Evicts the value for `key` from the entry map, firing `evicted`.
    fn evict_value(&mut self, key: &K) {
        if let Some(entry) = self.items.remove(key) {
            self.config.notify_evicted(key, &entry.value);
        }
    }

    /// Core replacement: demotes the T1 tail into B1 or the T2 tail into
    /// B2, guided by `p`. `key` is the key being brought in; when it is a
    /// B2 ghost the tie at `|T1| == p` breaks toward evicting from T1.
    fn replace(&mut self, key: &K) {
        if !self.is_full() {
            return;
        }
        let from_t1 = self.t1.len() > 0
            && ((self.b2.contains(key) && self.t1.len() == self.p) || self.t1.len() > self.p);

        if from_t1 {
            if let Some(old) = self.t1.pop_back() {
                self.b1.push_front(old.clone());
                self.evict_value(&old);
            }
        } else if self.t2.len() > 0 {
            if let Some(old) = self.t2.pop_back() {
                self.b2.push_front(old.clone());
                self.evict_value(&old);
            }
        } else if let Some(old) = self.t1.pop_back() {
            self.b1.push_front(old.clone());
            self.evict_value(&old);
        }
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        let capacity = self.config.capacity;

        assert!(
            self.t1.len() + self.t2.len() <= capacity,
            "resident entries exceed capacity"
        );
        assert!(
            self.t1.len() + self.b1.len() <= capacity,
            "|T1| + |B1| exceeds capacity"
        );
        assert!(
            self.t2.len() + self.b2.len() <= 2 * capacity,
            "|T2| + |B2| exceeds twice the capacity"
        );
        assert!(self.p <= capacity, "partition target out of range");
        assert_eq!(
            self.items.len(),
            self.t1.len() + self.t2.len(),
            "entry map does not cover exactly T1 ∪ T2"
        );

        for key in self.t1.iter() {
            assert!(self.items.contains_key(key), "T1 key missing a value");
            assert!(!self.t2.contains(key), "key in both T1 and T2");
            assert!(!self.b1.contains(key), "key in both T1 and B1");
            assert!(!self.b2.contains(key), "key in both T1 and B2");
        }
        for key in self.t2.iter() {
            assert!(self.items.contains_key(key), "T2 key missing a value");
            assert!(!self.b1.contains(key), "key in both T2 and B1");
            assert!(!self.b2.contains(key), "key in both T2 and B2");
        }
        for key in self.b1.iter() {
            assert!(!self.items.contains_key(key), "B1 ghost key has a value");
            assert!(!self.b2.contains(key), "key in both B1 and B2");
        }
        for key in self.b2.iter() {
            assert!(!self.items.contains_key(key), "B2 ghost key has a value");
        }

        self.t1.debug_validate_invariants();
        self.t2.debug_validate_invariants();
        self.b1.debug_validate_invariants();
        self.b2.debug_validate_invariants();
    }
}

impl<K, V> Engine<K, V> for ArcEngine<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    fn config(&self) -> &EngineConfig<K, V> {
        &self.config
    }

    fn store(&mut self, key: K, value: V, ttl: Option<Duration>) -> Result<(), CacheError> {
        if self.config.capacity == 0 {
            return Ok(());
        }
        let value = self.config.apply_serialize(&key, value)?;
        let refreshed = self.config.entry_expiration(ttl);

        // Resident key: overwrite in place, no list movement.
        if self.t1.contains(&key) || self.t2.contains(&key) {
            if let Some(entry) = self.items.get_mut(&key) {
                let old = std::mem::replace(&mut entry.value, value);
                if let Some(at) = refreshed {
                    entry.expiration = Some(at);
                }
                self.config.notify_evicted(&key, &old);
            }
            if let Some(entry) = self.items.get(&key) {
                self.config.notify_added(&key, &entry.value);
            }
            return Ok(());
        }

        if self.b1.contains(&key) {
            // Recency-side ghost hit: grow p, make room, resurrect into T2.
            let delta = (self.b2.len() / self.b1.len()).max(1);
            let p = (self.p + delta).min(self.config.capacity);
            self.set_partition(p);
            self.replace(&key);
            self.b1.remove(&key);
            self.t2.push_front(key.clone());
        } else if self.b2.contains(&key) {
            // Frequency-side ghost hit: shrink p, make room, resurrect into T2.
            let delta = (self.b1.len() / self.b2.len()).max(1);
            let p = self.p.saturating_sub(delta);
            self.set_partition(p);
            self.replace(&key);
            self.b2.remove(&key);
            self.t2.push_front(key.clone());
        } else {
            // Fresh key.
            let capacity = self.config.capacity;
            if self.t1.len() + self.b1.len() == capacity {
                if self.t1.len() < capacity {
                    self.b1.pop_back();
                    self.replace(&key);
                } else if let Some(victim) = self.t1.pop_back() {
                    // T1 occupies the whole cache: drop its tail, no ghost
                    self.evict_value(&victim);
                }
            } else {
                let total = self.t1.len() + self.b1.len() + self.t2.len() + self.b2.len();
                if total >= capacity {
                    if total == 2 * capacity && self.b2.pop_back().is_none() {
                        self.b1.pop_back();
                    }
                    self.replace(&key);
                }
            }
            self.t1.push_front(key.clone());
        }

        self.items
            .insert(key.clone(), CacheEntry::new(value, refreshed));
        if let Some(entry) = self.items.get(&key) {
            self.config.notify_added(&key, &entry.value);
        }
        Ok(())
    }

    fn lookup(&mut self, key: &K) -> Option<V> {
        let now = self.config.now();
        if self.t1.contains(key) {
            self.t1.remove(key);
            let expired = self
                .items
                .get(key)
                .is_none_or(|entry| entry.is_expired(now));
            if !expired {
                self.t2.push_front(key.clone());
                return self.items.get(key).map(|entry| entry.value.clone());
            }
            self.b1.push_front(key.clone());
            self.evict_value(key);
            return None;
        }
        if self.t2.contains(key) {
            let expired = self
                .items
                .get(key)
                .is_none_or(|entry| entry.is_expired(now));
            if !expired {
                self.t2.touch(key);
                return self.items.get(key).map(|entry| entry.value.clone());
            }
            self.t2.remove(key);
            self.b2.push_front(key.clone());
            self.evict_value(key);
            return None;
        }
        None
    }

    fn remove(&mut self, key: &K) -> bool {
        if self.t1.remove(key) {
            self.b1.push_front(key.clone());
            self.evict_value(key);
            return true;
        }
        if self.t2.remove(key) {
            self.b2.push_front(key.clone());
            self.evict_value(key);
            return true;
        }
        false
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
        self.t1.clear();
        self.t2.clear();
        self.b1.clear();
        self.b2.clear();
        self.p = 0;
    }
}

impl<K, V> fmt::Debug for ArcEngine<K, V>
where
    K: Clone + Eq + Hash,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArcEngine")
            .field("capacity", &self.config.capacity)
            .field("t1_len", &self.t1.len())
            .field("t2_len", &self.t2.len())
            .field("b1_len", &self.b1.len())
            .field("b2_len", &self.b2.len())
            .field("p", &self.p)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn arc_new_engine_is_empty() {
        let engine: ArcEngine<&str, i32> = ArcEngine::new(EngineConfig::new(10));
        assert_eq!(engine.len(false), 0);
        assert_eq!(engine.t1_len(), 0);
        assert_eq!(engine.t2_len(), 0);
        assert_eq!(engine.b1_len(), 0);
        assert_eq!(engine.b2_len(), 0);
        assert_eq!(engine.p_value(), 0);
    }

    #[test]
    fn arc_insert_lands_in_t1_and_get_promotes_to_t2() {
        let mut engine = ArcEngine::new(EngineConfig::new(10));
        engine.set("k", 1).unwrap();
        assert_eq!(engine.t1_len(), 1);
        assert_eq!(engine.t2_len(), 0);

        assert_eq!(engine.get(&"k", false).unwrap(), 1);
        assert_eq!(engine.t1_len(), 0);
        assert_eq!(engine.t2_len(), 1);

        // second hit stays in T2
        assert_eq!(engine.get(&"k", false).unwrap(), 1);
        assert_eq!(engine.t2_len(), 1);
        engine.debug_validate_invariants();
    }

    #[test]
    fn arc_overwrite_keeps_list_position() {
        let mut engine = ArcEngine::new(EngineConfig::new(10));
        engine.set("k", 1).unwrap();
        engine.set("k", 2).unwrap();

        assert_eq!(engine.t1_len(), 1);
        assert_eq!(engine.t2_len(), 0);
        assert_eq!(engine.get(&"k", false).unwrap(), 2);
        assert_eq!(engine.len(false), 1);
    }

    #[test]
    fn arc_pure_recency_fill_drops_t1_tail_without_ghost() {
        // never-read keys fill T1 completely; the overflow victim is
        // dropped outright rather than demoted to B1
        let mut engine = ArcEngine::new(EngineConfig::new(2));
        engine.set("a", 1).unwrap();
        engine.set("b", 2).unwrap();
        engine.set("c", 3).unwrap();

        assert_eq!(engine.len(false), 2);
        assert!(!engine.existed(&"a"));
        assert_eq!(engine.b1_len(), 0);
        engine.debug_validate_invariants();
    }

    #[test]
    fn arc_eviction_demotes_to_b1_once_t2_is_populated() {
        let mut engine = ArcEngine::new(EngineConfig::new(2));
        engine.set("a", 1).unwrap();
        engine.set("b", 2).unwrap();
        engine.get(&"a", false).unwrap(); // a -> T2, leaving t1=[b]

        engine.set("c", 3).unwrap(); // replace() demotes b into B1
        assert!(!engine.existed(&"b"));
        assert_eq!(engine.b1_len(), 1);
        assert_eq!(engine.t1_len(), 1);
        assert_eq!(engine.t2_len(), 1);
        engine.debug_validate_invariants();
    }

    #[test]
    fn arc_b1_ghost_hit_adapts_p_and_resurrects_into_t2() {
        let mut engine = ArcEngine::new(EngineConfig::new(2));
        engine.set("a", 1).unwrap();
        engine.set("b", 2).unwrap();
        engine.get(&"a", false).unwrap(); // t1=[b], t2=[a]
        engine.set("c", 3).unwrap(); // b demoted to B1
        assert!(engine.b1_len() == 1 && engine.p_value() == 0);

        engine.set("b", 9).unwrap(); // ghost hit on B1
        assert_eq!(engine.p_value(), 1, "p should grow by max(|B2|/|B1|, 1)");
        assert_eq!(engine.t2_len(), 1);
        assert_eq!(engine.b1_len(), 0);
        assert_eq!(engine.get(&"b", false).unwrap(), 9);
        engine.debug_validate_invariants();
    }

    #[test]
    fn arc_b2_ghost_hit_shrinks_p() {
        let mut engine = ArcEngine::new(EngineConfig::new(2));
        engine.set("a", 1).unwrap();
        engine.set("b", 2).unwrap();
        engine.get(&"a", false).unwrap(); // t1=[b], t2=[a]
        engine.set("c", 3).unwrap(); // b -> B1
        engine.set("b", 9).unwrap(); // B1 ghost hit: p=1, a demoted to B2

        assert_eq!(engine.b2_len(), 1);
        assert_eq!(engine.p_value(), 1);

        engine.set("a", 10).unwrap(); // B2 ghost hit: p shrinks back to 0
        assert_eq!(engine.p_value(), 0);
        assert_eq!(engine.get(&"a", false).unwrap(), 10);
        engine.debug_validate_invariants();
    }

    #[test]
    fn arc_invariants_hold_under_mixed_workload() {
        let mut engine = ArcEngine::new(EngineConfig::new(8));
        for _round in 0..6 {
            for i in 0u32..24 {
                engine.set(i, i).unwrap();
                if i % 3 == 0 {
                    let _ = engine.get(&(i / 2), false);
                }
                if i % 7 == 0 {
                    engine.remove(&(i % 5));
                }
                engine.debug_validate_invariants();
            }
        }
        assert!(engine.len(false) <= 8);
    }

    #[test]
    fn arc_expired_t1_hit_moves_key_to_b1() {
        let clock = Arc::new(FakeClock::new());
        let mut engine = ArcEngine::new(EngineConfig::new(4).with_clock(clock.clone()));

        engine
            .set_with_expire("k", 1, Duration::from_secs(1))
            .unwrap();
        clock.advance(Duration::from_secs(2));

        assert!(engine.get(&"k", false).is_err());
        assert_eq!(engine.len(false), 0);
        assert_eq!(engine.b1_len(), 1);
        engine.debug_validate_invariants();
    }

    #[test]
    fn arc_expired_t2_hit_moves_key_to_b2() {
        let clock = Arc::new(FakeClock::new());
        let mut engine = ArcEngine::new(EngineConfig::new(4).with_clock(clock.clone()));

        engine
            .set_with_expire("k", 1, Duration::from_secs(5))
            .unwrap();
        engine.get(&"k", false).unwrap(); // promote to T2
        clock.advance(Duration::from_secs(6));

        assert!(engine.get(&"k", false).is_err());
        assert_eq!(engine.b2_len(), 1);
        assert_eq!(engine.t2_len(), 0);
        engine.debug_validate_invariants();
    }

    #[test]
    fn arc_remove_pushes_key_to_matching_ghost_list() {
        let mut engine = ArcEngine::new(EngineConfig::new(4));
        engine.set("recent", 1).unwrap();
        engine.set("frequent", 2).unwrap();
        engine.get(&"frequent", false).unwrap();

        assert!(engine.remove(&"recent"));
        assert!(engine.remove(&"frequent"));
        assert!(!engine.remove(&"recent"));

        assert_eq!(engine.b1_len(), 1);
        assert_eq!(engine.b2_len(), 1);
        assert_eq!(engine.len(false), 0);
        engine.debug_validate_invariants();
    }

    #[test]
    fn arc_evicted_callback_fires_for_demotions() {
        let evicted = Arc::new(AtomicUsize::new(0));
        let mut engine = ArcEngine::new(EngineConfig::new(2).with_evicted_fn({
            let evicted = Arc::clone(&evicted);
            move |_k: &&str, _v: &i32| {
                evicted.fetch_add(1, Ordering::SeqCst);
            }
        }));

        engine.set("a", 1).unwrap();
        engine.set("b", 2).unwrap();
        engine.get(&"a", false).unwrap();
        engine.set("c", 3).unwrap(); // demotes b

        assert_eq!(evicted.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_purge_resets_everything() {
        let purged = Arc::new(AtomicUsize::new(0));
        let mut engine = ArcEngine::new(EngineConfig::new(4).with_purge_visitor_fn({
            let purged = Arc::clone(&purged);
            move |_k: &i32, _v: &i32| {
                purged.fetch_add(1, Ordering::SeqCst);
            }
        }));

        for i in 0..4 {
            engine.set(i, i).unwrap();
        }
        engine.get(&0, false).unwrap();
        engine.set(4, 4).unwrap(); // populate a ghost list
        engine.purge();

        assert_eq!(purged.load(Ordering::SeqCst), 4);
        assert_eq!(engine.len(false), 0);
        assert_eq!(engine.b1_len() + engine.b2_len(), 0);
        assert_eq!(engine.p_value(), 0);
        engine.debug_validate_invariants();
    }

    #[test]
    fn arc_ghost_lists_stay_bounded_under_churn() {
        let mut engine = ArcEngine::new(EngineConfig::new(4));
        for i in 0u32..100 {
            engine.set(i, i).unwrap();
            // promote every other key so both sides see traffic
            if i % 2 == 0 {
                let _ = engine.get(&i, false);
            }
        }
        engine.debug_validate_invariants();
        assert!(engine.b1_len() + engine.t1_len() <= 4);
        assert!(engine.b2_len() + engine.t2_len() <= 8);
    }
}
