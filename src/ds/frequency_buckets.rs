//! Frequency bucket list for LFU eviction.
//!
//! Buckets are linked in ascending frequency order. The bucket at slot 0 is
//! permanent, has frequency 0, and is the insertion point for brand-new
//! keys. Buckets that drain to empty are kept in place (cheap increments in
//! exchange for bucket-count growth on pathological workloads), so bucket
//! storage is append-only: a plain `Vec` position doubles as a stable
//! bucket id and no free list is needed. Only `clear` discards buckets, and
//! it keeps the head allocation. Eviction walks the chain from the head and
//! skips empties.

use rustc_hash::{FxHashMap, FxHashSet};
use std::hash::Hash;

const NIL: usize = usize::MAX;

#[derive(Debug)]
struct Bucket<K> {
    freq: u64,
    keys: FxHashSet<K>,
    prev: usize,
    next: usize,
}

impl<K> Bucket<K> {
    fn head() -> Self {
        Self {
            freq: 0,
            keys: FxHashSet::default(),
            prev: NIL,
            next: NIL,
        }
    }
}

/// Key set partitioned into frequency buckets, lowest frequency first.
#[derive(Debug)]
pub struct FrequencyBuckets<K> {
    /// Append-only bucket storage; slot 0 is the frequency-0 head.
    buckets: Vec<Bucket<K>>,
    index: FxHashMap<K, usize>,
    len: usize,
}

impl<K> FrequencyBuckets<K>
where
    K: Eq + Hash + Clone,
{
    /// Creates the bucket list with its permanent frequency-0 head bucket.
    pub fn new() -> Self {
        Self {
            buckets: vec![Bucket::head()],
            index: FxHashMap::default(),
            len: 0,
        }
    }

    /// Returns the number of tracked keys.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no keys are tracked.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns `true` if `key` is tracked.
    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Returns the access frequency of `key`, if tracked.
    pub fn frequency(&self, key: &K) -> Option<u64> {
        let at = *self.index.get(key)?;
        self.buckets.get(at).map(|bucket| bucket.freq)
    }

    /// Returns the number of buckets currently linked, including empties.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Adds a new key to the frequency-0 bucket; returns `false` if already
    /// tracked.
    pub fn insert(&mut self, key: K) -> bool {
        if self.index.contains_key(&key) {
            return false;
        }
        self.buckets[0].keys.insert(key.clone());
        self.index.insert(key, 0);
        self.len += 1;
        true
    }

    /// Moves `key` into the next-higher frequency bucket, appending and
    /// splicing a fresh bucket after the current one when the successor's
    /// frequency does not match. Returns the new frequency.
    ///
    /// The current bucket is left linked even if this empties it.
    pub fn touch(&mut self, key: &K) -> Option<u64> {
        let at = *self.index.get(key)?;
        let (freq, next) = {
            let bucket = self.buckets.get(at)?;
            (bucket.freq, bucket.next)
        };
        if freq == u64::MAX {
            return Some(freq);
        }
        let next_freq = freq + 1;

        let target = if next != NIL && self.buckets[next].freq == next_freq {
            next
        } else {
            let id = self.buckets.len();
            self.buckets.push(Bucket {
                freq: next_freq,
                keys: FxHashSet::default(),
                prev: at,
                next,
            });
            if next != NIL {
                self.buckets[next].prev = id;
            }
            self.buckets[at].next = id;
            id
        };

        self.buckets[at].keys.remove(key);
        self.buckets[target].keys.insert(key.clone());
        self.index.insert(key.clone(), target);
        Some(next_freq)
    }

    /// Stops tracking `key`; returns `true` if it was tracked.
    pub fn remove(&mut self, key: &K) -> bool {
        match self.index.remove(key) {
            Some(at) => {
                if let Some(bucket) = self.buckets.get_mut(at) {
                    bucket.keys.remove(key);
                }
                self.len -= 1;
                true
            },
            None => false,
        }
    }

    /// Removes and returns one key from the lowest non-empty bucket.
    ///
    /// Within a bucket the choice is arbitrary (set order); across buckets
    /// the walk is strictly lowest-frequency first.
    pub fn pop_min(&mut self) -> Option<K> {
        let mut at = 0;
        loop {
            let bucket = self.buckets.get_mut(at)?;
            let next = bucket.next;
            if let Some(key) = bucket.keys.iter().next().cloned() {
                bucket.keys.remove(&key);
                self.index.remove(&key);
                self.len -= 1;
                return Some(key);
            }
            if next == NIL {
                return None;
            }
            at = next;
        }
    }

    /// Drops every key and every spliced bucket, keeping only the reset
    /// frequency-0 head.
    pub fn clear(&mut self) {
        self.buckets.truncate(1);
        if let Some(head) = self.buckets.first_mut() {
            head.keys.clear();
            head.next = NIL;
        }
        self.index.clear();
        self.len = 0;
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        assert_eq!(self.index.len(), self.len);

        let head = self.buckets.first().expect("head bucket missing");
        assert_eq!(head.freq, 0);
        assert_eq!(head.prev, NIL);

        // the chain must visit every bucket exactly once, ascending
        let mut visited = 0usize;
        let mut total = 0usize;
        let mut last_freq = None;
        let mut last = NIL;
        let mut at = 0;
        while at != NIL {
            let bucket = self.buckets.get(at).expect("linked bucket missing");
            if let Some(prev_freq) = last_freq {
                assert!(bucket.freq > prev_freq, "bucket frequencies not ascending");
            }
            assert_eq!(bucket.prev, last);
            for key in &bucket.keys {
                assert_eq!(self.index.get(key), Some(&at));
            }
            visited += 1;
            total += bucket.keys.len();
            last_freq = Some(bucket.freq);
            last = at;
            at = bucket.next;
        }
        assert_eq!(visited, self.buckets.len(), "orphaned bucket slots");
        assert_eq!(total, self.len);
    }
}

impl<K> Default for FrequencyBuckets<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
