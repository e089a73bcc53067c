// Copyright 2015-2020 Parity Technologies (UK) Ltd.
// This file is part of OpenEthereum.

// OpenEthereum is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// OpenEthereum is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with OpenEthereum.  If not, see <http://www.gnu.org/licenses/>.

//! N-way set-associative cache with per-set locking.

use std::mem;

use crossbeam_utils::CachePadded;
use parking_lot::Mutex;

use crate::Cache;
use memory_footprint::MemoryFootprint;

/// Projection of a key onto the set index space. Keys landing in the same
/// set compete for the same `ways` slots.
pub trait SetKey {
    fn to_set_index(&self) -> u64;
}

macro_rules! impl_set_key {
    ($($type: ty),*) => {
        $(impl SetKey for $type {
            fn to_set_index(&self) -> u64 {
                *self as u64
            }
        })*
    };
}

impl_set_key!(u16, u32, u64, usize);

#[derive(Debug)]
struct Entry<K, V> {
    key: K,
    value: V,
    // Per-set ticker value of the last access; smallest is evicted first.
    used: u64,
}

#[derive(Debug)]
struct CacheSet<K, V> {
    entries: Vec<Entry<K, V>>,
    ticker: u64,
}

impl<K: Eq, V> CacheSet<K, V> {
    fn tick(&mut self) -> u64 {
        self.ticker += 1;
        self.ticker
    }

    fn position(&self, key: &K) -> Option<usize> {
        self.entries.iter().position(|e| &e.key == key)
    }

    fn evict_position(&self) -> usize {
        self.entries
            .iter()
            .enumerate()
            .min_by_key(|(_, e)| e.used)
            .map(|(i, _)| i)
            .expect("set is full, hence non-empty; qed")
    }
}

/// A set-associative cache: keys are partitioned into `num_sets` sets of
/// `ways` entries each, with LRU eviction inside a set. Each set is
/// guarded by its own mutex on a dedicated cache line, so operations on
/// different sets never contend.
///
/// Safe for arbitrary concurrent `get`/`set`/`remove`/`iterate` mixes.
/// Iteration callbacks run under the set lock and must not reenter the
/// cache for the same set.
#[derive(Debug)]
pub struct NWaysCache<K, V> {
    sets: Vec<CachePadded<Mutex<CacheSet<K, V>>>>,
    ways: usize,
}

impl<K: SetKey + Eq + Clone, V: Clone> NWaysCache<K, V> {
    /// Create a cache of at least `capacity` entries organized into sets
    /// of `ways`. The actual capacity is `ceil(capacity / ways) * ways`.
    pub fn new(capacity: usize, ways: usize) -> NWaysCache<K, V> {
        assert!(capacity > 0, "cache capacity must be non-zero");
        assert!(ways > 0, "cache associativity must be non-zero");
        let num_sets = capacity.div_ceil(ways);
        NWaysCache {
            sets: (0..num_sets)
                .map(|_| {
                    CachePadded::new(Mutex::new(CacheSet {
                        entries: Vec::with_capacity(ways),
                        ticker: 0,
                    }))
                })
                .collect(),
            ways,
        }
    }

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.sets.len() * self.ways
    }

    fn set_of(&self, key: &K) -> &Mutex<CacheSet<K, V>> {
        let index = key.to_set_index() % self.sets.len() as u64;
        &self.sets[index as usize]
    }

    /// Look up a key, refreshing its slot's recency within the set.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut set = self.set_of(key).lock();
        let now = set.tick();
        let pos = set.position(key)?;
        set.entries[pos].used = now;
        Some(set.entries[pos].value.clone())
    }

    /// Insert or update an entry; on a full set the least recently used
    /// slot is evicted and returned.
    pub fn set(&self, key: K, value: V) -> Option<(K, V)> {
        let mut set = self.set_of(&key).lock();
        let now = set.tick();
        if let Some(pos) = set.position(&key) {
            set.entries[pos].value = value;
            set.entries[pos].used = now;
            return None;
        }
        if set.entries.len() < self.ways {
            set.entries.push(Entry {
                key,
                value,
                used: now,
            });
            return None;
        }
        let pos = set.evict_position();
        let old = mem::replace(
            &mut set.entries[pos],
            Entry {
                key,
                value,
                used: now,
            },
        );
        trace!(target: "cache", "nways evicted one entry from a full set");
        Some((old.key, old.value))
    }

    /// Return the present value, or insert the supplied one.
    pub fn get_or_set(&self, key: K, value: V) -> (Option<V>, Option<(K, V)>) {
        let mut set = self.set_of(&key).lock();
        let now = set.tick();
        if let Some(pos) = set.position(&key) {
            set.entries[pos].used = now;
            return (Some(set.entries[pos].value.clone()), None);
        }
        if set.entries.len() < self.ways {
            set.entries.push(Entry {
                key,
                value,
                used: now,
            });
            return (None, None);
        }
        let pos = set.evict_position();
        let old = mem::replace(
            &mut set.entries[pos],
            Entry {
                key,
                value,
                used: now,
            },
        );
        (None, Some((old.key, old.value)))
    }

    /// Remove an entry. The freed slot is plugged by the set's last
    /// entry, keeping occupied slots contiguous.
    pub fn remove(&self, key: &K) -> Option<V> {
        let mut set = self.set_of(key).lock();
        let pos = set.position(key)?;
        Some(set.entries.swap_remove(pos).value)
    }

    /// Visit entries set by set until the callback returns `false`. The
    /// set lock is held for the duration of that set's callbacks.
    pub fn iterate(&self, visit: &mut dyn FnMut(&K, &V) -> bool) {
        for set in &self.sets {
            let set = set.lock();
            for entry in &set.entries {
                if !visit(&entry.key, &entry.value) {
                    return;
                }
            }
        }
    }

    /// Visit entries mutably, as `iterate`.
    pub fn iterate_mut(&self, visit: &mut dyn FnMut(&K, &mut V) -> bool) {
        for set in &self.sets {
            let mut set = set.lock();
            for entry in &mut set.entries {
                if !visit(&entry.key, &mut entry.value) {
                    return;
                }
            }
        }
    }

    /// Drop all entries, set by set.
    pub fn clear(&self) {
        for set in &self.sets {
            set.lock().entries.clear();
        }
    }

    /// Report the memory used by this cache.
    pub fn memory_footprint(&self) -> MemoryFootprint {
        let slots = self.capacity() * mem::size_of::<Entry<K, V>>();
        let sets = self.sets.len() * mem::size_of::<CachePadded<Mutex<CacheSet<K, V>>>>();
        MemoryFootprint::new((mem::size_of::<Self>() + slots + sets) as u64)
    }
}

// The single-threaded capability set delegates to the lock-taking
// methods above.
impl<K: SetKey + Eq + Clone, V: Clone> Cache<K, V> for NWaysCache<K, V> {
    fn get(&mut self, key: &K) -> Option<V> {
        NWaysCache::get(self, key)
    }

    fn set(&mut self, key: K, value: V) -> Option<(K, V)> {
        NWaysCache::set(self, key, value)
    }

    fn get_or_set(&mut self, key: K, value: V) -> (Option<V>, Option<(K, V)>) {
        NWaysCache::get_or_set(self, key, value)
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        NWaysCache::remove(self, key)
    }

    fn iterate(&mut self, visit: &mut dyn FnMut(&K, &V) -> bool) {
        NWaysCache::iterate(self, visit)
    }

    fn iterate_mut(&mut self, visit: &mut dyn FnMut(&K, &mut V) -> bool) {
        NWaysCache::iterate_mut(self, visit)
    }

    fn clear(&mut self) {
        NWaysCache::clear(self)
    }

    fn memory_footprint(&self) -> MemoryFootprint {
        NWaysCache::memory_footprint(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn capacity_is_rounded_up_to_full_sets() {
        let cache: NWaysCache<u32, u32> = NWaysCache::new(5, 2);
        assert_eq!(cache.capacity(), 6);
    }

    #[test]
    fn eviction_is_lru_within_the_set() {
        // Two sets of two ways; even keys land in set 0.
        let cache = NWaysCache::new(4, 2);
        assert_eq!(cache.set(0u32, 0), None);
        assert_eq!(cache.set(2, 20), None);
        // Set 0 is full; 0 is its least recently used entry.
        assert_eq!(cache.set(4, 40), Some((0, 0)));
        assert_eq!(cache.get(&0), None);
        // 4 was just written, so 2 is now the oldest.
        assert_eq!(cache.set(6, 60), Some((2, 20)));
        assert_eq!(cache.get(&4), Some(40));
        assert_eq!(cache.get(&6), Some(60));
    }

    #[test]
    fn sets_do_not_interfere() {
        let cache = NWaysCache::new(4, 2);
        cache.set(0u32, 0);
        cache.set(2, 2);
        // Odd keys land in set 1; filling it must not evict from set 0.
        assert_eq!(cache.set(1, 1), None);
        assert_eq!(cache.set(3, 3), None);
        assert_eq!(cache.get(&0), Some(0));
        assert_eq!(cache.get(&2), Some(2));
    }

    #[test]
    fn get_refreshes_recency() {
        let cache = NWaysCache::new(2, 2);
        cache.set(0u32, 0);
        cache.set(1, 1);
        cache.get(&0);
        assert_eq!(cache.set(2, 2), Some((1, 1)));
    }

    #[test]
    fn remove_compacts_the_set() {
        let cache = NWaysCache::new(4, 4);
        for i in 0..4u32 {
            cache.set(i, i * 10);
        }
        assert_eq!(cache.remove(&1), Some(10));
        assert_eq!(cache.remove(&1), None);
        // Remaining entries stay reachable and a slot is free again.
        assert_eq!(cache.get(&0), Some(0));
        assert_eq!(cache.get(&2), Some(20));
        assert_eq!(cache.get(&3), Some(30));
        assert_eq!(cache.set(5, 50), None);
    }

    #[test]
    fn get_or_set_reports_present_value() {
        let cache = NWaysCache::new(2, 2);
        assert_eq!(cache.get_or_set(1u32, 10), (None, None));
        assert_eq!(cache.get_or_set(1, 99), (Some(10), None));
        assert_eq!(cache.get(&1), Some(10));
    }

    #[test]
    fn iterate_stops_on_false() {
        let cache = NWaysCache::new(8, 2);
        for i in 0..8u32 {
            cache.set(i, i);
        }
        let mut seen = 0;
        cache.iterate(&mut |_, _| {
            seen += 1;
            seen < 3
        });
        assert_eq!(seen, 3);
    }

    #[test]
    fn concurrent_mixed_operations_do_not_lose_sets() {
        let cache = Arc::new(NWaysCache::new(256, 4));
        let mut handles = Vec::new();
        for t in 0..4u64 {
            let cache = cache.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..10_000u64 {
                    let key = (t * 10_000 + i) % 512;
                    match i % 3 {
                        0 => {
                            cache.set(key, i);
                        }
                        1 => {
                            cache.get(&key);
                        }
                        _ => {
                            cache.remove(&key);
                        }
                    }
                }
            }));
        }
        for handle in handles {
            handle.join().expect("worker thread never panics; qed");
        }
        // No set may exceed its associativity.
        let mut count = 0;
        cache.iterate(&mut |_, _| {
            count += 1;
            true
        });
        assert!(count <= cache.capacity());
    }
}
