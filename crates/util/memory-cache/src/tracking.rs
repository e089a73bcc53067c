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

//! Hit/miss accounting wrapper around any cache policy.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::Cache;
use memory_footprint::MemoryFootprint;
use stats::{PrometheusMetrics, PrometheusRegistry};

/// Delegates to an inner cache and counts lookup hits and misses in
/// atomic counters. Semantics of the wrapped policy are unchanged; the
/// counters are reported through the footprint note and as prometheus
/// metrics.
#[derive(Debug, Default)]
pub struct TrackingCache<C> {
    inner: C,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<C> TrackingCache<C> {
    pub fn new(inner: C) -> TrackingCache<C> {
        TrackingCache {
            inner,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Number of lookups that found their key.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Number of lookups that did not.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// The wrapped cache.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    fn record(&self, hit: bool) {
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn ratio_note(&self) -> String {
        let hits = self.hits();
        let misses = self.misses();
        let total = hits + misses;
        if total == 0 {
            return "hit ratio -/-".into();
        }
        format!(
            "hit ratio {:.2} ({hits} hits, {misses} misses)",
            hits as f64 / total as f64
        )
    }
}

impl<K, V, C: Cache<K, V>> Cache<K, V> for TrackingCache<C> {
    fn get(&mut self, key: &K) -> Option<V> {
        let value = self.inner.get(key);
        self.record(value.is_some());
        value
    }

    fn set(&mut self, key: K, value: V) -> Option<(K, V)> {
        self.inner.set(key, value)
    }

    fn get_or_set(&mut self, key: K, value: V) -> (Option<V>, Option<(K, V)>) {
        let result = self.inner.get_or_set(key, value);
        self.record(result.0.is_some());
        result
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        self.inner.remove(key)
    }

    fn iterate(&mut self, visit: &mut dyn FnMut(&K, &V) -> bool) {
        self.inner.iterate(visit)
    }

    fn iterate_mut(&mut self, visit: &mut dyn FnMut(&K, &mut V) -> bool) {
        self.inner.iterate_mut(visit)
    }

    fn clear(&mut self) {
        self.inner.clear()
    }

    fn memory_footprint(&self) -> MemoryFootprint {
        let mut footprint = self.inner.memory_footprint();
        footprint.set_note(self.ratio_note());
        footprint
    }
}

impl<C> PrometheusMetrics for TrackingCache<C> {
    fn prometheus_metrics(&self, registry: &mut PrometheusRegistry) {
        registry.register_counter("cache_hits", "cache lookup hits", self.hits());
        registry.register_counter("cache_misses", "cache lookup misses", self.misses());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LruCache;

    #[test]
    fn counts_hits_and_misses() {
        let mut cache = TrackingCache::new(LruCache::new(2));
        cache.set(1u32, 10u32);
        cache.get(&1);
        cache.get(&2);
        cache.get(&2);
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 2);
    }

    #[test]
    fn get_or_set_counts_presence_as_hit() {
        let mut cache = TrackingCache::new(LruCache::new(2));
        cache.get_or_set(1u32, 10u32);
        cache.get_or_set(1, 20);
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
    }

    #[test]
    fn footprint_note_carries_the_ratio() {
        let mut cache = TrackingCache::new(LruCache::new(2));
        cache.set(1u32, 10u32);
        cache.get(&1);
        let note = cache
            .memory_footprint()
            .note()
            .expect("tracking cache always sets a note; qed")
            .to_string();
        assert!(note.contains("1 hits"));
    }

    #[test]
    fn metrics_are_registered() {
        let mut cache = TrackingCache::new(LruCache::new(2));
        cache.set(1u32, 10u32);
        cache.get(&1);
        cache.get(&9);
        let mut registry = PrometheusRegistry::new("test_".into());
        cache.prometheus_metrics(&mut registry);
        assert_eq!(registry.registry().gather().len(), 2);
    }
}
