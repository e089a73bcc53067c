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

//! Array-backed ordered map.

use std::{marker::PhantomData, mem};

use crate::{BulkInsertMap, MapEntry};
use memory_footprint::MemoryFootprint;
use statedb_types::Comparator;

/// An ordered map over a contiguous array of entries kept sorted by the
/// comparator `C`. Lookups binary-search; inserts and deletes shift.
/// Suits small maps with read-heavy use, such as hash-map buckets.
///
/// Not thread-safe.
#[derive(Debug)]
pub struct SortedMap<K, V, C> {
    entries: Vec<MapEntry<K, V>>,
    _comparator: PhantomData<C>,
}

impl<K, V, C: Comparator<K>> SortedMap<K, V, C> {
    /// Create an empty map. `capacity` is a pre-allocation hint; the
    /// map grows past it as needed.
    pub fn new(capacity: usize) -> SortedMap<K, V, C> {
        SortedMap {
            entries: Vec::with_capacity(capacity),
            _comparator: PhantomData,
        }
    }

    fn find(&self, key: &K) -> Result<usize, usize> {
        self.entries
            .binary_search_by(|entry| C::compare(&entry.key, key))
    }

    /// Remove and return the greatest entry.
    pub fn pop_last(&mut self) -> Option<MapEntry<K, V>> {
        self.entries.pop()
    }

    /// Borrow the underlying sorted entries.
    pub fn entries(&self) -> &[MapEntry<K, V>] {
        &self.entries
    }
}

impl<K: Clone, V: Clone, C: Comparator<K>> BulkInsertMap<K, V> for SortedMap<K, V, C> {
    fn get(&self, key: &K) -> Option<&V> {
        let index = self.find(key).ok()?;
        Some(&self.entries[index].value)
    }

    fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let index = self.find(key).ok()?;
        Some(&mut self.entries[index].value)
    }

    fn put(&mut self, key: K, value: V) -> bool {
        match self.find(&key) {
            Ok(index) => {
                self.entries[index].value = value;
                false
            }
            Err(index) => {
                self.entries.insert(index, MapEntry::new(key, value));
                true
            }
        }
    }

    fn get_or_add(&mut self, key: K, value: V) -> (V, bool) {
        match self.find(&key) {
            Ok(index) => (self.entries[index].value.clone(), false),
            Err(index) => {
                self.entries
                    .insert(index, MapEntry::new(key, value.clone()));
                (value, true)
            }
        }
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        let index = self.find(key).ok()?;
        Some(self.entries.remove(index).value)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn bulk_insert(&mut self, data: Vec<MapEntry<K, V>>) {
        debug_assert!(
            data.windows(2)
                .all(|w| C::compare(&w[0].key, &w[1].key).is_lt()),
            "bulk insert input must be sorted and unique"
        );
        debug_assert!(
            match (self.entries.last(), data.first()) {
                (Some(last), Some(first)) => C::compare(&last.key, &first.key).is_lt(),
                _ => true,
            },
            "bulk insert input must sort after the present content"
        );
        self.entries.extend(data);
    }

    fn get_entries(&self) -> Vec<MapEntry<K, V>> {
        self.entries.clone()
    }

    fn iterate(&self, visit: &mut dyn FnMut(&K, &V) -> bool) {
        for entry in &self.entries {
            if !visit(&entry.key, &entry.value) {
                return;
            }
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn memory_footprint(&self) -> MemoryFootprint {
        let entries = self.entries.capacity() * mem::size_of::<MapEntry<K, V>>();
        MemoryFootprint::new((mem::size_of::<Self>() + entries) as u64)
    }
}
