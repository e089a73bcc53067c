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

//! Least-recently-used cache over an index-linked node arena.

use std::{collections::HashMap, hash::Hash, mem};

use crate::Cache;
use memory_footprint::MemoryFootprint;

#[derive(Debug)]
struct Node<K, V> {
    key: K,
    value: V,
    prev: Option<u32>,
    next: Option<u32>,
}

/// An LRU cache of fixed capacity. The recency list is threaded through
/// an arena of nodes by index, so eviction reuses the evicted node's slot
/// and steady-state operation does not allocate.
///
/// Not thread-safe; wrap it in a lock when shared.
#[derive(Debug)]
pub struct LruCache<K, V> {
    map: HashMap<K, u32>,
    nodes: Vec<Node<K, V>>,
    free: Vec<u32>,
    head: Option<u32>,
    tail: Option<u32>,
    capacity: usize,
}

impl<K: Eq + Hash + Clone, V: Clone> LruCache<K, V> {
    /// Create a cache holding at most `capacity` entries.
    pub fn new(capacity: usize) -> LruCache<K, V> {
        assert!(capacity > 0, "cache capacity must be non-zero");
        LruCache {
            map: HashMap::with_capacity(capacity),
            nodes: Vec::with_capacity(capacity),
            free: Vec::new(),
            head: None,
            tail: None,
            capacity,
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// The configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn unlink(&mut self, idx: u32) {
        let (prev, next) = {
            let node = &self.nodes[idx as usize];
            (node.prev, node.next)
        };
        match prev {
            Some(p) => self.nodes[p as usize].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n as usize].prev = prev,
            None => self.tail = prev,
        }
    }

    fn push_front(&mut self, idx: u32) {
        let old_head = self.head;
        {
            let node = &mut self.nodes[idx as usize];
            node.prev = None;
            node.next = old_head;
        }
        if let Some(h) = old_head {
            self.nodes[h as usize].prev = Some(idx);
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    fn touch(&mut self, idx: u32) {
        if self.head == Some(idx) {
            return;
        }
        self.unlink(idx);
        self.push_front(idx);
    }

    // Insert a key known to be absent, evicting the tail when full.
    fn insert_new(&mut self, key: K, value: V) -> Option<(K, V)> {
        if self.map.len() < self.capacity {
            let idx = match self.free.pop() {
                Some(idx) => {
                    self.nodes[idx as usize] = Node {
                        key: key.clone(),
                        value,
                        prev: None,
                        next: None,
                    };
                    idx
                }
                None => {
                    self.nodes.push(Node {
                        key: key.clone(),
                        value,
                        prev: None,
                        next: None,
                    });
                    (self.nodes.len() - 1) as u32
                }
            };
            self.map.insert(key, idx);
            self.push_front(idx);
            return None;
        }

        // At capacity: reuse the least recently used node for the new entry.
        let idx = self.tail.expect("capacity > 0 and cache is full; qed");
        self.unlink(idx);
        let (old_key, old_value) = {
            let node = &mut self.nodes[idx as usize];
            let old_key = mem::replace(&mut node.key, key.clone());
            let old_value = mem::replace(&mut node.value, value);
            (old_key, old_value)
        };
        self.map.remove(&old_key);
        self.map.insert(key, idx);
        self.push_front(idx);
        trace!(target: "cache", "lru evicted one entry at capacity {}", self.capacity);
        Some((old_key, old_value))
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Cache<K, V> for LruCache<K, V> {
    fn get(&mut self, key: &K) -> Option<V> {
        let idx = *self.map.get(key)?;
        self.touch(idx);
        Some(self.nodes[idx as usize].value.clone())
    }

    fn set(&mut self, key: K, value: V) -> Option<(K, V)> {
        if let Some(&idx) = self.map.get(&key) {
            self.nodes[idx as usize].value = value;
            self.touch(idx);
            return None;
        }
        self.insert_new(key, value)
    }

    fn get_or_set(&mut self, key: K, value: V) -> (Option<V>, Option<(K, V)>) {
        if let Some(&idx) = self.map.get(&key) {
            self.touch(idx);
            return (Some(self.nodes[idx as usize].value.clone()), None);
        }
        (None, self.insert_new(key, value))
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        let idx = self.map.remove(key)?;
        self.unlink(idx);
        self.free.push(idx);
        Some(self.nodes[idx as usize].value.clone())
    }

    fn iterate(&mut self, visit: &mut dyn FnMut(&K, &V) -> bool) {
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            let node = &self.nodes[idx as usize];
            if !visit(&node.key, &node.value) {
                return;
            }
            cursor = node.next;
        }
    }

    fn iterate_mut(&mut self, visit: &mut dyn FnMut(&K, &mut V) -> bool) {
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            let node = &mut self.nodes[idx as usize];
            if !visit(&node.key, &mut node.value) {
                return;
            }
            cursor = node.next;
        }
    }

    fn clear(&mut self) {
        self.map.clear();
        self.nodes.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
    }

    fn memory_footprint(&self) -> MemoryFootprint {
        let nodes = self.nodes.capacity() * mem::size_of::<Node<K, V>>();
        let index = self.map.len() * (mem::size_of::<K>() + mem::size_of::<u32>());
        MemoryFootprint::new((mem::size_of::<Self>() + nodes + index) as u64)
    }
}
