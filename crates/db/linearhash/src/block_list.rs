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

//! Sequence of fixed-capacity sorted blocks.

use std::{mem, sync::Arc};

use crate::{BulkInsertMap, MapEntry, SortedMap};
use memory_footprint::MemoryFootprint;
use statedb_types::Comparator;

/// A map stored as a list of [`SortedMap`] blocks of fixed capacity.
/// New entries go to the tail block; deletion pulls a replacement entry
/// from the tail, so every block except the last stays full.
///
/// Not thread-safe.
#[derive(Debug)]
pub struct BlockList<K, V, C> {
    blocks: Vec<SortedMap<K, V, C>>,
    block_capacity: usize,
    len: usize,
}

impl<K: Clone, V: Clone, C: Comparator<K>> BlockList<K, V, C> {
    /// Create an empty list with the given per-block capacity.
    pub fn new(block_capacity: usize) -> BlockList<K, V, C> {
        assert!(block_capacity > 0, "block capacity must be non-zero");
        BlockList {
            blocks: Vec::new(),
            block_capacity,
            len: 0,
        }
    }

    /// Number of blocks currently allocated.
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    // Append a key known to be absent, opening a new block if the tail
    // is full.
    fn append_new(&mut self, key: K, value: V) {
        let tail_full = self
            .blocks
            .last()
            .map(|block| block.len() >= self.block_capacity)
            .unwrap_or(true);
        if tail_full {
            self.blocks.push(SortedMap::new(self.block_capacity));
        }
        let added = self
            .blocks
            .last_mut()
            .expect("a tail block was just ensured; qed")
            .put(key, value);
        debug_assert!(added, "append_new is only called for absent keys");
        self.len += 1;
    }
}

impl<K: Clone, V: Clone, C: Comparator<K>> BulkInsertMap<K, V> for BlockList<K, V, C> {
    fn get(&self, key: &K) -> Option<&V> {
        self.blocks.iter().find_map(|block| block.get(key))
    }

    fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.blocks.iter_mut().find_map(|block| block.get_mut(key))
    }

    fn put(&mut self, key: K, value: V) -> bool {
        if let Some(present) = self.get_mut(&key) {
            *present = value;
            return false;
        }
        self.append_new(key, value);
        true
    }

    fn get_or_add(&mut self, key: K, value: V) -> (V, bool) {
        if let Some(present) = self.get(&key) {
            return (present.clone(), false);
        }
        self.append_new(key, value.clone());
        (value, true)
    }

    fn remove(&mut self, key: &K) -> Option<V> {
        let block_index = self.blocks.iter().position(|block| block.get(key).is_some())?;
        let value = self.blocks[block_index]
            .remove(key)
            .expect("key was just located in this block; qed");
        self.len -= 1;

        // Plug the hole with the tail block's greatest entry so that all
        // blocks but the last stay full.
        let tail_index = self.blocks.len() - 1;
        if block_index != tail_index {
            let filler = self.blocks[tail_index]
                .pop_last()
                .expect("tail block of a non-empty list is non-empty; qed");
            self.blocks[block_index].put(filler.key, filler.value);
        }
        if self.blocks.last().map(|block| block.is_empty()).unwrap_or(false) {
            self.blocks.pop();
        }
        Some(value)
    }

    fn len(&self) -> usize {
        self.len
    }

    fn bulk_insert(&mut self, mut data: Vec<MapEntry<K, V>>) {
        // Top up a non-full tail first.
        if let Some(tail) = self.blocks.last_mut() {
            let free = self.block_capacity.saturating_sub(tail.len());
            let take = free.min(data.len());
            for entry in data.drain(..take) {
                tail.put(entry.key, entry.value);
                self.len += 1;
            }
        }
        // The remainder opens fresh blocks, one full chunk at a time.
        while !data.is_empty() {
            let take = self.block_capacity.min(data.len());
            let chunk: Vec<_> = data.drain(..take).collect();
            let mut block = SortedMap::new(self.block_capacity);
            self.len += chunk.len();
            block.bulk_insert(chunk);
            self.blocks.push(block);
        }
    }

    fn get_entries(&self) -> Vec<MapEntry<K, V>> {
        let mut entries = Vec::with_capacity(self.len);
        for block in &self.blocks {
            entries.extend_from_slice(block.entries());
        }
        entries
    }

    fn iterate(&self, visit: &mut dyn FnMut(&K, &V) -> bool) {
        for block in &self.blocks {
            for entry in block.entries() {
                if !visit(&entry.key, &entry.value) {
                    return;
                }
            }
        }
    }

    fn clear(&mut self) {
        self.blocks.clear();
        self.len = 0;
    }

    fn memory_footprint(&self) -> MemoryFootprint {
        let mut footprint = MemoryFootprint::new(mem::size_of::<Self>() as u64);
        for (index, block) in self.blocks.iter().enumerate() {
            footprint.add_child(format!("block-{index}"), Arc::new(block.memory_footprint()));
        }
        footprint
    }
}
