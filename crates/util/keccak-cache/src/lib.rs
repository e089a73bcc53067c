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

//! Keccak-256 hashing of serializable values with LRU memoization.
//!
//! Hash states are expensive to set up, so completed states are parked
//! in a shared pool and reset for reuse. The memoization cache and the
//! pool are guarded by separate locks: a thread busy hashing never
//! blocks another thread's cache lookup.

#[macro_use]
extern crate log;

use std::{hash::Hash as StdHash, marker::PhantomData, mem, sync::Arc};

use parking_lot::Mutex;
use sha3::{Digest, Keccak256};

use memory_cache::{Cache, LruCache};
use memory_footprint::MemoryFootprint;
use statedb_types::{Hash, Serializer, H256};

/// Keccak-256 of the empty byte string.
pub const KECCAK_EMPTY: Hash = H256([
    0xc5, 0xd2, 0x46, 0x01, 0x86, 0xf7, 0x23, 0x3c, 0x92, 0x7e, 0x7d, 0xb2, 0xdc, 0xc7, 0x03,
    0xc0, 0xe5, 0x00, 0xb6, 0x53, 0xca, 0x82, 0x27, 0x3b, 0x7b, 0xfa, 0xd8, 0x04, 0x5d, 0x85,
    0xa4, 0x70,
]);

/// Keccak-256 of `data`.
pub fn keccak256(data: &[u8]) -> Hash {
    if data.is_empty() {
        return KECCAK_EMPTY;
    }
    Hash::from_slice(&Keccak256::digest(data))
}

/// A pool of reusable Keccak-256 states. A state is borrowed for the
/// duration of one hash call and parked again afterwards; the pool lock
/// is only held while borrowing and returning, never while hashing.
#[derive(Default)]
pub struct HasherPool {
    states: Mutex<Vec<Keccak256>>,
}

impl HasherPool {
    pub fn new() -> HasherPool {
        HasherPool {
            states: Mutex::new(Vec::new()),
        }
    }

    /// Hash `data` using a pooled state.
    pub fn hash(&self, data: &[u8]) -> Hash {
        let mut state = match self.states.lock().pop() {
            Some(state) => state,
            None => {
                trace!(target: "keccak", "hasher pool empty, allocating a state");
                Keccak256::new()
            }
        };
        state.update(data);
        let digest = Hash::from_slice(&state.finalize_reset());
        self.states.lock().push(state);
        digest
    }

    /// Number of currently parked states.
    pub fn idle_states(&self) -> usize {
        self.states.lock().len()
    }

    /// Report the memory used by the parked states.
    pub fn memory_footprint(&self) -> MemoryFootprint {
        let states = self.states.lock().len() * mem::size_of::<Keccak256>();
        MemoryFootprint::new((mem::size_of::<Self>() + states) as u64)
    }
}

/// Keccak-256 over the serialized form of `T`, with an LRU cache of
/// previously computed digests. With `cache_capacity == 0` memoization
/// is disabled and every call hashes.
///
/// Thread-safe: lookups are serialized by the cache lock, hashing runs
/// on pooled states outside it.
pub struct CachedHasher<T, S> {
    cache: Option<Mutex<LruCache<T, Hash>>>,
    pool: HasherPool,
    _serializer: PhantomData<S>,
}

impl<T, S> CachedHasher<T, S>
where
    T: Eq + StdHash + Clone,
    S: Serializer<T>,
{
    /// Create a hasher memoizing up to `cache_capacity` digests.
    pub fn new(cache_capacity: usize) -> CachedHasher<T, S> {
        CachedHasher {
            cache: (cache_capacity > 0).then(|| Mutex::new(LruCache::new(cache_capacity))),
            pool: HasherPool::new(),
            _serializer: PhantomData,
        }
    }

    /// The Keccak-256 digest of `item`'s serialized form.
    pub fn hash(&self, item: &T) -> Hash {
        if let Some(cache) = &self.cache {
            if let Some(digest) = cache.lock().get(item) {
                return digest;
            }
        }

        let bytes = S::to_bytes(item);
        let digest = if bytes.is_empty() {
            KECCAK_EMPTY
        } else {
            self.pool.hash(&bytes)
        };

        if let Some(cache) = &self.cache {
            cache.lock().set(item.clone(), digest);
        }
        digest
    }

    /// Report the memory used by the cache and the state pool.
    pub fn memory_footprint(&self) -> MemoryFootprint {
        let mut footprint = MemoryFootprint::of_type::<Self>();
        if let Some(cache) = &self.cache {
            footprint.add_child("cache", Arc::new(cache.lock().memory_footprint()));
        }
        footprint.add_child("pool", Arc::new(self.pool.memory_footprint()));
        footprint
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statedb_types::{Address, AddressSerializer};
    use std::sync::Arc;

    #[test]
    fn keccak256_matches_known_vectors() {
        // Empty string.
        assert_eq!(keccak256(&[]), KECCAK_EMPTY);
        // keccak256("abc")
        let expected: Hash =
            "4e03657aea45a94fc7d47ba826c8d667c0d1e6e33a64a036ec44f58fa12d6c45"
                .parse()
                .expect("static hex literal parses; qed");
        assert_eq!(keccak256(b"abc"), expected);
    }

    #[test]
    fn pool_reuses_states() {
        let pool = HasherPool::new();
        let first = pool.hash(b"hello");
        assert_eq!(pool.idle_states(), 1);
        let second = pool.hash(b"hello");
        assert_eq!(pool.idle_states(), 1);
        assert_eq!(first, second);
        assert_eq!(first, keccak256(b"hello"));
    }

    #[test]
    fn cached_and_uncached_hashes_agree() {
        let cached: CachedHasher<Address, AddressSerializer> = CachedHasher::new(16);
        let uncached: CachedHasher<Address, AddressSerializer> = CachedHasher::new(0);
        let addr = Address::repeat_byte(0x5a);
        let digest = cached.hash(&addr);
        assert_eq!(digest, uncached.hash(&addr));
        assert_eq!(digest, keccak256(addr.as_bytes()));
        // Second call is served from the cache and stays identical.
        assert_eq!(cached.hash(&addr), digest);
    }

    #[test]
    fn concurrent_hashing_is_consistent() {
        let hasher: Arc<CachedHasher<Address, AddressSerializer>> =
            Arc::new(CachedHasher::new(8));
        let mut handles = Vec::new();
        for t in 0..4u8 {
            let hasher = hasher.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..200u8 {
                    let addr = Address::repeat_byte(i % 16 + t);
                    assert_eq!(hasher.hash(&addr), keccak256(addr.as_bytes()));
                }
            }));
        }
        for handle in handles {
            handle.join().expect("worker thread never panics; qed");
        }
    }
}
