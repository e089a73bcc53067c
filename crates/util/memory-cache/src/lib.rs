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

//! Fixed-capacity cache policies for the storage layers.
//!
//! Two eviction policies share one capability set: [`LruCache`] keeps a
//! global recency order and is meant to be guarded by its owner, while
//! [`NWaysCache`] partitions keys into independently locked sets and is
//! safe for concurrent use. [`TrackingCache`] wraps either and counts
//! hits and misses.

#[macro_use]
extern crate log;

mod lru;
mod nways;
mod tracking;

use memory_footprint::MemoryFootprint;

pub use lru::LruCache;
pub use nways::{NWaysCache, SetKey};
pub use tracking::TrackingCache;

/// Capability set shared by all cache policies.
///
/// Contracts, common to every implementation:
///
///   - a cache never holds more than `capacity` live entries;
///   - `set` returns `Some((key, value))` exactly when inserting a new
///     key forced an existing entry out; updating a present key is never
///     reported as an eviction;
///   - `get_or_set` returns the present value in `.0` and leaves the
///     cache unchanged if the key was already there, otherwise inserts
///     the supplied value and reports any eviction in `.1`.
pub trait Cache<K, V> {
    /// Look up a key, refreshing its recency on a hit.
    fn get(&mut self, key: &K) -> Option<V>;

    /// Insert or update an entry, returning the evicted entry if the
    /// insertion forced one out.
    fn set(&mut self, key: K, value: V) -> Option<(K, V)>;

    /// Return the present value, or insert the supplied one.
    fn get_or_set(&mut self, key: K, value: V) -> (Option<V>, Option<(K, V)>);

    /// Remove an entry, returning its value if it was present.
    fn remove(&mut self, key: &K) -> Option<V>;

    /// Visit entries until the callback returns `false`. Iteration order
    /// is unspecified.
    fn iterate(&mut self, visit: &mut dyn FnMut(&K, &V) -> bool);

    /// Visit entries mutably until the callback returns `false`.
    fn iterate_mut(&mut self, visit: &mut dyn FnMut(&K, &mut V) -> bool);

    /// Drop all entries, keeping the capacity.
    fn clear(&mut self);

    /// Report the memory used by this cache.
    fn memory_footprint(&self) -> MemoryFootprint;
}
