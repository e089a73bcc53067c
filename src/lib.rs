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

//! Core data-structure substrate of the world-state database.
//!
//! The facade over the member crates:
//!
//!   - [`statedb_types`] — fixed-width value types, serializers,
//!     comparators and the fast fold hasher;
//!   - [`statedb_snapshot`] — the composable snapshot/verification
//!     framework;
//!   - [`statedb_update`] — the per-block mutation log and its byte
//!     encoding;
//!   - [`linearhash`] — the linear-hashing map and its sorted bucket
//!     containers;
//!   - [`memory_cache`] — LRU and N-way set-associative cache policies;
//!   - [`fastmap`] — the generation-counter hash map;
//!   - [`keccak_cache`] — memoizing Keccak-256 hashing;
//!   - [`memory_footprint`] — hierarchical memory accounting;
//!   - [`shared_lock`] — read/write handles over a shared value;
//!   - [`lock_file`] — the cross-process advisory lock.

pub use fastmap::{FastMap, ShortHasher};
pub use keccak_cache::{keccak256, CachedHasher, HasherPool, KECCAK_EMPTY};
pub use linearhash::{BlockList, BulkInsertMap, LinearHashMap, MapEntry, SortedMap};
pub use lock_file::LockFile;
pub use memory_cache::{Cache, LruCache, NWaysCache, TrackingCache};
pub use memory_footprint::MemoryFootprint;
pub use shared_lock::{ReadHandle, Shared, WriteHandle};
pub use statedb_snapshot::{
    split_composite_data, split_composite_metadata, ComposedProof, ComposedSnapshot,
    ComposedSnapshotVerifier, Part, Proof, Snapshot, SnapshotData, SnapshotVerifier, Snapshotable,
};
pub use statedb_types::{
    Address, Balance, Code, Comparator, FoldHasher, Hash, Key, Nonce, OrdComparator, Serializer,
    TypeHasher, Value,
};
pub use statedb_update::{Update, UpdateTarget};
