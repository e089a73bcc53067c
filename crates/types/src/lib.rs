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

//! Fixed-width value types of the world state and the capability traits
//! (`Serializer`, `Comparator`, `TypeHasher`) consumed by the generic
//! containers built on top of them.

extern crate ethereum_types;
extern crate parity_bytes;

mod serializer;

use std::cmp::Ordering;

pub use ethereum_types::{H128, H160, H256, H64};
pub use parity_bytes::Bytes;
pub use serializer::{
    AddressSerializer, BalanceSerializer, HashSerializer, KeySerializer, NonceSerializer,
    Serializer, ValueSerializer,
};

/// Account address, 20 bytes.
pub type Address = H160;
/// Storage slot key, 32 bytes.
pub type Key = H256;
/// Storage slot value, 32 bytes.
pub type Value = H256;
/// Cryptographic hash, 32 bytes.
pub type Hash = H256;
/// Account balance, 16 bytes, big-endian.
pub type Balance = H128;
/// Account nonce, 8 bytes, big-endian.
pub type Nonce = H64;
/// Contract code blob.
pub type Code = Bytes;

/// Total order over keys, injected into the sorted containers so that the
/// ordering is an explicit part of a container's type.
pub trait Comparator<T> {
    fn compare(a: &T, b: &T) -> Ordering;
}

/// Lexicographic byte order; for the fixed-width value types this is the
/// `Ord` they already carry.
#[derive(Clone, Copy, Debug, Default)]
pub struct OrdComparator;

impl<T: Ord> Comparator<T> for OrdComparator {
    fn compare(a: &T, b: &T) -> Ordering {
        a.cmp(b)
    }
}

/// Non-cryptographic hash of a key, used for bucket routing in the hash
/// maps. Implementations must be deterministic across the process lifetime
/// but carry no stability guarantee beyond it.
pub trait TypeHasher<T> {
    fn hash(item: &T) -> u64;
}

/// The stock hasher for all fixed-width types: folds the value 8 bytes at
/// a time into a 64-bit state with multiplier 31, seed 17. A trailing
/// partial chunk is zero-padded on the right.
#[derive(Clone, Copy, Debug, Default)]
pub struct FoldHasher;

const HASH_SEED: u64 = 17;
const HASH_PRIME: u64 = 31;

fn fold_bytes(bytes: &[u8]) -> u64 {
    let mut hash = HASH_SEED;
    let mut chunks = bytes.chunks_exact(8);
    for chunk in &mut chunks {
        let word = u64::from_be_bytes(chunk.try_into().expect("chunk is 8 bytes; qed"));
        hash = hash.wrapping_mul(HASH_PRIME).wrapping_add(word);
    }
    let rest = chunks.remainder();
    if !rest.is_empty() {
        let mut word = [0u8; 8];
        word[..rest.len()].copy_from_slice(rest);
        hash = hash
            .wrapping_mul(HASH_PRIME)
            .wrapping_add(u64::from_be_bytes(word));
    }
    hash
}

impl TypeHasher<H256> for FoldHasher {
    fn hash(item: &H256) -> u64 {
        fold_bytes(item.as_bytes())
    }
}

impl TypeHasher<H160> for FoldHasher {
    fn hash(item: &H160) -> u64 {
        fold_bytes(item.as_bytes())
    }
}

impl TypeHasher<H128> for FoldHasher {
    fn hash(item: &H128) -> u64 {
        fold_bytes(item.as_bytes())
    }
}

impl TypeHasher<H64> for FoldHasher {
    fn hash(item: &H64) -> u64 {
        fold_bytes(item.as_bytes())
    }
}

impl TypeHasher<u32> for FoldHasher {
    fn hash(item: &u32) -> u64 {
        fold_bytes(&item.to_be_bytes())
    }
}

impl TypeHasher<u64> for FoldHasher {
    fn hash(item: &u64) -> u64 {
        fold_bytes(&item.to_be_bytes())
    }
}
