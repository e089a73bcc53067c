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

//! Byte serializers for the fixed-width value types.

use crate::{Address, Balance, Hash, Key, Nonce, Value};

/// Fixed-width byte codec for a value type. Serialized forms are exactly
/// `SIZE` bytes; `from_bytes` reads the first `SIZE` bytes of its input.
pub trait Serializer<T> {
    /// Serialized size in bytes.
    const SIZE: usize;

    /// Write the serialized form into `out`, which must hold at least
    /// `SIZE` bytes.
    fn copy_bytes(item: &T, out: &mut [u8]);

    /// Read a value back from the first `SIZE` bytes of `bytes`.
    fn from_bytes(bytes: &[u8]) -> T;

    /// Serialize into a fresh buffer.
    fn to_bytes(item: &T) -> Vec<u8> {
        let mut out = vec![0u8; Self::SIZE];
        Self::copy_bytes(item, &mut out);
        out
    }
}

macro_rules! impl_fixed_serializer {
    ($name: ident, $type: ty, $size: expr) => {
        #[derive(Clone, Copy, Debug, Default)]
        pub struct $name;

        impl Serializer<$type> for $name {
            const SIZE: usize = $size;

            fn copy_bytes(item: &$type, out: &mut [u8]) {
                out[..$size].copy_from_slice(item.as_bytes());
            }

            fn from_bytes(bytes: &[u8]) -> $type {
                <$type>::from_slice(&bytes[..$size])
            }
        }
    };
}

impl_fixed_serializer!(AddressSerializer, Address, 20);
impl_fixed_serializer!(KeySerializer, Key, 32);
impl_fixed_serializer!(ValueSerializer, Value, 32);
impl_fixed_serializer!(HashSerializer, Hash, 32);
impl_fixed_serializer!(BalanceSerializer, Balance, 16);
impl_fixed_serializer!(NonceSerializer, Nonce, 8);
