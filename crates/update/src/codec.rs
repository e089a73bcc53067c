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

//! Versioned byte encoding of updates.
//!
//! Layout, big-endian lengths: a version byte, six `u32` list lengths
//! (deleted, created, balances, codes, nonces, slots), then the list
//! bodies in the order deleted, created, balances, codes, nonces,
//! slots. Fixed-width fields are the raw value bytes; a code entry is
//! its address, a `u16` length and the code bytes.

use std::fmt;

use crate::{BalanceUpdate, CodeUpdate, Error, NonceUpdate, Result, SlotUpdate, Update};
use statedb_types::{
    Address, AddressSerializer, BalanceSerializer, KeySerializer, NonceSerializer, Serializer,
    ValueSerializer,
};

/// Current encoding version.
const VERSION: u8 = 0;

/// The parse stage a truncation error occurred in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Section {
    Version,
    Lengths,
    DeletedAccounts,
    CreatedAccounts,
    Balances,
    Codes,
    Nonces,
    Slots,
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Section::Version => "the version byte",
            Section::Lengths => "the list lengths",
            Section::DeletedAccounts => "the deleted accounts",
            Section::CreatedAccounts => "the created accounts",
            Section::Balances => "the balance updates",
            Section::Codes => "the code updates",
            Section::Nonces => "the nonce updates",
            Section::Slots => "the slot updates",
        };
        f.write_str(name)
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
}

impl<'a> Reader<'a> {
    fn take(&mut self, count: usize, section: Section) -> Result<&'a [u8]> {
        if self.bytes.len() < count {
            return Err(Error::Truncated(section));
        }
        let (chunk, rest) = self.bytes.split_at(count);
        self.bytes = rest;
        Ok(chunk)
    }

    fn read_u16(&mut self, section: Section) -> Result<u16> {
        let chunk = self.take(2, section)?;
        Ok(u16::from_be_bytes(
            chunk.try_into().expect("chunk is 2 bytes; qed"),
        ))
    }

    fn read_u32(&mut self, section: Section) -> Result<u32> {
        let chunk = self.take(4, section)?;
        Ok(u32::from_be_bytes(
            chunk.try_into().expect("chunk is 4 bytes; qed"),
        ))
    }

    fn remaining(&self) -> usize {
        self.bytes.len()
    }
}

impl Update {
    /// Serialize into the versioned byte layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![VERSION];
        for length in [
            self.deleted_accounts.len(),
            self.created_accounts.len(),
            self.balances.len(),
            self.codes.len(),
            self.nonces.len(),
            self.slots.len(),
        ] {
            out.extend_from_slice(&(length as u32).to_be_bytes());
        }
        for address in &self.deleted_accounts {
            out.extend(AddressSerializer::to_bytes(address));
        }
        for address in &self.created_accounts {
            out.extend(AddressSerializer::to_bytes(address));
        }
        for update in &self.balances {
            out.extend(AddressSerializer::to_bytes(&update.address));
            out.extend(BalanceSerializer::to_bytes(&update.balance));
        }
        for update in &self.codes {
            out.extend(AddressSerializer::to_bytes(&update.address));
            out.extend_from_slice(&(update.code.len() as u16).to_be_bytes());
            out.extend_from_slice(&update.code);
        }
        for update in &self.nonces {
            out.extend(AddressSerializer::to_bytes(&update.address));
            out.extend(NonceSerializer::to_bytes(&update.nonce));
        }
        for update in &self.slots {
            out.extend(AddressSerializer::to_bytes(&update.address));
            out.extend(KeySerializer::to_bytes(&update.key));
            out.extend(ValueSerializer::to_bytes(&update.value));
        }
        out
    }

    /// Parse an update back from its byte form. Truncation anywhere is
    /// an error; so is an unknown version or trailing data.
    pub fn from_bytes(bytes: &[u8]) -> Result<Update> {
        let mut reader = Reader { bytes };

        let version = reader.take(1, Section::Version)?[0];
        if version != VERSION {
            return Err(Error::UnsupportedVersion(version));
        }

        let num_deleted = reader.read_u32(Section::Lengths)? as usize;
        let num_created = reader.read_u32(Section::Lengths)? as usize;
        let num_balances = reader.read_u32(Section::Lengths)? as usize;
        let num_codes = reader.read_u32(Section::Lengths)? as usize;
        let num_nonces = reader.read_u32(Section::Lengths)? as usize;
        let num_slots = reader.read_u32(Section::Lengths)? as usize;

        let mut update = Update::new();

        for _ in 0..num_deleted {
            let chunk = reader.take(20, Section::DeletedAccounts)?;
            update
                .deleted_accounts
                .push(AddressSerializer::from_bytes(chunk));
        }
        for _ in 0..num_created {
            let chunk = reader.take(20, Section::CreatedAccounts)?;
            update
                .created_accounts
                .push(AddressSerializer::from_bytes(chunk));
        }
        for _ in 0..num_balances {
            let address = read_address(&mut reader, Section::Balances)?;
            let chunk = reader.take(16, Section::Balances)?;
            update.balances.push(BalanceUpdate {
                address,
                balance: BalanceSerializer::from_bytes(chunk),
            });
        }
        for _ in 0..num_codes {
            let address = read_address(&mut reader, Section::Codes)?;
            let length = reader.read_u16(Section::Codes)? as usize;
            let code = reader.take(length, Section::Codes)?.to_vec();
            update.codes.push(CodeUpdate { address, code });
        }
        for _ in 0..num_nonces {
            let address = read_address(&mut reader, Section::Nonces)?;
            let chunk = reader.take(8, Section::Nonces)?;
            update.nonces.push(NonceUpdate {
                address,
                nonce: NonceSerializer::from_bytes(chunk),
            });
        }
        for _ in 0..num_slots {
            let address = read_address(&mut reader, Section::Slots)?;
            let key = reader.take(32, Section::Slots)?;
            let value = reader.take(32, Section::Slots)?;
            update.slots.push(SlotUpdate {
                address,
                key: KeySerializer::from_bytes(key),
                value: ValueSerializer::from_bytes(value),
            });
        }

        if reader.remaining() != 0 {
            return Err(Error::TrailingData(reader.remaining()));
        }
        Ok(update)
    }
}

fn read_address(reader: &mut Reader, section: Section) -> Result<Address> {
    let chunk = reader.take(20, section)?;
    Ok(AddressSerializer::from_bytes(chunk))
}
