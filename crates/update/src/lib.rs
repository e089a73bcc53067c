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

//! Per-block record of world-state mutations.
//!
//! An [`Update`] accumulates account creations and deletions plus
//! balance, nonce, code and storage-slot writes, is normalized into a
//! canonical sorted form, and is applied to a state through the
//! [`UpdateTarget`] visitor. The byte encoding is versioned and
//! self-describing; see the `codec` module.

#[macro_use]
extern crate log;

mod codec;

use std::{error, fmt};

use statedb_types::{Address, Balance, Code, Key, Nonce, Value};

pub use codec::Section;

/// Update processing result.
pub type Result<T> = std::result::Result<T, Error>;

/// Update construction, validation, codec and application errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A list is not sorted-unique at `check` time.
    DuplicateOrUnordered(&'static str),
    /// An address is both created and deleted.
    CreateDeleteConflict(Address),
    /// The same key carries distinct values across appended updates.
    NormalizeConflict(Address),
    /// The byte buffer ended inside the named section.
    Truncated(Section),
    /// The byte buffer continues past a complete encoding.
    TrailingData(usize),
    /// Unknown encoding version byte.
    UnsupportedVersion(u8),
    /// Failure reported by an [`UpdateTarget`].
    Application(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::DuplicateOrUnordered(list) => {
                write!(f, "update list '{list}' is not sorted and unique")
            }
            Error::CreateDeleteConflict(address) => {
                write!(f, "account {address:?} is both created and deleted")
            }
            Error::NormalizeConflict(address) => write!(
                f,
                "conflicting updates for the same key on account {address:?}"
            ),
            Error::Truncated(section) => write!(f, "update encoding truncated in {section}"),
            Error::TrailingData(count) => {
                write!(f, "{count} bytes of trailing data after the update encoding")
            }
            Error::UnsupportedVersion(version) => {
                write!(f, "unsupported update encoding version {version}")
            }
            Error::Application(message) => write!(f, "update application failed: {message}"),
        }
    }
}

impl error::Error for Error {}

/// A balance write.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct BalanceUpdate {
    pub address: Address,
    pub balance: Balance,
}

/// A nonce write.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct NonceUpdate {
    pub address: Address,
    pub nonce: Nonce,
}

/// A contract code write. Codes are limited to 2^16 - 1 bytes by the
/// encoding.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct CodeUpdate {
    pub address: Address,
    pub code: Code,
}

/// A storage slot write.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct SlotUpdate {
    pub address: Address,
    pub key: Key,
    pub value: Value,
}

/// The visitor consumed by [`Update::apply_to`].
pub trait UpdateTarget {
    fn create_account(&mut self, address: &Address) -> Result<()>;
    fn delete_account(&mut self, address: &Address) -> Result<()>;
    fn set_balance(&mut self, address: &Address, balance: &Balance) -> Result<()>;
    fn set_nonce(&mut self, address: &Address, nonce: &Nonce) -> Result<()>;
    fn set_code(&mut self, address: &Address, code: &Code) -> Result<()>;
    fn set_storage(&mut self, address: &Address, key: &Key, value: &Value) -> Result<()>;
}

/// The mutations of one block, as six ordered lists.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Update {
    deleted_accounts: Vec<Address>,
    created_accounts: Vec<Address>,
    balances: Vec<BalanceUpdate>,
    nonces: Vec<NonceUpdate>,
    codes: Vec<CodeUpdate>,
    slots: Vec<SlotUpdate>,
}

impl Update {
    /// An update with no mutations.
    pub fn new() -> Update {
        Update::default()
    }

    /// Whether the update carries no mutations.
    pub fn is_empty(&self) -> bool {
        self.deleted_accounts.is_empty()
            && self.created_accounts.is_empty()
            && self.balances.is_empty()
            && self.nonces.is_empty()
            && self.codes.is_empty()
            && self.slots.is_empty()
    }

    /// Record the deletion of an account.
    pub fn append_delete_account(&mut self, address: Address) {
        self.deleted_accounts.push(address);
    }

    /// Record the creation of an account.
    pub fn append_create_account(&mut self, address: Address) {
        self.created_accounts.push(address);
    }

    /// Record a balance write.
    pub fn append_balance_update(&mut self, address: Address, balance: Balance) {
        self.balances.push(BalanceUpdate { address, balance });
    }

    /// Record a nonce write.
    pub fn append_nonce_update(&mut self, address: Address, nonce: Nonce) {
        self.nonces.push(NonceUpdate { address, nonce });
    }

    /// Record a code write.
    pub fn append_code_update(&mut self, address: Address, code: Code) {
        debug_assert!(code.len() <= u16::MAX as usize, "code exceeds the encodable size");
        self.codes.push(CodeUpdate { address, code });
    }

    /// Record a storage slot write.
    pub fn append_slot_update(&mut self, address: Address, key: Key, value: Value) {
        self.slots.push(SlotUpdate {
            address,
            key,
            value,
        });
    }

    /// Deleted accounts, in list order.
    pub fn deleted_accounts(&self) -> &[Address] {
        &self.deleted_accounts
    }

    /// Created accounts, in list order.
    pub fn created_accounts(&self) -> &[Address] {
        &self.created_accounts
    }

    /// Balance writes, in list order.
    pub fn balances(&self) -> &[BalanceUpdate] {
        &self.balances
    }

    /// Nonce writes, in list order.
    pub fn nonces(&self) -> &[NonceUpdate] {
        &self.nonces
    }

    /// Code writes, in list order.
    pub fn codes(&self) -> &[CodeUpdate] {
        &self.codes
    }

    /// Storage slot writes, in list order.
    pub fn slots(&self) -> &[SlotUpdate] {
        &self.slots
    }

    /// Bring every list into its canonical sorted, duplicate-free form.
    /// Exact duplicates collapse; duplicates that disagree on the value
    /// are a conflict.
    pub fn normalize(&mut self) -> Result<()> {
        self.deleted_accounts.sort_unstable();
        self.deleted_accounts.dedup();
        self.created_accounts.sort_unstable();
        self.created_accounts.dedup();

        self.balances.sort_unstable();
        self.balances.dedup();
        if let Some(pair) = find_adjacent(&self.balances, |a, b| a.address == b.address) {
            return Err(Error::NormalizeConflict(pair));
        }

        self.nonces.sort_unstable();
        self.nonces.dedup();
        if let Some(pair) = find_adjacent(&self.nonces, |a, b| a.address == b.address) {
            return Err(Error::NormalizeConflict(pair));
        }

        self.codes.sort_unstable();
        self.codes.dedup();
        if let Some(pair) = find_adjacent(&self.codes, |a, b| a.address == b.address) {
            return Err(Error::NormalizeConflict(pair));
        }

        self.slots.sort_unstable();
        self.slots.dedup();
        if let Some(pair) = find_adjacent(&self.slots, |a, b| {
            a.address == b.address && a.key == b.key
        }) {
            return Err(Error::NormalizeConflict(pair));
        }
        Ok(())
    }

    /// Verify the canonical form: every list strictly sorted by its
    /// key(s), and no account both created and deleted.
    pub fn check(&self) -> Result<()> {
        if !is_strictly_sorted(&self.deleted_accounts, |a, b| a < b) {
            return Err(Error::DuplicateOrUnordered("deleted accounts"));
        }
        if !is_strictly_sorted(&self.created_accounts, |a, b| a < b) {
            return Err(Error::DuplicateOrUnordered("created accounts"));
        }
        if !is_strictly_sorted(&self.balances, |a, b| a.address < b.address) {
            return Err(Error::DuplicateOrUnordered("balances"));
        }
        if !is_strictly_sorted(&self.nonces, |a, b| a.address < b.address) {
            return Err(Error::DuplicateOrUnordered("nonces"));
        }
        if !is_strictly_sorted(&self.codes, |a, b| a.address < b.address) {
            return Err(Error::DuplicateOrUnordered("codes"));
        }
        if !is_strictly_sorted(&self.slots, |a, b| {
            (a.address, a.key) < (b.address, b.key)
        }) {
            return Err(Error::DuplicateOrUnordered("slots"));
        }

        // Both lists are sorted here; walk them in lockstep.
        let mut deleted = self.deleted_accounts.iter().peekable();
        let mut created = self.created_accounts.iter().peekable();
        while let (Some(d), Some(c)) = (deleted.peek(), created.peek()) {
            match d.cmp(c) {
                std::cmp::Ordering::Less => {
                    deleted.next();
                }
                std::cmp::Ordering::Greater => {
                    created.next();
                }
                std::cmp::Ordering::Equal => return Err(Error::CreateDeleteConflict(**d)),
            }
        }
        Ok(())
    }

    /// Feed the mutations to `target`, deletes first, then creates,
    /// balances, nonces, codes and slots. Stops at the first error.
    pub fn apply_to(&self, target: &mut dyn UpdateTarget) -> Result<()> {
        trace!(
            target: "update",
            "applying update: {} deleted, {} created, {} balances, {} nonces, {} codes, {} slots",
            self.deleted_accounts.len(),
            self.created_accounts.len(),
            self.balances.len(),
            self.nonces.len(),
            self.codes.len(),
            self.slots.len()
        );
        for address in &self.deleted_accounts {
            target.delete_account(address)?;
        }
        for address in &self.created_accounts {
            target.create_account(address)?;
        }
        for update in &self.balances {
            target.set_balance(&update.address, &update.balance)?;
        }
        for update in &self.nonces {
            target.set_nonce(&update.address, &update.nonce)?;
        }
        for update in &self.codes {
            target.set_code(&update.address, &update.code)?;
        }
        for update in &self.slots {
            target.set_storage(&update.address, &update.key, &update.value)?;
        }
        Ok(())
    }
}

// First address of an adjacent pair matching `same_key`, if any.
fn find_adjacent<T, F: Fn(&T, &T) -> bool>(list: &[T], same_key: F) -> Option<Address>
where
    T: HasAddress,
{
    list.windows(2)
        .find(|pair| same_key(&pair[0], &pair[1]))
        .map(|pair| pair[0].address())
}

trait HasAddress {
    fn address(&self) -> Address;
}

impl HasAddress for BalanceUpdate {
    fn address(&self) -> Address {
        self.address
    }
}

impl HasAddress for NonceUpdate {
    fn address(&self) -> Address {
        self.address
    }
}

impl HasAddress for CodeUpdate {
    fn address(&self) -> Address {
        self.address
    }
}

impl HasAddress for SlotUpdate {
    fn address(&self) -> Address {
        self.address
    }
}

fn is_strictly_sorted<T, F: Fn(&T, &T) -> bool>(list: &[T], less: F) -> bool {
    list.windows(2).all(|pair| less(&pair[0], &pair[1]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    fn balance(value: u64) -> Balance {
        Balance::from_low_u64_be(value)
    }

    #[test]
    fn normalize_sorts_and_deduplicates() {
        let mut update = Update::new();
        update.append_create_account(address(3));
        update.append_create_account(address(1));
        update.append_create_account(address(3));
        update.append_balance_update(address(2), balance(5));
        update.append_balance_update(address(1), balance(4));
        update.append_balance_update(address(2), balance(5));
        update.normalize().unwrap();
        assert_eq!(update.created_accounts(), &[address(1), address(3)]);
        assert_eq!(update.balances().len(), 2);
        assert_eq!(update.balances()[0].address, address(1));
        update.check().unwrap();
    }

    #[test]
    fn conflicting_balances_fail_normalization() {
        let mut update = Update::new();
        update.append_balance_update(address(1), balance(4));
        update.append_balance_update(address(1), balance(5));
        assert_eq!(
            update.normalize(),
            Err(Error::NormalizeConflict(address(1)))
        );
    }

    #[test]
    fn conflicting_slot_values_fail_normalization() {
        let mut update = Update::new();
        let key = Key::repeat_byte(9);
        update.append_slot_update(address(1), key, Value::repeat_byte(1));
        update.append_slot_update(address(1), key, Value::repeat_byte(2));
        assert_eq!(
            update.normalize(),
            Err(Error::NormalizeConflict(address(1)))
        );
    }

    #[test]
    fn same_slot_same_value_collapses() {
        let mut update = Update::new();
        let key = Key::repeat_byte(9);
        update.append_slot_update(address(1), key, Value::repeat_byte(1));
        update.append_slot_update(address(1), key, Value::repeat_byte(1));
        update.normalize().unwrap();
        assert_eq!(update.slots().len(), 1);
    }

    #[test]
    fn distinct_slots_of_one_account_are_fine() {
        let mut update = Update::new();
        update.append_slot_update(address(1), Key::repeat_byte(2), Value::repeat_byte(1));
        update.append_slot_update(address(1), Key::repeat_byte(1), Value::repeat_byte(1));
        update.normalize().unwrap();
        update.check().unwrap();
        assert_eq!(update.slots().len(), 2);
        assert_eq!(update.slots()[0].key, Key::repeat_byte(1));
    }

    #[test]
    fn check_rejects_unsorted_lists() {
        let mut update = Update::new();
        update.append_delete_account(address(2));
        update.append_delete_account(address(1));
        assert_eq!(
            update.check(),
            Err(Error::DuplicateOrUnordered("deleted accounts"))
        );
    }

    #[test]
    fn check_rejects_duplicates() {
        let mut update = Update::new();
        update.append_nonce_update(address(1), Nonce::from_low_u64_be(1));
        update.append_nonce_update(address(1), Nonce::from_low_u64_be(1));
        assert_eq!(update.check(), Err(Error::DuplicateOrUnordered("nonces")));
    }

    #[test]
    fn check_rejects_create_delete_overlap() {
        let mut update = Update::new();
        update.append_create_account(address(1));
        update.append_create_account(address(2));
        update.append_delete_account(address(2));
        update.normalize().unwrap();
        assert_eq!(
            update.check(),
            Err(Error::CreateDeleteConflict(address(2)))
        );
    }

    #[derive(Default)]
    struct RecordingTarget {
        log: Vec<String>,
        fail_on: Option<&'static str>,
    }

    impl RecordingTarget {
        fn record(&mut self, op: String, kind: &'static str) -> Result<()> {
            if self.fail_on == Some(kind) {
                return Err(Error::Application(format!("{kind} rejected")));
            }
            self.log.push(op);
            Ok(())
        }
    }

    impl UpdateTarget for RecordingTarget {
        fn create_account(&mut self, address: &Address) -> Result<()> {
            self.record(format!("create {:x}", address.0[0]), "create")
        }
        fn delete_account(&mut self, address: &Address) -> Result<()> {
            self.record(format!("delete {:x}", address.0[0]), "delete")
        }
        fn set_balance(&mut self, address: &Address, _balance: &Balance) -> Result<()> {
            self.record(format!("balance {:x}", address.0[0]), "balance")
        }
        fn set_nonce(&mut self, address: &Address, _nonce: &Nonce) -> Result<()> {
            self.record(format!("nonce {:x}", address.0[0]), "nonce")
        }
        fn set_code(&mut self, address: &Address, _code: &Code) -> Result<()> {
            self.record(format!("code {:x}", address.0[0]), "code")
        }
        fn set_storage(&mut self, address: &Address, _key: &Key, _value: &Value) -> Result<()> {
            self.record(format!("slot {:x}", address.0[0]), "slot")
        }
    }

    fn full_update() -> Update {
        let mut update = Update::new();
        update.append_delete_account(address(1));
        update.append_create_account(address(2));
        update.append_balance_update(address(3), balance(30));
        update.append_nonce_update(address(4), Nonce::from_low_u64_be(4));
        update.append_code_update(address(5), vec![0x60, 0x00]);
        update.append_slot_update(address(6), Key::repeat_byte(6), Value::repeat_byte(7));
        update
    }

    #[test]
    fn apply_visits_in_fixed_order() {
        let mut target = RecordingTarget::default();
        full_update().apply_to(&mut target).unwrap();
        assert_eq!(
            target.log,
            vec![
                "delete 1", "create 2", "balance 3", "nonce 4", "code 5", "slot 6"
            ]
        );
    }

    #[test]
    fn apply_stops_at_the_first_error() {
        let mut target = RecordingTarget {
            fail_on: Some("balance"),
            ..Default::default()
        };
        let error = full_update().apply_to(&mut target).unwrap_err();
        assert_eq!(error, Error::Application("balance rejected".into()));
        assert_eq!(target.log, vec!["delete 1", "create 2"]);
    }
}
