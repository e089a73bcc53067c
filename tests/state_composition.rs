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

//! End-to-end exercise of the snapshot framework: a pair of snapshotable
//! balance tables composed into one snapshot, shipped as raw data,
//! verified part by part and restored on the other side.

use std::{any::Any, collections::BTreeMap};

use oe_statedb::{
    keccak256, split_composite_data, split_composite_metadata, Address, Balance,
    ComposedSnapshot, ComposedSnapshotVerifier, Hash, Part, Proof, Snapshot, SnapshotData,
    SnapshotVerifier, Snapshotable, Update, UpdateTarget,
};
use statedb_snapshot::Error;

// Two balance records per part keeps the tests multi-part.
const ENTRIES_PER_PART: usize = 2;
const RECORD_SIZE: usize = 20 + 16;

#[derive(Clone, Debug, PartialEq, Eq)]
struct DigestProof(Hash);

impl Proof for DigestProof {
    fn equal(&self, other: &dyn Proof) -> bool {
        other
            .as_any()
            .downcast_ref::<DigestProof>()
            .is_some_and(|other| other.0 == self.0)
    }

    fn to_bytes(&self) -> Vec<u8> {
        self.0.as_bytes().to_vec()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct TablePart(Vec<u8>);

impl Part for TablePart {
    fn verify(&self, proof: &dyn Proof) -> bool {
        proof.to_bytes() == keccak256(&self.0).as_bytes()
    }

    fn to_bytes(&self) -> Vec<u8> {
        self.0.clone()
    }
}

// Per-part digests plus the root digest over their concatenation.
fn digest_parts(parts: &[Vec<u8>]) -> (Vec<DigestProof>, DigestProof) {
    let proofs: Vec<DigestProof> = parts.iter().map(|part| DigestProof(keccak256(part))).collect();
    let concatenated: Vec<u8> = proofs.iter().flat_map(|proof| proof.to_bytes()).collect();
    let root = DigestProof(keccak256(&concatenated));
    (proofs, root)
}

struct TableSnapshot {
    parts: Vec<Vec<u8>>,
    proofs: Vec<DigestProof>,
    root: DigestProof,
}

impl TableSnapshot {
    fn new(parts: Vec<Vec<u8>>) -> TableSnapshot {
        let (proofs, root) = digest_parts(&parts);
        TableSnapshot {
            parts,
            proofs,
            root,
        }
    }
}

impl Snapshot for TableSnapshot {
    fn num_parts(&self) -> u64 {
        self.parts.len() as u64
    }

    fn root_proof(&self) -> &dyn Proof {
        &self.root
    }

    fn proof(&self, part_number: u64) -> Result<Box<dyn Proof>, Error> {
        self.proofs
            .get(part_number as usize)
            .map(|proof| Box::new(proof.clone()) as Box<dyn Proof>)
            .ok_or(Error::PartNotFound(part_number))
    }

    fn part(&self, part_number: u64) -> Result<Box<dyn Part>, Error> {
        self.parts
            .get(part_number as usize)
            .map(|part| Box::new(TablePart(part.clone())) as Box<dyn Part>)
            .ok_or(Error::PartNotFound(part_number))
    }

    fn verify_root_proof(&self) -> Result<(), Error> {
        let (_, root) = digest_parts(&self.parts);
        if root.equal(&self.root) {
            Ok(())
        } else {
            Err(Error::ProofMismatch)
        }
    }

    fn data(&self) -> &dyn SnapshotData {
        self
    }

    fn release(&mut self) -> Result<(), Error> {
        self.parts.clear();
        self.proofs.clear();
        Ok(())
    }
}

impl SnapshotData for TableSnapshot {
    fn meta(&self) -> Result<Vec<u8>, Error> {
        Ok(self.num_parts().to_le_bytes().to_vec())
    }

    fn proof_data(&self, part_number: u64) -> Result<Vec<u8>, Error> {
        Ok(self.proof(part_number)?.to_bytes())
    }

    fn part_data(&self, part_number: u64) -> Result<Vec<u8>, Error> {
        Ok(self.part(part_number)?.to_bytes())
    }
}

struct TableVerifier {
    num_parts: u64,
}

impl SnapshotVerifier for TableVerifier {
    fn verify_root_proof(&self, data: &dyn SnapshotData) -> Result<Box<dyn Proof>, Error> {
        let declared = parse_meta(&data.meta()?)?;
        if declared != self.num_parts {
            return Err(Error::MalformedMetadata);
        }
        let mut concatenated = Vec::new();
        for part_number in 0..declared {
            concatenated.extend(data.proof_data(part_number)?);
        }
        Ok(Box::new(DigestProof(keccak256(&concatenated))))
    }

    fn verify_part(&self, _part_number: u64, proof: &[u8], part: &[u8]) -> Result<(), Error> {
        if proof == keccak256(part).as_bytes() {
            Ok(())
        } else {
            Err(Error::ProofMismatch)
        }
    }
}

fn parse_meta(meta: &[u8]) -> Result<u64, Error> {
    let chunk: [u8; 8] = meta.try_into().map_err(|_| Error::MalformedMetadata)?;
    Ok(u64::from_le_bytes(chunk))
}

/// A toy account-balance table speaking the snapshot and update
/// protocols of the real state schemas.
#[derive(Default)]
struct BalanceTable {
    balances: BTreeMap<Address, Balance>,
}

impl BalanceTable {
    fn set(&mut self, address: Address, balance: Balance) {
        self.balances.insert(address, balance);
    }

    fn balances(&self) -> &BTreeMap<Address, Balance> {
        &self.balances
    }

    fn encode_parts(&self) -> Vec<Vec<u8>> {
        let records: Vec<_> = self.balances.iter().collect();
        records
            .chunks(ENTRIES_PER_PART)
            .map(|chunk| {
                let mut part = Vec::with_capacity(chunk.len() * RECORD_SIZE);
                for (address, balance) in chunk {
                    part.extend_from_slice(address.as_bytes());
                    part.extend_from_slice(balance.as_bytes());
                }
                part
            })
            .collect()
    }
}

impl Snapshotable for BalanceTable {
    fn proof(&self) -> Result<Box<dyn Proof>, Error> {
        let (_, root) = digest_parts(&self.encode_parts());
        Ok(Box::new(root))
    }

    fn create_snapshot(&self) -> Result<Box<dyn Snapshot>, Error> {
        Ok(Box::new(TableSnapshot::new(self.encode_parts())))
    }

    fn restore(&mut self, data: &dyn SnapshotData) -> Result<(), Error> {
        let num_parts = parse_meta(&data.meta()?)?;
        let mut balances = BTreeMap::new();
        for part_number in 0..num_parts {
            let part = data.part_data(part_number)?;
            if part.len() % RECORD_SIZE != 0 {
                return Err(Error::Custom(format!(
                    "balance part {part_number} has a partial record"
                )));
            }
            for record in part.chunks(RECORD_SIZE) {
                balances.insert(
                    Address::from_slice(&record[..20]),
                    Balance::from_slice(&record[20..]),
                );
            }
        }
        self.balances = balances;
        Ok(())
    }

    fn get_snapshot_verifier(&self, meta: &[u8]) -> Result<Box<dyn SnapshotVerifier>, Error> {
        Ok(Box::new(TableVerifier {
            num_parts: parse_meta(meta)?,
        }))
    }
}

impl UpdateTarget for BalanceTable {
    fn create_account(&mut self, address: &Address) -> statedb_update::Result<()> {
        self.balances.insert(*address, Balance::zero());
        Ok(())
    }

    fn delete_account(&mut self, address: &Address) -> statedb_update::Result<()> {
        self.balances.remove(address);
        Ok(())
    }

    fn set_balance(
        &mut self,
        address: &Address,
        balance: &Balance,
    ) -> statedb_update::Result<()> {
        self.balances.insert(*address, *balance);
        Ok(())
    }

    fn set_nonce(
        &mut self,
        _address: &Address,
        _nonce: &oe_statedb::Nonce,
    ) -> statedb_update::Result<()> {
        Ok(())
    }

    fn set_code(
        &mut self,
        _address: &Address,
        _code: &oe_statedb::Code,
    ) -> statedb_update::Result<()> {
        Ok(())
    }

    fn set_storage(
        &mut self,
        _address: &Address,
        _key: &oe_statedb::Key,
        _value: &oe_statedb::Value,
    ) -> statedb_update::Result<()> {
        Ok(())
    }
}

fn sample_tables() -> (BalanceTable, BalanceTable) {
    let mut first = BalanceTable::default();
    for i in 1..=3u8 {
        first.set(Address::repeat_byte(i), Balance::from_low_u64_be(i as u64));
    }
    let mut second = BalanceTable::default();
    for i in 10..=14u8 {
        second.set(
            Address::repeat_byte(i),
            Balance::from_low_u64_be(i as u64 * 100),
        );
    }
    (first, second)
}

#[test]
fn composed_snapshot_verifies_end_to_end() {
    let (first, second) = sample_tables();

    let composed = ComposedSnapshot::new(vec![
        first.create_snapshot().unwrap(),
        second.create_snapshot().unwrap(),
    ]);
    // 3 entries -> 2 parts, 5 entries -> 3 parts.
    assert_eq!(composed.num_parts(), 5);
    composed.verify_root_proof().unwrap();

    let meta = composed.data().meta().unwrap();
    let (sub_metas, counts) = split_composite_metadata(&meta).unwrap();
    assert_eq!(counts, vec![2, 3]);

    let verifier = ComposedSnapshotVerifier::new(
        vec![
            first.get_snapshot_verifier(&sub_metas[0]).unwrap(),
            second.get_snapshot_verifier(&sub_metas[1]).unwrap(),
        ],
        counts,
    );

    let root = verifier.verify_root_proof(composed.data()).unwrap();
    assert!(root.equal(composed.root_proof()));

    for part_number in 0..composed.num_parts() {
        let proof = composed.data().proof_data(part_number).unwrap();
        let part = composed.data().part_data(part_number).unwrap();
        verifier.verify_part(part_number, &proof, &part).unwrap();
        assert!(composed
            .part(part_number)
            .unwrap()
            .verify(composed.proof(part_number).unwrap().as_ref()));
    }

    // A corrupted part is caught.
    let part = composed.data().part_data(0).unwrap();
    let proof = composed.data().proof_data(1).unwrap();
    assert_eq!(
        verifier.verify_part(0, &proof, &part).unwrap_err(),
        Error::ProofMismatch
    );
}

#[test]
fn tables_restore_from_composed_sub_views() {
    let (first, second) = sample_tables();
    let composed = ComposedSnapshot::new(vec![
        first.create_snapshot().unwrap(),
        second.create_snapshot().unwrap(),
    ]);

    let views = split_composite_data(composed.data()).unwrap();
    assert_eq!(views.len(), 2);

    let mut restored_first = BalanceTable::default();
    restored_first.restore(&views[0]).unwrap();
    assert_eq!(restored_first.balances(), first.balances());

    let mut restored_second = BalanceTable::default();
    restored_second.restore(&views[1]).unwrap();
    assert_eq!(restored_second.balances(), second.balances());

    // Proofs of restored content match the originals.
    assert!(restored_second
        .proof()
        .unwrap()
        .equal(composed.snapshots()[1].root_proof()));
}

#[test]
fn updates_apply_to_a_snapshotable_table() {
    let (mut table, _) = sample_tables();

    let mut update = Update::new();
    update.append_delete_account(Address::repeat_byte(1));
    update.append_create_account(Address::repeat_byte(9));
    update.append_balance_update(Address::repeat_byte(2), Balance::from_low_u64_be(2000));
    update.normalize().unwrap();
    update.check().unwrap();

    let decoded = Update::from_bytes(&update.to_bytes()).unwrap();
    decoded.apply_to(&mut table).unwrap();

    assert!(!table.balances().contains_key(&Address::repeat_byte(1)));
    assert_eq!(
        table.balances().get(&Address::repeat_byte(9)),
        Some(&Balance::zero())
    );
    assert_eq!(
        table.balances().get(&Address::repeat_byte(2)),
        Some(&Balance::from_low_u64_be(2000))
    );
}
