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

//! Composition of sub-snapshots into one snapshot.

use std::any::Any;

use sha2::{Digest, Sha256};

use crate::{Error, Part, Proof, Snapshot, SnapshotData, SnapshotVerifier};
use statedb_types::Hash;

/// A composed snapshot holds at most this many sub-snapshots; the limit
/// is fixed by the one-byte count in the metadata encoding.
pub const MAX_SUB_SNAPSHOTS: usize = 255;

/// Root proof of a composed snapshot: the SHA-256 digest over the
/// serialized root proofs of the sub-snapshots, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComposedProof {
    hash: Hash,
}

impl ComposedProof {
    /// Compute the proof over the given sub-proofs.
    pub fn of<'a, I: IntoIterator<Item = &'a dyn Proof>>(proofs: I) -> ComposedProof {
        let mut hasher = Sha256::new();
        for proof in proofs {
            hasher.update(proof.to_bytes());
        }
        ComposedProof {
            hash: Hash::from_slice(&hasher.finalize()),
        }
    }

    /// Read a proof back from its 32 serialized bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<ComposedProof, Error> {
        if bytes.len() != 32 {
            return Err(Error::MalformedMetadata);
        }
        Ok(ComposedProof {
            hash: Hash::from_slice(bytes),
        })
    }
}

impl Proof for ComposedProof {
    fn equal(&self, other: &dyn Proof) -> bool {
        other
            .as_any()
            .downcast_ref::<ComposedProof>()
            .is_some_and(|other| other.hash == self.hash)
    }

    fn to_bytes(&self) -> Vec<u8> {
        self.hash.as_bytes().to_vec()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A snapshot glued together from sub-snapshots. Parts are numbered
/// across the sub-snapshots in order, and the metadata records how to
/// take the composition apart again.
///
/// The composed snapshot owns its sub-snapshots: they must not be
/// retained or released independently once handed over.
pub struct ComposedSnapshot {
    snapshots: Vec<Box<dyn Snapshot>>,
    proof: ComposedProof,
}

impl ComposedSnapshot {
    /// Compose the given snapshots, in order.
    pub fn new(snapshots: Vec<Box<dyn Snapshot>>) -> ComposedSnapshot {
        let proof = ComposedProof::of(snapshots.iter().map(|s| s.root_proof()));
        ComposedSnapshot { snapshots, proof }
    }

    /// The owned sub-snapshots, in composition order.
    pub fn snapshots(&self) -> &[Box<dyn Snapshot>] {
        &self.snapshots
    }

    // Map a global part number onto (sub-snapshot index, local part
    // number).
    fn locate(&self, part_number: u64) -> Result<(usize, u64), Error> {
        let mut remaining = part_number;
        for (index, snapshot) in self.snapshots.iter().enumerate() {
            let count = snapshot.num_parts();
            if remaining < count {
                return Ok((index, remaining));
            }
            remaining -= count;
        }
        Err(Error::PartNotFound(part_number))
    }
}

impl Snapshot for ComposedSnapshot {
    fn num_parts(&self) -> u64 {
        self.snapshots.iter().map(|s| s.num_parts()).sum()
    }

    fn root_proof(&self) -> &dyn Proof {
        &self.proof
    }

    fn proof(&self, part_number: u64) -> Result<Box<dyn Proof>, Error> {
        let (index, local) = self.locate(part_number)?;
        self.snapshots[index].proof(local)
    }

    fn part(&self, part_number: u64) -> Result<Box<dyn Part>, Error> {
        let (index, local) = self.locate(part_number)?;
        self.snapshots[index].part(local)
    }

    fn verify_root_proof(&self) -> Result<(), Error> {
        for snapshot in &self.snapshots {
            snapshot.verify_root_proof()?;
        }
        let recomputed = ComposedProof::of(self.snapshots.iter().map(|s| s.root_proof()));
        if !recomputed.equal(&self.proof) {
            return Err(Error::ProofMismatch);
        }
        Ok(())
    }

    fn data(&self) -> &dyn SnapshotData {
        self
    }

    fn release(&mut self) -> Result<(), Error> {
        // Best effort: every sub-snapshot is released even when an
        // earlier one fails; the first error is reported.
        let mut first_error = None;
        for snapshot in &mut self.snapshots {
            if let Err(error) = snapshot.release() {
                warn!(target: "snapshot", "sub-snapshot release failed: {error}");
                if first_error.is_none() {
                    first_error = Some(error);
                }
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl SnapshotData for ComposedSnapshot {
    /// Metadata layout, little-endian: the number of sub-snapshots as
    /// one byte, the sub-metadata lengths as `u32`s, the concatenated
    /// sub-metadata, and the sub-part counts as `u64`s.
    fn meta(&self) -> Result<Vec<u8>, Error> {
        if self.snapshots.len() > MAX_SUB_SNAPSHOTS {
            return Err(Error::TooManySubSnapshots(self.snapshots.len()));
        }
        let metas = self
            .snapshots
            .iter()
            .map(|s| s.data().meta())
            .collect::<Result<Vec<_>, _>>()?;

        let mut out = Vec::new();
        out.push(self.snapshots.len() as u8);
        for meta in &metas {
            out.extend_from_slice(&(meta.len() as u32).to_le_bytes());
        }
        for meta in &metas {
            out.extend_from_slice(meta);
        }
        for snapshot in &self.snapshots {
            out.extend_from_slice(&snapshot.num_parts().to_le_bytes());
        }
        Ok(out)
    }

    fn proof_data(&self, part_number: u64) -> Result<Vec<u8>, Error> {
        Ok(self.proof(part_number)?.to_bytes())
    }

    fn part_data(&self, part_number: u64) -> Result<Vec<u8>, Error> {
        Ok(self.part(part_number)?.to_bytes())
    }
}

/// Byte-exact inverse of the composed metadata encoding: the list of
/// sub-metadata blocks and the list of sub-part counts.
pub fn split_composite_metadata(meta: &[u8]) -> Result<(Vec<Vec<u8>>, Vec<u64>), Error> {
    let (&count, mut rest) = meta.split_first().ok_or(Error::MalformedMetadata)?;
    let count = count as usize;

    let mut lengths = Vec::with_capacity(count);
    for _ in 0..count {
        if rest.len() < 4 {
            return Err(Error::MalformedMetadata);
        }
        let (chunk, tail) = rest.split_at(4);
        lengths.push(u32::from_le_bytes(chunk.try_into().expect("chunk is 4 bytes; qed")) as usize);
        rest = tail;
    }

    let mut metas = Vec::with_capacity(count);
    for length in lengths {
        if rest.len() < length {
            return Err(Error::MalformedMetadata);
        }
        let (chunk, tail) = rest.split_at(length);
        metas.push(chunk.to_vec());
        rest = tail;
    }

    let mut counts = Vec::with_capacity(count);
    for _ in 0..count {
        if rest.len() < 8 {
            return Err(Error::MalformedMetadata);
        }
        let (chunk, tail) = rest.split_at(8);
        counts.push(u64::from_le_bytes(chunk.try_into().expect("chunk is 8 bytes; qed")));
        rest = tail;
    }

    Ok((metas, counts))
}

/// View of one sub-snapshot's slice of a composed snapshot's data.
/// Part numbers are translated by the recorded offset and served by the
/// parent view.
pub struct ComposedSubData<'a> {
    parent: &'a dyn SnapshotData,
    meta: Vec<u8>,
    offset: u64,
    num_parts: u64,
}

impl<'a> ComposedSubData<'a> {
    /// Number of parts in this sub-snapshot.
    pub fn num_parts(&self) -> u64 {
        self.num_parts
    }
}

impl<'a> SnapshotData for ComposedSubData<'a> {
    fn meta(&self) -> Result<Vec<u8>, Error> {
        Ok(self.meta.clone())
    }

    fn proof_data(&self, part_number: u64) -> Result<Vec<u8>, Error> {
        self.parent.proof_data(part_number + self.offset)
    }

    fn part_data(&self, part_number: u64) -> Result<Vec<u8>, Error> {
        self.parent.part_data(part_number + self.offset)
    }
}

/// Take composed snapshot data apart into per-sub-snapshot views.
pub fn split_composite_data(data: &dyn SnapshotData) -> Result<Vec<ComposedSubData<'_>>, Error> {
    let meta = data.meta()?;
    let (metas, counts) = split_composite_metadata(&meta)?;
    let mut views = Vec::with_capacity(metas.len());
    let mut offset = 0u64;
    for (meta, num_parts) in metas.into_iter().zip(counts) {
        views.push(ComposedSubData {
            parent: data,
            meta,
            offset,
            num_parts,
        });
        offset += num_parts;
    }
    Ok(views)
}

/// Verifier for composed snapshot data, routing each part to the
/// verifier of the sub-snapshot it belongs to.
pub struct ComposedSnapshotVerifier {
    verifiers: Vec<Box<dyn SnapshotVerifier>>,
    num_parts: Vec<u64>,
}

impl ComposedSnapshotVerifier {
    /// Combine sub-verifiers with their snapshots' part counts. The two
    /// lists describe the same sub-snapshots and must be equally long.
    pub fn new(
        verifiers: Vec<Box<dyn SnapshotVerifier>>,
        num_parts: Vec<u64>,
    ) -> ComposedSnapshotVerifier {
        assert_eq!(
            verifiers.len(),
            num_parts.len(),
            "one part count per verifier is required"
        );
        ComposedSnapshotVerifier {
            verifiers,
            num_parts,
        }
    }
}

impl SnapshotVerifier for ComposedSnapshotVerifier {
    fn verify_root_proof(&self, data: &dyn SnapshotData) -> Result<Box<dyn Proof>, Error> {
        let views = split_composite_data(data)?;
        if views.len() != self.verifiers.len() {
            return Err(Error::FormatMismatch {
                expected: self.verifiers.len(),
                actual: views.len(),
            });
        }
        let mut proofs = Vec::with_capacity(views.len());
        for (verifier, view) in self.verifiers.iter().zip(&views) {
            proofs.push(verifier.verify_root_proof(view)?);
        }
        Ok(Box::new(ComposedProof::of(
            proofs.iter().map(|p| p.as_ref()),
        )))
    }

    fn verify_part(&self, part_number: u64, proof: &[u8], part: &[u8]) -> Result<(), Error> {
        let mut remaining = part_number;
        for (verifier, &count) in self.verifiers.iter().zip(&self.num_parts) {
            if remaining < count {
                return verifier.verify_part(remaining, proof, part);
            }
            remaining -= count;
        }
        Err(Error::PartNotFound(part_number))
    }
}
