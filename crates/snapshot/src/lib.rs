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

//! Verifiable, streamable snapshots of state structures.
//!
//! A structure exposes its content as a sequence of parts, each
//! individually verifiable against a proof, with a root proof covering
//! the whole. A composite structure glues the snapshots of its
//! components into one [`ComposedSnapshot`]: parts are numbered across
//! the components in order, and the composed root proof is a SHA-256
//! digest over the component root proofs. A remote peer can fetch the
//! metadata, reconstruct per-component views with
//! [`split_composite_data`] and verify parts incrementally through a
//! [`ComposedSnapshotVerifier`].

#[macro_use]
extern crate log;

mod composed;
mod error;

use std::any::Any;

pub use composed::{
    split_composite_data, split_composite_metadata, ComposedProof, ComposedSnapshot,
    ComposedSnapshotVerifier, ComposedSubData, MAX_SUB_SNAPSHOTS,
};
pub use error::Error;

/// A compact, comparable certificate of a part or a whole snapshot.
pub trait Proof: std::fmt::Debug {
    /// Whether two proofs certify the same content. Symmetric and
    /// reflexive; proofs of different concrete types are never equal.
    fn equal(&self, other: &dyn Proof) -> bool;

    /// Deterministic byte serialization.
    fn to_bytes(&self) -> Vec<u8>;

    /// Downcasting hook for `equal` implementations.
    fn as_any(&self) -> &dyn Any;
}

/// A streamable chunk of a snapshot.
pub trait Part {
    /// Whether `proof` was produced from this part's source bytes.
    fn verify(&self, proof: &dyn Proof) -> bool;

    /// Byte serialization of the part payload.
    fn to_bytes(&self) -> Vec<u8>;
}

/// Type-erased access to a snapshot's raw contents. The data may live
/// behind a network connection; every accessor can fail.
pub trait SnapshotData {
    /// Snapshot metadata, sufficient to construct a matching verifier.
    fn meta(&self) -> Result<Vec<u8>, Error>;

    /// Serialized proof of the given part.
    fn proof_data(&self, part_number: u64) -> Result<Vec<u8>, Error>;

    /// Serialized payload of the given part.
    fn part_data(&self, part_number: u64) -> Result<Vec<u8>, Error>;
}

/// An isolated, verifiable view of a structure's content at creation
/// time. Must be released once done with.
pub trait Snapshot {
    /// Number of parts in this snapshot.
    fn num_parts(&self) -> u64;

    /// The proof covering the entire snapshot.
    fn root_proof(&self) -> &dyn Proof;

    /// The proof of one part.
    fn proof(&self, part_number: u64) -> Result<Box<dyn Proof>, Error>;

    /// One part's content.
    fn part(&self, part_number: u64) -> Result<Box<dyn Part>, Error>;

    /// Check that the root proof still matches the snapshot content.
    fn verify_root_proof(&self) -> Result<(), Error>;

    /// Raw-data view of this snapshot, e.g. for shipping it to a peer.
    fn data(&self) -> &dyn SnapshotData;

    /// Release resources held by the snapshot.
    fn release(&mut self) -> Result<(), Error>;
}

/// Incremental verification of snapshot data, part by part.
pub trait SnapshotVerifier {
    /// Verify the metadata-level consistency of `data` and compute its
    /// root proof.
    fn verify_root_proof(&self, data: &dyn SnapshotData) -> Result<Box<dyn Proof>, Error>;

    /// Verify one part against its serialized proof.
    fn verify_part(&self, part_number: u64, proof: &[u8], part: &[u8]) -> Result<(), Error>;
}

/// Implemented by structures that can snapshot themselves and be
/// restored from snapshot data.
pub trait Snapshotable {
    /// Proof of the current content, deterministic in the content.
    fn proof(&self) -> Result<Box<dyn Proof>, Error>;

    /// Create a snapshot shielded from subsequent mutation until
    /// released.
    fn create_snapshot(&self) -> Result<Box<dyn Snapshot>, Error>;

    /// Replace the current content with the snapshotted one.
    fn restore(&mut self, data: &dyn SnapshotData) -> Result<(), Error>;

    /// Parse `meta` and return a verifier for that snapshot format.
    fn get_snapshot_verifier(&self, meta: &[u8]) -> Result<Box<dyn SnapshotVerifier>, Error>;
}
