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

//! Snapshot framework errors.

use std::{error, fmt};

/// Snapshot framework error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Part number outside the snapshot's part index space.
    PartNotFound(u64),
    /// Composed metadata shorter than declared, or internally
    /// inconsistent.
    MalformedMetadata,
    /// A composed snapshot holds at most 255 sub-snapshots.
    TooManySubSnapshots(usize),
    /// Verifier and data disagree on the number of sub-snapshots.
    FormatMismatch { expected: usize, actual: usize },
    /// A proof does not match the content it was checked against.
    ProofMismatch,
    /// Failure reported by a snapshotable structure.
    Custom(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::PartNotFound(part) => write!(f, "no such part: {part}"),
            Error::MalformedMetadata => write!(f, "malformed composed snapshot metadata"),
            Error::TooManySubSnapshots(count) => {
                write!(f, "too many sub-snapshots: {count}, at most 255 supported")
            }
            Error::FormatMismatch { expected, actual } => write!(
                f,
                "format mismatch: verifier expects {expected} sub-snapshots, data has {actual}"
            ),
            Error::ProofMismatch => write!(f, "proof does not match content"),
            Error::Custom(message) => write!(f, "{message}"),
        }
    }
}

impl error::Error for Error {}
