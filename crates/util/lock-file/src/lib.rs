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

//! Cross-process advisory lock based on exclusive file creation.
//!
//! Acquisition creates the lock file with fail-if-exists semantics, so
//! exactly one contender on a path wins. Release unlinks the file. The
//! lock is advisory: a crashed process leaves the file behind, and
//! recovering from that is the caller's concern.

#[macro_use]
extern crate log;

use std::{
    error, fmt, fs,
    fs::{File, OpenOptions},
    io,
    path::{Path, PathBuf},
};

/// Lock acquisition and release failures.
#[derive(Debug)]
pub enum Error {
    /// Exclusive creation of the lock file failed, typically because
    /// another process holds the lock.
    AcquireFailed(io::Error),
    /// The lock file could not be removed.
    ReleaseFailed(io::Error),
    /// The instance was already released, or never held a lock.
    InvalidHandle,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::AcquireFailed(err) => write!(f, "unable to acquire lock file: {err}"),
            Error::ReleaseFailed(err) => write!(f, "unable to release lock file: {err}"),
            Error::InvalidHandle => write!(f, "lock file handle is invalid"),
        }
    }
}

impl error::Error for Error {}

/// An exclusive lock on a file-system path, valid from successful
/// creation until `release`.
#[derive(Debug, Default)]
pub struct LockFile {
    path: PathBuf,
    file: Option<File>,
}

impl LockFile {
    /// Acquire the lock by creating `path` exclusively.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<LockFile, Error> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(Error::AcquireFailed)?;
        debug!(target: "lockfile", "acquired lock on {}", path.display());
        Ok(LockFile {
            path: path.to_path_buf(),
            file: Some(file),
        })
    }

    /// Whether this instance still holds its lock.
    pub fn valid(&self) -> bool {
        self.file.is_some()
    }

    /// Release the lock: close the file and unlink the path. Fails on
    /// an already-released instance, and when the file was removed
    /// externally.
    pub fn release(&mut self) -> Result<(), Error> {
        if self.file.take().is_none() {
            return Err(Error::InvalidHandle);
        }
        if !self.path.exists() {
            warn!(target: "lockfile", "lock file {} vanished while held", self.path.display());
            return Err(Error::ReleaseFailed(io::Error::new(
                io::ErrorKind::NotFound,
                "lock file was removed externally",
            )));
        }
        fs::remove_file(&self.path).map_err(Error::ReleaseFailed)?;
        debug!(target: "lockfile", "released lock on {}", self.path.display());
        Ok(())
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        // Best effort; an abandoned lock file is legal (advisory lock).
        if self.valid() {
            let _ = self.release();
        }
    }
}
