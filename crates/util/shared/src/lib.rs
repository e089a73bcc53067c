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

//! A value behind a read-write lock, accessed through explicit handles.
//!
//! Unlike a plain guard, a handle is a first-class token: it can be
//! default-constructed invalid, passed around, queried for validity and
//! released explicitly. The protocol is to release every valid handle
//! exactly once; as a backstop, dropping a still-valid handle releases
//! the lock.

use std::{cell::UnsafeCell, error, fmt};

use parking_lot::{lock_api::RawRwLock as _, RawRwLock};

/// Error raised on use of an invalid handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandleError {
    /// The handle was released, or never attached to a lock.
    InvalidHandle,
}

impl fmt::Display for HandleError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HandleError::InvalidHandle => write!(f, "handle is invalid"),
        }
    }
}

impl error::Error for HandleError {}

/// A value protected by a read-write lock. Read handles coexist; a
/// write handle excludes everything else.
pub struct Shared<T> {
    lock: RawRwLock,
    value: UnsafeCell<T>,
}

// The raw lock serializes all access to the cell.
unsafe impl<T: Send> Send for Shared<T> {}
unsafe impl<T: Send + Sync> Sync for Shared<T> {}

impl<T> Shared<T> {
    /// Wrap a value.
    pub fn new(value: T) -> Shared<T> {
        Shared {
            lock: RawRwLock::INIT,
            value: UnsafeCell::new(value),
        }
    }

    /// Acquire shared access, blocking while a writer is active.
    pub fn get_read_handle(&self) -> ReadHandle<'_, T> {
        self.lock.lock_shared();
        ReadHandle { shared: Some(self) }
    }

    /// Acquire shared access if no writer is active; an invalid handle
    /// is returned otherwise.
    pub fn try_get_read_handle(&self) -> ReadHandle<'_, T> {
        if self.lock.try_lock_shared() {
            ReadHandle { shared: Some(self) }
        } else {
            ReadHandle { shared: None }
        }
    }

    /// Acquire exclusive access, blocking while readers or a writer are
    /// active.
    pub fn get_write_handle(&self) -> WriteHandle<'_, T> {
        self.lock.lock_exclusive();
        WriteHandle { shared: Some(self) }
    }

    /// Acquire exclusive access if the lock is free; an invalid handle
    /// is returned otherwise.
    pub fn try_get_write_handle(&self) -> WriteHandle<'_, T> {
        if self.lock.try_lock_exclusive() {
            WriteHandle { shared: Some(self) }
        } else {
            WriteHandle { shared: None }
        }
    }

    /// Unwrap the value.
    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

/// Shared access token. Valid until released.
pub struct ReadHandle<'a, T> {
    shared: Option<&'a Shared<T>>,
}

impl<'a, T> ReadHandle<'a, T> {
    /// Whether this handle still holds the lock.
    pub fn valid(&self) -> bool {
        self.shared.is_some()
    }

    /// Read the protected value.
    pub fn get(&self) -> Result<&T, HandleError> {
        let shared = self.shared.ok_or(HandleError::InvalidHandle)?;
        // Valid handle holds the shared lock, so no writer is active.
        Ok(unsafe { &*shared.value.get() })
    }

    /// Give up the lock, invalidating the handle. Releasing an invalid
    /// handle is an error.
    pub fn release(&mut self) -> Result<(), HandleError> {
        let shared = self.shared.take().ok_or(HandleError::InvalidHandle)?;
        unsafe { shared.lock.unlock_shared() };
        Ok(())
    }
}

impl<'a, T> Default for ReadHandle<'a, T> {
    fn default() -> Self {
        ReadHandle { shared: None }
    }
}

impl<'a, T> Drop for ReadHandle<'a, T> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            unsafe { shared.lock.unlock_shared() };
        }
    }
}

/// Exclusive access token. Valid until released.
pub struct WriteHandle<'a, T> {
    shared: Option<&'a Shared<T>>,
}

impl<'a, T> WriteHandle<'a, T> {
    /// Whether this handle still holds the lock.
    pub fn valid(&self) -> bool {
        self.shared.is_some()
    }

    /// Read the protected value.
    pub fn get(&self) -> Result<&T, HandleError> {
        let shared = self.shared.ok_or(HandleError::InvalidHandle)?;
        // Valid handle holds the exclusive lock.
        Ok(unsafe { &*shared.value.get() })
    }

    /// Mutably borrow the protected value.
    pub fn get_mut(&mut self) -> Result<&mut T, HandleError> {
        let shared = self.shared.ok_or(HandleError::InvalidHandle)?;
        Ok(unsafe { &mut *shared.value.get() })
    }

    /// Replace the protected value.
    pub fn set(&mut self, value: T) -> Result<(), HandleError> {
        *self.get_mut()? = value;
        Ok(())
    }

    /// Give up the lock, invalidating the handle. Releasing an invalid
    /// handle is an error.
    pub fn release(&mut self) -> Result<(), HandleError> {
        let shared = self.shared.take().ok_or(HandleError::InvalidHandle)?;
        unsafe { shared.lock.unlock_exclusive() };
        Ok(())
    }
}

impl<'a, T> Default for WriteHandle<'a, T> {
    fn default() -> Self {
        WriteHandle { shared: None }
    }
}

impl<'a, T> Drop for WriteHandle<'a, T> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            unsafe { shared.lock.unlock_exclusive() };
        }
    }
}
