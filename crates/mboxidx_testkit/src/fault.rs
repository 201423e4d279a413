//! Fault-injecting storage backend.
//!
//! Wraps any [`StorageBackend`] and fails selected operations on demand.
//! The toggles live behind a shared [`FaultHandle`], so a test can hand
//! the backend to an index, keep the handle, and flip failures mid-run to
//! simulate crashes and durability loss at precise points of the append
//! protocol.

use mboxidx_storage::{StorageBackend, StorageError, StorageResult};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct FaultState {
    fail_append: AtomicBool,
    fail_write: AtomicBool,
    fail_flush: AtomicBool,
    fail_sync: AtomicBool,
}

/// Remote control for a [`FaultBackend`]'s failure toggles.
#[derive(Debug, Clone)]
pub struct FaultHandle {
    state: Arc<FaultState>,
}

impl FaultHandle {
    /// Makes `append` fail (or succeed again).
    pub fn fail_append(&self, fail: bool) {
        self.state.fail_append.store(fail, Ordering::SeqCst);
    }

    /// Makes `write_at` fail (or succeed again).
    pub fn fail_write(&self, fail: bool) {
        self.state.fail_write.store(fail, Ordering::SeqCst);
    }

    /// Makes `flush` fail (or succeed again).
    pub fn fail_flush(&self, fail: bool) {
        self.state.fail_flush.store(fail, Ordering::SeqCst);
    }

    /// Makes `sync` fail (or succeed again).
    pub fn fail_sync(&self, fail: bool) {
        self.state.fail_sync.store(fail, Ordering::SeqCst);
    }
}

/// A storage backend wrapper that can fail on command.
///
/// Reads always pass through; mutation and durability operations consult
/// their toggle first and report an injected I/O error when armed. The
/// wrapped backend is untouched by a failed operation.
pub struct FaultBackend {
    inner: Box<dyn StorageBackend>,
    state: Arc<FaultState>,
}

impl FaultBackend {
    /// Wraps a backend, returning it together with its fault handle.
    #[must_use]
    pub fn new(inner: Box<dyn StorageBackend>) -> (Self, FaultHandle) {
        let state = Arc::new(FaultState::default());
        let handle = FaultHandle {
            state: Arc::clone(&state),
        };
        (Self { inner, state }, handle)
    }
}

impl std::fmt::Debug for FaultBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaultBackend").finish_non_exhaustive()
    }
}

fn injected(operation: &str) -> StorageError {
    StorageError::Io(io::Error::other(format!("injected {operation} failure")))
}

impl StorageBackend for FaultBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.inner.read_at(offset, len)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        if self.state.fail_append.load(Ordering::SeqCst) {
            return Err(injected("append"));
        }
        self.inner.append(data)
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> StorageResult<()> {
        if self.state.fail_write.load(Ordering::SeqCst) {
            return Err(injected("write"));
        }
        self.inner.write_at(offset, data)
    }

    fn flush(&mut self) -> StorageResult<()> {
        if self.state.fail_flush.load(Ordering::SeqCst) {
            return Err(injected("flush"));
        }
        self.inner.flush()
    }

    fn sync(&mut self) -> StorageResult<()> {
        if self.state.fail_sync.load(Ordering::SeqCst) {
            return Err(injected("sync"));
        }
        self.inner.sync()
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.size()
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        self.inner.truncate(new_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mboxidx_storage::MemoryBackend;

    #[test]
    fn passes_through_until_armed() {
        let (mut backend, faults) = FaultBackend::new(Box::new(MemoryBackend::new()));

        backend.append(b"fine").unwrap();
        backend.sync().unwrap();

        faults.fail_sync(true);
        assert!(backend.sync().is_err());
        assert!(backend.flush().is_ok());

        faults.fail_sync(false);
        backend.sync().unwrap();
    }

    #[test]
    fn armed_append_leaves_inner_untouched() {
        let (mut backend, faults) = FaultBackend::new(Box::new(MemoryBackend::new()));
        backend.append(b"kept").unwrap();

        faults.fail_append(true);
        assert!(backend.append(b"lost").is_err());
        assert_eq!(backend.size().unwrap(), 4);
        assert_eq!(backend.read_at(0, 4).unwrap(), b"kept");
    }

    #[test]
    fn write_toggle_is_independent() {
        let (mut backend, faults) = FaultBackend::new(Box::new(MemoryBackend::new()));
        backend.append(b"abcd").unwrap();

        faults.fail_write(true);
        assert!(backend.write_at(0, b"XY").is_err());
        faults.fail_write(false);
        backend.write_at(0, b"XY").unwrap();
        assert_eq!(backend.read_at(0, 4).unwrap(), b"XYcd");
    }
}
