//! Exclusive locking for index writers.
//!
//! One batch of archive indexing runs under one coarse exclusive lock.
//! File-backed indexes use an advisory lock on a sibling lock file so other
//! processes are excluded too; in-memory indexes fall back to a
//! process-local flag.

use crate::error::{EngineError, EngineResult};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::PathBuf;

/// Exclusive lock guarding one index.
///
/// Acquisition is non-blocking: contention surfaces as
/// [`EngineError::Locked`] rather than a wait, so a failed acquisition
/// leaves no partial state behind.
pub trait IndexLock: Send {
    /// Acquires the exclusive lock without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Locked`] if another holder has the lock, or
    /// an I/O error if the lock file cannot be opened.
    fn try_exclusive(&mut self) -> EngineResult<()>;

    /// Releases a previously acquired lock. Idempotent.
    fn release(&mut self);
}

/// Advisory file lock on a sibling lock file.
#[derive(Debug)]
pub struct FsLock {
    path: PathBuf,
    file: Option<File>,
}

impl FsLock {
    /// Creates an (unacquired) lock backed by the given lock file path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }
}

impl IndexLock for FsLock {
    fn try_exclusive(&mut self) -> EngineResult<()> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;

        if file.try_lock_exclusive().is_err() {
            return Err(EngineError::Locked);
        }
        self.file = Some(file);
        Ok(())
    }

    fn release(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = file.unlock();
        }
    }
}

/// Process-local lock for in-memory indexes.
#[derive(Debug, Default)]
pub struct LocalLock {
    held: bool,
}

impl LocalLock {
    /// Creates an (unacquired) process-local lock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl IndexLock for LocalLock {
    fn try_exclusive(&mut self) -> EngineResult<()> {
        if self.held {
            return Err(EngineError::Locked);
        }
        self.held = true;
        Ok(())
    }

    fn release(&mut self) {
        self.held = false;
    }
}
