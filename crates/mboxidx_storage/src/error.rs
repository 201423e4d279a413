//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to read beyond the end of the store.
    #[error("read beyond end of store: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// The requested read offset.
        offset: u64,
        /// The requested read length.
        len: usize,
        /// The current store size.
        size: u64,
    },

    /// Attempted an in-place write beyond the end of the store.
    ///
    /// In-place writes may only overwrite existing bytes; growing the store
    /// goes through `append`.
    #[error("write beyond end of store: offset {offset}, len {len}, size {size}")]
    WritePastEnd {
        /// The requested write offset.
        offset: u64,
        /// The requested write length.
        len: usize,
        /// The current store size.
        size: u64,
    },

    /// Attempted to truncate the store to a larger size.
    #[error("cannot truncate to {requested} bytes: current size is {size}")]
    TruncateBeyondEnd {
        /// The requested new size.
        requested: u64,
        /// The current store size.
        size: u64,
    },
}
