//! Error types for archive indexing.

use thiserror::Error;

/// Result type for archive indexing operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can abort a batch of archive indexing.
///
/// Every variant aborts the whole batch; already-committed records are
/// never rolled back, and no record is ever partially visible.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Reading the archive failed.
    #[error("archive storage error: {0}")]
    Storage(#[from] mboxidx_storage::StorageError),

    /// The index engine failed (lock contention, record or flush failure).
    #[error("index error: {0}")]
    Index(#[from] mboxidx_engine::EngineError),

    /// The archive violates the envelope/separator structure.
    ///
    /// Position integrity for everything after the violation is
    /// untrustworthy, so the index has been marked for a full consistency
    /// re-check.
    #[error("archive corrupted: {message}")]
    Corrupt {
        /// Description of the structural violation.
        message: String,
    },
}

impl SyncError {
    /// Creates a structural corruption error.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt {
            message: message.into(),
        }
    }
}
