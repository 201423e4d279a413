//! Storage backend trait definition.

use crate::error::StorageResult;

/// A low-level byte store underneath an mboxidx index file.
///
/// Backends are **opaque byte stores**: the index engine owns all format
/// interpretation (header layout, record slots), and the archive reader
/// treats a backend as a plain read-only byte source. Record slots are
/// appended once and then patched in place, so backends support bounded
/// overwrites in addition to appends.
///
/// # Invariants
///
/// - `append` returns the offset where the data landed
/// - `read_at` returns exactly the bytes most recently written at that range
/// - `write_at` never grows the store; it fails past the current size
/// - after `sync` returns, all previously written data survives process
///   termination
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the range extends beyond the current size or an
    /// I/O error occurs.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends data to the end of the store, returning the write offset.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Overwrites existing bytes at `offset`.
    ///
    /// The whole range must lie within the current size.
    ///
    /// # Errors
    ///
    /// Returns an error if the range extends beyond the current size or an
    /// I/O error occurs.
    fn write_at(&mut self, offset: u64, data: &[u8]) -> StorageResult<()>;

    /// Pushes all pending writes to the OS.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush operation fails.
    fn flush(&mut self) -> StorageResult<()>;

    /// Durably persists data and metadata (fsync).
    ///
    /// A stronger barrier than `flush`: after this returns, everything
    /// written so far survives a crash.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync operation fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Returns the current size of the store in bytes.
    ///
    /// This is the offset where the next `append` will write.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Truncates the store to `new_size` bytes.
    ///
    /// Used to reclaim torn or provisional record slots left behind by a
    /// crash.
    ///
    /// # Errors
    ///
    /// Returns an error if `new_size` exceeds the current size or the
    /// truncation fails.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;
}
