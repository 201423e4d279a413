//! In-memory storage backend for tests and ephemeral indexes.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;

/// An in-memory storage backend.
///
/// Holds all bytes in a `Vec`. `flush` and `sync` are no-ops; "durability"
/// ends with the process, which is exactly what unit tests and throwaway
/// indexes want.
///
/// # Example
///
/// ```rust
/// use mboxidx_storage::{MemoryBackend, StorageBackend};
///
/// let mut backend = MemoryBackend::from_bytes(b"From a@b\n".to_vec());
/// assert_eq!(backend.size().unwrap(), 9);
/// ```
#[derive(Debug, Default)]
pub struct MemoryBackend {
    data: RwLock<Vec<u8>>,
}

impl MemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend pre-loaded with existing bytes.
    ///
    /// Useful for replaying recovery scenarios against a known image.
    #[must_use]
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    /// Returns a copy of all bytes currently in the backend.
    #[must_use]
    pub fn bytes(&self) -> Vec<u8> {
        self.data.read().clone()
    }
}

impl StorageBackend for MemoryBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let data = self.data.read();
        let size = data.len() as u64;
        let start = offset as usize;
        let end = start.saturating_add(len);

        if offset > size || end > data.len() {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }
        Ok(data[start..end].to_vec())
    }

    fn append(&mut self, new_data: &[u8]) -> StorageResult<u64> {
        let mut data = self.data.write();
        let offset = data.len() as u64;
        data.extend_from_slice(new_data);
        Ok(offset)
    }

    fn write_at(&mut self, offset: u64, new_data: &[u8]) -> StorageResult<()> {
        let mut data = self.data.write();
        let size = data.len() as u64;
        let start = offset as usize;
        let end = start.saturating_add(new_data.len());

        if offset > size || end > data.len() {
            return Err(StorageError::WritePastEnd {
                offset,
                len: new_data.len(),
                size,
            });
        }
        data[start..end].copy_from_slice(new_data);
        Ok(())
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.data.read().len() as u64)
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let mut data = self.data.write();
        let size = data.len() as u64;

        if new_size > size {
            return Err(StorageError::TruncateBeyondEnd {
                requested: new_size,
                size,
            });
        }
        data.truncate(new_size as usize);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_backend_is_empty() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.size().unwrap(), 0);
        assert!(backend.bytes().is_empty());
    }

    #[test]
    fn append_returns_offsets() {
        let mut backend = MemoryBackend::new();
        assert_eq!(backend.append(b"one").unwrap(), 0);
        assert_eq!(backend.append(b"two").unwrap(), 3);
        assert_eq!(backend.size().unwrap(), 6);
    }

    #[test]
    fn read_at_returns_written_bytes() {
        let mut backend = MemoryBackend::new();
        backend.append(b"From a@b Thu Nov 29 2001").unwrap();

        assert_eq!(backend.read_at(0, 4).unwrap(), b"From");
        assert_eq!(backend.read_at(5, 3).unwrap(), b"a@b");
    }

    #[test]
    fn read_past_end_fails() {
        let mut backend = MemoryBackend::new();
        backend.append(b"short").unwrap();

        assert!(matches!(
            backend.read_at(4, 8),
            Err(StorageError::ReadPastEnd { .. })
        ));
    }

    #[test]
    fn write_at_patches_in_place() {
        let mut backend = MemoryBackend::from_bytes(b"....slot".to_vec());
        backend.write_at(0, b"HEAD").unwrap();

        assert_eq!(backend.bytes(), b"HEADslot");
    }

    #[test]
    fn write_at_cannot_grow_the_store() {
        let mut backend = MemoryBackend::from_bytes(b"1234".to_vec());

        assert!(matches!(
            backend.write_at(2, b"56789"),
            Err(StorageError::WritePastEnd { .. })
        ));
        assert_eq!(backend.size().unwrap(), 4);
    }

    #[test]
    fn truncate_drops_tail() {
        let mut backend = MemoryBackend::from_bytes(b"keep-tail".to_vec());
        backend.truncate(4).unwrap();

        assert_eq!(backend.bytes(), b"keep");
        assert!(matches!(
            backend.truncate(100),
            Err(StorageError::TruncateBeyondEnd { .. })
        ));
    }

    #[test]
    fn zero_length_operations() {
        let mut backend = MemoryBackend::new();
        backend.append(b"x").unwrap();

        assert!(backend.read_at(1, 0).unwrap().is_empty());
        backend.write_at(1, b"").unwrap();
        assert_eq!(backend.append(b"").unwrap(), 1);
    }
}
