//! # mboxidx Storage
//!
//! Byte-store backends for mboxidx.
//!
//! A backend is an opaque, flat byte store. It knows nothing about index
//! headers, record slots, or mbox framing; the engine crate owns all format
//! interpretation. Backends only provide positioned reads, appends, bounded
//! in-place overwrites, and durability barriers.
//!
//! ## Available backends
//!
//! - [`FileBackend`] - persistent storage using OS file APIs
//! - [`MemoryBackend`] - tests and ephemeral indexes
//!
//! ## Example
//!
//! ```rust
//! use mboxidx_storage::{MemoryBackend, StorageBackend};
//!
//! let mut backend = MemoryBackend::new();
//! let offset = backend.append(b"record bytes").unwrap();
//! assert_eq!(backend.read_at(offset, 12).unwrap(), b"record bytes");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::MemoryBackend;
