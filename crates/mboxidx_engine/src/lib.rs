//! # mboxidx Engine
//!
//! The durable index engine for mboxidx.
//!
//! An index file holds a fixed header followed by fixed-size record slots,
//! one per message of the archive. Records go through a two-phase life:
//! they are appended *provisional* (no identity, invisible to readers),
//! filled in field by field, durably flushed, and only then assigned a UID.
//! A crash at any point before the UID write leaves a record that readers
//! can never observe; such residue is reclaimed the next time the index is
//! opened.
//!
//! This crate provides:
//! - [`MailIndex`] - record storage, staged updates, identity assignment
//! - [`IndexLock`] / [`FsLock`] / [`LocalLock`] - exclusive batch locking
//! - [`MessageFlags`] / [`RecordState`] - per-record metadata types

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod header;
mod index;
mod lock;
mod record;
mod types;

pub use error::{EngineError, EngineResult};
pub use index::{CommittedRecord, MailIndex, RecordUpdate};
pub use lock::{FsLock, IndexLock, LocalLock};
pub use record::{IndexRecord, RECORD_SIZE};
pub use types::{MessageFlags, RecordId, RecordState, Uid};
