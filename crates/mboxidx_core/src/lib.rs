//! # mboxidx Core
//!
//! Incremental indexing of append-only mbox archives.
//!
//! An mbox archive has no length framing: messages are delimited by a
//! textual convention (a line starting with `From `), which can also occur
//! inside message content. This crate finds the real message boundaries in
//! a growing byte stream and commits each newly-arrived message into the
//! durable index with crash-consistent visibility: a record becomes visible
//! only after all of its fields are durably flushed and an identity is
//! assigned, so a crash at any earlier point is indistinguishable from
//! "not yet indexed".
//!
//! The entry point is [`append_new_messages`], which processes everything
//! the archive has gained since the last successful run under one
//! exclusive lock:
//!
//! ```no_run
//! use mboxidx_core::{append_new_messages, SystemClock};
//! use mboxidx_engine::MailIndex;
//! use mboxidx_storage::FileBackend;
//! use std::path::Path;
//!
//! let mut index = MailIndex::open_path(Path::new("inbox.idx")).unwrap();
//! let archive = FileBackend::open(Path::new("inbox.mbox")).unwrap();
//! append_new_messages(&mut index, &archive, &SystemClock).unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod append;
mod batch;
pub mod boundary;
pub mod clock;
pub mod envelope;
mod error;
pub mod header;
pub mod stream;

pub use batch::append_new_messages;
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{SyncError, SyncResult};
