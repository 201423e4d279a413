//! # mboxidx Testkit
//!
//! Test utilities for mboxidx.
//!
//! This crate provides:
//! - [`fault::FaultBackend`] - a storage backend wrapper with switchable
//!   failure injection, for crash and durability-failure scenarios
//! - [`archive::ArchiveBuilder`] - mbox byte-stream fixtures
//! - [`generators`] - proptest strategies for message bodies and archives

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod archive;
pub mod fault;
pub mod generators;

pub use archive::ArchiveBuilder;
pub use fault::{FaultBackend, FaultHandle};
