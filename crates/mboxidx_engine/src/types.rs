//! Core type definitions for the index engine.

use bitflags::bitflags;
use std::fmt;

/// Durable identity of a committed record.
///
/// UIDs are allocated from the index header's counter, start at 1, increase
/// monotonically and are never reused. The on-disk value 0 means "no
/// identity assigned yet"; [`Uid`] itself is always non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Uid(u32);

impl Uid {
    /// Creates a UID from its raw value.
    #[must_use]
    pub const fn new(uid: u32) -> Self {
        Self(uid)
    }

    /// Returns the raw UID value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "uid:{}", self.0)
    }
}

/// Position of a record slot within the index file.
///
/// Slot positions are handles for the duration of one open index; they are
/// not durable identities (that is what [`Uid`] is for).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId(u32);

impl RecordId {
    /// Creates a record ID from a slot position.
    #[must_use]
    pub const fn new(slot: u32) -> Self {
        Self(slot)
    }

    /// Returns the slot position.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot:{}", self.0)
    }
}

/// Visibility state of an index record.
///
/// Only `Committed` records are enumerable; a `Provisional` record is
/// either mid-append or crash residue awaiting reclamation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    /// Created but not yet assigned an identity; invisible to readers.
    Provisional,
    /// Fully written, durably flushed, and identified.
    Committed(Uid),
}

impl RecordState {
    /// Returns whether the record is committed.
    #[must_use]
    pub const fn is_committed(self) -> bool {
        matches!(self, Self::Committed(_))
    }

    /// Returns the UID for committed records.
    #[must_use]
    pub const fn uid(self) -> Option<Uid> {
        match self {
            Self::Committed(uid) => Some(uid),
            Self::Provisional => None,
        }
    }
}

bitflags! {
    /// Message status flags derived from mbox `Status:` / `X-Status:`
    /// headers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MessageFlags: u32 {
        /// The message has been read (`Status: R`).
        const SEEN = 1 << 0;
        /// The message has been answered (`X-Status: A`).
        const ANSWERED = 1 << 1;
        /// The message is flagged (`X-Status: F`).
        const FLAGGED = 1 << 2;
        /// The message is marked deleted (`X-Status: D`).
        const DELETED = 1 << 3;
        /// The message is a draft (`X-Status: T`).
        const DRAFT = 1 << 4;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uid_ordering_and_display() {
        assert!(Uid::new(1) < Uid::new(2));
        assert_eq!(format!("{}", Uid::new(7)), "uid:7");
    }

    #[test]
    fn record_state_accessors() {
        assert!(!RecordState::Provisional.is_committed());
        assert_eq!(RecordState::Provisional.uid(), None);

        let committed = RecordState::Committed(Uid::new(3));
        assert!(committed.is_committed());
        assert_eq!(committed.uid(), Some(Uid::new(3)));
    }

    #[test]
    fn message_flags_compose() {
        let flags = MessageFlags::SEEN | MessageFlags::ANSWERED;
        assert!(flags.contains(MessageFlags::SEEN));
        assert!(!flags.contains(MessageFlags::DELETED));
    }
}
