//! The mail index: record storage, staged updates, identity assignment.

use crate::error::{EngineError, EngineResult};
use crate::header::{IndexHeader, HEADER_SIZE};
use crate::lock::{FsLock, IndexLock, LocalLock};
use crate::record::{IndexRecord, RECORD_SIZE};
use crate::types::{MessageFlags, RecordId, RecordState, Uid};
use mboxidx_storage::{FileBackend, StorageBackend};
use std::path::Path;
use tracing::{debug, warn};

/// A committed record, as readers see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommittedRecord {
    /// Durable identity of the message.
    pub uid: Uid,
    /// Status flags derived from the message headers.
    pub flags: MessageFlags,
    /// Internal date as Unix seconds.
    pub internal_date: i64,
    /// Absolute archive offset of the message's first header byte.
    pub location: u64,
    /// Byte length of the message extent.
    pub length: u64,
    /// 128-bit digest of the scanned header bytes.
    pub fingerprint: [u8; 16],
}

/// The durable mail index.
///
/// A fixed header followed by fixed-size record slots, one per message.
/// Appending a message is a two-phase protocol:
///
/// 1. [`append_provisional`](Self::append_provisional) adds a slot with no
///    identity. Provisional records never appear in
///    [`committed`](Self::committed) enumeration.
/// 2. The caller fills in fields through a [`RecordUpdate`], applies status
///    flags, calls [`force_flush`](Self::force_flush), and only then
///    [`assign_identity`](Self::assign_identity).
///
/// Because the UID write comes after the flush, a crash anywhere in the
/// protocol leaves a record indistinguishable from "never indexed". Such
/// residue is reclaimed on the next open: trailing provisional slots are
/// truncated away, and a provisional slot wedged between committed ones
/// marks the index as needing a consistency re-check.
pub struct MailIndex {
    backend: Box<dyn StorageBackend>,
    lock: Box<dyn IndexLock>,
    header: IndexHeader,
    records: Vec<IndexRecord>,
    locked: bool,
}

impl MailIndex {
    /// Opens an index over the given backend with a process-local lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored header is invalid or I/O fails.
    pub fn open(backend: Box<dyn StorageBackend>) -> EngineResult<Self> {
        Self::open_with_lock(backend, Box::new(LocalLock::new()))
    }

    /// Opens a file-backed index at `path`, locking via `<path>.lock`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or is not a valid
    /// index file.
    pub fn open_path(path: &Path) -> EngineResult<Self> {
        let backend = FileBackend::open(path)?;

        let mut lock_name = path.as_os_str().to_owned();
        lock_name.push(".lock");
        let lock = FsLock::new(std::path::PathBuf::from(lock_name));

        Self::open_with_lock(Box::new(backend), Box::new(lock))
    }

    /// Opens an index over the given backend and lock implementation.
    ///
    /// A zero-length backend is initialized with a fresh header. Torn or
    /// provisional slots left behind by a crash are reclaimed here.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored header is invalid or I/O fails.
    pub fn open_with_lock(
        mut backend: Box<dyn StorageBackend>,
        lock: Box<dyn IndexLock>,
    ) -> EngineResult<Self> {
        let size = backend.size()?;

        let (header, records) = if size == 0 {
            let header = IndexHeader::new();
            backend.append(&header.encode())?;
            backend.sync()?;
            (header, Vec::new())
        } else {
            if size < HEADER_SIZE as u64 {
                return Err(EngineError::invalid_format(
                    "index file shorter than its header",
                ));
            }
            let header = IndexHeader::decode(&backend.read_at(0, HEADER_SIZE)?)?;
            let records = Self::load_records(backend.as_mut(), size)?;
            (header, records)
        };

        let mut index = Self {
            backend,
            lock,
            header,
            records,
            locked: false,
        };
        index.reclaim_residue()?;

        debug!(
            slots = index.records.len(),
            next_uid = index.header.next_uid,
            sync_offset = index.header.sync_offset,
            "index opened"
        );
        Ok(index)
    }

    fn load_records(backend: &mut dyn StorageBackend, size: u64) -> EngineResult<Vec<IndexRecord>> {
        let body = size - HEADER_SIZE as u64;
        let torn = (body % RECORD_SIZE as u64) as usize;
        if torn != 0 {
            // a crash mid-append left a partial slot at the tail
            warn!(bytes = torn, "truncating torn record slot");
            backend.truncate(size - torn as u64)?;
        }

        let count = (body / RECORD_SIZE as u64) as usize;
        let mut records = Vec::with_capacity(count);
        for slot in 0..count {
            let offset = HEADER_SIZE as u64 + (slot * RECORD_SIZE) as u64;
            records.push(IndexRecord::decode(&backend.read_at(offset, RECORD_SIZE)?)?);
        }
        Ok(records)
    }

    /// Drops trailing provisional slots; flags interior ones.
    fn reclaim_residue(&mut self) -> EngineResult<()> {
        let keep = self
            .records
            .iter()
            .rposition(|record| record.state.is_committed())
            .map_or(0, |last| last + 1);

        if keep < self.records.len() {
            warn!(
                reclaimed = self.records.len() - keep,
                "reclaiming provisional records left by a crash"
            );
            self.backend.truncate(Self::record_offset(keep))?;
            self.records.truncate(keep);
        }

        if self.records.iter().any(|r| !r.state.is_committed()) && !self.header.needs_check {
            warn!("provisional record between committed ones; requesting consistency re-check");
            self.mark_needs_check()?;
        }
        Ok(())
    }

    fn record_offset(slot: usize) -> u64 {
        HEADER_SIZE as u64 + (slot * RECORD_SIZE) as u64
    }

    fn write_header(&mut self) -> EngineResult<()> {
        self.backend.write_at(0, &self.header.encode())?;
        Ok(())
    }

    fn write_record(&mut self, slot: usize) -> EngineResult<()> {
        let bytes = self.records[slot].encode();
        self.backend.write_at(Self::record_offset(slot), &bytes)?;
        Ok(())
    }

    fn slot(&self, id: RecordId) -> EngineResult<usize> {
        let slot = id.as_u32() as usize;
        if slot >= self.records.len() {
            return Err(EngineError::invalid_operation(format!(
                "no record at {id}"
            )));
        }
        Ok(slot)
    }

    /// Acquires the exclusive lock for a batch of appends.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Locked`] on contention; nothing is mutated in
    /// that case. Acquiring twice without an intervening
    /// [`unlock`](Self::unlock) is an error.
    pub fn lock_exclusive(&mut self) -> EngineResult<()> {
        if self.locked {
            return Err(EngineError::invalid_operation(
                "exclusive lock already held",
            ));
        }
        self.lock.try_exclusive()?;
        self.locked = true;
        Ok(())
    }

    /// Releases the exclusive lock. Idempotent.
    pub fn unlock(&mut self) {
        if self.locked {
            self.lock.release();
            self.locked = false;
        }
    }

    /// Returns whether this index currently holds the exclusive lock.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Appends a provisional record carrying only the internal date.
    ///
    /// The record is invisible to readers until
    /// [`assign_identity`](Self::assign_identity).
    ///
    /// # Errors
    ///
    /// Returns an error if the append fails; the index remains usable.
    pub fn append_provisional(&mut self, internal_date: i64) -> EngineResult<RecordId> {
        if self.records.len() >= u32::MAX as usize {
            return Err(EngineError::invalid_operation("record slots exhausted"));
        }

        let record = IndexRecord::provisional(internal_date);
        self.backend.append(&record.encode())?;
        self.records.push(record);
        Ok(RecordId::new((self.records.len() - 1) as u32))
    }

    /// Begins a staged field update on a record.
    ///
    /// Staged fields are persisted together by [`RecordUpdate::end`];
    /// dropping the update without calling `end` discards them.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` does not name a record.
    pub fn begin_update(&mut self, id: RecordId) -> EngineResult<RecordUpdate<'_>> {
        self.slot(id)?;
        Ok(RecordUpdate {
            index: self,
            id,
            location: None,
            length: None,
            fingerprint: None,
        })
    }

    /// Applies derived status flags to a record.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` does not name a record or the write fails.
    pub fn set_flags(&mut self, id: RecordId, flags: MessageFlags) -> EngineResult<()> {
        let slot = self.slot(id)?;
        self.records[slot].flags = flags;
        self.write_record(slot)
    }

    /// Durably persists everything written to the index so far.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush or fsync fails; in that case no
    /// identity should be assigned, leaving the current record invisible.
    pub fn force_flush(&mut self) -> EngineResult<()> {
        self.backend.flush()?;
        self.backend.sync()?;
        Ok(())
    }

    /// Assigns the next UID to a provisional record, committing it.
    ///
    /// This is the last step of the append protocol and the sole signal
    /// that the record is complete; call it only after a successful
    /// [`force_flush`](Self::force_flush).
    ///
    /// # Errors
    ///
    /// Returns an error if the record is already committed or I/O fails.
    pub fn assign_identity(&mut self, id: RecordId) -> EngineResult<Uid> {
        let slot = self.slot(id)?;
        if self.records[slot].state.is_committed() {
            return Err(EngineError::invalid_operation(format!(
                "record at {id} already has an identity"
            )));
        }
        if self.header.next_uid == u32::MAX {
            return Err(EngineError::invalid_operation("identity space exhausted"));
        }

        let uid = Uid::new(self.header.next_uid);
        self.records[slot].state = RecordState::Committed(uid);
        self.write_record(slot)?;

        self.header.next_uid += 1;
        self.write_header()?;
        Ok(uid)
    }

    /// Requests a full consistency re-check before further indexing.
    ///
    /// The flag is persisted and flushed immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if the header write or flush fails.
    pub fn mark_needs_check(&mut self) -> EngineResult<()> {
        self.header.needs_check = true;
        self.write_header()?;
        self.force_flush()
    }

    /// Returns whether a consistency re-check has been requested.
    #[must_use]
    pub fn needs_check(&self) -> bool {
        self.header.needs_check
    }

    /// Returns the archive offset up to which messages are committed.
    #[must_use]
    pub fn sync_offset(&self) -> u64 {
        self.header.sync_offset
    }

    /// Records the archive offset up to which messages are committed.
    ///
    /// Persisted with the next flush rather than immediately; the offset
    /// only ever covers already-committed messages, so losing it merely
    /// re-scans bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the header write fails.
    pub fn set_sync_offset(&mut self, offset: u64) -> EngineResult<()> {
        self.header.sync_offset = offset;
        self.write_header()
    }

    /// Enumerates committed records in slot order.
    ///
    /// Provisional records never appear here; that is the whole
    /// crash-consistency contract.
    pub fn committed(&self) -> impl Iterator<Item = CommittedRecord> + '_ {
        self.records.iter().filter_map(|record| {
            record.state.uid().map(|uid| CommittedRecord {
                uid,
                flags: record.flags,
                internal_date: record.internal_date,
                location: record.location,
                length: record.length,
                fingerprint: record.fingerprint,
            })
        })
    }

    /// Returns the record at `id`, committed or not. Intended for tests
    /// and diagnostics.
    #[must_use]
    pub fn record(&self, id: RecordId) -> Option<&IndexRecord> {
        self.records.get(id.as_u32() as usize)
    }

    /// Returns the total number of record slots, provisional included.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.records.len()
    }
}

impl Drop for MailIndex {
    fn drop(&mut self) {
        self.unlock();
    }
}

impl std::fmt::Debug for MailIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailIndex")
            .field("slots", &self.records.len())
            .field("next_uid", &self.header.next_uid)
            .field("locked", &self.locked)
            .finish_non_exhaustive()
    }
}

/// A staged field update on one record.
///
/// Obtained from [`MailIndex::begin_update`]. Setters stage values in
/// memory; [`end`](Self::end) persists them in one slot write. Dropping
/// the update without `end` leaves the record untouched.
pub struct RecordUpdate<'a> {
    index: &'a mut MailIndex,
    id: RecordId,
    location: Option<u64>,
    length: Option<u64>,
    fingerprint: Option<[u8; 16]>,
}

impl RecordUpdate<'_> {
    /// Stages the message location field.
    pub fn set_location(&mut self, location: u64) {
        self.location = Some(location);
    }

    /// Stages the message extent length field.
    pub fn set_length(&mut self, length: u64) {
        self.length = Some(length);
    }

    /// Stages the header fingerprint field.
    pub fn set_fingerprint(&mut self, fingerprint: [u8; 16]) {
        self.fingerprint = Some(fingerprint);
    }

    /// Persists the staged fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot write fails; the on-disk record then
    /// keeps its previous contents and stays provisional.
    pub fn end(self) -> EngineResult<()> {
        let slot = self.index.slot(self.id)?;
        {
            let record = &mut self.index.records[slot];
            if let Some(location) = self.location {
                record.location = location;
            }
            if let Some(length) = self.length {
                record.length = length;
            }
            if let Some(fingerprint) = self.fingerprint {
                record.fingerprint = fingerprint;
            }
        }
        self.index.write_record(slot)
    }
}
