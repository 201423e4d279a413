//! The batch driver: index everything the archive has gained.

use crate::append::{append_message, structural};
use crate::clock::Clock;
use crate::error::SyncResult;
use crate::stream::ArchiveStream;
use mboxidx_engine::MailIndex;
use mboxidx_storage::StorageBackend;
use tracing::debug;

/// Indexes all messages newly available in the archive.
///
/// Resumes from the index's persisted offset and processes up to the
/// archive's current end. If nothing is new, returns success without
/// acquiring anything. Otherwise the whole batch runs under one exclusive
/// lock: separators are skipped between messages, and each message goes
/// through the full append protocol.
///
/// Any failure aborts the entire batch - there is no partial-success
/// return. Messages committed before the failure stay committed; the
/// resume offset only ever covers committed messages, so a later run
/// re-scans the rest without duplicating anything.
///
/// # Errors
///
/// - [`SyncError::Index`] on lock contention or any engine failure; lock
///   contention mutates nothing.
/// - [`SyncError::Corrupt`] when the envelope/separator structure is
///   violated (the index is then marked for a consistency re-check).
/// - [`SyncError::Storage`] when reading the archive fails.
///
/// [`SyncError::Index`]: crate::SyncError::Index
/// [`SyncError::Corrupt`]: crate::SyncError::Corrupt
/// [`SyncError::Storage`]: crate::SyncError::Storage
pub fn append_new_messages(
    index: &mut MailIndex,
    archive: &dyn StorageBackend,
    clock: &dyn Clock,
) -> SyncResult<()> {
    let start = index.sync_offset();
    let end = archive.size()?;

    if end == start {
        // no new data
        return Ok(());
    }
    if end < start {
        return Err(structural(
            index,
            "archive shrank below the indexed region",
        ));
    }

    index.lock_exclusive()?;
    let result = run_batch(index, archive, start, end, clock);
    index.unlock();
    result
}

fn run_batch(
    index: &mut MailIndex,
    archive: &dyn StorageBackend,
    start: u64,
    end: u64,
    clock: &dyn Clock,
) -> SyncResult<()> {
    let mut stream = ArchiveStream::new(archive, start, end);
    let mut appended = 0u64;

    loop {
        if stream.offset() != 0 {
            // we are at the [\r]\n before the next envelope line
            if stream.at_end() {
                break;
            }
            skip_separator(index, &mut stream)?;
        }
        if stream.at_end() {
            break;
        }

        append_message(index, &mut stream, clock)?;
        appended += 1;
    }

    if appended > 0 {
        // persist the last identity and resume-offset updates
        index.force_flush()?;
    }
    debug!(appended, scanned_to = end, "archive batch complete");
    Ok(())
}

/// Consumes exactly one line terminator (`\r\n` or `\n`) at the cursor.
///
/// Its absence means position integrity for everything that follows is
/// untrustworthy - structural corruption, not a per-message failure.
fn skip_separator(index: &mut MailIndex, stream: &mut ArchiveStream<'_>) -> SyncResult<()> {
    const MISSING: &str = "message separator not found where expected";

    while stream.window().is_empty() {
        if !stream.refill()? {
            return Err(structural(index, MISSING));
        }
    }

    match stream.window()[0] {
        b'\n' => {
            stream.skip(1);
            Ok(())
        }
        b'\r' => {
            while stream.window().len() < 2 {
                if !stream.refill()? {
                    return Err(structural(index, MISSING));
                }
            }
            if stream.window()[1] == b'\n' {
                stream.skip(2);
                Ok(())
            } else {
                Err(structural(index, MISSING))
            }
        }
        _ => Err(structural(index, MISSING)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::error::SyncError;
    use chrono::{TimeZone, Utc};
    use mboxidx_engine::{EngineError, MessageFlags};
    use mboxidx_storage::MemoryBackend;
    use mboxidx_testkit::archive::ArchiveBuilder;
    use mboxidx_testkit::fault::FaultBackend;
    use mboxidx_testkit::generators;
    use proptest::prelude::*;
    use tempfile::tempdir;

    const ENVELOPE: &str = "a@b Thu Nov 29 22:33:52 2001";

    fn fixed_clock() -> FixedClock {
        FixedClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
    }

    fn open_index() -> MailIndex {
        MailIndex::open(Box::new(MemoryBackend::new())).unwrap()
    }

    fn contents(index: &MailIndex, archive: &dyn StorageBackend) -> Vec<Vec<u8>> {
        index
            .committed()
            .map(|record| {
                archive
                    .read_at(record.location, record.length as usize)
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn two_message_archive_commits_both() {
        let archive =
            MemoryBackend::from_bytes(b"From a@b 1 Jan\nHello\nFrom c@d 2 Jan\nWorld\n".to_vec());
        let mut index = open_index();

        append_new_messages(&mut index, &archive, &fixed_clock()).unwrap();

        assert_eq!(contents(&index, &archive), vec![b"Hello".to_vec(), b"World".to_vec()]);
        let uids: Vec<u32> = index.committed().map(|r| r.uid.as_u32()).collect();
        assert_eq!(uids, vec![1, 2]);
        // resume offset sits before the final trailing terminator
        assert_eq!(index.sync_offset(), 41);
    }

    #[test]
    fn extents_reconstruct_message_bytes_verbatim() {
        let bodies: [&str; 3] = [
            "Subject: one\n\nfirst body",
            "",
            "Subject: three\n\nmulti\nline\n\nbody",
        ];
        let mut builder = ArchiveBuilder::new();
        for body in bodies {
            builder = builder.message(ENVELOPE, body);
        }
        let archive = builder.into_backend();
        let mut index = open_index();

        append_new_messages(&mut index, &archive, &fixed_clock()).unwrap();

        let expected: Vec<Vec<u8>> = bodies.iter().map(|b| b.as_bytes().to_vec()).collect();
        assert_eq!(contents(&index, &archive), expected);
    }

    #[test]
    fn mid_line_from_never_splits_a_message() {
        let body = "XFrom bob is content\nFromage too\nstill one message";
        let archive = ArchiveBuilder::new()
            .message(ENVELOPE, body)
            .message(ENVELOPE, "second")
            .into_backend();
        let mut index = open_index();

        append_new_messages(&mut index, &archive, &fixed_clock()).unwrap();

        assert_eq!(
            contents(&index, &archive),
            vec![body.as_bytes().to_vec(), b"second".to_vec()]
        );
    }

    #[test]
    fn final_terminator_variants_yield_the_same_extent() {
        let lf = ArchiveBuilder::new().message(ENVELOPE, "World").into_backend();
        let crlf = ArchiveBuilder::new()
            .message_crlf(ENVELOPE, "World")
            .into_backend();
        let bare = ArchiveBuilder::new()
            .message_unterminated(ENVELOPE, "World")
            .into_backend();

        for archive in [&lf, &crlf, &bare] {
            let mut index = open_index();
            append_new_messages(&mut index, archive, &fixed_clock()).unwrap();
            assert_eq!(contents(&index, archive), vec![b"World".to_vec()]);
        }
    }

    #[test]
    fn envelope_date_becomes_the_internal_date() {
        let archive = ArchiveBuilder::new()
            .message(ENVELOPE, "dated")
            .into_backend();
        let mut index = open_index();

        append_new_messages(&mut index, &archive, &fixed_clock()).unwrap();

        let expected = Utc
            .with_ymd_and_hms(2001, 11, 29, 22, 33, 52)
            .unwrap()
            .timestamp();
        assert_eq!(index.committed().next().unwrap().internal_date, expected);
    }

    #[test]
    fn garbled_date_falls_back_to_the_clock() {
        let archive = ArchiveBuilder::new()
            .message("a@b not a date", "undated")
            .into_backend();
        let mut index = open_index();
        let clock = fixed_clock();

        append_new_messages(&mut index, &archive, &clock).unwrap();

        assert_eq!(
            index.committed().next().unwrap().internal_date,
            clock.now().timestamp()
        );
    }

    #[test]
    fn status_headers_become_record_flags() {
        let archive = ArchiveBuilder::new()
            .message(ENVELOPE, "Status: RO\nX-Status: A\n\nhello")
            .into_backend();
        let mut index = open_index();

        append_new_messages(&mut index, &archive, &fixed_clock()).unwrap();

        assert_eq!(
            index.committed().next().unwrap().flags,
            MessageFlags::SEEN | MessageFlags::ANSWERED
        );
    }

    #[test]
    fn fingerprints_are_deterministic() {
        let build = || {
            ArchiveBuilder::new()
                .message(ENVELOPE, "Subject: stable\n\nbody")
                .into_backend()
        };

        let mut first = open_index();
        append_new_messages(&mut first, &build(), &fixed_clock()).unwrap();
        let mut second = open_index();
        append_new_messages(&mut second, &build(), &fixed_clock()).unwrap();

        assert_eq!(
            first.committed().next().unwrap().fingerprint,
            second.committed().next().unwrap().fingerprint
        );
        assert_ne!(first.committed().next().unwrap().fingerprint, [0u8; 16]);
    }

    #[test]
    fn rerun_without_new_bytes_is_a_noop() {
        let archive = ArchiveBuilder::new()
            .message(ENVELOPE, "Hello")
            .message(ENVELOPE, "World")
            .into_backend();
        let mut index = open_index();

        append_new_messages(&mut index, &archive, &fixed_clock()).unwrap();
        let offset = index.sync_offset();

        append_new_messages(&mut index, &archive, &fixed_clock()).unwrap();

        assert_eq!(index.committed().count(), 2);
        assert_eq!(index.slot_count(), 2);
        assert_eq!(index.sync_offset(), offset);
    }

    #[test]
    fn rerun_only_indexes_newly_appended_messages() {
        let mut archive = ArchiveBuilder::new()
            .message(ENVELOPE, "Hello")
            .message(ENVELOPE, "World")
            .into_backend();
        let mut index = open_index();

        append_new_messages(&mut index, &archive, &fixed_clock()).unwrap();
        let before: Vec<_> = index.committed().collect();

        archive
            .append(b"From e@f Thu Nov 29 22:33:52 2001\nThird\n")
            .unwrap();
        append_new_messages(&mut index, &archive, &fixed_clock()).unwrap();

        let after: Vec<_> = index.committed().collect();
        assert_eq!(after.len(), 3);
        // previously committed records are untouched
        assert_eq!(&after[..2], &before[..]);
        assert_eq!(
            contents(&index, &archive),
            vec![b"Hello".to_vec(), b"World".to_vec(), b"Third".to_vec()]
        );
    }

    #[test]
    fn empty_archive_is_a_noop() {
        let archive = MemoryBackend::new();
        let mut index = open_index();

        append_new_messages(&mut index, &archive, &fixed_clock()).unwrap();

        assert_eq!(index.slot_count(), 0);
        assert!(!index.needs_check());
    }

    #[test]
    fn missing_envelope_line_is_structural_corruption() {
        let archive = MemoryBackend::from_bytes(b"Garbage, not an envelope\nmore\n".to_vec());
        let mut index = open_index();

        let err = append_new_messages(&mut index, &archive, &fixed_clock()).unwrap_err();

        assert!(matches!(err, SyncError::Corrupt { .. }));
        assert!(index.needs_check());
        assert_eq!(index.committed().count(), 0);
    }

    #[test]
    fn unterminated_envelope_line_is_structural_corruption() {
        let archive = MemoryBackend::from_bytes(b"From a@b with no terminator at all".to_vec());
        let mut index = open_index();

        let err = append_new_messages(&mut index, &archive, &fixed_clock()).unwrap_err();

        assert!(matches!(err, SyncError::Corrupt { .. }));
        assert!(index.needs_check());
    }

    #[test]
    fn missing_separator_aborts_but_keeps_prior_commits() {
        let mut archive = ArchiveBuilder::new()
            .message_unterminated(ENVELOPE, "Hello")
            .into_backend();
        let mut index = open_index();

        append_new_messages(&mut index, &archive, &fixed_clock()).unwrap();
        assert_eq!(index.committed().count(), 1);

        // new bytes glued on without the separating terminator
        archive
            .append(b"From c@d Thu Nov 29 22:33:52 2001\nWorld\n")
            .unwrap();
        let err = append_new_messages(&mut index, &archive, &fixed_clock()).unwrap_err();

        assert!(matches!(err, SyncError::Corrupt { .. }));
        assert!(index.needs_check());
        // the earlier commit survives; nothing new became visible
        assert_eq!(contents(&index, &archive), vec![b"Hello".to_vec()]);
    }

    #[test]
    fn shrunken_archive_is_structural_corruption() {
        let archive = ArchiveBuilder::new()
            .message(ENVELOPE, "Hello there")
            .into_backend();
        let mut index = open_index();
        append_new_messages(&mut index, &archive, &fixed_clock()).unwrap();

        let truncated = MemoryBackend::from_bytes(b"From".to_vec());
        let err = append_new_messages(&mut index, &truncated, &fixed_clock()).unwrap_err();

        assert!(matches!(err, SyncError::Corrupt { .. }));
        assert!(index.needs_check());
    }

    #[test]
    fn flush_failure_leaves_the_record_invisible() {
        let (backend, faults) = FaultBackend::new(Box::new(MemoryBackend::new()));
        let mut index = MailIndex::open(Box::new(backend)).unwrap();
        let archive = ArchiveBuilder::new().message(ENVELOPE, "Hello").into_backend();

        faults.fail_sync(true);
        let err = append_new_messages(&mut index, &archive, &fixed_clock()).unwrap_err();

        assert!(matches!(err, SyncError::Index(_)));
        // all fields were written, but no identity: the record is not a
        // message, and the resume offset never moved
        assert_eq!(index.slot_count(), 1);
        assert_eq!(index.committed().count(), 0);
        assert_eq!(index.sync_offset(), 0);

        // once durability returns, a re-run indexes the message fresh
        faults.fail_sync(false);
        append_new_messages(&mut index, &archive, &fixed_clock()).unwrap();
        assert_eq!(index.committed().count(), 1);
        assert_eq!(index.slot_count(), 2);
    }

    #[test]
    fn record_creation_failure_aborts_the_batch() {
        let (backend, faults) = FaultBackend::new(Box::new(MemoryBackend::new()));
        let mut index = MailIndex::open(Box::new(backend)).unwrap();
        let archive = ArchiveBuilder::new().message(ENVELOPE, "Hello").into_backend();

        faults.fail_append(true);
        let err = append_new_messages(&mut index, &archive, &fixed_clock()).unwrap_err();

        assert!(matches!(err, SyncError::Index(_)));
        assert_eq!(index.slot_count(), 0);
        assert!(!index.needs_check());
    }

    #[test]
    fn lock_contention_aborts_with_nothing_mutated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mailbox.idx");
        let archive = ArchiveBuilder::new().message(ENVELOPE, "Hello").into_backend();

        let mut holder = MailIndex::open_path(&path).unwrap();
        holder.lock_exclusive().unwrap();

        let mut contender = MailIndex::open_path(&path).unwrap();
        let err = append_new_messages(&mut contender, &archive, &fixed_clock()).unwrap_err();

        assert!(matches!(err, SyncError::Index(EngineError::Locked)));
        assert_eq!(contender.slot_count(), 0);
        assert_eq!(contender.sync_offset(), 0);
    }

    #[test]
    fn crlf_archive_round_trips() {
        let body = "Status: R\r\n\r\nline one\r\nline two";
        let archive = ArchiveBuilder::new()
            .message_crlf(ENVELOPE, body)
            .message_crlf(ENVELOPE, "tail")
            .into_backend();
        let mut index = open_index();

        append_new_messages(&mut index, &archive, &fixed_clock()).unwrap();

        assert_eq!(
            contents(&index, &archive),
            vec![body.as_bytes().to_vec(), b"tail".to_vec()]
        );
        assert_eq!(
            index.committed().next().unwrap().flags,
            MessageFlags::SEEN
        );
    }

    proptest! {
        #[test]
        fn random_archives_index_every_message(bodies in generators::bodies()) {
            let mut builder = ArchiveBuilder::new();
            for body in &bodies {
                builder = builder.message(ENVELOPE, body);
            }
            let archive = builder.into_backend();
            let mut index = open_index();

            append_new_messages(&mut index, &archive, &fixed_clock()).unwrap();

            let records: Vec<_> = index.committed().collect();
            prop_assert_eq!(records.len(), bodies.len());
            for (record, body) in records.iter().zip(&bodies) {
                let bytes = archive
                    .read_at(record.location, record.length as usize)
                    .unwrap();
                prop_assert_eq!(bytes.as_slice(), body.as_bytes());
            }
        }
    }
}
