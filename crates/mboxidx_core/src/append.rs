//! The append orchestrator: one message's full lifecycle.

use crate::boundary::find_message_end;
use crate::clock::Clock;
use crate::envelope::{is_envelope, parse_envelope_date};
use crate::error::{SyncError, SyncResult};
use crate::header::scan_headers;
use crate::stream::ArchiveStream;
use mboxidx_engine::MailIndex;
use tracing::warn;

/// Longest envelope line accepted before the archive is declared corrupt.
const MAX_ENVELOPE_LINE: usize = 8192;

/// Flags a structural violation: persists the consistency-check request on
/// the index (best effort) and produces the batch-aborting error.
pub(crate) fn structural(index: &mut MailIndex, message: &str) -> SyncError {
    if let Err(err) = index.mark_needs_check() {
        warn!(error = %err, "failed to persist consistency-check request");
    }
    SyncError::corrupt(message)
}

/// Indexes the single message the stream is positioned at.
///
/// Expects the cursor on the first byte of an envelope line. On success
/// the message is durably committed, the cursor rests on the message's
/// stop offset, and the persisted resume offset has advanced past it.
///
/// Failure modes follow the batch's abort taxonomy: a malformed or
/// missing envelope line is structural corruption; any engine failure
/// after record creation leaves the record provisional, to be reclaimed
/// when the index is next opened; a flush failure means no identity is
/// ever assigned, so the record stays invisible - the same outcome as a
/// crash.
pub(crate) fn append_message(
    index: &mut MailIndex,
    stream: &mut ArchiveStream<'_>,
    clock: &dyn Clock,
) -> SyncResult<()> {
    let line = match stream.read_line(MAX_ENVELOPE_LINE)? {
        Some(line) if is_envelope(&line) => line,
        _ => return Err(structural(index, "envelope line not found where expected")),
    };

    // a garbled date is never fatal; fall back to the injected clock
    let internal_date = parse_envelope_date(&line)
        .unwrap_or_else(|| clock.now())
        .timestamp();

    let location = stream.offset();
    let stop = find_message_end(stream)?.stop();

    let id = index.append_provisional(internal_date)?;

    let mut update = index.begin_update(id)?;
    update.set_location(location);
    update.set_length(stop - location);
    let summary = scan_headers(stream.view(location, stop))?;
    update.set_fingerprint(summary.fingerprint);
    update.end()?;

    index.set_flags(id, summary.flags)?;
    index.force_flush()?;
    index.assign_identity(id)?;
    index.set_sync_offset(stop)?;
    Ok(())
}
