//! Header scanning: status flags and the content fingerprint.
//!
//! The orchestrator hands the scanner a [`BoundedView`] over one message's
//! extent. [`HeaderLines`] iterates the raw header lines (terminators
//! included) up to and including the blank line that ends the headers;
//! [`scan_headers`] folds over them to derive the message's status flags
//! and accumulate a 128-bit MD5 fingerprint over exactly the bytes
//! scanned. Body bytes never enter the fold, so the fingerprint keys on
//! headers alone.
//!
//! Flags follow the mbox status conventions: `Status: R` marks a message
//! seen; `X-Status:` letters `A`, `F`, `D` and `T` mark it answered,
//! flagged, deleted and draft.

use crate::error::SyncResult;
use crate::stream::BoundedView;
use md5::{Digest, Md5};
use mboxidx_engine::MessageFlags;
use memchr::memchr;

/// What the header scan derives from one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderSummary {
    /// Status flags derived from recognized headers.
    pub flags: MessageFlags,
    /// 128-bit digest over the scanned header bytes.
    pub fingerprint: [u8; 16],
}

/// Iterator over the raw header lines of a message extent.
///
/// Yields each line with its terminator bytes intact. Iteration ends
/// after the blank line separating headers from body, or at the extent's
/// end for messages without a body.
pub struct HeaderLines<'a> {
    view: BoundedView<'a>,
    done: bool,
}

impl<'a> HeaderLines<'a> {
    /// Creates the iterator over a message extent.
    #[must_use]
    pub fn new(view: BoundedView<'a>) -> Self {
        Self { view, done: false }
    }
}

impl Iterator for HeaderLines<'_> {
    type Item = SyncResult<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.view.next_line() {
            Ok(Some(line)) => {
                if strip_terminator(&line).is_empty() {
                    self.done = true;
                }
                Some(Ok(line))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err.into()))
            }
        }
    }
}

fn strip_terminator(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn apply_status(line: &[u8], flags: &mut MessageFlags) {
    let Some(colon) = memchr(b':', line) else {
        return;
    };
    let name = line[..colon].trim_ascii();
    let value = &line[colon + 1..];

    if name.eq_ignore_ascii_case(b"status") {
        for &byte in value {
            if byte == b'R' {
                *flags |= MessageFlags::SEEN;
            }
        }
    } else if name.eq_ignore_ascii_case(b"x-status") {
        for &byte in value {
            match byte {
                b'A' => *flags |= MessageFlags::ANSWERED,
                b'F' => *flags |= MessageFlags::FLAGGED,
                b'D' => *flags |= MessageFlags::DELETED,
                b'T' => *flags |= MessageFlags::DRAFT,
                _ => {}
            }
        }
    }
}

/// Folds over a message's header lines, producing flags and fingerprint.
///
/// # Errors
///
/// Returns an error if reading the archive fails mid-scan.
pub fn scan_headers(view: BoundedView<'_>) -> SyncResult<HeaderSummary> {
    let mut digest = Md5::new();
    let mut flags = MessageFlags::empty();

    for line in HeaderLines::new(view) {
        let line = line?;
        digest.update(&line);
        apply_status(strip_terminator(&line), &mut flags);
    }

    Ok(HeaderSummary {
        flags,
        fingerprint: digest.finalize().into(),
    })
}
