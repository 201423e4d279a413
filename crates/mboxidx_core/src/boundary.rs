//! Message boundary detection.
//!
//! mbox delimits messages by convention, not framing: a message ends where
//! the next line starts with the literal `From `. The scanner looks for a
//! line terminator immediately followed by `From ` - searching for the
//! 6-byte `\nFrom ` pattern makes line-initialness part of the match, so a
//! `From ` in the middle of a line can never be mistaken for a boundary.
//! No unescaping is attempted; this is a boundary detector, not a content
//! rewriter.
//!
//! [`scan_window`] is a pure function over a byte slice so the tricky
//! cases are unit-testable without I/O; [`find_message_end`] drives it
//! over an [`ArchiveStream`], keeping just enough trailing bytes across
//! refills that a pattern spanning two reads is never missed.

use crate::error::SyncResult;
use crate::stream::ArchiveStream;
use memchr::memmem;

/// A line terminator immediately followed by the next envelope line.
const BOUNDARY_PATTERN: &[u8] = b"\nFrom ";

/// Trailing bytes that must survive a refill so a boundary spanning two
/// reads (a partial pattern at the window's edge, or the `\r` before it)
/// can still complete.
const BOUNDARY_TAIL: usize = BOUNDARY_PATTERN.len();

/// Outcome of scanning one buffered window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowScan {
    /// A boundary starts at this window offset (at the `\n`, or at the
    /// `\r` directly before it).
    Boundary(usize),
    /// No boundary in this window. The last `keep` bytes could still be
    /// the start of one and must be retained; everything before them may
    /// be skipped forever.
    Incomplete {
        /// Number of trailing bytes to retain across the next refill.
        keep: usize,
    },
}

/// Scans a window for the next message boundary.
///
/// The window starts at or after the first byte following an envelope
/// line; a leading `\nFrom ` therefore marks an empty message whose
/// extent ends right where it began.
#[must_use]
pub fn scan_window(window: &[u8]) -> WindowScan {
    match memmem::find(window, BOUNDARY_PATTERN) {
        Some(i) if i > 0 && window[i - 1] == b'\r' => WindowScan::Boundary(i - 1),
        Some(i) => WindowScan::Boundary(i),
        None => WindowScan::Incomplete {
            keep: window.len().min(BOUNDARY_TAIL),
        },
    }
}

/// Where the current message ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageEnd {
    /// The extent's exclusive end offset; the separator before the next
    /// envelope line starts here.
    Boundary(u64),
    /// The extent's exclusive end offset of the final message. Trailing
    /// terminator bytes at end-of-content are excluded from the extent
    /// but not consumed.
    EndOfContent(u64),
}

impl MessageEnd {
    /// Returns the extent's exclusive end offset.
    #[must_use]
    pub fn stop(self) -> u64 {
        match self {
            Self::Boundary(stop) | Self::EndOfContent(stop) => stop,
        }
    }
}

/// Finds the end of the message the stream is positioned in.
///
/// Expects the cursor at the first byte after an envelope line. Advances
/// the cursor to the returned offset - onto the separator for
/// [`MessageEnd::Boundary`], before the trailing terminator (if any) for
/// [`MessageEnd::EndOfContent`] - and never consumes bytes past it.
/// Everything between is permanently consumed; it is never re-read.
///
/// The stream's logical end is the end of currently available content, so
/// exhausting it means this is the final message of this batch.
///
/// # Errors
///
/// Returns an error if reading the archive fails.
pub fn find_message_end(stream: &mut ArchiveStream<'_>) -> SyncResult<MessageEnd> {
    loop {
        match scan_window(stream.window()) {
            WindowScan::Boundary(i) => {
                let stop = stream.offset() + i as u64;
                stream.skip(i as u64);
                return Ok(MessageEnd::Boundary(stop));
            }
            WindowScan::Incomplete { keep } => {
                let len = stream.window().len();
                stream.skip((len - keep) as u64);
                if !stream.refill()? {
                    return Ok(MessageEnd::EndOfContent(finish_final(stream)));
                }
            }
        }
    }
}

/// Excludes the trailing `[\r]\n` at end-of-content from the final
/// message's extent and parks the cursor right before it.
fn finish_final(stream: &mut ArchiveStream<'_>) -> u64 {
    let tail = stream.window();
    let mut trim = 0usize;
    if tail.last() == Some(&b'\n') {
        trim = 1;
        if tail.len() >= 2 && tail[tail.len() - 2] == b'\r' {
            trim = 2;
        }
    }

    let stop = stream.end() - trim as u64;
    stream.skip((tail.len() - trim) as u64);
    stop
}
