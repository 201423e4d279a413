//! Buffered cursor over the archive byte stream.
//!
//! [`ArchiveStream`] is the scanner's view of the archive: an absolute
//! window `[start, end)` over a [`StorageBackend`], a cursor, and a lazily
//! refilled buffer. Bytes before the cursor are gone for good once the
//! buffer compacts; the boundary scanner controls how much trailing context
//! survives a refill by how far it advances the cursor.
//!
//! [`BoundedView`] is an independent reader over a sub-range, handed to the
//! header scan so it cannot read past the message boundary. The stream's
//! own cursor and end are never touched by a view, so there is nothing to
//! restore afterwards.

use memchr::memchr;
use mboxidx_storage::{StorageBackend, StorageResult};

/// Default refill granularity in bytes.
const DEFAULT_CHUNK: usize = 8 * 1024;

/// A buffered, forward-only cursor over a byte range of the archive.
pub struct ArchiveStream<'a> {
    source: &'a dyn StorageBackend,
    /// Logical end of the stream (exclusive, absolute).
    end: u64,
    /// Cursor (absolute). Never moves backwards.
    pos: u64,
    buf: Vec<u8>,
    /// Absolute offset of `buf[0]`.
    buf_start: u64,
    chunk: usize,
}

impl<'a> ArchiveStream<'a> {
    /// Creates a stream over `[start, end)` of the source.
    #[must_use]
    pub fn new(source: &'a dyn StorageBackend, start: u64, end: u64) -> Self {
        Self {
            source,
            end,
            pos: start,
            buf: Vec::new(),
            buf_start: start,
            chunk: DEFAULT_CHUNK,
        }
    }

    /// Overrides the refill granularity. Tiny chunks force patterns to
    /// span refills, which is exactly what scanner tests want.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk: usize) -> Self {
        self.chunk = chunk.max(1);
        self
    }

    /// Returns the absolute cursor position.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.pos
    }

    /// Returns the logical end of the stream.
    #[must_use]
    pub fn end(&self) -> u64 {
        self.end
    }

    /// Returns whether the cursor has reached the logical end.
    #[must_use]
    pub fn at_end(&self) -> bool {
        self.pos >= self.end
    }

    fn buffered_end(&self) -> u64 {
        self.buf_start + self.buf.len() as u64
    }

    /// Returns the buffered bytes from the cursor onwards.
    ///
    /// Empty when nothing is buffered yet; call [`refill`](Self::refill)
    /// to extend it.
    #[must_use]
    pub fn window(&self) -> &[u8] {
        &self.buf[(self.pos - self.buf_start) as usize..]
    }

    /// Buffers one more chunk from the source.
    ///
    /// Bytes before the cursor are discarded first; they can never be read
    /// again. Returns `false` once the buffer already covers the logical
    /// end.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the source fails.
    pub fn refill(&mut self) -> StorageResult<bool> {
        if self.buffered_end() >= self.end {
            return Ok(false);
        }

        let consumed = (self.pos - self.buf_start) as usize;
        if consumed > 0 {
            self.buf.drain(..consumed);
            self.buf_start = self.pos;
        }

        let at = self.buffered_end();
        let want = (self.end - at).min(self.chunk as u64) as usize;
        let data = self.source.read_at(at, want)?;
        self.buf.extend_from_slice(&data);
        Ok(true)
    }

    /// Advances the cursor by `n` bytes, clamped to the logical end.
    pub fn skip(&mut self, n: u64) {
        self.pos = (self.pos + n).min(self.end);
        if self.pos >= self.buffered_end() {
            self.buf.clear();
            self.buf_start = self.pos;
        }
    }

    /// Reads one line, consuming it and its `\n` terminator.
    ///
    /// The returned line excludes the `\n` (a trailing `\r` is kept; the
    /// caller decides what a terminator is). Returns `None` when no
    /// terminator exists within `max` buffered bytes or before the logical
    /// end - the cursor is left unmoved in that case.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the source fails.
    pub fn read_line(&mut self, max: usize) -> StorageResult<Option<Vec<u8>>> {
        loop {
            if let Some(i) = memchr(b'\n', self.window()) {
                let line = self.window()[..i].to_vec();
                self.skip(i as u64 + 1);
                return Ok(Some(line));
            }
            if self.window().len() >= max || !self.refill()? {
                return Ok(None);
            }
        }
    }

    /// Creates an independent bounded reader over `[start, end)`.
    ///
    /// The view shares the source but nothing else; reading through it
    /// leaves this stream's cursor and bounds untouched.
    #[must_use]
    pub fn view(&self, start: u64, end: u64) -> BoundedView<'a> {
        BoundedView {
            stream: ArchiveStream::new(self.source, start, end).with_chunk_size(self.chunk),
        }
    }
}

/// An independent reader over one message's extent.
///
/// Hands out raw lines, terminators included, and refuses by construction
/// to read past its end offset.
pub struct BoundedView<'a> {
    stream: ArchiveStream<'a>,
}

impl BoundedView<'_> {
    /// Returns the next raw line, including its terminator bytes.
    ///
    /// The final line of the extent is returned as-is even when it has no
    /// terminator. Returns `None` once the extent is exhausted.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the source fails.
    pub fn next_line(&mut self) -> StorageResult<Option<Vec<u8>>> {
        loop {
            if let Some(i) = memchr(b'\n', self.stream.window()) {
                let line = self.stream.window()[..=i].to_vec();
                self.stream.skip(i as u64 + 1);
                return Ok(Some(line));
            }
            if !self.stream.refill()? {
                let line = self.stream.window().to_vec();
                self.stream.skip(line.len() as u64);
                return Ok(if line.is_empty() { None } else { Some(line) });
            }
        }
    }
}
