//! mbox archive fixtures.
//!
//! Builds archive byte streams the way deliveries actually lay them out:
//! each message is an envelope line, its content, and one trailing line
//! terminator. Between messages that terminator doubles as the separator;
//! after the final message it is the trailing terminator the scanner
//! excludes from the extent.

use mboxidx_storage::MemoryBackend;

/// Builder for mbox archive byte streams.
///
/// ```rust
/// use mboxidx_testkit::ArchiveBuilder;
///
/// let bytes = ArchiveBuilder::new()
///     .message("a@b Thu Nov 29 22:33:52 2001", "Hello")
///     .build();
/// assert_eq!(bytes, b"From a@b Thu Nov 29 22:33:52 2001\nHello\n");
/// ```
#[derive(Debug, Default)]
pub struct ArchiveBuilder {
    data: Vec<u8>,
}

impl ArchiveBuilder {
    /// Creates an empty archive.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message with LF line endings and a trailing terminator.
    ///
    /// `envelope` is everything after the `From ` literal; `body` becomes
    /// the exact message extent.
    #[must_use]
    pub fn message(mut self, envelope: &str, body: &str) -> Self {
        self.data.extend_from_slice(b"From ");
        self.data.extend_from_slice(envelope.as_bytes());
        self.data.push(b'\n');
        self.data.extend_from_slice(body.as_bytes());
        self.data.push(b'\n');
        self
    }

    /// Appends a message with CRLF line endings on the envelope and the
    /// trailing terminator. Line endings inside `body` are the caller's
    /// business.
    #[must_use]
    pub fn message_crlf(mut self, envelope: &str, body: &str) -> Self {
        self.data.extend_from_slice(b"From ");
        self.data.extend_from_slice(envelope.as_bytes());
        self.data.extend_from_slice(b"\r\n");
        self.data.extend_from_slice(body.as_bytes());
        self.data.extend_from_slice(b"\r\n");
        self
    }

    /// Appends a message without a trailing terminator.
    ///
    /// Only sensible as the last message: an archive cut off mid-delivery.
    #[must_use]
    pub fn message_unterminated(mut self, envelope: &str, body: &str) -> Self {
        self.data.extend_from_slice(b"From ");
        self.data.extend_from_slice(envelope.as_bytes());
        self.data.push(b'\n');
        self.data.extend_from_slice(body.as_bytes());
        self
    }

    /// Appends raw bytes verbatim, for corruption fixtures.
    #[must_use]
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.data.extend_from_slice(bytes);
        self
    }

    /// Returns the archive bytes.
    #[must_use]
    pub fn build(self) -> Vec<u8> {
        self.data
    }

    /// Wraps the archive bytes in an in-memory storage backend.
    #[must_use]
    pub fn into_backend(self) -> MemoryBackend {
        MemoryBackend::from_bytes(self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_share_one_separator() {
        let bytes = ArchiveBuilder::new()
            .message("a 1", "Hello")
            .message("b 2", "World")
            .build();

        assert_eq!(bytes, b"From a 1\nHello\nFrom b 2\nWorld\n");
    }

    #[test]
    fn empty_body_produces_adjacent_terminators() {
        let bytes = ArchiveBuilder::new().message("a 1", "").build();
        assert_eq!(bytes, b"From a 1\n\n");
    }

    #[test]
    fn unterminated_message_ends_at_its_body() {
        let bytes = ArchiveBuilder::new()
            .message("a 1", "Hello")
            .message_unterminated("b 2", "cut off")
            .build();

        assert_eq!(bytes, b"From a 1\nHello\nFrom b 2\ncut off");
    }

    #[test]
    fn crlf_message_layout() {
        let bytes = ArchiveBuilder::new().message_crlf("a 1", "Hi").build();
        assert_eq!(bytes, b"From a 1\r\nHi\r\n");
    }

    #[test]
    fn raw_bytes_pass_through() {
        let bytes = ArchiveBuilder::new().raw(b"anything\x00at all").build();
        assert_eq!(bytes, b"anything\x00at all");
    }
}
