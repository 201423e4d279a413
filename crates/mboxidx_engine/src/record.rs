//! On-disk record slot layout.

use crate::error::{EngineError, EngineResult};
use crate::types::{MessageFlags, RecordState, Uid};

/// Size of one record slot in bytes.
///
/// uid (4) + flags (4) + internal_date (8) + location (8) + length (8) +
/// fingerprint (16)
pub const RECORD_SIZE: usize = 48;

/// One message's entry in the index.
///
/// Slots are appended once per message and then patched in place as the
/// append protocol proceeds. A `uid` of 0 on disk encodes
/// [`RecordState::Provisional`]; any other value is the committed UID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRecord {
    /// Visibility state (provisional or committed with a UID).
    pub state: RecordState,
    /// Status flags derived from the message headers.
    pub flags: MessageFlags,
    /// Internal date as Unix seconds, from the envelope line.
    pub internal_date: i64,
    /// Absolute archive offset of the first byte after the envelope line.
    pub location: u64,
    /// Byte length of the message extent (headers and body, excluding the
    /// envelope line and the adjacent separators).
    pub length: u64,
    /// 128-bit digest of the scanned header bytes.
    pub fingerprint: [u8; 16],
}

impl IndexRecord {
    /// Creates a fresh provisional record carrying only the internal date.
    #[must_use]
    pub fn provisional(internal_date: i64) -> Self {
        Self {
            state: RecordState::Provisional,
            flags: MessageFlags::empty(),
            internal_date,
            location: 0,
            length: 0,
            fingerprint: [0; 16],
        }
    }

    /// Encodes the record into its fixed slot layout.
    #[must_use]
    pub fn encode(&self) -> [u8; RECORD_SIZE] {
        let uid = match self.state {
            RecordState::Provisional => 0,
            RecordState::Committed(uid) => uid.as_u32(),
        };

        let mut buf = [0u8; RECORD_SIZE];
        buf[0..4].copy_from_slice(&uid.to_le_bytes());
        buf[4..8].copy_from_slice(&self.flags.bits().to_le_bytes());
        buf[8..16].copy_from_slice(&self.internal_date.to_le_bytes());
        buf[16..24].copy_from_slice(&self.location.to_le_bytes());
        buf[24..32].copy_from_slice(&self.length.to_le_bytes());
        buf[32..48].copy_from_slice(&self.fingerprint);
        buf
    }

    /// Decodes a record from one slot's bytes.
    ///
    /// Unknown flag bits are dropped, so newer writers stay readable.
    ///
    /// # Errors
    ///
    /// Returns an error if `bytes` is not exactly one slot long.
    pub fn decode(bytes: &[u8]) -> EngineResult<Self> {
        if bytes.len() != RECORD_SIZE {
            return Err(EngineError::invalid_format(format!(
                "record slot is {} bytes, expected {}",
                bytes.len(),
                RECORD_SIZE
            )));
        }

        let uid = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let state = if uid == 0 {
            RecordState::Provisional
        } else {
            RecordState::Committed(Uid::new(uid))
        };

        let flags = MessageFlags::from_bits_truncate(u32::from_le_bytes([
            bytes[4], bytes[5], bytes[6], bytes[7],
        ]));
        let internal_date = i64::from_le_bytes([
            bytes[8], bytes[9], bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15],
        ]);
        let location = u64::from_le_bytes([
            bytes[16], bytes[17], bytes[18], bytes[19], bytes[20], bytes[21], bytes[22], bytes[23],
        ]);
        let length = u64::from_le_bytes([
            bytes[24], bytes[25], bytes[26], bytes[27], bytes[28], bytes[29], bytes[30], bytes[31],
        ]);
        let mut fingerprint = [0u8; 16];
        fingerprint.copy_from_slice(&bytes[32..48]);

        Ok(Self {
            state,
            flags,
            internal_date,
            location,
            length,
            fingerprint,
        })
    }
}
