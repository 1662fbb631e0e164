use std::io;

use thiserror::Error;

/// Why decoding a single record frame failed.
///
/// `Eof` and `Torn` are not necessarily fatal: they are only recoverable at
/// the tail of the last segment of a log, where recovery is expected to
/// swallow them (see [`Error::TornTail`]).
#[derive(Debug, Error)]
pub enum DecodeError {
    /// A clean record boundary: zero bytes available before the next frame.
    #[error("end of stream")]
    Eof,
    /// Between 1 and a full frame's worth of bytes were available.
    #[error("torn record: only {available} bytes present before end of stream")]
    Torn { available: usize },
    /// The frame's crc32c did not match its payload.
    #[error("checksum mismatch")]
    ChecksumMismatch,
    /// `type` byte did not match any of `{1, 2, 3}`.
    #[error("unknown record type: {0}")]
    UnknownType(u8),
    /// `payload_len` exceeded the configured `max_record_bytes`.
    #[error("record length {len} exceeds maximum {max}")]
    LengthTooLarge { len: u32, max: u32 },
}

/// Crate-wide error taxonomy, per the component's error handling design.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("segment {seg_id}: corrupt header: {reason}")]
    CorruptSegmentHeader { seg_id: u64, reason: String },

    #[error("segment {seg_id}: corrupt record at byte offset {byte_offset}")]
    CorruptRecord {
        seg_id: u64,
        byte_offset: u64,
        #[source]
        source: DecodeError,
    },

    #[error("segment {seg_id}: torn tail at byte offset {byte_offset}, discarding remainder")]
    TornTail { seg_id: u64, byte_offset: u64 },

    #[error("protocol violation: entry at index={index} has term={term}, which regresses behind last retained term={last_term}")]
    TermRegression { index: u64, term: u64, last_term: u64 },

    #[error("log manager is closed")]
    ClosedError,
}

impl From<DecodeError> for io::Error {
    fn from(e: DecodeError) -> Self {
        io::Error::new(io::ErrorKind::InvalidData, e)
    }
}
