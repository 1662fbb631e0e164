//! Segment naming and on-disk segment header.

use std::io::{self, Read, Write};
use std::sync::OnceLock;

use regex::Regex;

use crate::error::DecodeError;
use crate::record::{RawFrame, TYPE_SEGMENT_HEADER};

/// Why [`Header::decode`] failed.
#[derive(Debug, thiserror::Error)]
pub enum HeaderError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("expected record type {expected}, found {found}")]
    WrongRecordType { expected: u8, found: u8 },
    #[error("header payload is {len} bytes, expected 22")]
    WrongPayloadLen { len: usize },
    #[error("magic mismatch: expected {expected:#x}, found {found:#x}")]
    BadMagic { expected: u32, found: u32 },
    #[error("unsupported segment format version: {found}")]
    BadVersion { found: u16 },
}

/// `"WAL_"` as a little-endian u32.
pub const MAGIC: u32 = 0x5741_4C5F;
pub const VERSION: u16 = 1;

fn segment_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)-(\d+)\.wal$").expect("static regex is valid"))
}

/// The canonical on-disk file name for a segment.
pub fn file_name(seg_id: u64, seg_start: u64) -> String {
    format!("{seg_id}-{seg_start}.wal")
}

/// Parse a directory entry's file name as `(seg_id, seg_start)`.
///
/// Returns `None` for anything that does not fully match
/// `^(\d+)-(\d+)\.wal$` -- a name must match in full, not just as a prefix,
/// so a stray `.tmp`/`.bak` suffix is correctly treated as "not a segment".
pub fn parse_file_name(name: &str) -> Option<(u64, u64)> {
    let caps = segment_name_re().captures(name)?;
    let seg_id = caps.get(1)?.as_str().parse().ok()?;
    let seg_start = caps.get(2)?.as_str().parse().ok()?;
    Some((seg_id, seg_start))
}

/// The first record of every segment file.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Header {
    pub seg_id: u64,
    pub seg_start: u64,
}

impl Header {
    /// Encode `self` as the payload of a `SegmentHeader` record and write it.
    pub fn write<W: Write>(&self, out: W) -> io::Result<()> {
        let mut payload = Vec::with_capacity(22);
        payload.extend_from_slice(&MAGIC.to_le_bytes());
        payload.extend_from_slice(&VERSION.to_le_bytes());
        payload.extend_from_slice(&self.seg_id.to_le_bytes());
        payload.extend_from_slice(&self.seg_start.to_le_bytes());
        RawFrame::encode(TYPE_SEGMENT_HEADER, &payload, out)
    }

    /// Read and validate the segment header record from `reader`.
    pub fn decode<R: Read>(reader: R, max_record_bytes: u32, verify_checksum: bool) -> Result<Self, HeaderError> {
        let frame = RawFrame::decode(reader, max_record_bytes, verify_checksum)?;
        if frame.record_type != TYPE_SEGMENT_HEADER {
            return Err(HeaderError::WrongRecordType {
                expected: TYPE_SEGMENT_HEADER,
                found: frame.record_type,
            });
        }
        if frame.payload.len() != 22 {
            return Err(HeaderError::WrongPayloadLen {
                len: frame.payload.len(),
            });
        }
        let magic = u32::from_le_bytes(frame.payload[0..4].try_into().unwrap());
        let version = u16::from_le_bytes(frame.payload[4..6].try_into().unwrap());
        let seg_id = u64::from_le_bytes(frame.payload[6..14].try_into().unwrap());
        let seg_start = u64::from_le_bytes(frame.payload[14..22].try_into().unwrap());

        if magic != MAGIC {
            return Err(HeaderError::BadMagic { expected: MAGIC, found: magic });
        }
        if version != VERSION {
            return Err(HeaderError::BadVersion { found: version });
        }

        Ok(Self { seg_id, seg_start })
    }
}
