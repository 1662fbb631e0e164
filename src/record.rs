//! Record Codec: the raw, checksummed frame format every record type is
//! encoded into.
//!
//! A record frame is:
//!
//! ```text
//! [ type: u8 ][ payload_len: u32 LE ][ payload: bytes ][ crc32c: u32 LE ]
//! ```
//!
//! `crc32c` covers `type || payload_len || payload`. This module only deals
//! in raw frames; [`Entry`], [`HardState`] and [`SegmentHeader`] give them
//! meaning.

use std::fmt;
use std::io::{self, ErrorKind, Read, Write};

use crc32c::{Crc32cReader, Crc32cWriter};

use crate::error::DecodeError;

/// Hard cap on `payload_len`, enforced unless overridden by
/// [`crate::WriteAheadLogOptions::max_record_bytes`].
pub const DEFAULT_MAX_RECORD_BYTES: u32 = 64 * 1024 * 1024;

pub const TYPE_ENTRY: u8 = 1;
pub const TYPE_HARD_STATE: u8 = 2;
pub const TYPE_SEGMENT_HEADER: u8 = 3;

/// Bytes preceding the payload: type (1) + payload_len (4).
const FRAME_PREFIX_LEN: usize = 5;
/// Bytes following the payload: crc32c (4).
const FRAME_SUFFIX_LEN: usize = 4;

/// A decoded frame before its payload has been interpreted as an
/// [`Entry`]/[`HardState`]/[`SegmentHeader`].
#[derive(Debug, PartialEq, Eq)]
pub struct RawFrame {
    pub record_type: u8,
    pub payload: Vec<u8>,
}

impl RawFrame {
    /// Serialize and write `type || payload` as a checksummed frame.
    pub fn encode<W: Write>(record_type: u8, payload: &[u8], mut out: W) -> io::Result<()> {
        let mut out = Crc32cWriter::new(&mut out);
        out.write_all(&[record_type])?;
        out.write_all(&(payload.len() as u32).to_le_bytes())?;
        out.write_all(payload)?;
        let crc = out.crc32c();
        let out = out.into_inner();
        out.write_all(&crc.to_le_bytes())?;
        Ok(())
    }

    /// Length in bytes this frame would occupy once encoded.
    pub fn encoded_len(payload_len: usize) -> usize {
        FRAME_PREFIX_LEN + payload_len + FRAME_SUFFIX_LEN
    }

    /// Attempt to read and validate one frame from `reader`.
    ///
    /// `max_len` bounds `payload_len`; exceeding it yields
    /// [`DecodeError::LengthTooLarge`] without attempting to read the
    /// (possibly bogus) payload.
    pub fn decode<R: Read>(mut reader: R, max_len: u32, verify_checksum: bool) -> Result<Self, DecodeError> {
        let mut reader = Crc32cReader::new(&mut reader);

        let mut prefix = [0u8; FRAME_PREFIX_LEN];
        let got = fill_as_much_as_possible(&mut reader, &mut prefix)?;
        if got == 0 {
            return Err(DecodeError::Eof);
        }
        if got < FRAME_PREFIX_LEN {
            return Err(DecodeError::Torn { available: got });
        }

        let record_type = prefix[0];
        let payload_len = u32::from_le_bytes(prefix[1..5].try_into().unwrap());
        if payload_len > max_len {
            return Err(DecodeError::LengthTooLarge {
                len: payload_len,
                max: max_len,
            });
        }

        let mut payload = vec![0u8; payload_len as usize];
        let got = fill_as_much_as_possible(&mut reader, &mut payload)?;
        if got < payload.len() {
            return Err(DecodeError::Torn {
                available: FRAME_PREFIX_LEN + got,
            });
        }

        let computed = reader.crc32c();
        let mut trailer = [0u8; FRAME_SUFFIX_LEN];
        // The crc trailer itself is not covered by the checksum.
        let mut reader = reader.into_inner();
        let got = fill_as_much_as_possible(&mut reader, &mut trailer)?;
        if got < FRAME_SUFFIX_LEN {
            return Err(DecodeError::Torn {
                available: FRAME_PREFIX_LEN + payload.len() + got,
            });
        }
        let stored = u32::from_le_bytes(trailer);

        if verify_checksum && stored != computed {
            return Err(DecodeError::ChecksumMismatch);
        }

        match record_type {
            TYPE_ENTRY | TYPE_HARD_STATE | TYPE_SEGMENT_HEADER => {}
            other => return Err(DecodeError::UnknownType(other)),
        }

        Ok(Self { record_type, payload })
    }
}

/// Read as many bytes as are available into `buf`, short of an error,
/// returning how many were actually read. Unlike [`Read::read_exact`], this
/// never turns a short read into an error — callers use the returned count
/// to distinguish a clean end-of-stream from a torn tail.
fn fill_as_much_as_possible<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize, DecodeError> {
    let mut total = 0;
    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(io_to_decode_error(e)),
        }
    }
    Ok(total)
}

fn io_to_decode_error(e: io::Error) -> DecodeError {
    // Any genuine I/O failure (not a short read) is surfaced as a torn read
    // of zero bytes; callers that need the underlying cause should use the
    // higher-level APIs in `readable_segment`, which retain the `io::Error`.
    match e.kind() {
        ErrorKind::UnexpectedEof => DecodeError::Eof,
        _ => DecodeError::Torn { available: 0 },
    }
}

impl fmt::Display for RawFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawFrame {{ type: {}, len: {} }}", self.record_type, self.payload.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let payload = b"hello raft".to_vec();
        let mut buf = Vec::new();
        RawFrame::encode(TYPE_ENTRY, &payload, &mut buf).unwrap();

        let frame = RawFrame::decode(&mut &buf[..], DEFAULT_MAX_RECORD_BYTES, true).unwrap();
        assert_eq!(frame.record_type, TYPE_ENTRY);
        assert_eq!(frame.payload, payload);
    }

    #[test]
    fn eof_on_empty_stream() {
        let err = RawFrame::decode(&mut &b""[..], DEFAULT_MAX_RECORD_BYTES, true).unwrap_err();
        assert!(matches!(err, DecodeError::Eof));
    }

    #[test]
    fn torn_on_partial_frame() {
        let payload = b"0123456789".to_vec();
        let mut buf = Vec::new();
        RawFrame::encode(TYPE_ENTRY, &payload, &mut buf).unwrap();
        buf.truncate(buf.len() - 2);

        let err = RawFrame::decode(&mut &buf[..], DEFAULT_MAX_RECORD_BYTES, true).unwrap_err();
        assert!(matches!(err, DecodeError::Torn { .. }));
    }

    #[test]
    fn checksum_mismatch_detected() {
        let payload = b"0123456789".to_vec();
        let mut buf = Vec::new();
        RawFrame::encode(TYPE_ENTRY, &payload, &mut buf).unwrap();
        let last = buf.len() - 1;
        buf[last] ^= 0xff;

        let err = RawFrame::decode(&mut &buf[..], DEFAULT_MAX_RECORD_BYTES, true).unwrap_err();
        assert!(matches!(err, DecodeError::ChecksumMismatch));
    }

    #[test]
    fn checksum_not_verified_when_disabled() {
        let payload = b"0123456789".to_vec();
        let mut buf = Vec::new();
        RawFrame::encode(TYPE_ENTRY, &payload, &mut buf).unwrap();
        let last = buf.len() - 1;
        buf[last] ^= 0xff;

        let frame = RawFrame::decode(&mut &buf[..], DEFAULT_MAX_RECORD_BYTES, false).unwrap();
        assert_eq!(frame.payload, payload);
    }

    #[test]
    fn length_too_large_rejected() {
        let mut buf = Vec::new();
        buf.push(TYPE_ENTRY);
        buf.extend_from_slice(&(100u32).to_le_bytes());
        let err = RawFrame::decode(&mut &buf[..], 10, true).unwrap_err();
        assert!(matches!(err, DecodeError::LengthTooLarge { len: 100, max: 10 }));
    }

    #[test]
    fn unknown_type_rejected() {
        let mut buf = Vec::new();
        RawFrame::encode(99, b"x", &mut buf).unwrap();
        let err = RawFrame::decode(&mut &buf[..], DEFAULT_MAX_RECORD_BYTES, true).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownType(99)));
    }

    proptest::proptest! {
        /// Any payload survives an encode/decode cycle unchanged.
        #[test]
        fn round_trip_any_payload(payload in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..512)) {
            let mut buf = Vec::new();
            RawFrame::encode(TYPE_ENTRY, &payload, &mut buf).unwrap();
            let frame = RawFrame::decode(&mut &buf[..], DEFAULT_MAX_RECORD_BYTES, true).unwrap();
            proptest::prop_assert_eq!(frame.payload, payload);
        }

        /// Flipping any single bit of an encoded frame is always caught by
        /// the checksum.
        #[test]
        fn bitflip_detected(payload in proptest::collection::vec(proptest::prelude::any::<u8>(), 1..512), bit in 0usize..4096) {
            let mut buf = Vec::new();
            RawFrame::encode(TYPE_ENTRY, &payload, &mut buf).unwrap();
            let bit = bit % (buf.len() * 8);
            buf[bit / 8] ^= 1 << (bit % 8);

            let result = RawFrame::decode(&mut &buf[..], DEFAULT_MAX_RECORD_BYTES, true);
            // A flipped length byte can turn a well-formed frame into a
            // torn or oversized read instead of a checksum mismatch; any of
            // the three still correctly rejects the corrupted frame.
            match result {
                Ok(frame) => proptest::prop_assert_eq!(frame.payload, payload),
                Err(DecodeError::ChecksumMismatch | DecodeError::Torn { .. } | DecodeError::LengthTooLarge { .. }) => {}
                Err(e) => proptest::prop_assert!(false, "unexpected error: {e}"),
            }
        }
    }
}
