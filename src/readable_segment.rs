//! Readable Segment: a cursor over the records of one segment file, used
//! only during recovery -- there is no random read-by-index access.

use crate::entry::{EntryPayload, Record};
use crate::error::{DecodeError, Error};
use crate::record::RawFrame;
use crate::repo::Repo;
use crate::segment;

/// A cursor over the records of one segment file.
pub struct ReadableSegment<S> {
    pub seg_id: u64,
    pub seg_start: u64,
    inner: S,
    verify_checksum: bool,
    max_record_bytes: u32,
    /// Byte offset of the next record to be read, from the start of the file.
    offset: u64,
    eof: bool,
}

impl<S: std::io::Read> ReadableSegment<S> {
    /// Open `file_name` from `repo`, reading and validating the segment
    /// header. `seg_id`/`seg_start` are the values parsed from the file
    /// name, cross-checked against the header's own copy.
    pub fn open<R: Repo<Segment = S>>(
        repo: &R,
        file_name: &str,
        seg_id: u64,
        seg_start: u64,
        verify_checksum: bool,
        max_record_bytes: u32,
    ) -> Result<Self, Error> {
        let mut inner = repo.open_for_read(file_name)?;
        let header = segment::Header::decode(&mut inner, max_record_bytes, verify_checksum).map_err(|e| {
            Error::CorruptSegmentHeader {
                seg_id,
                reason: e.to_string(),
            }
        })?;
        if header.seg_id != seg_id || header.seg_start != seg_start {
            return Err(Error::CorruptSegmentHeader {
                seg_id,
                reason: format!(
                    "header {{seg_id={}, seg_start={}}} does not match file name {{seg_id={}, seg_start={}}}",
                    header.seg_id, header.seg_start, seg_id, seg_start
                ),
            });
        }

        Ok(Self {
            seg_id,
            seg_start,
            inner,
            verify_checksum,
            max_record_bytes,
            offset: RawFrame::encoded_len(22) as u64,
            eof: false,
        })
    }

    /// `true` once [`Self::next`] has returned `Ok(None)`.
    pub fn eof(&self) -> bool {
        self.eof
    }

    /// Current byte offset into the segment file (past the header and all
    /// records yielded so far).
    pub fn byte_offset(&self) -> u64 {
        self.offset
    }

    /// Yield the next record, or `Ok(None)` at a clean end of stream.
    ///
    /// An incomplete trailing frame yields [`Error::TornTail`]; a complete
    /// but invalid frame yields [`Error::CorruptRecord`]. Distinguishing
    /// which of these is recoverable (only at the tail of the *last*
    /// segment) is the Log Manager's responsibility, not this type's -- a
    /// `ReadableSegment` has no notion of "last".
    pub fn next<P: EntryPayload>(&mut self) -> Result<Option<Record<P>>, Error> {
        if self.eof {
            return Ok(None);
        }

        match RawFrame::decode(&mut self.inner, self.max_record_bytes, self.verify_checksum) {
            Ok(frame) => {
                self.offset += RawFrame::encoded_len(frame.payload.len()) as u64;
                let record = Record::from_raw(frame).map_err(|source| Error::CorruptRecord {
                    seg_id: self.seg_id,
                    byte_offset: self.offset,
                    source,
                })?;
                Ok(Some(record))
            }
            Err(DecodeError::Eof) => {
                self.eof = true;
                Ok(None)
            }
            Err(e @ (DecodeError::Torn { .. } | DecodeError::LengthTooLarge { .. })) => {
                self.eof = true;
                Err(Error::TornTail {
                    seg_id: self.seg_id,
                    byte_offset: self.offset,
                })
                .inspect_err(|_| {
                    log::debug!("segment {}: torn tail at offset {}: {e}", self.seg_id, self.offset);
                })
            }
            Err(e @ (DecodeError::ChecksumMismatch | DecodeError::UnknownType(_))) => {
                self.eof = true;
                Err(Error::CorruptRecord {
                    seg_id: self.seg_id,
                    byte_offset: self.offset,
                    source: e,
                })
            }
        }
    }
}
