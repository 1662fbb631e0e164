//! Log Writer: owns exactly one open segment file.

use std::io::{self, BufWriter, Write};
use std::iter::Peekable;
use std::marker::PhantomData;

use crate::entry::{Entry, EntryPayload, HardState};
use crate::error::Error;
use crate::repo::Repo;
use crate::segment;

/// Descriptor kept by the Log Manager for every sealed segment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SegmentMetaData {
    pub seg_id: u64,
    pub seg_start: u64,
    /// `None` if the segment holds no entries (only a header, and
    /// possibly a hard-state record).
    pub last_index_written: Option<u64>,
    pub file_name: String,
    pub byte_size: u64,
}

/// Owns exactly one open segment file; appends records, tracks byte size,
/// and seals on demand.
pub struct LogWriter<P, R: Repo> {
    repo: R,
    seg_id: u64,
    seg_start: u64,
    file_name: String,
    inner: BufWriter<R::Segment>,
    bytes_written: u64,
    last_index_written: Option<u64>,
    rollover_threshold: u64,
    _payload: PhantomData<P>,
}

impl<P: EntryPayload, R: Repo> LogWriter<P, R> {
    /// Create a new segment and write its header.
    ///
    /// `next_seg` is called exactly once to obtain `(seg_id, seg_start)`;
    /// it is a plain closure rather than a back-pointer to the owning Log
    /// Manager, so a writer never needs to borrow its owner to allocate an
    /// id.
    pub fn new(repo: R, rollover_threshold: u64, next_seg: impl FnOnce() -> (u64, u64)) -> Result<Self, Error> {
        let (seg_id, seg_start) = next_seg();
        let file_name = segment::file_name(seg_id, seg_start);

        let file = repo.open_for_append(&file_name)?;
        let mut inner = BufWriter::new(file);
        segment::Header { seg_id, seg_start }.write(&mut inner)?;
        inner.flush()?;
        let bytes_written = header_len();

        Ok(Self {
            repo,
            seg_id,
            seg_start,
            file_name,
            inner,
            bytes_written,
            last_index_written: None,
            rollover_threshold,
            _payload: PhantomData,
        })
    }

    pub fn seg_id(&self) -> u64 {
        self.seg_id
    }

    pub fn seg_start(&self) -> u64 {
        self.seg_start
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn last_index_written(&self) -> Option<u64> {
        self.last_index_written
    }

    /// Encode and write records from `entries` one by one, stopping either
    /// when the iterator is exhausted, or when writing the next entry would
    /// exceed the rollover threshold -- in which case `entries` is left
    /// pointing at the first entry not written, for the caller to seal this
    /// segment and continue into a new one.
    ///
    /// If present, `hard_state` is written before any entry. At least one
    /// entry is always written while `entries` has anything left, even if
    /// that single entry alone exceeds the rollover threshold -- this
    /// guarantees progress.
    pub fn append<I>(&mut self, entries: &mut Peekable<I>, hard_state: Option<&HardState>) -> Result<(), Error>
    where
        I: Iterator<Item = Entry<P>>,
    {
        if let Some(hs) = hard_state {
            let mut buf = Vec::new();
            hs.encode_record(&mut buf)?;
            self.inner.write_all(&buf)?;
            self.bytes_written += buf.len() as u64;
        }

        let mut wrote_any = false;
        while let Some(entry) = entries.peek() {
            let mut buf = Vec::new();
            entry.encode_record(&mut buf)?;

            let would_be = self.bytes_written + buf.len() as u64;
            if wrote_any && would_be > self.rollover_threshold {
                break;
            }

            self.inner.write_all(&buf)?;
            self.bytes_written = would_be;
            self.last_index_written = Some(entry.index);
            wrote_any = true;

            entries.next();
        }

        self.inner.flush()?;
        Ok(())
    }

    /// Flush the OS write buffer (fdatasync semantics).
    pub fn sync(&mut self) -> io::Result<()> {
        self.inner.flush()?;
        self.repo.fdatasync(self.inner.get_mut())
    }

    /// Flush, sync, and consume the writer, returning its final metadata.
    pub fn finish(mut self) -> Result<SegmentMetaData, Error> {
        self.sync()?;
        Ok(SegmentMetaData {
            seg_id: self.seg_id,
            seg_start: self.seg_start,
            last_index_written: self.last_index_written,
            file_name: self.file_name,
            byte_size: self.bytes_written,
        })
    }
}

fn header_len() -> u64 {
    // type(1) + payload_len(4) + payload(22) + crc32c(4)
    (1 + 4 + 22 + 4) as u64
}
