//! A write-ahead log for a Raft consensus replica: segmented, framed,
//! checksummed on-disk storage for the replicated log and hard voting
//! state, with crash recovery and suffix truncation on conflicting appends.
//!
//! The log is split across components in dependency order (leaves first):
//! the [`record`] codec frames a single record; [`readable_segment`]
//! streams records back out of one segment file during recovery;
//! [`log_writer`] owns exactly one open segment and appends to it;
//! [`log_manager`] discovers segments on disk, drives recovery, and routes
//! live appends across writers as segments roll over.
//!
//! Start with [`recover`].

mod entry;
mod error;
mod log_manager;
mod log_writer;
mod memstore;
mod readable_segment;
mod record;
mod repo;
mod segment;

use record::DEFAULT_MAX_RECORD_BYTES;

pub use entry::{Entry, EntryPayload, HardState, Record};
pub use error::{DecodeError, Error};
pub use log_manager::{append_to_mem_store, recover, CompactionHint, LogManager};
pub use log_writer::SegmentMetaData;
pub use memstore::{EntryStore, MemoryStorage};
pub use repo::{Fs, Repo};
#[cfg(any(test, feature = "test"))]
pub use repo::Memory;

/// Tunables for a [`LogManager`], passed to [`recover`].
#[derive(Clone, Copy, Debug)]
pub struct WriteAheadLogOptions {
    /// Soft cap on a segment's size in bytes before it is rolled over. A
    /// single entry larger than this is still written whole -- the cap is
    /// never allowed to block progress (see [`log_writer::LogWriter::append`]).
    pub segment_size_bytes: u64,
    /// Whether to verify each record's crc32c on read. Disabling this is
    /// only useful for recovering data you already know is intact faster.
    pub verify_checksum: bool,
    /// Hard cap on a single record's encoded payload length. Guards against
    /// treating a wild `payload_len` prefix (e.g. from a torn write) as a
    /// huge allocation request.
    pub max_record_bytes: u32,
}

impl Default for WriteAheadLogOptions {
    fn default() -> Self {
        Self {
            segment_size_bytes: 64 * 1024 * 1024,
            verify_checksum: true,
            max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
        }
    }
}
