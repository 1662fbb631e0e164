//! Log Manager: discovers segments, orchestrates recovery, routes appends to
//! the current [`LogWriter`], and maintains the sealed segment directory.

use crate::entry::{Entry, EntryPayload, HardState, Record};
use crate::error::Error;
use crate::log_writer::{LogWriter, SegmentMetaData};
use crate::memstore::{EntryStore, MemoryStorage};
use crate::readable_segment::ReadableSegment;
use crate::repo::Repo;
use crate::segment;
use crate::WriteAheadLogOptions;

/// What [`LogManager::gc`] should remove.
///
/// Only unlink-by-index is implemented; policy beyond "unlink everything
/// fully below this index" is out of scope (see `DESIGN.md`).
#[derive(Clone, Copy, Debug)]
pub enum CompactionHint {
    Before { last_index_lt: u64 },
}

/// Owns the sealed-segment directory and, once a write has happened, the
/// one currently-open [`LogWriter`].
///
/// This type performs no internal synchronization: a `LogManager` is meant
/// to be driven by a single writer thread.
pub struct LogManager<P, R: Repo> {
    repo: R,
    opts: WriteAheadLogOptions,
    next_seg_id: u64,
    files: Vec<SegmentMetaData>,
    writer: Option<LogWriter<P, R>>,
    last_index: u64,
    empty: bool,
    closed: bool,
}

impl<P: EntryPayload, R: Repo> LogManager<P, R> {
    /// Sealed segments, oldest first. Does not include the currently open
    /// segment, if any.
    pub fn files(&self) -> &[SegmentMetaData] {
        &self.files
    }

    pub fn last_index(&self) -> u64 {
        self.last_index
    }

    /// `true` until the first successful [`Self::write`] of at least one
    /// entry.
    pub fn is_empty(&self) -> bool {
        self.empty
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Append `entries` (and, optionally, a hard-state snapshot) to the log.
    ///
    /// An empty `entries` is deliberately a no-op, even when `hard_state` is
    /// `Some` -- a hard-state-only write is not a supported operation here
    /// (see `DESIGN.md`). Callers that need to persist a hard-state change
    /// with no new entries must accompany it with at least one entry.
    ///
    /// On the first write into a fresh manager, the last-index counter is
    /// initialized from `entries[0].index - 1`. Entries are handed to the
    /// current [`LogWriter`]; when it reports it stopped short of the
    /// rollover threshold, this segment is sealed and a new one opened to
    /// carry on, with the hard state written only to the first segment of
    /// the batch.
    pub fn write(&mut self, entries: Vec<Entry<P>>, hard_state: Option<HardState>) -> Result<(), Error> {
        if self.closed {
            return Err(Error::ClosedError);
        }
        if entries.is_empty() {
            return Ok(());
        }

        if self.empty {
            self.last_index = entries[0].index.saturating_sub(1);
        }

        let mut pending = entries.into_iter().peekable();
        let mut hard_state = hard_state;

        loop {
            if self.writer.is_none() {
                let seg_start = pending.peek().map(|e| e.index).unwrap_or(self.last_index + 1);
                self.next_seg_id += 1;
                let seg_id = self.next_seg_id;
                self.writer = Some(LogWriter::new(self.repo.clone(), self.opts.segment_size_bytes, || {
                    (seg_id, seg_start)
                })?);
            }

            let writer = self.writer.as_mut().expect("just ensured Some above");
            writer.append(&mut pending, hard_state.as_ref())?;
            hard_state = None;

            if let Some(idx) = writer.last_index_written() {
                self.last_index = idx;
                self.empty = false;
            }

            if pending.peek().is_none() {
                break;
            }
            self.seal_current_writer()?;
        }

        Ok(())
    }

    /// Flush the current segment's writes to stable storage. A no-op if no
    /// segment is open yet.
    pub fn sync(&mut self) -> Result<(), Error> {
        if self.closed {
            return Err(Error::ClosedError);
        }
        if let Some(writer) = self.writer.as_mut() {
            writer.sync()?;
        }
        Ok(())
    }

    /// Seal the current segment, if any, and mark the manager closed.
    /// Idempotent: closing an already-closed manager is a no-op.
    pub fn close(&mut self) -> Result<(), Error> {
        if self.closed {
            return Ok(());
        }
        // `closed` is set on every exit path, including the `?` below --
        // a half-sealed segment must never be mistaken for one still open.
        let Self { writer, files, closed, .. } = self;
        let _always_closed = scopeguard::guard(closed, |c| **c = true);
        if let Some(w) = writer.take() {
            let meta = w.finish()?;
            files.push(meta);
        }
        Ok(())
    }

    /// Remove sealed segments matching `hint`, returning their metadata.
    ///
    /// Only removes segments that are both sealed (not the currently open
    /// one) and fully covered by the hint; never rewrites a segment to
    /// partially reclaim it (see `DESIGN.md`).
    pub fn gc(&mut self, hint: CompactionHint) -> Result<Vec<SegmentMetaData>, Error> {
        let CompactionHint::Before { last_index_lt } = hint;
        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(self.files.len());
        for meta in self.files.drain(..) {
            let fully_covered = meta.last_index_written.is_some_and(|idx| idx < last_index_lt);
            if fully_covered {
                removed.push(meta);
            } else {
                kept.push(meta);
            }
        }
        self.files = kept;
        for meta in &removed {
            self.repo.unlink(&meta.file_name)?;
            log::info!("gc: removed segment {} ({})", meta.seg_id, meta.file_name);
        }
        Ok(removed)
    }

    fn seal_current_writer(&mut self) -> Result<(), Error> {
        if let Some(w) = self.writer.take() {
            let meta = w.finish()?;
            log::debug!(
                "sealed segment {} ({}, {} bytes)",
                meta.seg_id,
                meta.file_name,
                meta.byte_size
            );
            self.files.push(meta);
        }
        Ok(())
    }
}

/// Apply the suffix-truncation rule for one recovered or freshly-written
/// entry: a term regression behind the last retained entry is a protocol
/// violation; otherwise, any retained entries at or past this one's index
/// are discarded before it is appended.
pub fn append_to_mem_store<P: EntryPayload, S: EntryStore<P>>(
    entry: Entry<P>,
    store: &mut S,
) -> Result<(), Error> {
    let entries = store.entries();
    if let Some(last) = entries.last() {
        if entry.term < last.term {
            return Err(Error::TermRegression {
                index: entry.index,
                term: entry.term,
                last_term: last.term,
            });
        }
    }
    while entries.last().is_some_and(|e| e.index >= entry.index) {
        entries.pop();
    }
    entries.push(entry);
    Ok(())
}

/// Discover, validate, and replay every segment under `repo`, reconstructing
/// an in-memory store and handing back a [`LogManager`] ready to continue
/// appending.
///
/// Segments are processed in ascending `seg_id` order. A torn or corrupt
/// tail is swallowed only on the *last* segment -- the same condition as a
/// crash mid-write -- and only after everything readable from it has been
/// applied; the same failure in an earlier segment is unrecoverable and
/// fails recovery outright.
pub fn recover<P: EntryPayload, R: Repo>(
    repo: R,
    opts: WriteAheadLogOptions,
) -> Result<(LogManager<P, R>, MemoryStorage<P>), Error> {
    repo.create_dir_if_missing()?;

    let mut segments: Vec<(u64, u64, String)> = repo
        .get_children()?
        .into_iter()
        .filter_map(|name| segment::parse_file_name(&name).map(|(seg_id, seg_start)| (seg_id, seg_start, name)))
        .collect();
    segments.sort_by_key(|(seg_id, ..)| *seg_id);

    let mut memstore = MemoryStorage::new();
    let mut files = Vec::with_capacity(segments.len());
    let mut last_index = 0u64;
    let mut empty = true;
    let mut max_seg_id = 0u64;

    let n = segments.len();
    for (i, (seg_id, seg_start, file_name)) in segments.into_iter().enumerate() {
        max_seg_id = max_seg_id.max(seg_id);
        let is_last_segment = i + 1 == n;

        let mut seg = ReadableSegment::open(&repo, &file_name, seg_id, seg_start, opts.verify_checksum, opts.max_record_bytes)?;
        let mut last_index_in_seg = None;

        loop {
            match seg.next::<P>() {
                Ok(Some(Record::Entry(entry))) => {
                    let index = entry.index;
                    append_to_mem_store(entry, &mut memstore)?;
                    last_index_in_seg = Some(index);
                    last_index = index;
                    empty = false;
                }
                Ok(Some(Record::HardState(hard_state))) => {
                    memstore.set_hard_state(hard_state);
                }
                Ok(None) => break,
                Err(e) if is_last_segment => {
                    log::warn!("recovery: discarding torn/corrupt tail of last segment {seg_id}: {e}");
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        files.push(SegmentMetaData {
            seg_id,
            seg_start,
            last_index_written: last_index_in_seg,
            file_name,
            byte_size: seg.byte_offset(),
        });
    }

    log::info!("recovery complete: {} segment(s), last_index={}", files.len(), last_index);

    let manager = LogManager {
        repo,
        opts,
        next_seg_id: max_seg_id,
        files,
        writer: None,
        last_index,
        empty,
        closed: false,
    };

    Ok((manager, memstore))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::Memory;

    fn opts(segment_size_bytes: u64) -> WriteAheadLogOptions {
        WriteAheadLogOptions {
            segment_size_bytes,
            ..Default::default()
        }
    }

    fn entries(range: std::ops::Range<u64>, term: u64) -> Vec<Entry<Vec<u8>>> {
        range
            .map(|i| Entry {
                index: i,
                term,
                payload: vec![0u8; 8],
            })
            .collect()
    }

    #[test]
    fn recover_on_empty_directory_yields_empty_manager() {
        let repo = Memory::new();
        let (manager, mut store) = recover::<Vec<u8>, _>(repo, opts(1 << 20)).unwrap();
        assert!(manager.is_empty());
        assert_eq!(manager.last_index(), 0);
        assert!(manager.files().is_empty());
        assert!(store.entries().is_empty());
    }

    #[test]
    fn write_then_recover_round_trips() {
        let repo = Memory::new();
        let (mut manager, _) = recover::<Vec<u8>, _>(repo.clone(), opts(1 << 20)).unwrap();
        manager
            .write(
                entries(1..4, 1),
                Some(HardState {
                    term: 1,
                    vote: 7,
                    commit: 0,
                }),
            )
            .unwrap();
        manager.close().unwrap();

        let (manager2, mut store) = recover::<Vec<u8>, _>(repo, opts(1 << 20)).unwrap();
        assert_eq!(manager2.last_index(), 3);
        assert_eq!(store.entries().iter().map(|e| e.index).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(*store.hard_state(), HardState { term: 1, vote: 7, commit: 0 });
    }

    #[test]
    fn rollover_produces_multiple_segments() {
        let repo = Memory::new();
        let (mut manager, _) = recover::<Vec<u8>, _>(repo, opts(64)).unwrap();
        manager.write(entries(1..10, 1), None).unwrap();
        manager.close().unwrap();
        assert!(manager.files().len() >= 3, "expected rollover, got {:?}", manager.files());
    }

    #[test]
    fn write_is_rejected_after_close() {
        let repo = Memory::new();
        let (mut manager, _) = recover::<Vec<u8>, _>(repo, opts(1 << 20)).unwrap();
        manager.close().unwrap();
        let err = manager.write(entries(1..2, 1), None).unwrap_err();
        assert!(matches!(err, Error::ClosedError));
    }

    #[test]
    fn write_with_empty_entries_and_hard_state_is_a_silent_no_op() {
        let repo = Memory::new();
        let (mut manager, mut store) = recover::<Vec<u8>, _>(repo, opts(1 << 20)).unwrap();
        manager
            .write(
                vec![],
                Some(HardState {
                    term: 5,
                    vote: 1,
                    commit: 1,
                }),
            )
            .unwrap();
        assert!(manager.is_empty());
        assert_eq!(*store.hard_state(), HardState::default());
    }

    #[test]
    fn gc_unlinks_fully_covered_segments_only() {
        let repo = Memory::new();
        let (mut manager, _) = recover::<Vec<u8>, _>(repo, opts(64)).unwrap();
        manager.write(entries(1..10, 1), None).unwrap();
        manager.close().unwrap();

        let before = manager.files().len();
        assert!(before >= 2);
        let last_seg_last_index = manager.files().last().unwrap().last_index_written.unwrap();

        let removed = manager.gc(CompactionHint::Before { last_index_lt: last_seg_last_index }).unwrap();
        assert!(!removed.is_empty());
        assert!(manager.files().len() < before);
        assert!(manager.files().iter().all(|m| m.last_index_written.unwrap() >= last_seg_last_index));
    }

    #[test]
    fn term_regression_is_rejected() {
        let mut store: MemoryStorage<Vec<u8>> = MemoryStorage::new();
        append_to_mem_store(
            Entry {
                index: 1,
                term: 2,
                payload: vec![],
            },
            &mut store,
        )
        .unwrap();
        let err = append_to_mem_store(
            Entry {
                index: 2,
                term: 1,
                payload: vec![],
            },
            &mut store,
        )
        .unwrap_err();
        assert!(matches!(err, Error::TermRegression { .. }));
    }

    #[test]
    fn suffix_truncation_discards_diverging_tail() {
        let mut store: MemoryStorage<Vec<u8>> = MemoryStorage::new();
        for e in entries(1..4, 1) {
            append_to_mem_store(e, &mut store).unwrap();
        }
        assert_eq!(store.entries().iter().map(|e| e.index).collect::<Vec<_>>(), vec![1, 2, 3]);

        append_to_mem_store(
            Entry {
                index: 2,
                term: 2,
                payload: vec![9],
            },
            &mut store,
        )
        .unwrap();
        assert_eq!(store.entries().iter().map(|e| e.index).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(store.entries().last().unwrap().term, 2);
    }
}
