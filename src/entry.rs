//! The application-facing record types: [`Entry`] and [`HardState`],
//! layered on top of the raw frame codec in [`crate::record`].

use std::fmt;
use std::io::{self, Write};

use crate::error::DecodeError;
use crate::record::{RawFrame, TYPE_ENTRY, TYPE_HARD_STATE};

/// A datatype which can serve as the opaque payload of a Raft log [`Entry`].
///
/// The WAL never interprets the payload itself; it only needs to move bytes
/// around. Encode and decode are collapsed into a single trait since this
/// crate has no need for a stateful decoder across records.
pub trait EntryPayload: Clone + fmt::Debug {
    fn encode(&self, buf: &mut Vec<u8>);
    fn decode(bytes: &[u8]) -> Result<Self, DecodeError>
    where
        Self: Sized;
}

/// Byte blobs are the simplest possible payload, useful for tests and for
/// callers that already serialize entries themselves.
impl EntryPayload for Vec<u8> {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self);
    }

    fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        Ok(bytes.to_vec())
    }
}

/// One Raft log entry: an index, monotonic within a term, a term, and an
/// opaque payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry<P> {
    pub index: u64,
    pub term: u64,
    pub payload: P,
}

impl<P: EntryPayload> Entry<P> {
    pub fn encode_record<W: Write>(&self, out: W) -> io::Result<()> {
        let mut payload = Vec::with_capacity(16);
        payload.extend_from_slice(&self.index.to_le_bytes());
        payload.extend_from_slice(&self.term.to_le_bytes());
        self.payload.encode(&mut payload);
        RawFrame::encode(TYPE_ENTRY, &payload, out)
    }

    fn decode_payload(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() < 16 {
            return Err(DecodeError::Torn { available: bytes.len() });
        }
        let index = u64::from_le_bytes(bytes[0..8].try_into().unwrap());
        let term = u64::from_le_bytes(bytes[8..16].try_into().unwrap());
        let payload = P::decode(&bytes[16..])?;
        Ok(Self { index, term, payload })
    }
}

/// The replica's persistent vote/term/commit snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HardState {
    pub term: u64,
    pub vote: u64,
    pub commit: u64,
}

impl HardState {
    const ENCODED_LEN: usize = 24;

    pub fn encode_record<W: Write>(&self, out: W) -> io::Result<()> {
        let mut payload = Vec::with_capacity(Self::ENCODED_LEN);
        payload.extend_from_slice(&self.term.to_le_bytes());
        payload.extend_from_slice(&self.vote.to_le_bytes());
        payload.extend_from_slice(&self.commit.to_le_bytes());
        RawFrame::encode(TYPE_HARD_STATE, &payload, out)
    }

    fn decode_payload(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() != Self::ENCODED_LEN {
            return Err(DecodeError::Torn { available: bytes.len() });
        }
        Ok(Self {
            term: u64::from_le_bytes(bytes[0..8].try_into().unwrap()),
            vote: u64::from_le_bytes(bytes[8..16].try_into().unwrap()),
            commit: u64::from_le_bytes(bytes[16..24].try_into().unwrap()),
        })
    }
}

/// A decoded, meaningful record: either a log [`Entry`] or a [`HardState`]
/// snapshot. Segment headers are handled separately by
/// [`crate::segment::Header`] since only [`crate::readable_segment`] ever
/// sees one.
#[derive(Clone, Debug, PartialEq)]
pub enum Record<P> {
    Entry(Entry<P>),
    HardState(HardState),
}

impl<P: EntryPayload> Record<P> {
    /// Interpret an already-decoded, checksum-verified [`RawFrame`].
    pub fn from_raw(frame: RawFrame) -> Result<Self, DecodeError> {
        match frame.record_type {
            TYPE_ENTRY => Entry::decode_payload(&frame.payload).map(Record::Entry),
            TYPE_HARD_STATE => HardState::decode_payload(&frame.payload).map(Record::HardState),
            other => Err(DecodeError::UnknownType(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_round_trip() {
        let entry = Entry {
            index: 7,
            term: 3,
            payload: b"payload".to_vec(),
        };
        let mut buf = Vec::new();
        entry.encode_record(&mut buf).unwrap();

        let frame = RawFrame::decode(&mut &buf[..], 1024, true).unwrap();
        let Record::Entry(decoded) = Record::<Vec<u8>>::from_raw(frame).unwrap() else {
            panic!("expected Entry");
        };
        assert_eq!(decoded, entry);
    }

    #[test]
    fn hard_state_round_trip() {
        let hs = HardState {
            term: 7,
            vote: 2,
            commit: 5,
        };
        let mut buf = Vec::new();
        hs.encode_record(&mut buf).unwrap();

        let frame = RawFrame::decode(&mut &buf[..], 1024, true).unwrap();
        let Record::HardState(decoded) = Record::<Vec<u8>>::from_raw(frame).unwrap() else {
            panic!("expected HardState");
        };
        assert_eq!(decoded, hs);
    }
}
