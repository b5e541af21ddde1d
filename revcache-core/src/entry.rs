//! Cache entry and its binary encoding.
//!
//! An entry is packed as a self-describing list of exactly four byte
//! strings, XDR style:
//!
//! ```text
//! [count: u32 BE = 4]
//! [len: u32 BE][oid bytes][pad to 4]
//! [len: u32 BE][start_tid bytes][pad to 4]
//! [len: u32 BE][end_tid bytes][pad to 4]
//! [len: u32 BE][payload bytes][pad to 4]
//! ```
//!
//! There is no version field. Any buffer that is not exactly this shape
//! fails to decode.

use crate::error::EntryError;
use crate::{Oid, Tid, ID_WIDTH};

/// Number of fields in an encoded entry.
pub const FIELD_COUNT: u32 = 4;

const WORD: usize = 4;

/// One cached revision of an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub oid: Oid,
    /// Transaction that wrote this revision.
    pub start_tid: Tid,
    /// Transaction that superseded it, or [`Tid::ZERO`] while current.
    pub end_tid: Tid,
    pub payload: Vec<u8>,
}

impl CacheEntry {
    pub fn new(oid: Oid, start_tid: Tid, end_tid: Tid, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            oid,
            start_tid,
            end_tid,
            payload: payload.into(),
        }
    }

    /// Build an entry whose end TID is optional, substituting the zero
    /// sentinel for "still current".
    pub fn with_optional_end(
        oid: Oid,
        start_tid: Tid,
        end_tid: Option<Tid>,
        payload: impl Into<Vec<u8>>,
    ) -> Self {
        Self::new(oid, start_tid, end_tid.unwrap_or(Tid::ZERO), payload)
    }

    /// Whether this revision has no known successor.
    pub fn is_current(&self) -> bool {
        self.end_tid.is_zero()
    }

    /// The end TID, with the zero sentinel mapped back to `None`.
    pub fn end_tid(&self) -> Option<Tid> {
        if self.is_current() {
            None
        } else {
            Some(self.end_tid)
        }
    }

    /// Encode this entry.
    ///
    /// Fails only if the payload is longer than `u32::MAX` bytes.
    pub fn encode(&self) -> Result<Vec<u8>, EntryError> {
        encode_parts(self.oid, self.start_tid, self.end_tid, &self.payload)
    }

    /// Decode an entry, rejecting anything that is not exactly four
    /// well-formed fields.
    pub fn decode(bytes: &[u8]) -> Result<Self, EntryError> {
        let mut reader = FieldReader::new(bytes);

        let count = reader.read_u32()?;
        if count != FIELD_COUNT {
            return Err(EntryError::FieldCount {
                expected: FIELD_COUNT,
                found: count,
            });
        }

        let oid = reader.read_id_field("oid")?;
        let start_tid = reader.read_id_field("start_tid")?;
        let end_tid = reader.read_id_field("end_tid")?;
        let payload = reader.read_field("payload")?.to_vec();
        reader.finish()?;

        Ok(Self {
            oid: Oid::from_bytes(oid),
            start_tid: Tid::from_bytes(start_tid),
            end_tid: Tid::from_bytes(end_tid),
            payload,
        })
    }
}

/// Encode an entry from its parts without building a [`CacheEntry`].
pub fn encode_parts(
    oid: Oid,
    start_tid: Tid,
    end_tid: Tid,
    payload: &[u8],
) -> Result<Vec<u8>, EntryError> {
    let payload_len = u32::try_from(payload.len()).map_err(|_| EntryError::TooLarge {
        field: "payload",
        len: payload.len(),
    })?;

    let mut buf = Vec::with_capacity(WORD + 3 * (WORD + ID_WIDTH) + WORD + padded(payload.len()));
    buf.extend_from_slice(&FIELD_COUNT.to_be_bytes());
    for id in [oid.to_bytes(), start_tid.to_bytes(), end_tid.to_bytes()] {
        buf.extend_from_slice(&(ID_WIDTH as u32).to_be_bytes());
        buf.extend_from_slice(&id);
    }
    buf.extend_from_slice(&payload_len.to_be_bytes());
    buf.extend_from_slice(payload);
    buf.resize(buf.len() + padded(payload.len()) - payload.len(), 0);
    Ok(buf)
}

fn padded(len: usize) -> usize {
    len.div_ceil(WORD) * WORD
}

struct FieldReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> FieldReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn take(&mut self, needed: usize) -> Result<&'a [u8], EntryError> {
        let available = self.bytes.len() - self.offset;
        if needed > available {
            return Err(EntryError::Truncated {
                offset: self.offset,
                needed,
                available,
            });
        }
        let slice = &self.bytes[self.offset..self.offset + needed];
        self.offset += needed;
        Ok(slice)
    }

    fn read_u32(&mut self) -> Result<u32, EntryError> {
        let word = self.take(WORD)?;
        Ok(u32::from_be_bytes([word[0], word[1], word[2], word[3]]))
    }

    fn read_field(&mut self, field: &'static str) -> Result<&'a [u8], EntryError> {
        let len = self.read_u32()? as usize;
        let body = self.take(len)?;
        let padding = self.take(padded(len) - len)?;
        if padding.iter().any(|&b| b != 0) {
            return Err(EntryError::Padding { field });
        }
        Ok(body)
    }

    fn read_id_field(&mut self, field: &'static str) -> Result<[u8; ID_WIDTH], EntryError> {
        let body = self.read_field(field)?;
        body.try_into().map_err(|_| EntryError::FieldWidth {
            field,
            len: body.len(),
            expected: ID_WIDTH,
        })
    }

    fn finish(self) -> Result<(), EntryError> {
        let count = self.bytes.len() - self.offset;
        if count != 0 {
            return Err(EntryError::TrailingBytes { count });
        }
        Ok(())
    }
}
