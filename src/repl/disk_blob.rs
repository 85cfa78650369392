//! Local on-disk record codec for recovered blobs.
//!
//! A record holds any subset of a blob's parts. Layout, little-endian:
//!
//! ```text
//! u8    total part count of the scheme
//! u32   parts bitmap
//! u32   full blob size
//! u32   part length, once per set bit, ascending position
//! ...   part payloads, concatenated in ascending position order
//! ```
//!
//! Header-only parts (zero-length payload) mark presence without data and are
//! superseded by a data-carrying payload when two records are merged.

use bytes::{Buf, BufMut, Bytes};

use crate::error::RecordError;
use crate::repl::arena::RecordArena;
use crate::repl::parts::{PartMask, MAX_PARTS};

const FIXED_HEADER_LEN: usize = 1 + 4 + 4;

type RecordResult<T> = std::result::Result<T, RecordError>;

/// Parsed view of a record; payloads borrow the record buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskBlob {
    parts: PartMask,
    full_data_size: u32,
    payloads: Vec<Bytes>,
}

fn ensure(buf: &Bytes, needed: usize) -> RecordResult<()> {
    if buf.remaining() < needed {
        return Err(RecordError::Truncated {
            needed,
            available: buf.remaining(),
        });
    }
    Ok(())
}

fn check_total_parts(total_parts: u8) -> RecordResult<()> {
    if total_parts > MAX_PARTS {
        return Err(RecordError::PositionOutOfRange {
            position: total_parts - 1,
            total_parts: MAX_PARTS,
        });
    }
    Ok(())
}

fn write_record<P: AsRef<[u8]>>(
    parts: PartMask,
    full_data_size: u32,
    payloads: &[P],
    arena: &mut RecordArena,
) -> Bytes {
    let data_len: usize = payloads.iter().map(|p| p.as_ref().len()).sum();
    let len = FIXED_HEADER_LEN + 4 * payloads.len() + data_len;

    arena.build(len, |buf| {
        buf.put_u8(parts.size());
        buf.put_u32_le(parts.bits());
        buf.put_u32_le(full_data_size);
        for payload in payloads {
            buf.put_u32_le(payload.as_ref().len() as u32);
        }
        for payload in payloads {
            buf.put_slice(payload.as_ref());
        }
    })
}

impl DiskBlob {
    /// Build a record holding the single part at `position`.
    pub fn create(
        full_data_size: u32,
        position: u8,
        total_parts: u8,
        data: &[u8],
        arena: &mut RecordArena,
    ) -> RecordResult<Bytes> {
        check_total_parts(total_parts)?;
        if position >= total_parts {
            return Err(RecordError::PositionOutOfRange {
                position,
                total_parts,
            });
        }
        let parts = PartMask::one_hot(position, total_parts);
        Ok(write_record(parts, full_data_size, &[data], arena))
    }

    /// Build a record from non-overlapping part buffers, one per set position.
    pub fn create_from_distinct_parts<P: AsRef<[u8]>>(
        payloads: &[P],
        positions: PartMask,
        full_data_size: u32,
        arena: &mut RecordArena,
    ) -> RecordResult<Bytes> {
        if payloads.len() != positions.count() as usize {
            return Err(RecordError::PartCountMismatch {
                buffers: payloads.len(),
                positions: positions.count() as usize,
            });
        }
        Ok(write_record(positions, full_data_size, payloads, arena))
    }

    /// Merge two records addressed to the same blob.
    ///
    /// The result holds the union of both parts bitmaps.
    pub fn merge(a: &Bytes, b: &Bytes, arena: &mut RecordArena) -> RecordResult<(Bytes, PartMask)> {
        let left = Self::parse(a)?;
        let right = Self::parse(b)?;

        if left.parts.size() != right.parts.size() {
            return Err(RecordError::HeaderMismatch {
                field: "total_parts",
                left: u32::from(left.parts.size()),
                right: u32::from(right.parts.size()),
            });
        }
        if left.full_data_size != right.full_data_size {
            return Err(RecordError::HeaderMismatch {
                field: "full_data_size",
                left: left.full_data_size,
                right: right.full_data_size,
            });
        }

        let parts = left.parts.union(right.parts);
        let mut payloads = Vec::with_capacity(parts.count() as usize);
        for position in parts {
            let payload = match (left.part(position), right.part(position)) {
                (Some(l), Some(r)) if l.is_empty() => r,
                (Some(l), Some(r)) if r.is_empty() || l.len() == r.len() => l,
                (Some(l), Some(r)) => {
                    return Err(RecordError::ConflictingPart {
                        position,
                        left: l.len(),
                        right: r.len(),
                    })
                }
                (Some(l), None) => l,
                (None, Some(r)) => r,
                (None, None) => unreachable!("position {position} comes from the union"),
            };
            payloads.push(payload.clone());
        }

        Ok((
            write_record(parts, left.full_data_size, &payloads, arena),
            parts,
        ))
    }

    /// Parse a record without copying its payloads.
    pub fn parse(data: &Bytes) -> RecordResult<Self> {
        let mut buf = data.clone();
        ensure(&buf, FIXED_HEADER_LEN)?;

        let total_parts = buf.get_u8();
        check_total_parts(total_parts)?;
        let bits = buf.get_u32_le();
        let full = PartMask::full(total_parts);
        if bits & !full.bits() != 0 {
            return Err(RecordError::PositionOutOfRange {
                position: (31 - bits.leading_zeros()) as u8,
                total_parts,
            });
        }
        let parts = PartMask::from_bits(bits, total_parts);
        let full_data_size = buf.get_u32_le();

        let count = parts.count() as usize;
        ensure(&buf, 4 * count)?;
        let lengths: Vec<usize> = (0..count).map(|_| buf.get_u32_le() as usize).collect();

        let mut payloads = Vec::with_capacity(count);
        for len in lengths {
            ensure(&buf, len)?;
            payloads.push(buf.split_to(len));
        }
        if buf.has_remaining() {
            return Err(RecordError::TrailingBytes(buf.remaining()));
        }

        Ok(Self {
            parts,
            full_data_size,
            payloads,
        })
    }

    pub fn total_parts(&self) -> u8 {
        self.parts.size()
    }

    pub fn parts(&self) -> PartMask {
        self.parts
    }

    pub fn full_data_size(&self) -> u32 {
        self.full_data_size
    }

    /// Payload of the part at `position`, if the record holds it.
    pub fn part(&self, position: u8) -> Option<&Bytes> {
        if !self.parts.get(position) {
            return None;
        }
        let index = self.parts.iter().take_while(|&p| p < position).count();
        self.payloads.get(index)
    }

    /// `(position, payload)` pairs in ascending position order.
    pub fn iter_parts(&self) -> impl Iterator<Item = (u8, &Bytes)> + '_ {
        self.parts.iter().zip(self.payloads.iter())
    }
}
