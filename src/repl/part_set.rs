//! Part accumulator: fragments of one blob gathered from peers.

use crate::domain::blob_id::BlobId;
use crate::domain::ports::ErasureCoder;
use crate::ec::scheme::ErasureScheme;
use crate::error::Result;
use crate::repl::parts::{PartMask, MAX_PARTS};

/// Status of one peer's reply for a blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStatus {
    /// Peer returned a part
    Ok,
    /// Peer has no data for the blob
    NoData,
    /// Peer has not finished its own replication yet
    NotYet,
    /// Request failed on the peer
    Error,
    /// Peer did not answer in time
    Deadline,
}

/// Parts of one blob collected across peers for a single batch.
#[derive(Debug, Clone)]
pub struct PartSet {
    parts: Vec<Option<Vec<u8>>>,
    parts_mask: PartMask,
    full_data_size: u32,
    disks_replied_ok: u32,
    disks_replied_nodata: u32,
    disks_replied_not_yet: u32,
    disks_replied_other: u32,
}

impl PartSet {
    pub fn new(scheme: ErasureScheme) -> Self {
        let total = scheme.total_part_count();
        Self {
            parts: vec![None; usize::from(total)],
            parts_mask: PartMask::empty(total),
            full_data_size: 0,
            disks_replied_ok: 0,
            disks_replied_nodata: 0,
            disks_replied_not_yet: 0,
            disks_replied_other: 0,
        }
    }

    /// Record one peer reply.
    ///
    /// For `Ok` replies `id` must name the returned part; the reply's blob size
    /// becomes the declared full data size.
    pub fn add_data(&mut self, disk_idx: u8, id: BlobId, status: ReplyStatus, data: Vec<u8>) {
        assert!(disk_idx < MAX_PARTS, "peer index {disk_idx} out of range");
        let disk_bit = 1u32 << disk_idx;

        match status {
            ReplyStatus::Ok => {
                let position = id
                    .part_position()
                    .filter(|&p| usize::from(p) < self.parts.len());
                let Some(position) = position else {
                    panic!(
                        "part id {} of {} out of range for {} parts",
                        id.part_id(),
                        id,
                        self.parts.len()
                    );
                };
                self.full_data_size = id.blob_size();
                self.parts_mask.set(position);
                self.parts[usize::from(position)] = Some(data);
                self.disks_replied_ok |= disk_bit;
            }
            ReplyStatus::NoData => self.disks_replied_nodata |= disk_bit,
            ReplyStatus::NotYet => self.disks_replied_not_yet |= disk_bit,
            ReplyStatus::Error | ReplyStatus::Deadline => self.disks_replied_other |= disk_bit,
        }
    }

    /// Positions with a buffer present.
    pub fn parts_mask(&self) -> PartMask {
        self.parts_mask
    }

    /// Blob size declared by the peers that returned data.
    pub fn full_data_size(&self) -> u32 {
        self.full_data_size
    }

    pub fn part(&self, position: u8) -> Option<&[u8]> {
        self.parts.get(usize::from(position))?.as_deref()
    }

    /// Restore every missing part in place; afterwards all parts are present.
    pub fn restore(&mut self, coder: &dyn ErasureCoder) -> Result<()> {
        coder.restore(&mut self.parts)?;
        self.parts_mask = PartMask::full(self.parts_mask.size());
        Ok(())
    }

    pub fn disks_replied_ok(&self) -> u32 {
        self.disks_replied_ok
    }

    pub fn disks_replied_nodata(&self) -> u32 {
        self.disks_replied_nodata
    }

    pub fn disks_replied_not_yet(&self) -> u32 {
        self.disks_replied_not_yet
    }

    pub fn disks_replied_other(&self) -> u32 {
        self.disks_replied_other
    }
}

impl std::fmt::Display for PartSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{PartsMask# {} DisksRepliedOK# {:#b} DisksRepliedNODATA# {:#b} DisksRepliedNOT_YET# {:#b} DisksRepliedOther# {:#b}}}",
            self.parts_mask,
            self.disks_replied_ok,
            self.disks_replied_nodata,
            self.disks_replied_not_yet,
            self.disks_replied_other
        )
    }
}
