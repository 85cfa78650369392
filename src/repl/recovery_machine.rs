//! Recovery Machine
//!
//! Restores the parts a storage node lost from the parts its peers returned.
//!
//! Planning fills two queues in strictly ascending id order: lost-blob tasks
//! and metadata-only entries. Gathered part sets then arrive one blob at a
//! time, also ascending, and are merge-joined against both queues:
//!
//! ```text
//!   metadata queue ──┐
//!                    ├──▶ recover(id, part set) ──▶ RecoveredBlobsQueue
//!   task queue ──────┘            │
//!                                 └──▶ unreplicated ids (retry later)
//! ```
//!
//! Every task leaves the queue exactly once: as a recovered record (full or
//! partial), as an unreplicated id, or as a skip.

use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::config::ReplConfig;
use crate::domain::blob_id::BlobId;
use crate::domain::ports::ErasureCoder;
use crate::ec::scheme::ErasureScheme;
use crate::error::{Error, Result};
use crate::metrics::ReplMonGroup;
use crate::repl::arena::RecordArena;
use crate::repl::disk_blob::DiskBlob;
use crate::repl::huge::HugeBlobCtx;
use crate::repl::part_set::PartSet;
use crate::repl::parts::PartMask;
use crate::repl::stats::ReplInfo;
use crate::repl::task::{Ingress, LostBlob};

/// A record ready to be committed by the persistence layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveredBlob {
    /// Whole-blob id, or a part id for huge blobs
    pub id: BlobId,
    /// Encoded local record
    pub data: Bytes,
    /// Parts the record represents
    pub local_parts: PartMask,
    /// Stored as an independent per-part record
    pub is_huge: bool,
}

pub type RecoveredBlobsQueue = VecDeque<RecoveredBlob>;

/// Per-blob outcome of the restoration path
#[derive(Debug, Default)]
struct PartTally {
    exact: u64,
    restored: u64,
    missing: u64,
    bytes: u64,
    small: u64,
    huge: u64,
}

pub struct RecoveryMachine {
    coder: Arc<dyn ErasureCoder>,
    scheme: ErasureScheme,
    huge_blob_ctx: HugeBlobCtx,
    max_lost_vec_size: usize,
    mon: ReplMonGroup,
    lost_vec: VecDeque<LostBlob>,
    metadata_parts: VecDeque<BlobId>,
    unreplicated: VecDeque<BlobId>,
    arena: RecordArena,
    last_recovered_id: Option<BlobId>,
    last_parts: PartMask,
}

impl std::fmt::Debug for RecoveryMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryMachine")
            .field("scheme", &self.scheme)
            .field("lost_vec", &self.lost_vec.len())
            .field("metadata_parts", &self.metadata_parts.len())
            .field("unreplicated", &self.unreplicated.len())
            .field("last_recovered_id", &self.last_recovered_id)
            .finish()
    }
}

impl RecoveryMachine {
    pub fn new(config: &ReplConfig, coder: Arc<dyn ErasureCoder>, mon: ReplMonGroup) -> Self {
        let scheme = coder.scheme();
        Self {
            coder,
            scheme,
            huge_blob_ctx: HugeBlobCtx::new(config.huge_blob_threshold),
            max_lost_vec_size: config.max_lost_vec_size,
            mon,
            lost_vec: VecDeque::new(),
            metadata_parts: VecDeque::new(),
            unreplicated: VecDeque::new(),
            arena: RecordArena::new(config.arena_chunk_size),
            last_recovered_id: None,
            last_parts: PartMask::empty(scheme.total_part_count()),
        }
    }

    /// Recover one blob from the parts gathered for it.
    ///
    /// Returns `false` only when the blob was deferred to a phantom check.
    ///
    /// # Panics
    ///
    /// If `id` names a single part, is not greater than the previously
    /// recovered id, disagrees with the gathered parts on the blob size, or a
    /// gathered part is not exactly the scheme's part size.
    pub fn recover(
        &mut self,
        id: BlobId,
        part_set: &mut PartSet,
        rbq: &mut RecoveredBlobsQueue,
        info: &mut ReplInfo,
    ) -> bool {
        assert_eq!(id.part_id(), 0, "recover expects a whole-blob id, got {id}");
        if let Some(last) = self.last_recovered_id {
            assert!(last < id, "blob ids must strictly increase: {id} after {last}");
        }
        self.last_recovered_id = Some(id);

        self.recover_metadata(id, rbq, info);

        while self.lost_vec.front().is_some_and(|item| item.id < id) {
            if let Some(item) = self.lost_vec.pop_front() {
                self.skip_item(&item, info);
            }
        }

        let lost = match self.lost_vec.pop_front() {
            Some(item) if item.id == id => item,
            other => {
                if let Some(item) = other {
                    self.lost_vec.push_front(item);
                }
                error!(blob_id = %id, "blob not in lost vec");
                return true;
            }
        };

        let parts = lost.parts_to_recover;
        self.last_parts = parts;

        let present = part_set.parts_mask();
        let has_exact_parts = !parts.intersection(present).is_empty();
        let need_to_restore = !parts.difference(present).is_empty();
        let present_parts = present.count();
        let min_parts = self.scheme.minimal_restorable_part_count();
        let can_restore = self.coder.can_restore(present_parts as usize);

        if lost.possible_phantom && need_to_restore && !can_restore {
            info.data_recovery_no_parts += 1;
            info.parts_missing += u64::from(parts.count());
            info.data_recovery_phantom_check += 1;
            // treated as a real blob until the phantom check says otherwise
            self.unreplicated.push_back(id);
            debug!(blob_id = %id, present_parts, "deferring possible phantom blob");
            return false;
        }

        if !can_restore && need_to_restore && !has_exact_parts {
            info.data_recovery_no_parts += 1;
            info.parts_missing += u64::from(parts.count());
            info!(
                blob_id = %id,
                present_parts,
                min_parts,
                part_set = %part_set,
                ingress = %lost.ingress,
                "not enough data parts to recover"
            );
            self.unreplicated.push_back(id);
            return true;
        }

        if !present.is_empty() {
            assert_eq!(
                part_set.full_data_size(),
                id.blob_size(),
                "peers declared a different size for {id}"
            );
            let part_size = self.scheme.part_size(id.blob_size());
            for position in present {
                let actual = part_set.part(position).map_or(0, <[u8]>::len);
                assert_eq!(
                    actual, part_size,
                    "part {position} of {id} has {actual} bytes, expected {part_size}"
                );
            }
        }

        match self.restore_blob(id, parts, part_set, can_restore && need_to_restore, rbq) {
            Ok(tally) => self.account_recovered(id, &lost, tally, info),
            Err(e) => {
                self.mon.repl_recovery_group_type_errors.inc();
                error!(blob_id = %id, error = %e, "recovery exception");
                info.data_recovery_failure += 1;
                self.unreplicated.push_back(id);
            }
        }

        true
    }

    /// Restore what is missing and queue records for the requested parts.
    ///
    /// Nothing is queued unless the whole blob succeeds.
    fn restore_blob(
        &mut self,
        id: BlobId,
        parts: PartMask,
        part_set: &mut PartSet,
        restore: bool,
        rbq: &mut RecoveredBlobsQueue,
    ) -> Result<PartTally> {
        let total_parts = self.scheme.total_part_count();
        let incoming = part_set.parts_mask();
        if restore {
            part_set.restore(self.coder.as_ref())?;
        }
        let available = part_set.parts_mask();

        let part_size = self.scheme.part_size(id.blob_size());
        let is_huge = self.huge_blob_ctx.is_huge_blob(&self.scheme, id);

        let mut tally = PartTally::default();
        let mut huge_records = Vec::new();
        let mut small_parts: Vec<&[u8]> = Vec::new();
        let mut small = PartMask::empty(total_parts);

        for position in parts {
            if !available.get(position) {
                tally.missing += 1;
                continue;
            }
            if incoming.get(position) {
                tally.exact += 1;
            } else {
                tally.restored += 1;
            }

            let data = part_set.part(position).ok_or_else(|| {
                Error::Internal(format!("part {} of {} marked present without data", position, id))
            })?;
            tally.bytes += part_size as u64;

            if is_huge {
                let record =
                    DiskBlob::create(id.blob_size(), position, total_parts, data, &mut self.arena)?;
                huge_records.push(RecoveredBlob {
                    id: id.with_part(position + 1),
                    data: record,
                    local_parts: PartMask::one_hot(position, total_parts),
                    is_huge: true,
                });
            } else {
                small_parts.push(data);
                small.set(position);
            }
        }

        let small_record = if small_parts.is_empty() {
            None
        } else {
            Some(DiskBlob::create_from_distinct_parts(
                &small_parts,
                small,
                id.blob_size(),
                &mut self.arena,
            )?)
        };

        tally.huge = huge_records.len() as u64;
        tally.small = small_parts.len() as u64;

        for record in huge_records {
            self.add_blob_to_queue(record, rbq)?;
        }
        if let Some(data) = small_record {
            self.add_blob_to_queue(
                RecoveredBlob {
                    id,
                    data,
                    local_parts: small,
                    is_huge: false,
                },
                rbq,
            )?;
        }

        Ok(tally)
    }

    fn account_recovered(&mut self, id: BlobId, lost: &LostBlob, tally: PartTally, info: &mut ReplInfo) {
        if tally.missing > 0 {
            // not fully replicated yet
            self.unreplicated.push_back(id);
        }

        info.logo_blobs_recovered += tally.small;
        info.huge_logo_blobs_recovered += tally.huge;
        info.bytes_recovered += tally.bytes;
        info.parts_exact += tally.exact;
        info.parts_restored += tally.restored;
        info.parts_missing += tally.missing;
        info.data_recovery_success += 1;
        info.work_units_processed += u64::from(id.blob_size());

        if tally.missing == 0 {
            self.mon.repl_work_units_done.inc_by(u64::from(id.blob_size()));
            self.mon.repl_work_units_remaining.sub(i64::from(id.blob_size()));
        }
        if lost.possible_phantom {
            self.mon.repl_phantom_like_recovered.inc();
        }

        debug!(
            blob_id = %id,
            exact = tally.exact,
            restored = tally.restored,
            missing = tally.missing,
            "blob recovered"
        );
    }

    /// Book the verdict of a phantom check.
    pub fn process_phantom_blob(&self, id: BlobId, parts: PartMask, is_phantom: bool) {
        info!(blob_id = %id, parts = %parts, is_phantom, "phantom check completed");

        if is_phantom {
            self.mon.repl_phantom_like_dropped.inc();
        } else {
            self.mon.repl_phantom_like_unrecovered.inc();
        }
    }

    /// Flush all metadata and skip every task still queued.
    pub fn finish(&mut self, rbq: &mut RecoveredBlobsQueue, info: &mut ReplInfo) {
        self.recover_metadata(BlobId::max(), rbq, info);
        for item in std::mem::take(&mut self.lost_vec) {
            self.skip_item(&item, info);
        }
    }

    /// Queue a lost blob during planning.
    ///
    /// # Panics
    ///
    /// If `id` names a single part, is not greater than the last queued task,
    /// or `parts_to_recover` does not match the scheme.
    pub fn add_task(
        &mut self,
        id: BlobId,
        parts_to_recover: PartMask,
        possible_phantom: bool,
        ingress: Ingress,
    ) {
        assert_eq!(id.part_id(), 0, "tasks address whole blobs, got {id}");
        if let Some(back) = self.lost_vec.back() {
            assert!(back.id < id, "task ids must strictly increase: {id} after {}", back.id);
        }
        assert_eq!(
            parts_to_recover.size(),
            self.scheme.total_part_count(),
            "parts mask of {id} does not match scheme {}",
            self.scheme
        );
        self.lost_vec
            .push_back(LostBlob::new(id, parts_to_recover, possible_phantom, ingress));
    }

    pub fn add_metadata_part(&mut self, id: BlobId) {
        self.metadata_parts.push_back(id);
    }

    pub fn full_of_tasks(&self) -> bool {
        self.lost_vec.len() >= self.max_lost_vec_size
    }

    pub fn no_tasks(&self) -> bool {
        self.lost_vec.is_empty() && self.metadata_parts.is_empty()
    }

    /// Mark every queued task as certainly written.
    pub fn clear_possible_phantom(&mut self) {
        for item in self.lost_vec.iter_mut() {
            item.possible_phantom = false;
        }
    }

    /// Visit queued tasks in id order.
    pub fn for_each(&self, mut visitor: impl FnMut(BlobId, PartMask, Ingress)) {
        for item in &self.lost_vec {
            visitor(item.id, item.parts_to_recover, item.ingress);
        }
    }

    /// Parts requested by the task most recently matched in `recover`.
    pub fn last_parts(&self) -> PartMask {
        self.last_parts
    }

    pub fn unreplicated(&self) -> &VecDeque<BlobId> {
        &self.unreplicated
    }

    pub fn take_unreplicated(&mut self) -> Vec<BlobId> {
        self.unreplicated.drain(..).collect()
    }

    pub fn mon(&self) -> &ReplMonGroup {
        &self.mon
    }

    pub fn scheme(&self) -> ErasureScheme {
        self.scheme
    }

    /// Start a fresh arena chunk; committed records keep their buffers.
    pub fn reset_arena(&mut self) {
        self.arena.reset();
    }

    fn add_blob_to_queue(&mut self, blob: RecoveredBlob, rbq: &mut RecoveredBlobsQueue) -> Result<()> {
        if !blob.is_huge {
            if let Some(last) = rbq
                .back_mut()
                .filter(|last| last.id == blob.id && !last.is_huge)
            {
                let (data, parts) = DiskBlob::merge(&last.data, &blob.data, &mut self.arena)?;
                last.data = data;
                last.local_parts = parts;
                return Ok(());
            }
        }
        rbq.push_back(blob);
        Ok(())
    }

    fn recover_metadata(&mut self, boundary: BlobId, rbq: &mut RecoveredBlobsQueue, info: &mut ReplInfo) {
        let total_parts = self.scheme.total_part_count();

        while let Some(&id) = self.metadata_parts.front() {
            if id.full_id() > boundary {
                break;
            }
            self.metadata_parts.pop_front();

            let is_huge = self.huge_blob_ctx.is_huge_blob(&self.scheme, id.full_id());
            debug!(blob_id = %id, is_huge, "recovering metadata blob");

            let blob = if is_huge {
                // huge metadata carries no data and keeps its part id
                Ok(RecoveredBlob {
                    id,
                    data: Bytes::new(),
                    local_parts: id
                        .part_position()
                        .map_or(PartMask::empty(total_parts), |p| PartMask::one_hot(p, total_parts)),
                    is_huge: true,
                })
            } else {
                let Some(position) = id.part_position().filter(|&p| p < total_parts) else {
                    panic!("metadata blob {id} has no part id within {total_parts} parts");
                };
                let parts = PartMask::one_hot(position, total_parts);
                let empty: [&[u8]; 1] = [&[]];
                DiskBlob::create_from_distinct_parts(&empty, parts, id.blob_size(), &mut self.arena)
                    .map(|data| RecoveredBlob {
                        id: id.full_id(),
                        data,
                        local_parts: parts,
                        is_huge: false,
                    })
            };

            let queued = match blob {
                Ok(blob) => self.add_blob_to_queue(blob, rbq),
                Err(e) => Err(e.into()),
            };
            match queued {
                Ok(()) => info.metadata_blobs += 1,
                Err(e) => {
                    self.mon.repl_recovery_group_type_errors.inc();
                    error!(blob_id = %id, error = %e, "metadata recovery failed");
                    self.unreplicated.push_back(id.full_id());
                }
            }
        }
    }

    fn skip_item(&mut self, item: &LostBlob, info: &mut ReplInfo) {
        info!(blob_id = %item.id, "skipping blob without peer data");
        info.data_recovery_skip += 1;
        self.unreplicated.push_back(item.id);
        if item.possible_phantom {
            self.mon.repl_phantom_like_unrecovered.inc();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ReedSolomonCoder;
    use crate::repl::part_set::ReplyStatus;

    struct FailingCoder(ErasureScheme);

    impl ErasureCoder for FailingCoder {
        fn scheme(&self) -> ErasureScheme {
            self.0
        }

        fn split(&self, _data: &[u8]) -> Result<Vec<Vec<u8>>> {
            Err(Error::EcEncodingFailed("split disabled".to_string()))
        }

        fn restore(&self, _parts: &mut [Option<Vec<u8>>]) -> Result<()> {
            Err(Error::EcRestoreFailed("corrupted parts".to_string()))
        }
    }

    struct Fixture {
        machine: RecoveryMachine,
        coder: Arc<ReedSolomonCoder>,
        rbq: RecoveredBlobsQueue,
        info: ReplInfo,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_config(ReplConfig::default())
        }

        fn with_config(config: ReplConfig) -> Self {
            let coder = Arc::new(ReedSolomonCoder::standard_4_2().unwrap());
            let machine =
                RecoveryMachine::new(&config, coder.clone(), ReplMonGroup::new().unwrap());
            Self {
                machine,
                coder,
                rbq: RecoveredBlobsQueue::new(),
                info: ReplInfo::default(),
            }
        }

        /// Encode a payload for `id` and gather the parts at `positions`.
        fn gather(&self, id: BlobId, positions: &[u8]) -> (PartSet, Vec<Vec<u8>>) {
            let payload: Vec<u8> = (0..id.blob_size()).map(|i| (i * 7 + 3) as u8).collect();
            let parts = self.coder.split(&payload).unwrap();
            let mut set = PartSet::new(self.coder.scheme());
            for &position in positions {
                set.add_data(
                    position,
                    id.with_part(position + 1),
                    ReplyStatus::Ok,
                    parts[usize::from(position)].clone(),
                );
            }
            (set, parts)
        }

        fn add_task(&mut self, id: BlobId, parts: &[u8], phantom: bool) {
            self.machine
                .add_task(id, PartMask::from_positions(parts, 6), phantom, Ingress(1));
        }

        fn recover(&mut self, id: BlobId, set: &mut PartSet) -> bool {
            self.machine.recover(id, set, &mut self.rbq, &mut self.info)
        }

        fn finish(&mut self) {
            self.machine.finish(&mut self.rbq, &mut self.info);
        }
    }

    fn blob(step: u32) -> BlobId {
        BlobId::new(100, 1, step, 0, 0, 600)
    }

    const ALL: [u8; 6] = [0, 1, 2, 3, 4, 5];

    #[test]
    fn test_exact_parts_without_restore() {
        let mut fx = Fixture::new();
        fx.add_task(blob(1), &[1, 4], false);
        let (mut set, parts) = fx.gather(blob(1), &ALL);

        assert!(fx.recover(blob(1), &mut set));

        assert_eq!(fx.rbq.len(), 1);
        let record = &fx.rbq[0];
        assert_eq!(record.local_parts, PartMask::from_positions(&[1, 4], 6));
        assert!(!record.is_huge);
        let disk = DiskBlob::parse(&record.data).unwrap();
        assert_eq!(disk.part(1).map(|p| p.to_vec()), Some(parts[1].clone()));
        assert_eq!(disk.part(4).map(|p| p.to_vec()), Some(parts[4].clone()));

        assert_eq!(fx.info.parts_exact, 2);
        assert_eq!(fx.info.parts_restored, 0);
        assert_eq!(fx.info.bytes_recovered, 300);
        assert_eq!(fx.info.logo_blobs_recovered, 2);
        assert!(fx.machine.unreplicated().is_empty());
    }

    #[test]
    fn test_restore_from_minimal_parts() {
        let mut fx = Fixture::new();
        fx.add_task(blob(1), &ALL, false);
        let (mut set, parts) = fx.gather(blob(1), &[0, 1, 2, 3]);

        assert!(fx.recover(blob(1), &mut set));

        assert_eq!(fx.rbq.len(), 1);
        assert_eq!(fx.rbq[0].local_parts.bits(), 0b111111);
        let disk = DiskBlob::parse(&fx.rbq[0].data).unwrap();
        for (position, data) in disk.iter_parts() {
            assert_eq!(&data[..], parts[usize::from(position)].as_slice());
        }

        assert_eq!(fx.info.parts_restored, 2);
        assert_eq!(fx.info.parts_exact, 4);
        assert_eq!(fx.info.parts_missing, 0);
        assert_eq!(fx.info.data_recovery_success, 1);
        assert_eq!(fx.info.work_units_processed, 600);
        assert!(fx.machine.unreplicated().is_empty());
        assert_eq!(fx.machine.mon().repl_work_units_done.get(), 600);
    }

    #[test]
    fn test_insufficient_parts() {
        let mut fx = Fixture::new();
        fx.add_task(blob(1), &ALL, false);
        let (mut set, _) = fx.gather(blob(1), &[0, 1, 2]);

        assert!(fx.recover(blob(1), &mut set));

        assert!(fx.rbq.is_empty());
        assert_eq!(fx.info.data_recovery_no_parts, 1);
        assert_eq!(fx.info.parts_missing, 6);
        assert_eq!(fx.info.data_recovery_success, 0);
        assert_eq!(fx.machine.unreplicated(), &VecDeque::from([blob(1)]));
    }

    #[test]
    fn test_possible_phantom_is_deferred() {
        let mut fx = Fixture::new();
        fx.add_task(blob(1), &[4, 5], true);
        let (mut set, _) = fx.gather(blob(1), &[0]);

        assert!(!fx.recover(blob(1), &mut set));

        assert!(fx.rbq.is_empty());
        assert_eq!(fx.info.data_recovery_phantom_check, 1);
        assert_eq!(fx.info.data_recovery_no_parts, 1);
        assert_eq!(fx.info.parts_missing, 2);
        assert_eq!(fx.machine.unreplicated(), &VecDeque::from([blob(1)]));
        assert_eq!(fx.machine.last_parts(), PartMask::from_positions(&[4, 5], 6));
        assert!(fx.machine.no_tasks());
    }

    #[test]
    fn test_cleared_phantom_is_not_deferred() {
        let mut fx = Fixture::new();
        fx.add_task(blob(1), &[4, 5], true);
        fx.machine.clear_possible_phantom();
        let (mut set, _) = fx.gather(blob(1), &[0]);

        assert!(fx.recover(blob(1), &mut set));
        assert_eq!(fx.info.data_recovery_phantom_check, 0);
        assert_eq!(fx.info.data_recovery_no_parts, 1);
    }

    #[test]
    fn test_partial_recovery_of_exact_parts() {
        let mut fx = Fixture::new();
        fx.add_task(blob(1), &[0, 4], false);
        let (mut set, _) = fx.gather(blob(1), &[0, 1]);

        assert!(fx.recover(blob(1), &mut set));

        assert_eq!(fx.rbq.len(), 1);
        assert_eq!(fx.rbq[0].local_parts, PartMask::one_hot(0, 6));
        assert_eq!(fx.info.parts_exact, 1);
        assert_eq!(fx.info.parts_missing, 1);
        assert_eq!(fx.info.data_recovery_success, 1);
        assert_eq!(fx.machine.unreplicated(), &VecDeque::from([blob(1)]));
        assert_eq!(fx.machine.mon().repl_work_units_done.get(), 0);
    }

    #[test]
    fn test_phantom_like_recovered() {
        let mut fx = Fixture::new();
        fx.add_task(blob(1), &[5], true);
        let (mut set, _) = fx.gather(blob(1), &[0, 1, 2, 3]);

        assert!(fx.recover(blob(1), &mut set));
        assert_eq!(fx.machine.mon().repl_phantom_like_recovered.get(), 1);
        assert_eq!(fx.info.parts_restored, 1);
    }

    #[test]
    fn test_earlier_tasks_are_skipped() {
        let mut fx = Fixture::new();
        fx.add_task(blob(1), &[0], false);
        fx.add_task(blob(2), &[1], true);
        fx.add_task(blob(3), &[2], false);
        let (mut set, _) = fx.gather(blob(3), &ALL);

        assert!(fx.recover(blob(3), &mut set));

        assert_eq!(fx.info.data_recovery_skip, 2);
        assert_eq!(fx.info.data_recovery_success, 1);
        assert_eq!(fx.machine.unreplicated(), &VecDeque::from([blob(1), blob(2)]));
        assert_eq!(fx.machine.mon().repl_phantom_like_unrecovered.get(), 1);
        assert!(fx.machine.no_tasks());
    }

    #[test]
    fn test_blob_not_in_lost_vec() {
        let mut fx = Fixture::new();
        fx.add_task(blob(5), &[0], false);
        let (mut set, _) = fx.gather(blob(2), &ALL);

        assert!(fx.recover(blob(2), &mut set));

        assert!(fx.rbq.is_empty());
        assert_eq!(fx.info, ReplInfo::default());
        assert!(!fx.machine.no_tasks());

        // the unmatched task is still at the front
        let (mut set, _) = fx.gather(blob(5), &ALL);
        assert!(fx.recover(blob(5), &mut set));
        assert_eq!(fx.info.data_recovery_success, 1);
        assert!(fx.machine.no_tasks());
    }

    #[test]
    #[should_panic(expected = "strictly increase")]
    fn test_non_increasing_recover_panics() {
        let mut fx = Fixture::new();
        fx.add_task(blob(1), &[0], false);
        fx.add_task(blob(2), &[0], false);
        let (mut set, _) = fx.gather(blob(2), &ALL);
        fx.recover(blob(2), &mut set);
        let (mut set, _) = fx.gather(blob(1), &ALL);
        fx.recover(blob(1), &mut set);
    }

    #[test]
    #[should_panic(expected = "strictly increase")]
    fn test_non_increasing_add_task_panics() {
        let mut fx = Fixture::new();
        fx.add_task(blob(2), &[0], false);
        fx.add_task(blob(2), &[1], false);
    }

    #[test]
    #[should_panic(expected = "whole-blob id")]
    fn test_recover_part_id_panics() {
        let mut fx = Fixture::new();
        let (mut set, _) = fx.gather(blob(1), &ALL);
        fx.recover(blob(1).with_part(2), &mut set);
    }

    #[test]
    #[should_panic(expected = "different size")]
    fn test_size_mismatch_panics() {
        let mut fx = Fixture::new();
        let other = BlobId::new(100, 1, 1, 0, 0, 400);
        fx.add_task(blob(1), &[0], false);
        let (mut set, _) = fx.gather(other, &ALL);
        fx.recover(blob(1), &mut set);
    }

    #[test]
    fn test_decode_failure_is_per_blob() {
        let config = ReplConfig::default();
        let scheme = ErasureScheme::block_4_2();
        let mut machine = RecoveryMachine::new(
            &config,
            Arc::new(FailingCoder(scheme)),
            ReplMonGroup::new().unwrap(),
        );
        let fx = Fixture::new();
        let mut rbq = RecoveredBlobsQueue::new();
        let mut info = ReplInfo::default();

        machine.add_task(blob(1), PartMask::full(6), false, Ingress(0));
        machine.add_task(blob(2), PartMask::one_hot(0, 6), false, Ingress(0));

        let (mut set, _) = fx.gather(blob(1), &[0, 1, 2, 3]);
        assert!(machine.recover(blob(1), &mut set, &mut rbq, &mut info));
        let (mut set, _) = fx.gather(blob(2), &ALL);
        assert!(machine.recover(blob(2), &mut set, &mut rbq, &mut info));

        assert_eq!(info.data_recovery_failure, 1);
        assert_eq!(info.data_recovery_success, 1);
        assert_eq!(machine.mon().repl_recovery_group_type_errors.get(), 1);
        assert_eq!(machine.unreplicated(), &VecDeque::from([blob(1)]));
        assert_eq!(rbq.len(), 1);
        assert_eq!(rbq[0].id, blob(2));
    }

    #[test]
    #[should_panic(expected = "has 10 bytes, expected 150")]
    fn test_wrong_part_size_panics() {
        let mut fx = Fixture::new();
        fx.add_task(blob(1), &[0], false);
        let mut set = PartSet::new(ErasureScheme::block_4_2());
        set.add_data(0, blob(1).with_part(1), ReplyStatus::Ok, vec![0u8; 10]);

        fx.recover(blob(1), &mut set);
    }

    #[test]
    #[should_panic(expected = "has 10 bytes, expected 150")]
    fn test_wrong_part_size_panics_before_restore() {
        let mut fx = Fixture::new();
        fx.add_task(blob(1), &[5], false);
        let (mut set, _) = fx.gather(blob(1), &[0, 1, 2]);
        set.add_data(3, blob(1).with_part(4), ReplyStatus::Ok, vec![0u8; 10]);

        fx.recover(blob(1), &mut set);
    }

    #[test]
    fn test_huge_blob_gets_per_part_records() {
        let config = ReplConfig {
            huge_blob_threshold: 100,
            ..Default::default()
        };
        let mut fx = Fixture::with_config(config);
        fx.add_task(blob(1), &[4, 5], false);
        let (mut set, parts) = fx.gather(blob(1), &[0, 1, 2, 3]);

        assert!(fx.recover(blob(1), &mut set));

        assert_eq!(fx.rbq.len(), 2);
        for (record, position) in fx.rbq.iter().zip([4u8, 5]) {
            assert!(record.is_huge);
            assert_eq!(record.id, blob(1).with_part(position + 1));
            assert_eq!(record.local_parts, PartMask::one_hot(position, 6));
            let disk = DiskBlob::parse(&record.data).unwrap();
            assert_eq!(disk.full_data_size(), 600);
            assert_eq!(
                disk.part(position).map(|p| p.to_vec()),
                Some(parts[usize::from(position)].clone())
            );
        }
        assert_eq!(fx.info.huge_logo_blobs_recovered, 2);
        assert_eq!(fx.info.logo_blobs_recovered, 0);
    }

    #[test]
    fn test_metadata_merges_with_later_task() {
        let mut fx = Fixture::new();
        fx.machine.add_metadata_part(blob(1).with_part(3));
        fx.add_task(blob(1), &[2, 3], false);
        let (mut set, parts) = fx.gather(blob(1), &ALL);

        assert!(fx.recover(blob(1), &mut set));

        assert_eq!(fx.rbq.len(), 1);
        let record = &fx.rbq[0];
        assert_eq!(record.id, blob(1));
        assert_eq!(record.local_parts, PartMask::from_positions(&[2, 3], 6));
        let disk = DiskBlob::parse(&record.data).unwrap();
        assert_eq!(disk.part(2).map(|p| p.to_vec()), Some(parts[2].clone()));
        assert_eq!(fx.info.metadata_blobs, 1);
    }

    #[test]
    fn test_metadata_flushed_in_order() {
        let mut fx = Fixture::new();
        fx.machine.add_metadata_part(blob(1).with_part(3));
        fx.machine.add_metadata_part(blob(4).with_part(1));
        fx.add_task(blob(2), &[0], false);
        let (mut set, _) = fx.gather(blob(2), &ALL);

        fx.recover(blob(2), &mut set);

        let ids: Vec<BlobId> = fx.rbq.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![blob(1), blob(2)]);
        assert_eq!(fx.rbq[0].local_parts, PartMask::one_hot(2, 6));
        assert!(DiskBlob::parse(&fx.rbq[0].data).unwrap().part(2).unwrap().is_empty());
        assert!(!fx.machine.no_tasks());

        fx.finish();
        assert_eq!(fx.rbq.len(), 3);
        assert_eq!(fx.info.metadata_blobs, 2);
        assert!(fx.machine.no_tasks());
    }

    #[test]
    fn test_huge_metadata_is_empty_record() {
        let config = ReplConfig {
            huge_blob_threshold: 100,
            ..Default::default()
        };
        let mut fx = Fixture::with_config(config);
        fx.machine.add_metadata_part(blob(1).with_part(2));

        fx.finish();

        assert_eq!(fx.rbq.len(), 1);
        assert!(fx.rbq[0].is_huge);
        assert!(fx.rbq[0].data.is_empty());
        assert_eq!(fx.rbq[0].id, blob(1).with_part(2));
    }

    #[test]
    fn test_failed_metadata_merge_is_unreplicated() {
        let mut fx = Fixture::new();
        fx.rbq.push_back(RecoveredBlob {
            id: blob(1),
            data: Bytes::from_static(b"garbage"),
            local_parts: PartMask::one_hot(0, 6),
            is_huge: false,
        });
        fx.machine.add_metadata_part(blob(1).with_part(2));
        fx.machine.add_metadata_part(blob(2).with_part(2));

        fx.finish();

        assert_eq!(fx.machine.mon().repl_recovery_group_type_errors.get(), 1);
        assert_eq!(fx.info.metadata_blobs, 1);
        assert_eq!(fx.machine.unreplicated(), &VecDeque::from([blob(1)]));
        assert_eq!(fx.rbq.len(), 2);
        assert_eq!(fx.rbq[1].id, blob(2));
    }

    #[test]
    fn test_consecutive_records_for_same_blob_merge() {
        let mut fx = Fixture::new();
        let mut second = Fixture::new();
        fx.add_task(blob(1), &[0, 1], false);
        second.add_task(blob(1), &[4, 5], false);

        let (mut set, _) = fx.gather(blob(1), &ALL);
        fx.recover(blob(1), &mut set);
        let (mut set, _) = second.gather(blob(1), &ALL);
        second
            .machine
            .recover(blob(1), &mut set, &mut fx.rbq, &mut fx.info);

        assert_eq!(fx.rbq.len(), 1);
        assert_eq!(fx.rbq[0].local_parts, PartMask::from_positions(&[0, 1, 4, 5], 6));
        assert_eq!(DiskBlob::parse(&fx.rbq[0].data).unwrap().parts().count(), 4);
    }

    #[test]
    fn test_finish_skips_remaining_and_is_idempotent() {
        let mut fx = Fixture::new();
        fx.add_task(blob(1), &[0], false);
        fx.add_task(blob(2), &[0], true);

        fx.finish();
        assert_eq!(fx.info.data_recovery_skip, 2);
        assert_eq!(fx.machine.mon().repl_phantom_like_unrecovered.get(), 1);
        assert!(fx.machine.no_tasks());

        let before = fx.info.clone();
        fx.finish();
        assert_eq!(fx.info, before);
        assert_eq!(fx.machine.take_unreplicated(), vec![blob(1), blob(2)]);
        assert!(fx.machine.unreplicated().is_empty());
    }

    #[test]
    fn test_full_of_tasks_and_for_each() {
        let config = ReplConfig {
            max_lost_vec_size: 2,
            ..Default::default()
        };
        let mut fx = Fixture::with_config(config);
        assert!(fx.machine.no_tasks());

        fx.add_task(blob(1), &[0], false);
        assert!(!fx.machine.full_of_tasks());
        fx.add_task(blob(2), &[1, 2], false);
        assert!(fx.machine.full_of_tasks());

        let mut visited = Vec::new();
        fx.machine
            .for_each(|id, parts, ingress| visited.push((id, parts.bits(), ingress)));
        assert_eq!(
            visited,
            vec![(blob(1), 0b1, Ingress(1)), (blob(2), 0b110, Ingress(1))]
        );
    }

    #[test]
    fn test_metadata_only_queue_is_not_empty() {
        let mut fx = Fixture::new();
        fx.machine.add_metadata_part(blob(1).with_part(1));
        assert!(!fx.machine.no_tasks());
    }

    #[test]
    fn test_process_phantom_blob() {
        let fx = Fixture::new();
        fx.machine.process_phantom_blob(blob(1), PartMask::full(6), true);
        fx.machine.process_phantom_blob(blob(2), PartMask::full(6), false);
        fx.machine.process_phantom_blob(blob(3), PartMask::full(6), false);

        assert_eq!(fx.machine.mon().repl_phantom_like_dropped.get(), 1);
        assert_eq!(fx.machine.mon().repl_phantom_like_unrecovered.get(), 2);
    }
}
