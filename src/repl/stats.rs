//! Per-job recovery statistics.

use serde::Serialize;

use crate::repl::time_account::PhaseDurations;

/// Outcome tallies of one replication job.
///
/// Owned by the caller; the recovery machine only increments fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplInfo {
    /// Blobs fully or partially recovered
    pub data_recovery_success: u64,
    /// Blobs whose restoration or record build failed
    pub data_recovery_failure: u64,
    /// Blobs without enough parts to restore
    pub data_recovery_no_parts: u64,
    /// Blobs for which no peer data arrived at all
    pub data_recovery_skip: u64,
    /// Blobs deferred to the phantom check
    pub data_recovery_phantom_check: u64,

    pub logo_blobs_recovered: u64,
    pub huge_logo_blobs_recovered: u64,
    pub bytes_recovered: u64,
    pub parts_exact: u64,
    pub parts_restored: u64,
    pub parts_missing: u64,
    pub metadata_blobs: u64,

    pub work_units_planned: u64,
    pub work_units_processed: u64,

    pub phases: PhaseDurations,
}

impl ReplInfo {
    /// Whether every planned work unit was processed.
    pub fn is_complete(&self) -> bool {
        self.work_units_processed >= self.work_units_planned
    }
}
