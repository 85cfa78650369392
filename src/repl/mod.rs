//! Replication Recovery Engine
//!
//! Rebuilds the erasure parts a storage node is missing from the parts its
//! peers hold, and turns them into local records.
//!
//! # Components
//!
//! - **Parts** (`parts.rs`): fixed-width part bitmaps
//! - **Part Accumulator** (`part_set.rs`): per-blob collection of peer replies
//! - **Record Builder** (`disk_blob.rs`, `arena.rs`): local record codec
//! - **Recovery Machine** (`recovery_machine.rs`): merge-join of gathered
//!   parts against planned tasks
//! - **Time Accounting** (`time_account.rs`): per-phase timing of a job
//! - **Job** (`job.rs`): the batch loop over the ports

pub mod arena;
pub mod disk_blob;
pub mod huge;
pub mod job;
pub mod part_set;
pub mod parts;
pub mod recovery_machine;
pub mod stats;
pub mod task;
pub mod time_account;

#[cfg(test)]
mod proptest;

pub use arena::RecordArena;
pub use disk_blob::DiskBlob;
pub use huge::HugeBlobCtx;
pub use job::{ReplJob, ReplPorts, ReplReport};
pub use part_set::{PartSet, ReplyStatus};
pub use parts::{PartMask, MAX_PARTS};
pub use recovery_machine::{RecoveredBlob, RecoveredBlobsQueue, RecoveryMachine};
pub use stats::ReplInfo;
pub use task::{Ingress, LostBlob, PartRequest};
pub use time_account::{PhaseDurations, TimeAccount, TimeState};
