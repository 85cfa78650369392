//! Domain Ports (Port/Adapter Pattern)
//!
//! Abstractions over the collaborators of the recovery engine. The engine
//! itself only restores and re-encodes data; planning, peer fetches, phantom
//! checks and persistence are reached through these traits.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐   LostBlob / metadata ids   ┌──────────────────────────┐
//! │  ReplPlanner  │ ──────────────────────────▶ │                          │
//! └───────────────┘                             │                          │
//! ┌───────────────┐   (BlobId, PartSet) asc.    │     RecoveryMachine      │
//! │PeerPartSource │ ──────────────────────────▶ │  (ErasureCoder inside)   │
//! └───────────────┘                             │                          │
//! ┌───────────────┐   phantom verdicts          │                          │
//! │PhantomChecker │ ◀─────────────────────────▶ │                          │
//! └───────────────┘                             └────────────┬─────────────┘
//!                                                            │ RecoveredBlobsQueue
//!                                               ┌────────────▼─────────────┐
//!                                               │     RecordCommitter      │
//!                                               └──────────────────────────┘
//! ```

use async_trait::async_trait;

use crate::domain::blob_id::BlobId;
use crate::ec::scheme::ErasureScheme;
use crate::error::Result;
use crate::repl::part_set::PartSet;
use crate::repl::parts::PartMask;
use crate::repl::recovery_machine::RecoveredBlobsQueue;
use crate::repl::task::{LostBlob, PartRequest};

// =============================================================================
// Erasure Coder Port
// =============================================================================

/// Port for erasure restoration.
///
/// Implementations are CPU-bound and called synchronously from the recovery
/// machine; a failure is reported per blob and never aborts a batch.
pub trait ErasureCoder: Send + Sync {
    /// The scheme this coder was built for.
    fn scheme(&self) -> ErasureScheme;

    /// Split a blob payload into all of its parts.
    fn split(&self, data: &[u8]) -> Result<Vec<Vec<u8>>>;

    /// Fill in every missing part (`None` entries) from the present ones.
    fn restore(&self, parts: &mut [Option<Vec<u8>>]) -> Result<()>;

    /// Whether `present` parts are enough to restore the rest.
    fn can_restore(&self, present: usize) -> bool {
        present >= usize::from(self.scheme().minimal_restorable_part_count())
    }
}

// =============================================================================
// Planner Port
// =============================================================================

/// One unit of planned work, produced in ascending id order.
#[derive(Debug, Clone)]
pub enum PlanItem {
    /// Blob that lacks some of its local parts
    Lost(LostBlob),
    /// Presence-only entry without payload
    Metadata(BlobId),
}

/// Port for the component that decides which blobs are missing.
#[async_trait]
pub trait ReplPlanner: Send {
    /// Next planned item, or `None` once the plan is exhausted.
    async fn next_item(&mut self) -> Result<Option<PlanItem>>;
}

// =============================================================================
// Peer Part Source Port
// =============================================================================

/// Port for the network layer fetching parts from peer storage nodes.
#[async_trait]
pub trait PeerPartSource: Send {
    /// Gather parts for the requested blobs.
    ///
    /// The returned pairs must be in strictly ascending id order. Blobs for
    /// which no peer returned anything may be left out.
    async fn fetch(&mut self, requests: &[PartRequest]) -> Result<Vec<(BlobId, PartSet)>>;
}

// =============================================================================
// Phantom Checker Port
// =============================================================================

/// Verdict of a phantom check for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhantomVerdict {
    pub id: BlobId,
    pub parts: PartMask,
    pub is_phantom: bool,
}

/// Port for the blob existence check.
#[async_trait]
pub trait PhantomChecker: Send {
    /// Decide for each candidate whether it was ever written.
    async fn check(&mut self, candidates: &[(BlobId, PartMask)]) -> Result<Vec<PhantomVerdict>>;
}

// =============================================================================
// Record Committer Port
// =============================================================================

/// Port for the persistence layer.
#[async_trait]
pub trait RecordCommitter: Send {
    /// Durably write the recovered records.
    async fn commit(&mut self, records: RecoveredBlobsQueue) -> Result<()>;
}
