//! In-Memory Adapters
//!
//! Implement the planner, peer, phantom and commit ports over in-process
//! state. Used by the simulation binary and by tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;
use tracing::debug;

use crate::domain::blob_id::BlobId;
use crate::domain::ports::{
    ErasureCoder, PeerPartSource, PhantomChecker, PhantomVerdict, PlanItem, RecordCommitter,
    ReplPlanner,
};
use crate::error::{Error, Result};
use crate::repl::part_set::{PartSet, ReplyStatus};
use crate::repl::parts::PartMask;
use crate::repl::recovery_machine::{RecoveredBlob, RecoveredBlobsQueue};
use crate::repl::task::PartRequest;

// =============================================================================
// Planner
// =============================================================================

/// Planner replaying a fixed list of items.
#[derive(Debug, Default)]
pub struct VecPlanner {
    items: VecDeque<PlanItem>,
    fail_after: Option<(usize, String)>,
}

impl VecPlanner {
    /// Items must already be in ascending id order.
    pub fn new(items: Vec<PlanItem>) -> Self {
        Self {
            items: items.into(),
            fail_after: None,
        }
    }

    /// Fail every call once `served` items have been handed out.
    pub fn fail_after(&mut self, served: usize, message: impl Into<String>) {
        let remaining = self.items.len().saturating_sub(served);
        self.fail_after = Some((remaining, message.into()));
    }

    pub fn remaining(&self) -> usize {
        self.items.len()
    }
}

#[async_trait]
impl ReplPlanner for VecPlanner {
    async fn next_item(&mut self) -> Result<Option<PlanItem>> {
        if let Some((remaining, message)) = &self.fail_after {
            if self.items.len() <= *remaining {
                return Err(Error::Plan(message.clone()));
            }
        }
        Ok(self.items.pop_front())
    }
}

// =============================================================================
// Peer Part Source
// =============================================================================

/// Peers whose stored parts are held in memory.
///
/// Peer `i` holds part position `i`; a fetch returns every part the peers
/// still have for each requested blob.
pub struct InMemoryPeerSource {
    coder: Arc<dyn ErasureCoder>,
    blobs: BTreeMap<BlobId, BTreeMap<u8, Vec<u8>>>,
    failure: Option<String>,
    fetches: usize,
}

impl std::fmt::Debug for InMemoryPeerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryPeerSource")
            .field("blobs", &self.blobs.len())
            .field("failure", &self.failure)
            .field("fetches", &self.fetches)
            .finish()
    }
}

impl InMemoryPeerSource {
    pub fn new(coder: Arc<dyn ErasureCoder>) -> Self {
        Self {
            coder,
            blobs: BTreeMap::new(),
            failure: None,
            fetches: 0,
        }
    }

    /// Encode `payload` and keep the parts at `positions` on the peers.
    pub fn add_blob(&mut self, id: BlobId, payload: &[u8], positions: &[u8]) -> Result<()> {
        if payload.len() != id.blob_size() as usize {
            return Err(Error::Internal(format!(
                "payload of {} bytes for {}",
                payload.len(),
                id
            )));
        }
        let mut parts = self.coder.split(payload)?;
        let held = self.blobs.entry(id.full_id()).or_default();
        for &position in positions {
            let part = parts.get_mut(usize::from(position)).ok_or_else(|| {
                Error::Internal(format!("part position {} out of range", position))
            })?;
            held.insert(position, std::mem::take(part));
        }
        Ok(())
    }

    /// Store a raw part buffer as-is.
    pub fn add_part(&mut self, id: BlobId, position: u8, data: Vec<u8>) {
        self.blobs
            .entry(id.full_id())
            .or_default()
            .insert(position, data);
    }

    /// Make every following fetch fail.
    pub fn fail_with(&mut self, message: impl Into<String>) {
        self.failure = Some(message.into());
    }

    pub fn fetches(&self) -> usize {
        self.fetches
    }
}

#[async_trait]
impl PeerPartSource for InMemoryPeerSource {
    async fn fetch(&mut self, requests: &[PartRequest]) -> Result<Vec<(BlobId, PartSet)>> {
        self.fetches += 1;
        if let Some(message) = &self.failure {
            return Err(Error::PeerFetch(message.clone()));
        }

        let scheme = self.coder.scheme();
        let mut gathered = Vec::new();
        for request in requests {
            let Some(held) = self.blobs.get(&request.id) else {
                continue;
            };
            let mut part_set = PartSet::new(scheme);
            for position in 0..scheme.total_part_count() {
                match held.get(&position) {
                    Some(data) => part_set.add_data(
                        position,
                        request.id.with_part(position + 1),
                        ReplyStatus::Ok,
                        data.clone(),
                    ),
                    None => part_set.add_data(position, request.id, ReplyStatus::NoData, Vec::new()),
                }
            }
            debug!(blob_id = %request.id, part_set = %part_set, "Gathered peer parts");
            gathered.push((request.id, part_set));
        }
        Ok(gathered)
    }
}

// =============================================================================
// Phantom Checker
// =============================================================================

/// Phantom checker answering from a fixed set of phantom blobs.
#[derive(Debug, Default)]
pub struct StaticPhantomChecker {
    phantoms: HashSet<BlobId>,
    checked: Vec<BlobId>,
    failure: Option<String>,
}

impl StaticPhantomChecker {
    pub fn new(phantoms: impl IntoIterator<Item = BlobId>) -> Self {
        Self {
            phantoms: phantoms.into_iter().collect(),
            checked: Vec::new(),
            failure: None,
        }
    }

    /// Make every following check fail.
    pub fn fail_with(&mut self, message: impl Into<String>) {
        self.failure = Some(message.into());
    }

    /// Every id checked so far, in order.
    pub fn checked(&self) -> &[BlobId] {
        &self.checked
    }
}

#[async_trait]
impl PhantomChecker for StaticPhantomChecker {
    async fn check(&mut self, candidates: &[(BlobId, PartMask)]) -> Result<Vec<PhantomVerdict>> {
        if let Some(message) = &self.failure {
            return Err(Error::PhantomCheck(message.clone()));
        }
        Ok(candidates
            .iter()
            .map(|&(id, parts)| {
                self.checked.push(id);
                PhantomVerdict {
                    id,
                    parts,
                    is_phantom: self.phantoms.contains(&id),
                }
            })
            .collect())
    }
}

// =============================================================================
// Record Store
// =============================================================================

/// Committer keeping every record in memory.
///
/// Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordStore {
    records: Arc<Mutex<Vec<RecoveredBlob>>>,
    commits: Arc<Mutex<usize>>,
    failure: Arc<Mutex<Option<String>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<RecoveredBlob> {
        self.records.lock().clone()
    }

    pub fn commits(&self) -> usize {
        *self.commits.lock()
    }

    /// Make every following commit fail without storing anything.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.lock() = Some(message.into());
    }
}

#[async_trait]
impl RecordCommitter for InMemoryRecordStore {
    async fn commit(&mut self, records: RecoveredBlobsQueue) -> Result<()> {
        *self.commits.lock() += 1;
        if let Some(message) = self.failure.lock().clone() {
            return Err(Error::Commit(message));
        }
        self.records.lock().extend(records);
        Ok(())
    }
}
