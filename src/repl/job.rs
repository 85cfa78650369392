//! Replication Job
//!
//! Drives one recovery machine through a whole plan, batch by batch:
//!
//! ```text
//!   plan ─▶ fetch ─▶ recover ─▶ phantom check ─▶ finish ─▶ commit
//!    ▲                                                        │
//!    └──────────────────── until the plan is exhausted ───────┘
//! ```
//!
//! Every stage is timed through the job's `TimeAccount`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::config::ReplConfig;
use crate::domain::blob_id::BlobId;
use crate::domain::ports::{
    ErasureCoder, PeerPartSource, PhantomChecker, PlanItem, RecordCommitter, ReplPlanner,
};
use crate::error::Result;
use crate::metrics::ReplMonGroup;
use crate::repl::recovery_machine::{RecoveredBlobsQueue, RecoveryMachine};
use crate::repl::stats::ReplInfo;
use crate::repl::task::PartRequest;
use crate::repl::time_account::{TimeAccount, TimeState};

/// Summary of a finished replication job.
#[derive(Debug, Clone, Serialize)]
pub struct ReplReport {
    pub job_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub batches: u64,
    pub info: ReplInfo,
    /// Blobs to retry in a later job
    pub unreplicated: Vec<BlobId>,
}

/// Collaborators a job talks to.
pub struct ReplPorts<'a> {
    pub planner: &'a mut dyn ReplPlanner,
    pub peers: &'a mut dyn PeerPartSource,
    pub phantom_checker: &'a mut dyn PhantomChecker,
    pub committer: &'a mut dyn RecordCommitter,
}

/// One replication job of a storage node.
#[derive(Debug)]
pub struct ReplJob {
    job_id: Uuid,
    machine: RecoveryMachine,
    time: TimeAccount,
    info: ReplInfo,
    unreplicated: Vec<BlobId>,
    batches: u64,
}

impl ReplJob {
    pub fn new(config: &ReplConfig, coder: Arc<dyn ErasureCoder>, mon: ReplMonGroup) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            machine: RecoveryMachine::new(config, coder, mon),
            time: TimeAccount::new(),
            info: ReplInfo::default(),
            unreplicated: Vec::new(),
            batches: 0,
        }
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn info(&self) -> &ReplInfo {
        &self.info
    }

    /// Run the job until the planner is exhausted.
    ///
    /// A port error aborts the job; records of the failing batch are not
    /// committed.
    #[instrument(skip_all, fields(job_id = %self.job_id))]
    pub async fn run(mut self, ports: ReplPorts<'_>) -> Result<ReplReport> {
        let ReplPorts {
            planner,
            peers,
            phantom_checker,
            committer,
        } = ports;
        let started_at = Utc::now();
        info!(scheme = %self.machine.scheme(), "Starting replication job");

        loop {
            self.time.set_state(TimeState::PreparePlan);
            let exhausted = self.fill_plan(planner).await?;

            if !self.machine.no_tasks() {
                self.run_batch(peers, phantom_checker, committer).await?;
            }
            if exhausted {
                break;
            }
        }

        self.time.stop();
        self.time.update_info(&mut self.info);

        info!(
            batches = self.batches,
            recovered = self.info.data_recovery_success,
            unreplicated = self.unreplicated.len(),
            "Replication job finished"
        );

        Ok(ReplReport {
            job_id: self.job_id,
            started_at,
            finished_at: Utc::now(),
            batches: self.batches,
            info: self.info,
            unreplicated: self.unreplicated,
        })
    }

    /// Pull plan items until the task queue is full.
    ///
    /// Returns `true` once the planner has nothing more.
    async fn fill_plan(&mut self, planner: &mut dyn ReplPlanner) -> Result<bool> {
        while !self.machine.full_of_tasks() {
            match planner.next_item().await? {
                Some(PlanItem::Lost(lost)) => {
                    let size = lost.id.blob_size();
                    self.info.work_units_planned += u64::from(size);
                    self.machine.mon().repl_work_units_remaining.add(i64::from(size));
                    self.machine.add_task(
                        lost.id,
                        lost.parts_to_recover,
                        lost.possible_phantom,
                        lost.ingress,
                    );
                }
                Some(PlanItem::Metadata(id)) => self.machine.add_metadata_part(id),
                None => return Ok(true),
            }
        }
        Ok(false)
    }

    #[instrument(skip_all, fields(batch = self.batches))]
    async fn run_batch(
        &mut self,
        peers: &mut dyn PeerPartSource,
        phantom_checker: &mut dyn PhantomChecker,
        committer: &mut dyn RecordCommitter,
    ) -> Result<()> {
        let mut requests = Vec::new();
        self.machine.for_each(|id, parts, ingress| {
            requests.push(PartRequest { id, parts, ingress })
        });

        self.time.set_state(TimeState::ProxyWait);
        let gathered = peers.fetch(&requests).await?;
        debug!(requested = requests.len(), gathered = gathered.len(), "Peer parts gathered");

        self.time.set_state(TimeState::Merge);
        let mut rbq = RecoveredBlobsQueue::new();
        let mut candidates = Vec::new();
        for (id, mut part_set) in gathered {
            if !self.machine.recover(id, &mut part_set, &mut rbq, &mut self.info) {
                candidates.push((id, self.machine.last_parts()));
            }
        }

        let mut dropped = HashSet::new();
        if !candidates.is_empty() {
            self.time.set_state(TimeState::Phantom);
            let verdicts = phantom_checker.check(&candidates).await?;
            for verdict in &verdicts {
                self.machine
                    .process_phantom_blob(verdict.id, verdict.parts, verdict.is_phantom);
                if verdict.is_phantom {
                    dropped.insert(verdict.id);
                }
            }
            if dropped.is_empty() {
                // blobs still queued were written after all
                self.machine.clear_possible_phantom();
            }
        }

        self.time.set_state(TimeState::Merge);
        self.machine.finish(&mut rbq, &mut self.info);

        if !rbq.is_empty() {
            self.time.set_state(TimeState::Commit);
            let records = rbq.len();
            committer.commit(rbq).await?;
            debug!(records, "Recovered records committed");
        }
        self.machine.reset_arena();

        self.unreplicated.extend(
            self.machine
                .take_unreplicated()
                .into_iter()
                .filter(|id| !dropped.contains(id)),
        );
        self.batches += 1;
        Ok(())
    }
}
