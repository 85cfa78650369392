//! Wall-clock attribution of a replication job to its phases.

use serde::Serialize;
use std::time::{Duration, Instant};

use crate::repl::stats::ReplInfo;

/// Phase a replication job is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeState {
    PreparePlan,
    TokenWait,
    /// Waiting for peers to return parts
    ProxyWait,
    /// Restoring and merging recovered data
    Merge,
    /// Persistence layer operation
    PDiskOp,
    Commit,
    Other,
    Phantom,
}

impl TimeState {
    pub const COUNT: usize = 8;

    pub const ALL: [TimeState; Self::COUNT] = [
        TimeState::PreparePlan,
        TimeState::TokenWait,
        TimeState::ProxyWait,
        TimeState::Merge,
        TimeState::PDiskOp,
        TimeState::Commit,
        TimeState::Other,
        TimeState::Phantom,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// Accumulated duration per phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PhaseDurations {
    pub prepare_plan: Duration,
    pub token_wait: Duration,
    pub proxy_wait: Duration,
    pub merge: Duration,
    pub pdisk: Duration,
    pub commit: Duration,
    pub other: Duration,
    pub phantom: Duration,
}

/// Single-current-phase timer.
///
/// Switching phases charges the time since the previous switch to the phase
/// being left, so phases never overlap.
#[derive(Debug, Clone, Default)]
pub struct TimeAccount {
    current: Option<(TimeState, Instant)>,
    durations: [Duration; TimeState::COUNT],
}

impl TimeAccount {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_state(&mut self, state: TimeState) {
        self.set_state_at(state, Instant::now());
    }

    pub fn set_state_at(&mut self, state: TimeState, now: Instant) {
        match self.current {
            Some((current, _)) if current == state => {}
            Some((current, since)) => {
                self.durations[current.index()] += now.saturating_duration_since(since);
                self.current = Some((state, now));
            }
            None => self.current = Some((state, now)),
        }
    }

    /// Charge the running phase and stop timing.
    pub fn stop(&mut self) {
        self.stop_at(Instant::now());
    }

    pub fn stop_at(&mut self, now: Instant) {
        if let Some((current, since)) = self.current.take() {
            self.durations[current.index()] += now.saturating_duration_since(since);
        }
    }

    pub fn current(&self) -> Option<TimeState> {
        self.current.map(|(state, _)| state)
    }

    pub fn duration(&self, state: TimeState) -> Duration {
        self.durations[state.index()]
    }

    pub fn summarize(&self) -> PhaseDurations {
        PhaseDurations {
            prepare_plan: self.duration(TimeState::PreparePlan),
            token_wait: self.duration(TimeState::TokenWait),
            proxy_wait: self.duration(TimeState::ProxyWait),
            merge: self.duration(TimeState::Merge),
            pdisk: self.duration(TimeState::PDiskOp),
            commit: self.duration(TimeState::Commit),
            other: self.duration(TimeState::Other),
            phantom: self.duration(TimeState::Phantom),
        }
    }

    /// Copy the phase durations into a job report.
    pub fn update_info(&self, info: &mut ReplInfo) {
        info.phases = self.summarize();
    }
}
