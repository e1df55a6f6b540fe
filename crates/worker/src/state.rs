//! Per-worker state

use std::collections::BTreeMap;

use contracts::{FailureKind, FetchResult, WorkerId};
use observability::RunningStats;

/// Tally of one worker, reported when it terminates
#[derive(Debug, Clone, Default)]
pub struct WorkerStats {
    /// Worker index within its stage
    pub worker_id: WorkerId,
    /// Items taken from the inbound side
    pub items: u64,
    /// Items skipped as consecutive duplicates
    pub skipped: u64,
    /// Fetch calls made, retries included
    pub attempts: u64,
    /// Artifacts stored
    pub stored: u64,
    /// Failure results emitted
    pub failed: u64,
    /// Failures by class
    pub failures_by_kind: BTreeMap<FailureKind, u64>,
    /// Fetch call latency (ms)
    pub latency_ms: RunningStats,
}

impl WorkerStats {
    pub fn new(worker_id: WorkerId) -> Self {
        Self {
            worker_id,
            ..Default::default()
        }
    }

    /// Count one emitted result
    pub fn count(&mut self, result: &FetchResult) {
        match result {
            FetchResult::Stored(_) => self.stored += 1,
            FetchResult::Failed(failure) => {
                self.failed += 1;
                *self.failures_by_kind.entry(failure.kind).or_default() += 1;
            }
        }
    }
}

/// Mutable state owned by exactly one worker
#[derive(Debug)]
pub struct WorkerState<I> {
    /// Previous item this worker took
    pub last_seen: Option<I>,
    /// Running tally
    pub stats: WorkerStats,
}

impl<I> WorkerState<I> {
    pub fn new(worker_id: WorkerId) -> Self {
        Self {
            last_seen: None,
            stats: WorkerStats::new(worker_id),
        }
    }

    pub fn worker_id(&self) -> WorkerId {
        self.stats.worker_id
    }
}
