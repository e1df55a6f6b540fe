//! ResultAggregator - terminal results of a run
//!
//! Workers call [`ResultRecorder::record`] concurrently; the orchestrator
//! reports each worker's exit once it has joined it and calls
//! [`ResultAggregator::finalize`] after the last join.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use contracts::{FailureKind, FetchResult, ResultRecorder, WorkerId};
use observability::{RunningStats, StatsSummary};
use worker::WorkerStats;

use crate::error::{OrchestratorError, Result};

/// How a worker ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerExit {
    /// Saw end-of-stream (or finished its chunk)
    Completed,
    /// Stopped on an unrecoverable error
    Fatal(String),
    /// The task crashed; only results recorded before the crash are known
    Panicked,
}

impl WorkerExit {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for WorkerExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Fatal(reason) => write!(f, "fatal ({reason})"),
            Self::Panicked => write!(f, "panicked"),
        }
    }
}

/// Final tally of one worker
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerReport {
    pub worker_id: WorkerId,
    pub exit: WorkerExit,
    pub items: u64,
    pub skipped: u64,
    pub attempts: u64,
    pub stored: u64,
    pub failed: u64,
    pub failures_by_kind: BTreeMap<FailureKind, u64>,
    pub latency_ms: StatsSummary,
}

/// Deterministic summary of a run
///
/// Built in worker-id order with sorted artifact paths, so it does not depend
/// on how the workers interleaved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineSummary {
    /// One entry per worker, ordered by id
    pub workers: Vec<WorkerReport>,
    /// Items taken by workers
    pub items: u64,
    /// Items skipped as consecutive duplicates
    pub skipped: u64,
    /// Fetch calls, retries included
    pub attempts: u64,
    /// Stored artifacts
    pub stored: u64,
    /// Failure results
    pub failed: u64,
    /// Items that no worker processed
    pub abandoned: u64,
    pub failures_by_kind: BTreeMap<FailureKind, u64>,
    /// Paths of every stored artifact, sorted
    pub artifacts: Vec<PathBuf>,
    /// Fetch latency over all workers
    pub latency_ms: StatsSummary,
}

impl PipelineSummary {
    /// Workers that stopped on a fatal error
    pub fn fatal_workers(&self) -> Vec<WorkerId> {
        self.workers
            .iter()
            .filter(|w| matches!(w.exit, WorkerExit::Fatal(_)))
            .map(|w| w.worker_id)
            .collect()
    }

    /// Workers whose task crashed
    pub fn panicked_workers(&self) -> Vec<WorkerId> {
        self.workers
            .iter()
            .filter(|w| w.exit == WorkerExit::Panicked)
            .map(|w| w.worker_id)
            .collect()
    }

    /// Every worker completed normally
    pub fn all_completed(&self) -> bool {
        self.workers.iter().all(|w| w.exit.is_completed())
    }
}

#[derive(Debug, Default)]
struct Tally {
    stored: u64,
    failed: u64,
    failures_by_kind: BTreeMap<FailureKind, u64>,
    artifacts: Vec<PathBuf>,
}

#[derive(Debug, Default)]
struct AggregatorState {
    tallies: BTreeMap<WorkerId, Tally>,
    exits: BTreeMap<WorkerId, (WorkerExit, Option<WorkerStats>)>,
    abandoned: u64,
}

impl AggregatorState {
    fn summarize(self) -> PipelineSummary {
        let AggregatorState {
            mut tallies,
            mut exits,
            abandoned,
        } = self;

        let mut ids: Vec<WorkerId> = tallies.keys().chain(exits.keys()).copied().collect();
        ids.sort_unstable();
        ids.dedup();

        let mut summary = PipelineSummary {
            abandoned,
            ..Default::default()
        };
        let mut latency = RunningStats::default();

        for worker_id in ids {
            let tally = tallies.remove(&worker_id).unwrap_or_default();
            // A worker that never reported an exit did not end normally
            let (exit, stats) = exits
                .remove(&worker_id)
                .unwrap_or((WorkerExit::Panicked, None));

            let (items, skipped, attempts, worker_latency) = match &stats {
                Some(stats) => (
                    stats.items,
                    stats.skipped,
                    stats.attempts,
                    stats.latency_ms.clone(),
                ),
                None => (0, 0, 0, RunningStats::default()),
            };
            latency.merge(&worker_latency);

            summary.items += items;
            summary.skipped += skipped;
            summary.attempts += attempts;
            summary.stored += tally.stored;
            summary.failed += tally.failed;
            for (kind, count) in &tally.failures_by_kind {
                *summary.failures_by_kind.entry(*kind).or_default() += count;
            }
            summary.artifacts.extend(tally.artifacts);

            summary.workers.push(WorkerReport {
                worker_id,
                exit,
                items,
                skipped,
                attempts,
                stored: tally.stored,
                failed: tally.failed,
                failures_by_kind: tally.failures_by_kind,
                latency_ms: worker_latency.summary(),
            });
        }

        summary.artifacts.sort();
        summary.latency_ms = latency.summary();
        summary
    }
}

/// Collects the results of every worker of a run
#[derive(Debug, Default)]
pub struct ResultAggregator {
    state: Mutex<AggregatorState>,
}

impl ResultAggregator {
    /// Aggregator expecting workers `0..workers`
    ///
    /// Workers that never record anything still appear in the summary.
    pub fn new(workers: usize) -> Self {
        let tallies = (0..workers).map(|id| (id, Tally::default())).collect();
        Self {
            state: Mutex::new(AggregatorState {
                tallies,
                ..Default::default()
            }),
        }
    }

    /// Report how a joined worker ended
    pub fn finish_worker(
        &self,
        worker_id: WorkerId,
        exit: WorkerExit,
        stats: Option<&WorkerStats>,
    ) {
        self.lock().exits.insert(worker_id, (exit, stats.cloned()));
    }

    /// Count items that no worker will ever process
    pub fn add_abandoned(&self, count: u64) {
        self.lock().abandoned += count;
    }

    /// Consume the aggregator and build the summary.
    ///
    /// Fails while any other owner (a running worker) still holds it.
    pub fn finalize(this: Arc<Self>) -> Result<PipelineSummary> {
        let aggregator = Arc::try_unwrap(this).map_err(|shared| OrchestratorError::AggregatorBusy {
            holders: Arc::strong_count(&shared),
        })?;
        let state = aggregator
            .state
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(state.summarize())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, AggregatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ResultRecorder for ResultAggregator {
    fn record(&self, worker_id: WorkerId, result: &FetchResult) {
        let mut state = self.lock();
        let tally = state.tallies.entry(worker_id).or_default();
        match result {
            FetchResult::Stored(artifact) => {
                tally.stored += 1;
                tally.artifacts.push(artifact.path.clone());
            }
            FetchResult::Failed(failure) => {
                tally.failed += 1;
                *tally.failures_by_kind.entry(failure.kind).or_default() += 1;
            }
        }
    }
}
