//! Static topology: the work list is split up front, one chunk per worker

use std::sync::Arc;
use std::time::Instant;

use contracts::{
    ArtifactStore, DedupConfig, Fetcher, PipelineMode, PipelineSettings, ResultRecorder, WorkItem,
};
use tokio::sync::{oneshot, watch};
use tracing::{info, instrument, warn};
use worker::{partition, Deduplicator, FetchWorker, SharedLastSeen, WorkerSettings};

use crate::aggregator::{ResultAggregator, WorkerExit};
use crate::error::{OrchestratorError, Result};
use crate::handle::{PipelineHandle, ShutdownTrigger};
use crate::join::{settle, Joined};
use crate::report::PipelineReport;
use crate::stage::{StageState, StageTracker};

/// Static-partition pipeline
///
/// The work list is cut into contiguous chunks of `⌈L/N⌉` items, one per
/// worker. Each worker hands its outcome back over its own oneshot channel,
/// and those channels are read only after every worker was joined.
///
/// `workers = 1` is a plain sequential download.
pub struct StaticPipeline<I, F, S> {
    items: Vec<I>,
    fetcher: Arc<F>,
    store: Arc<S>,
    workers: usize,
    dedup: DedupConfig,
    worker: WorkerSettings,
}

impl<I, F, S> StaticPipeline<I, F, S>
where
    I: WorkItem,
    F: Fetcher<I> + 'static,
    S: ArtifactStore + Send + Sync + 'static,
{
    pub fn new(items: Vec<I>, fetcher: Arc<F>, store: Arc<S>) -> Self {
        Self {
            items,
            fetcher,
            store,
            workers: PipelineSettings::default().workers,
            dedup: DedupConfig::default(),
            worker: WorkerSettings::default(),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_dedup(mut self, dedup: DedupConfig) -> Self {
        self.dedup = dedup;
        self
    }

    pub fn with_worker_settings(mut self, worker: WorkerSettings) -> Self {
        self.worker = worker;
        self
    }

    /// Start every worker on its chunk and return right away
    ///
    /// [`PipelineHandle::shutdown`] makes each worker leave the rest of its
    /// chunk after the item in hand; that remainder is reported as abandoned.
    pub fn start(self) -> Result<PipelineHandle> {
        if self.workers == 0 {
            return Err(OrchestratorError::startup("fetch", "no fetch workers configured"));
        }

        let fetch = Arc::new(StageTracker::new("fetch"));
        let (shutdown, stop) = ShutdownTrigger::new();
        let supervisor = tokio::spawn(self.execute(stop, Arc::clone(&fetch)));
        Ok(PipelineHandle::new(supervisor, vec![fetch], shutdown))
    }

    /// Run every chunk to completion
    pub async fn run(self) -> Result<PipelineReport> {
        self.start()?.join().await
    }

    /// A worker that stops on a fatal error or a stop request leaves the rest
    /// of its chunk unprocessed; that remainder is reported as abandoned. How
    /// far a crashed worker got is unknown, so its chunk does not count
    /// towards it.
    #[instrument(
        name = "pipeline_run",
        skip(self, stop, fetch),
        fields(mode = "static", workers = self.workers, items = self.items.len())
    )]
    async fn execute(
        self,
        stop: watch::Receiver<bool>,
        fetch: Arc<StageTracker>,
    ) -> Result<PipelineReport> {
        let started = Instant::now();
        let produced = self.items.len() as u64;

        let chunks = partition(&self.items, self.workers);
        let aggregator = Arc::new(ResultAggregator::new(self.workers));
        let shared_last = SharedLastSeen::<I>::default();

        let mut running = Vec::with_capacity(chunks.len());
        for (worker_id, chunk) in chunks.into_iter().enumerate() {
            let chunk_len = chunk.len() as u64;
            let (tx, rx) = oneshot::channel();
            let worker = FetchWorker::new(
                worker_id,
                Arc::clone(&self.fetcher),
                Arc::clone(&self.store),
                self.worker,
            )
            .with_dedup(Deduplicator::from_config(&self.dedup, &shared_last))
            .with_recorder(Arc::clone(&aggregator) as Arc<dyn ResultRecorder>)
            .with_stop(stop.clone());

            let task = tokio::spawn(async move {
                let outcome = worker.run_chunk(chunk).await;
                // The receiver lives until after this task is joined
                let _ = tx.send(outcome);
            });
            running.push((worker_id, chunk_len, task, rx));
        }
        fetch.advance(StageState::Running);
        // All work was handed out up front
        fetch.advance(StageState::Draining);

        let mut joined = Vec::with_capacity(running.len());
        for (worker_id, chunk_len, task, rx) in running {
            let crash = task.await.err();
            joined.push((worker_id, chunk_len, crash, rx));
        }
        fetch.advance(StageState::Terminated);

        // Every worker is joined; only now are the result channels read
        let mut abandoned = 0u64;
        for (worker_id, chunk_len, crash, mut rx) in joined {
            let outcome = match (crash, rx.try_recv()) {
                (Some(e), _) => Joined::Crashed(e.to_string()),
                (None, Ok(outcome)) => Joined::Finished(outcome),
                (None, Err(e)) => Joined::Crashed(e.to_string()),
            };
            let (exit, stats) = settle(worker_id, outcome);
            if let (WorkerExit::Fatal(_) | WorkerExit::Completed, Some(stats)) = (&exit, &stats) {
                abandoned += chunk_len.saturating_sub(stats.items);
            }
            aggregator.finish_worker(worker_id, exit, stats.as_ref());
        }
        if abandoned > 0 {
            warn!(abandoned, "Items left unprocessed");
            aggregator.add_abandoned(abandoned);
        }

        let interrupted = *stop.borrow();
        let summary = ResultAggregator::finalize(aggregator)?;
        let report = PipelineReport {
            mode: PipelineMode::Static,
            summary,
            produced,
            producer_error: None,
            interrupted,
            dispatch: None,
            stages: vec![(fetch.name(), fetch.state())],
            duration: started.elapsed(),
        };

        info!(
            stored = report.summary.stored,
            failed = report.summary.failed,
            duration_secs = report.duration.as_secs_f64(),
            "Pipeline finished"
        );
        Ok(report)
    }
}
