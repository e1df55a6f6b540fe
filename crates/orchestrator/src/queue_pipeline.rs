//! Queue topology: producer -> inbound queue -> fetch workers -> outbound
//! queue -> consumers

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

use contracts::{
    ArtifactStore, ConsumerConfig, DedupConfig, Envelope, FetchResult, Fetcher,
    PipelineMode, PipelineSettings, ResultRecorder, WorkItem, WorkProducer, WorkerId,
};
use dispatcher::{create_dispatcher, DispatchReport};
use observability::record_item_outcome;
use stage_queue::StageQueue;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};
use worker::{Deduplicator, FetchWorker, SharedLastSeen, WorkerSettings, WorkerStats};

use crate::aggregator::ResultAggregator;
use crate::error::{OrchestratorError, Result};
use crate::handle::{snapshot, stop_requested, PipelineHandle, ShutdownTrigger};
use crate::join::{settle, Joined};
use crate::report::PipelineReport;
use crate::stage::{StageState, StageTracker};

/// Three-stage pipeline over shared queues
pub struct QueuePipeline<I, P, F, S> {
    producer: P,
    fetcher: Arc<F>,
    store: Arc<S>,
    settings: PipelineSettings,
    dedup: DedupConfig,
    worker: WorkerSettings,
    consumers: Vec<ConsumerConfig>,
    _item: PhantomData<fn() -> I>,
}

impl<I, P, F, S> QueuePipeline<I, P, F, S>
where
    I: WorkItem,
    P: WorkProducer<I> + 'static,
    F: Fetcher<I> + 'static,
    S: ArtifactStore + Send + Sync + 'static,
{
    pub fn new(producer: P, fetcher: Arc<F>, store: Arc<S>) -> Self {
        Self {
            producer,
            fetcher,
            store,
            settings: PipelineSettings::default(),
            dedup: DedupConfig::default(),
            worker: WorkerSettings::default(),
            consumers: Vec::new(),
            _item: PhantomData,
        }
    }

    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
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

    pub fn with_consumers(mut self, consumers: Vec<ConsumerConfig>) -> Self {
        self.consumers = consumers;
        self
    }

    /// Start every stage and return right away
    ///
    /// [`PipelineHandle::shutdown`] ends the producer's stream early; the
    /// items already queued are still fetched.
    ///
    /// # Errors
    /// Only startup problems: no workers, a zero-capacity queue or a consumer
    /// that can not be built. Nothing is spawned in that case.
    #[instrument(
        name = "pipeline_start",
        skip(self),
        fields(producer = %self.producer.name(), workers = self.settings.workers)
    )]
    pub fn start(self) -> Result<PipelineHandle> {
        let workers = self.settings.workers;
        if workers == 0 {
            return Err(OrchestratorError::startup("fetch", "no fetch workers configured"));
        }

        let started = Instant::now();
        let inbound = StageQueue::<I>::bounded("inbound", self.settings.inbound_capacity)?;
        let outbound =
            StageQueue::<FetchResult>::bounded("outbound", self.settings.outbound_capacity)?;

        let produce = Arc::new(StageTracker::new("produce"));
        let fetch = Arc::new(StageTracker::new("fetch"));
        let consume = Arc::new(StageTracker::new("consume"));

        let dispatcher = create_dispatcher(&self.consumers, outbound.clone())?.spawn();
        consume.advance(StageState::Running);

        let aggregator = Arc::new(ResultAggregator::new(workers));
        let shared_last = SharedLastSeen::<I>::default();
        let worker_tasks = (0..workers)
            .map(|worker_id| {
                let worker = FetchWorker::new(
                    worker_id,
                    Arc::clone(&self.fetcher),
                    Arc::clone(&self.store),
                    self.worker,
                )
                .with_dedup(Deduplicator::from_config(&self.dedup, &shared_last))
                .with_recorder(Arc::clone(&aggregator) as Arc<dyn ResultRecorder>)
                .with_outbound(outbound.clone());
                (worker_id, tokio::spawn(worker.run(inbound.clone())))
            })
            .collect();
        fetch.advance(StageState::Running);

        let (shutdown, stop) = ShutdownTrigger::new();
        produce.advance(StageState::Running);
        let producer = tokio::spawn(drive_producer(
            self.producer,
            inbound.clone(),
            stop,
            Arc::clone(&produce),
            Arc::clone(&fetch),
        ));

        info!(workers, consumers = self.consumers.len(), "Pipeline started");

        let stages = vec![produce, Arc::clone(&fetch), Arc::clone(&consume)];
        let run = QueueRun {
            started,
            inbound,
            outbound,
            workers: worker_tasks,
            producer,
            dispatcher,
            aggregator,
            stages: stages.clone(),
            fetch,
            consume,
        };
        let supervisor = tokio::spawn(supervise(run));

        Ok(PipelineHandle::new(supervisor, stages, shutdown))
    }

    /// Start and wait for the end of the run
    pub async fn run(self) -> Result<PipelineReport> {
        self.start()?.join().await
    }
}

#[derive(Debug, Default)]
struct ProducerOutcome {
    produced: u64,
    abandoned: u64,
    error: Option<String>,
    stopped: bool,
}

/// Feed the inbound queue until the producer ends or a stop is requested,
/// then close it.
///
/// The producer is the single writer of the inbound queue, so closing it here
/// is what ends the fetch stage.
#[instrument(name = "pipeline_producer", skip_all, fields(producer = %producer.name()))]
async fn drive_producer<I, P>(
    mut producer: P,
    inbound: StageQueue<I>,
    mut stop: watch::Receiver<bool>,
    produce: Arc<StageTracker>,
    fetch: Arc<StageTracker>,
) -> ProducerOutcome
where
    I: WorkItem,
    P: WorkProducer<I>,
{
    let mut outcome = ProducerOutcome::default();
    loop {
        let next = tokio::select! {
            biased;
            _ = stop_requested(&mut stop) => {
                info!(produced = outcome.produced, "Stop requested, ending the stream");
                outcome.stopped = true;
                break;
            }
            next = producer.next_item() => next,
        };
        match next {
            Ok(Envelope::Item(item)) => {
                if inbound.put(item).await.is_err() {
                    outcome.abandoned += 1;
                    warn!("Inbound queue closed under the producer, stopping");
                    break;
                }
                outcome.produced += 1;
            }
            Ok(Envelope::EndOfStream) => break,
            Err(e) => {
                error!(error = %e, "Producer failed, ending the stream");
                outcome.error = Some(e.to_string());
                break;
            }
        }
    }

    inbound.close();
    produce.advance(StageState::Terminated);
    fetch.advance(StageState::Draining);
    info!(produced = outcome.produced, "Producer finished");
    outcome
}

struct QueueRun<I> {
    started: Instant,
    inbound: StageQueue<I>,
    outbound: StageQueue<FetchResult>,
    workers: Vec<(WorkerId, JoinHandle<worker::Result<WorkerStats>>)>,
    producer: JoinHandle<ProducerOutcome>,
    dispatcher: JoinHandle<DispatchReport>,
    aggregator: Arc<ResultAggregator>,
    stages: Vec<Arc<StageTracker>>,
    fetch: Arc<StageTracker>,
    consume: Arc<StageTracker>,
}

/// Join everything in stage order and build the report
#[instrument(name = "pipeline_run", skip_all, fields(mode = "queue", workers = run.workers.len()))]
async fn supervise<I: WorkItem>(run: QueueRun<I>) -> Result<PipelineReport> {
    let QueueRun {
        started,
        inbound,
        outbound,
        workers,
        producer,
        dispatcher,
        aggregator,
        stages,
        fetch,
        consume,
    } = run;

    for (worker_id, task) in workers {
        let joined = match task.await {
            Ok(outcome) => Joined::Finished(outcome),
            Err(e) => Joined::Crashed(e.to_string()),
        };
        let (exit, stats) = settle(worker_id, joined);
        aggregator.finish_worker(worker_id, exit, stats.as_ref());
    }

    // Only now may the next stage see end-of-stream
    fetch.advance(StageState::Terminated);
    outbound.close();
    consume.advance(StageState::Draining);

    // Nobody is left to take queued items; unblock the producer if it waits
    if inbound.close() {
        warn!("No fetch worker left before end-of-stream, inbound queue closed");
    }
    let mut abandoned = 0u64;
    while let Some(Envelope::Item(_)) = inbound.try_get() {
        abandoned += 1;
    }

    let producer = producer.await.unwrap_or_else(|e| {
        error!(error = %e, "Producer task crashed");
        ProducerOutcome {
            error: Some(e.to_string()),
            ..Default::default()
        }
    });
    abandoned += producer.abandoned;
    if abandoned > 0 {
        warn!(abandoned, "Items left unprocessed");
        (0..abandoned).for_each(|_| record_item_outcome("abandoned"));
        aggregator.add_abandoned(abandoned);
    }

    let dispatch = match dispatcher.await {
        Ok(report) => Some(report),
        Err(e) => {
            error!(error = %e, "Consumer stage crashed");
            None
        }
    };
    consume.advance(StageState::Terminated);

    let summary = ResultAggregator::finalize(aggregator)?;
    let report = PipelineReport {
        mode: PipelineMode::Queue,
        summary,
        produced: producer.produced,
        producer_error: producer.error,
        interrupted: producer.stopped,
        dispatch,
        stages: snapshot(&stages),
        duration: started.elapsed(),
    };

    info!(
        stored = report.summary.stored,
        failed = report.summary.failed,
        skipped = report.summary.skipped,
        duration_secs = report.duration.as_secs_f64(),
        "Pipeline finished"
    );
    Ok(report)
}
