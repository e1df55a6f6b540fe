//! FetchWorker - one concurrent unit of the fetch stage

use std::sync::Arc;
use std::time::{Duration, Instant};

use contracts::{
    ArtifactStore, ContractError, Envelope, FetchBatch, FetchConfig, FetchFailure, FetchResult,
    Fetcher, NoopRecorder, ResultRecorder, WorkItem, WorkerId,
};
use observability::{
    record_fetch_attempt, record_fetch_latency_ms, record_item_outcome, record_worker_exit,
};
use stage_queue::StageQueue;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::dedup::Deduplicator;
use crate::error::{Result, WorkerError};
use crate::retry::RetryPolicy;
use crate::state::{WorkerState, WorkerStats};

/// Per-fetch settings shared by every worker of a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSettings {
    /// Timeout handed to the fetcher on every call
    pub timeout: Duration,
    /// Retry policy for transient failures
    pub retry: RetryPolicy,
}

impl WorkerSettings {
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            timeout: config.timeout(),
            retry: RetryPolicy::from_config(config),
        }
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self::from_config(&FetchConfig::default())
    }
}

/// Fetch worker
///
/// Owns its [`WorkerState`]; the fetcher and store are shared with the other
/// workers of the stage.
pub struct FetchWorker<I, F, S> {
    state: WorkerState<I>,
    fetcher: Arc<F>,
    store: Arc<S>,
    dedup: Deduplicator<I>,
    settings: WorkerSettings,
    recorder: Arc<dyn ResultRecorder>,
    outbound: Option<StageQueue<FetchResult>>,
    stop: Option<watch::Receiver<bool>>,
}

impl<I, F, S> FetchWorker<I, F, S>
where
    I: WorkItem,
    F: Fetcher<I>,
    S: ArtifactStore + Sync,
{
    /// Create a worker with per-worker dedup, no recorder and no outbound queue
    pub fn new(
        worker_id: WorkerId,
        fetcher: Arc<F>,
        store: Arc<S>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            state: WorkerState::new(worker_id),
            fetcher,
            store,
            dedup: Deduplicator::PerWorker,
            settings,
            recorder: Arc::new(NoopRecorder),
            outbound: None,
            stop: None,
        }
    }

    pub fn with_dedup(mut self, dedup: Deduplicator<I>) -> Self {
        self.dedup = dedup;
        self
    }

    /// Report every result to `recorder`
    pub fn with_recorder(mut self, recorder: Arc<dyn ResultRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    /// Push every result into `outbound`
    pub fn with_outbound(mut self, outbound: StageQueue<FetchResult>) -> Self {
        self.outbound = Some(outbound);
        self
    }

    /// Stop [`run_chunk`](Self::run_chunk) before the next item once `stop`
    /// turns true. The item in hand is always finished.
    pub fn with_stop(mut self, stop: watch::Receiver<bool>) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn worker_id(&self) -> WorkerId {
        self.state.worker_id()
    }

    /// Take items from `inbound` until end-of-stream.
    ///
    /// Never closes `inbound` or the outbound queue; that is left to whoever
    /// owns the stage.
    #[instrument(
        name = "fetch_worker_loop",
        skip(self, inbound),
        fields(worker_id = self.state.worker_id(), queue = %inbound.name())
    )]
    pub async fn run(mut self, inbound: StageQueue<I>) -> Result<WorkerStats> {
        debug!("Fetch worker started");

        while let Envelope::Item(item) = inbound.get().await {
            if let Err(e) = self.process(item).await {
                return Err(self.abort(e));
            }
        }

        Ok(self.finish())
    }

    /// Process a fixed chunk of items in order
    ///
    /// Returns early, with `items` short of the chunk length, when a stop was
    /// requested through [`with_stop`](Self::with_stop).
    #[instrument(
        name = "fetch_worker_chunk",
        skip(self, chunk),
        fields(worker_id = self.state.worker_id(), items = chunk.len())
    )]
    pub async fn run_chunk(mut self, chunk: Vec<I>) -> Result<WorkerStats> {
        debug!("Fetch worker started");

        let total = chunk.len();
        for item in chunk {
            if self.stop_requested() {
                info!(
                    done = self.state.stats.items,
                    left = total as u64 - self.state.stats.items,
                    "Stop requested, leaving the rest of the chunk"
                );
                break;
            }
            if let Err(e) = self.process(item).await {
                return Err(self.abort(e));
            }
        }

        Ok(self.finish())
    }

    fn stop_requested(&self) -> bool {
        self.stop.as_ref().is_some_and(|stop| *stop.borrow())
    }

    async fn process(&mut self, item: I) -> Result<()> {
        self.state.stats.items += 1;

        if self.dedup.is_duplicate(&mut self.state.last_seen, &item) {
            self.state.stats.skipped += 1;
            record_item_outcome("skipped");
            debug!(item = %item, "Same as previous item, fetch skipped");
            return Ok(());
        }

        let batch = match self.fetch_with_retry(&item).await {
            Ok(batch) => batch,
            Err(e) if e.is_fatal() => return Err(self.fatal(e)),
            Err(e) => {
                warn!(item = %item, error = %e, "Fetch failed");
                let failure = FetchFailure::from_error(item.to_string(), &e);
                return self.emit(FetchResult::Failed(failure)).await;
            }
        };

        if batch.is_empty() {
            debug!(item = %item, "Item resolved to no resources");
        }

        let FetchBatch { resources, failures } = batch;

        for resource in &resources {
            let result = match self.store.store(resource).await {
                Ok(handle) => FetchResult::Stored(handle),
                Err(e) if e.is_fatal() => return Err(self.fatal(e)),
                Err(e) => {
                    warn!(identity = %resource.identity, error = %e, "Store failed");
                    FetchResult::Failed(FetchFailure::from_error(resource.identity.as_str(), &e))
                }
            };
            self.emit(result).await?;
        }

        for failure in &failures {
            let result = FetchResult::Failed(FetchFailure::from_error(item.to_string(), failure));
            self.emit(result).await?;
        }

        Ok(())
    }

    async fn fetch_with_retry(
        &mut self,
        item: &I,
    ) -> std::result::Result<FetchBatch, ContractError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            self.state.stats.attempts += 1;
            record_fetch_attempt(self.state.worker_id());

            let started = Instant::now();
            let outcome = self.fetcher.fetch(item, self.settings.timeout).await;
            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
            self.state.stats.latency_ms.push(elapsed_ms);
            record_fetch_latency_ms(elapsed_ms);

            match outcome {
                Ok(batch) => return Ok(batch),
                Err(e) if self.settings.retry.should_retry(attempt, &e) => {
                    debug!(item = %item, attempt, error = %e, "Transient failure, retrying");
                    tokio::time::sleep(self.settings.retry.backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn emit(&mut self, result: FetchResult) -> Result<()> {
        self.state.stats.count(&result);
        record_item_outcome(if result.is_success() { "stored" } else { "failed" });
        self.recorder.record(self.state.worker_id(), &result);

        if let Some(outbound) = &self.outbound {
            if outbound.put(result).await.is_err() {
                return Err(WorkerError::OutboundClosed {
                    worker_id: self.state.worker_id(),
                    queue: outbound.name().to_string(),
                    partial: Box::new(self.state.stats.clone()),
                });
            }
        }
        Ok(())
    }

    fn fatal(&self, source: ContractError) -> WorkerError {
        WorkerError::Fatal {
            worker_id: self.state.worker_id(),
            source,
            partial: Box::new(self.state.stats.clone()),
        }
    }

    fn abort(self, err: WorkerError) -> WorkerError {
        record_worker_exit("fatal");
        error!(
            items = self.state.stats.items,
            stored = self.state.stats.stored,
            error = %err,
            "Fetch worker terminated"
        );
        err
    }

    fn finish(self) -> WorkerStats {
        record_worker_exit("completed");
        let stats = self.state.stats;
        info!(
            items = stats.items,
            stored = stats.stored,
            failed = stats.failed,
            skipped = stats.skipped,
            attempts = stats.attempts,
            "Fetch worker finished"
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ArtifactHandle, FailureKind, Resource};
    use fetcher::{MockFetcher, MockResponse};
    use std::sync::Mutex;

    /// In-memory store
    #[derive(Default)]
    struct MemoryStore {
        stored: Mutex<Vec<String>>,
        fail_on: Option<String>,
    }

    impl ArtifactStore for MemoryStore {
        async fn store(
            &self,
            resource: &Resource,
        ) -> std::result::Result<ArtifactHandle, ContractError> {
            if self.fail_on.as_deref() == Some(resource.identity.as_str()) {
                return Err(ContractError::storage_write(&resource.identity, "disk full"));
            }
            self.stored.lock().unwrap().push(resource.identity.clone());
            Ok(ArtifactHandle {
                path: format!("mem/{}", resource.identity).into(),
                identity: resource.identity.clone(),
                size: resource.content.len() as u64,
            })
        }
    }

    /// Recorder that keeps everything
    #[derive(Default)]
    struct VecRecorder(Mutex<Vec<(WorkerId, FetchResult)>>);

    impl ResultRecorder for VecRecorder {
        fn record(&self, worker_id: WorkerId, result: &FetchResult) {
            self.0.lock().unwrap().push((worker_id, result.clone()));
        }
    }

    fn fast_settings() -> WorkerSettings {
        WorkerSettings {
            timeout: Duration::from_secs(1),
            retry: RetryPolicy {
                max_attempts: 3,
                backoff: Duration::from_millis(1),
            },
        }
    }

    fn in_memory_worker(
        worker_id: WorkerId,
        fetcher: Arc<MockFetcher>,
    ) -> FetchWorker<String, MockFetcher, MemoryStore> {
        FetchWorker::new(worker_id, fetcher, Arc::new(MemoryStore::default()), fast_settings())
    }

    async fn queue_of(items: &[&str]) -> StageQueue<String> {
        let queue = StageQueue::bounded("inbound", items.len().max(1)).unwrap();
        for item in items {
            queue.put(item.to_string()).await.unwrap();
        }
        queue.close();
        queue
    }

    #[tokio::test]
    async fn test_duplicate_consecutive_item_fetched_once() {
        let fetcher = Arc::new(MockFetcher::new());
        let store = Arc::new(MemoryStore::default());
        let worker = FetchWorker::new(0, Arc::clone(&fetcher), store, fast_settings());

        let stats = worker
            .run(queue_of(&["colombo", "colombo", "matara"]).await)
            .await
            .unwrap();

        assert_eq!(fetcher.calls(), 2);
        assert_eq!(fetcher.history(), vec!["colombo", "matara"]);
        assert_eq!(stats.items, 3);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.stored, 2);
    }

    #[tokio::test]
    async fn test_dedup_disabled_fetches_every_item() {
        let fetcher = Arc::new(MockFetcher::new());
        let worker = in_memory_worker(0, Arc::clone(&fetcher))
            .with_dedup(Deduplicator::Disabled);

        worker
            .run(queue_of(&["colombo", "colombo", "matara"]).await)
            .await
            .unwrap();
        assert_eq!(fetcher.calls(), 3);
    }

    #[tokio::test]
    async fn test_transient_failure_retried() {
        let fetcher = Arc::new(MockFetcher::new().respond_sequence(
            "galle",
            vec![MockResponse::Transient(Some(503)), MockResponse::Resources(1)],
        ));
        let worker = in_memory_worker(0, Arc::clone(&fetcher));

        let stats = worker.run(queue_of(&["galle"]).await).await.unwrap();

        assert_eq!(stats.attempts, 2);
        assert_eq!(stats.stored, 1);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.latency_ms.count(), 2);
    }

    #[tokio::test]
    async fn test_failures_forwarded_downstream() {
        let fetcher = Arc::new(
            MockFetcher::new()
                .respond("bad", MockResponse::Malformed)
                .respond("down", MockResponse::Transient(None)),
        );
        let outbound = StageQueue::bounded("results", 16).unwrap();
        let recorder = Arc::new(VecRecorder::default());
        let worker = in_memory_worker(4, Arc::clone(&fetcher))
            .with_outbound(outbound.clone())
            .with_recorder(recorder.clone());

        let stats = worker
            .run(queue_of(&["bad", "ok", "down"]).await)
            .await
            .unwrap();

        assert_eq!(fetcher.calls_for("bad"), 1, "malformed is not retried");
        assert_eq!(fetcher.calls_for("down"), 3, "transient is retried up to the limit");
        assert_eq!(stats.stored, 1);
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.failures_by_kind.get(&FailureKind::Malformed), Some(&1));

        outbound.close();
        let mut delivered = Vec::new();
        while let Envelope::Item(result) = outbound.get().await {
            delivered.push(result);
        }
        assert_eq!(delivered.len(), 3);
        assert!(!delivered[0].is_success());
        assert!(delivered[1].is_success());

        let recorded = recorder.0.lock().unwrap();
        assert_eq!(recorded.len(), 3);
        assert!(recorded.iter().all(|(id, _)| *id == 4));
    }

    #[tokio::test]
    async fn test_fan_out_and_store_failure() {
        let fetcher = Arc::new(MockFetcher::new().respond("colombo", MockResponse::Resources(3)));
        let store = Arc::new(MemoryStore {
            fail_on: Some("colombo/1".into()),
            ..Default::default()
        });
        let worker = FetchWorker::new(0, fetcher, Arc::clone(&store), fast_settings());

        let stats = worker.run(queue_of(&["colombo"]).await).await.unwrap();

        assert_eq!(stats.stored, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(*store.stored.lock().unwrap(), vec!["colombo/0", "colombo/2"]);
    }

    #[tokio::test]
    async fn test_fatal_error_stops_worker_with_partial_stats() {
        let fetcher = Arc::new(MockFetcher::new().respond("c", MockResponse::Fatal));
        let worker = in_memory_worker(1, Arc::clone(&fetcher));

        let chunk = ["a", "b", "c", "d", "e"].map(String::from).to_vec();
        let err = worker.run_chunk(chunk).await.unwrap_err();

        assert!(matches!(err, WorkerError::Fatal { worker_id: 1, .. }));
        assert_eq!(err.partial_stats().stored, 2);
        assert_eq!(fetcher.calls(), 3, "nothing after the fatal item is fetched");
        assert!(ContractError::from(err).is_fatal());
    }

    #[tokio::test]
    async fn test_closed_outbound_is_fatal() {
        let outbound = StageQueue::bounded("results", 4).unwrap();
        outbound.close();
        let worker = in_memory_worker(0, Arc::new(MockFetcher::new()))
            .with_outbound(outbound);

        let err = worker.run(queue_of(&["a"]).await).await.unwrap_err();
        assert!(matches!(err, WorkerError::OutboundClosed { .. }));
    }

    #[tokio::test]
    async fn test_stop_leaves_rest_of_chunk() {
        let fetcher = Arc::new(MockFetcher::new());
        let (stop, stopped) = watch::channel(false);
        stop.send_replace(true);
        let worker = in_memory_worker(2, Arc::clone(&fetcher)).with_stop(stopped);

        let chunk = ["a", "b", "c"].map(String::from).to_vec();
        let stats = worker.run_chunk(chunk).await.unwrap();

        assert_eq!(stats.items, 0);
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_stop_mid_chunk_finishes_current_item() {
        let fetcher = Arc::new(MockFetcher::new().with_delay(Duration::from_millis(40)));
        let (stop, stopped) = watch::channel(false);
        let worker = in_memory_worker(0, Arc::clone(&fetcher)).with_stop(stopped);

        let chunk = ["a", "b", "c", "d"].map(String::from).to_vec();
        let task = tokio::spawn(worker.run_chunk(chunk));
        tokio::time::sleep(Duration::from_millis(10)).await;
        stop.send_replace(true);

        let stats = task.await.unwrap().unwrap();
        assert_eq!(stats.items, 1);
        assert_eq!(stats.stored, 1, "the item in flight is stored");
        assert_eq!(fetcher.history(), vec!["a"]);
    }
}
