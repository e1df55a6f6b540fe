//! Dispatcher - final stage loop, fan-out to consumers

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use contracts::{ConsumerConfig, ConsumerKind, Envelope, FailureKind, FetchResult};
use stage_queue::StageQueue;

use crate::consumers::{LogConsumer, ManifestConsumer};
use crate::error::DispatcherError;
use crate::handle::ConsumerHandle;
use crate::metrics::{ConsumerMetrics, MetricsSnapshot};

/// What the consumer stage saw
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    /// Results taken from the input queue
    pub received: u64,
    /// Stored artifacts handed to consumers
    pub artifacts: u64,
    /// Failure results (counted, not forwarded)
    pub failures: u64,
    /// Failures by class
    pub failures_by_kind: BTreeMap<FailureKind, u64>,
    /// Artifact deliveries that never reached a consumer, over all consumers
    pub undelivered: u64,
    /// Final metrics per consumer
    pub consumers: Vec<(String, MetricsSnapshot)>,
}

/// Create a ConsumerHandle from configuration
#[instrument(
    name = "dispatcher_create_consumer_handle",
    skip(config),
    fields(consumer = %config.name, kind = ?config.kind)
)]
fn create_consumer_handle(config: &ConsumerConfig) -> Result<ConsumerHandle, DispatcherError> {
    match config.kind {
        ConsumerKind::Log => {
            let consumer = LogConsumer::new(&config.name);
            Ok(ConsumerHandle::spawn(consumer, config.queue_capacity))
        }
        ConsumerKind::Manifest => {
            let consumer = ManifestConsumer::from_params(&config.name, &config.params)
                .map_err(|e| DispatcherError::consumer_creation(&config.name, e.to_string()))?;
            Ok(ConsumerHandle::spawn(consumer, config.queue_capacity))
        }
    }
}

/// The consumer stage: drains the result queue and fans artifacts out
pub struct Dispatcher {
    handles: Vec<ConsumerHandle>,
    input: StageQueue<FetchResult>,
}

impl Dispatcher {
    /// Create a dispatcher with custom consumer handles (for testing)
    pub fn with_handles(handles: Vec<ConsumerHandle>, input: StageQueue<FetchResult>) -> Self {
        Self { handles, input }
    }

    /// Get metrics for all consumers
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().snapshot()))
            .collect()
    }

    /// Run the dispatcher main loop
    ///
    /// Returns after the input queue delivered end-of-stream and every
    /// consumer flushed and closed.
    #[instrument(name = "dispatcher_run", skip(self), fields(queue = %self.input.name()))]
    pub async fn run(self) -> DispatchReport {
        info!(consumers = self.handles.len(), "Dispatcher started");

        let mut report = DispatchReport::default();

        while let Envelope::Item(result) = self.input.get().await {
            report.received += 1;
            match result {
                FetchResult::Stored(artifact) => {
                    report.artifacts += 1;
                    for handle in &self.handles {
                        if !handle.send(artifact.clone()).await {
                            debug!(
                                consumer = %handle.name(),
                                path = %artifact.path.display(),
                                "Artifact not delivered"
                            );
                        }
                    }
                }
                FetchResult::Failed(failure) => {
                    report.failures += 1;
                    *report.failures_by_kind.entry(failure.kind).or_default() += 1;
                    debug!(item = %failure.item, kind = %failure.kind, "Failure result counted");
                }
            }

            if report.received % 100 == 0 {
                debug!(results = report.received, "Dispatcher progress");
            }
        }

        info!(
            results = report.received,
            artifacts = report.artifacts,
            failures = report.failures,
            "Dispatcher input closed, shutting down"
        );

        report.consumers = Self::shutdown_handles(self.handles).await;
        report.undelivered = report
            .consumers
            .iter()
            .map(|(_, metrics)| metrics.undelivered_count)
            .sum();
        if report.undelivered > 0 {
            warn!(undelivered = report.undelivered, "Some artifacts never reached their consumer");
        }

        info!("Dispatcher shutdown complete");
        report
    }

    /// Spawn the dispatcher as a background task
    pub fn spawn(self) -> JoinHandle<DispatchReport> {
        tokio::spawn(self.run())
    }

    async fn shutdown_handles(handles: Vec<ConsumerHandle>) -> Vec<(String, MetricsSnapshot)> {
        let mut finals = Vec::with_capacity(handles.len());
        for handle in handles {
            let name = handle.name().to_string();
            let metrics: Arc<ConsumerMetrics> = Arc::clone(handle.metrics());
            handle.shutdown().await;
            finals.push((name, metrics.snapshot()));
        }
        finals
    }
}

/// Create a dispatcher from consumer configs
#[instrument(name = "dispatcher_create", skip(consumer_configs, input))]
pub fn create_dispatcher(
    consumer_configs: &[ConsumerConfig],
    input: StageQueue<FetchResult>,
) -> Result<Dispatcher, DispatcherError> {
    if consumer_configs.is_empty() {
        warn!("No consumers configured - artifacts are only counted");
    }

    let handles = consumer_configs
        .iter()
        .map(create_consumer_handle)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Dispatcher::with_handles(handles, input))
}
