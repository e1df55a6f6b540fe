//! ConsumerHandle - manages a consumer with isolated queue and worker task

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, trace};

use contracts::{ArtifactConsumer, ArtifactHandle};
use observability::record_artifact_consumed;

use crate::metrics::ConsumerMetrics;

/// Handle to a running consumer worker
pub struct ConsumerHandle {
    /// Consumer name
    name: String,
    /// Channel to send artifacts to worker
    tx: mpsc::Sender<ArtifactHandle>,
    /// Shared metrics
    metrics: Arc<ConsumerMetrics>,
    /// Artifacts taken into the queue
    accepted: AtomicU64,
    /// Worker task handle
    worker_handle: JoinHandle<()>,
}

impl ConsumerHandle {
    /// Create a new ConsumerHandle and spawn the worker task
    pub fn spawn<C: ArtifactConsumer + Send + 'static>(consumer: C, queue_capacity: usize) -> Self {
        let name = consumer.name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(ConsumerMetrics::new());

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();

        let worker_handle = tokio::spawn(async move {
            consumer_worker(consumer, rx, worker_metrics, worker_name).await;
        });

        Self {
            name,
            tx,
            metrics,
            accepted: AtomicU64::new(0),
            worker_handle,
        }
    }

    /// Get consumer name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<ConsumerMetrics> {
        &self.metrics
    }

    /// Send an artifact to the consumer, waiting while its queue is full
    ///
    /// Returns false only if the consumer worker is gone; the artifact is then
    /// counted as undelivered.
    pub async fn send(&self, artifact: ArtifactHandle) -> bool {
        let artifact = match self.tx.try_send(artifact) {
            Ok(()) => {
                self.accepted.fetch_add(1, Ordering::Relaxed);
                self.metrics
                    .set_queue_len(self.tx.max_capacity() - self.tx.capacity());
                return true;
            }
            Err(mpsc::error::TrySendError::Full(artifact)) => {
                self.metrics.inc_blocked_count();
                trace!(consumer = %self.name, "Queue full, waiting");
                artifact
            }
            Err(mpsc::error::TrySendError::Closed(_)) => return self.undelivered(),
        };

        if self.tx.send(artifact).await.is_err() {
            return self.undelivered();
        }
        self.accepted.fetch_add(1, Ordering::Relaxed);
        true
    }

    fn undelivered(&self) -> bool {
        self.metrics.add_undelivered(1);
        error!(consumer = %self.name, "Consumer worker closed unexpectedly");
        false
    }

    /// Shutdown the consumer worker gracefully
    #[instrument(name = "consumer_handle_shutdown", skip(self), fields(consumer = %self.name))]
    pub async fn shutdown(self) {
        // Drop sender to signal worker to stop
        drop(self.tx);
        // Wait for worker to finish
        if let Err(e) = self.worker_handle.await {
            error!(consumer = %self.name, error = ?e, "Worker task panicked");
        }

        // Whatever was still queued when the worker died is lost
        let accepted = self.accepted.load(Ordering::Relaxed);
        let handled = self.metrics.consumed_count() + self.metrics.failure_count();
        let lost = accepted.saturating_sub(handled);
        if lost > 0 {
            error!(consumer = %self.name, lost, "Queued artifacts never reached the consumer");
            self.metrics.add_undelivered(lost);
        }
        debug!(consumer = %self.name, "ConsumerHandle shutdown complete");
    }
}

/// Worker task that hands artifacts to the consumer
#[instrument(
    name = "consumer_worker_loop",
    skip(consumer, rx, metrics),
    fields(consumer = %name)
)]
async fn consumer_worker<C: ArtifactConsumer>(
    mut consumer: C,
    mut rx: mpsc::Receiver<ArtifactHandle>,
    metrics: Arc<ConsumerMetrics>,
    name: String,
) {
    debug!(consumer = %name, "Consumer worker started");

    while let Some(artifact) = rx.recv().await {
        metrics.set_queue_len(rx.len());

        match consumer.consume(&artifact).await {
            Ok(()) => {
                metrics.inc_consumed_count();
                record_artifact_consumed(&name, true);
            }
            Err(e) => {
                metrics.inc_failure_count();
                record_artifact_consumed(&name, false);
                error!(
                    consumer = %name,
                    path = %artifact.path.display(),
                    error = %e,
                    "Consume failed"
                );
                // One bad artifact does not stop the consumer
            }
        }
    }

    // Cleanup
    if let Err(e) = consumer.flush().await {
        error!(consumer = %name, error = %e, "Flush failed on shutdown");
    }
    if let Err(e) = consumer.close().await {
        error!(consumer = %name, error = %e, "Close failed on shutdown");
    }

    debug!(consumer = %name, "Consumer worker stopped");
}
