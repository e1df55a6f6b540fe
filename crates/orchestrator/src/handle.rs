//! Handle to a started pipeline

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use crate::error::Result;
use crate::report::PipelineReport;
use crate::stage::{StageState, StageTracker};

/// Asks a running pipeline to stop taking new work
///
/// Stopping never cancels a task. The producer ends its stream (queue mode)
/// or workers leave the rest of their chunk (static mode); everything already
/// handed to a worker is finished and every worker is still joined before the
/// report is built.
#[derive(Debug, Clone)]
pub struct ShutdownTrigger(Arc<watch::Sender<bool>>);

impl ShutdownTrigger {
    pub(crate) fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self(Arc::new(tx)), rx)
    }

    /// Request the stop. Returns false if it was already requested.
    pub fn trigger(&self) -> bool {
        let first = !self.0.send_replace(true);
        if first {
            info!("Pipeline shutdown requested");
        }
        first
    }

    pub fn is_triggered(&self) -> bool {
        *self.0.borrow()
    }
}

/// Wait until a stop was requested
///
/// Never resolves if every [`ShutdownTrigger`] is gone without triggering.
pub(crate) async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    if stop.wait_for(|stopped| *stopped).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Running pipeline, used to observe, stop and join it
pub struct PipelineHandle {
    supervisor: JoinHandle<Result<PipelineReport>>,
    stages: Vec<Arc<StageTracker>>,
    shutdown: ShutdownTrigger,
}

impl PipelineHandle {
    pub(crate) fn new(
        supervisor: JoinHandle<Result<PipelineReport>>,
        stages: Vec<Arc<StageTracker>>,
        shutdown: ShutdownTrigger,
    ) -> Self {
        Self {
            supervisor,
            stages,
            shutdown,
        }
    }

    /// Current state of every stage
    pub fn stages(&self) -> Vec<(&'static str, StageState)> {
        snapshot(&self.stages)
    }

    pub fn is_finished(&self) -> bool {
        self.supervisor.is_finished()
    }

    /// Stop taking new work; [`join`](Self::join) still returns the report
    pub fn shutdown(&self) -> bool {
        self.shutdown.trigger()
    }

    /// A trigger that outlives the handle, for use while joining
    pub fn shutdown_trigger(&self) -> ShutdownTrigger {
        self.shutdown.clone()
    }

    /// Wait until every stage terminated
    pub async fn join(self) -> Result<PipelineReport> {
        self.supervisor.await?
    }
}

pub(crate) fn snapshot(stages: &[Arc<StageTracker>]) -> Vec<(&'static str, StageState)> {
    stages.iter().map(|s| (s.name(), s.state())).collect()
}
