//! Final report of a pipeline run

use std::fmt;
use std::time::Duration;

use contracts::PipelineMode;
use dispatcher::DispatchReport;

use crate::aggregator::PipelineSummary;
use crate::stage::StageState;

/// Everything known after a run ended
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub mode: PipelineMode,
    /// Deterministic result summary
    pub summary: PipelineSummary,
    /// Items handed to the fetch stage
    pub produced: u64,
    /// Why the producer stopped early, if it did
    pub producer_error: Option<String>,
    /// A shutdown was requested before the source was exhausted
    pub interrupted: bool,
    /// Consumer stage report (queue mode only)
    pub dispatch: Option<DispatchReport>,
    /// Final state per stage
    pub stages: Vec<(&'static str, StageState)>,
    /// Wall-clock duration
    pub duration: Duration,
}

impl PipelineReport {
    /// Stored artifacts per second
    pub fn throughput(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.summary.stored as f64 / secs
        } else {
            0.0
        }
    }

    /// Artifacts a consumer never received
    pub fn undelivered(&self) -> u64 {
        self.dispatch.as_ref().map_or(0, |d| d.undelivered)
    }

    /// No worker crashed or stopped early, the producer ran to the end and
    /// every artifact reached every consumer
    pub fn is_clean(&self) -> bool {
        self.summary.all_completed()
            && self.producer_error.is_none()
            && !self.interrupted
            && self.summary.abandoned == 0
            && self.undelivered() == 0
    }
}

impl fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let summary = &self.summary;
        writeln!(f, "Pipeline ({:?} mode)", self.mode)?;
        if self.interrupted {
            writeln!(f, "  Interrupted: partial results")?;
        }
        writeln!(f, "  Total Image Downloads: {}", summary.stored)?;
        writeln!(f, "  Failures: {}", summary.failed)?;
        for (kind, count) in &summary.failures_by_kind {
            writeln!(f, "    {kind}: {count}")?;
        }
        writeln!(f, "  Skipped (duplicate): {}", summary.skipped)?;
        if summary.abandoned > 0 {
            writeln!(f, "  Abandoned: {}", summary.abandoned)?;
        }
        writeln!(f, "  Fetch attempts: {}", summary.attempts)?;
        writeln!(f, "  Fetch latency (ms): {}", summary.latency_ms)?;
        writeln!(f, "  Workers:")?;
        for worker in &summary.workers {
            writeln!(
                f,
                "    #{} {}: items={} stored={} failed={} skipped={}",
                worker.worker_id,
                worker.exit,
                worker.items,
                worker.stored,
                worker.failed,
                worker.skipped
            )?;
        }
        if let Some(dispatch) = &self.dispatch {
            for (name, metrics) in &dispatch.consumers {
                writeln!(
                    f,
                    "  Consumer '{name}': consumed={} failed={} blocked={} undelivered={}",
                    metrics.consumed_count,
                    metrics.failure_count,
                    metrics.blocked_count,
                    metrics.undelivered_count
                )?;
            }
        }
        if let Some(err) = &self.producer_error {
            writeln!(f, "  Producer stopped: {err}")?;
        }
        writeln!(f, "  Throughput: {:.2} artifacts/s", self.throughput())?;
        write!(f, "  Duration: {:.2} s", self.duration.as_secs_f64())
    }
}
