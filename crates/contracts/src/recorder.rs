//! ResultRecorder trait - terminal result collection

use crate::{FetchResult, WorkerId};

/// Collector of terminal fetch results.
///
/// Called from every worker of a stage at once, so implementations must be
/// safe to share.
pub trait ResultRecorder: Send + Sync {
    /// Record one result produced by `worker_id`
    fn record(&self, worker_id: WorkerId, result: &FetchResult);
}

/// Recorder that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRecorder;

impl ResultRecorder for NoopRecorder {
    fn record(&self, _worker_id: WorkerId, _result: &FetchResult) {}
}
