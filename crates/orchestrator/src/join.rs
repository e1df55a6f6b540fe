//! Turning a joined worker task into an exit record

use contracts::WorkerId;
use observability::record_worker_exit;
use tracing::{error, warn};
use worker::WorkerStats;

use crate::aggregator::WorkerExit;

/// What joining a worker task yielded
pub(crate) enum Joined {
    /// The worker returned
    Finished(worker::Result<WorkerStats>),
    /// The task crashed before returning
    Crashed(String),
}

/// Log a worker's end and split it into exit and stats
pub(crate) fn settle(worker_id: WorkerId, joined: Joined) -> (WorkerExit, Option<WorkerStats>) {
    match joined {
        Joined::Finished(Ok(stats)) => (WorkerExit::Completed, Some(stats)),
        Joined::Finished(Err(err)) => {
            warn!(worker_id, error = %err, "Fetch worker stopped early, siblings continue");
            (WorkerExit::Fatal(err.to_string()), Some(err.partial_stats().clone()))
        }
        Joined::Crashed(reason) => {
            record_worker_exit("panicked");
            error!(worker_id, error = %reason, "Fetch worker crashed, treated as terminated");
            (WorkerExit::Panicked, None)
        }
    }
}
