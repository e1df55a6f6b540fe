//! Fetcher trait - fetch capability

use std::future::Future;
use std::time::Duration;

use crate::{ContractError, FetchBatch, WorkItem};

/// Fetch capability
///
/// Resolves one work item into zero-or-more resources with a single logical
/// call. The timeout is chosen by the caller and must be enforced by the
/// implementation; it is the only bound on a fetch in flight.
pub trait Fetcher<I: WorkItem>: Send + Sync {
    /// Fetch everything the item resolves to
    ///
    /// # Errors
    /// - `TransientFetch` / `Timeout` for network failures of the item itself
    /// - `MalformedItem` when the response can not be decoded
    /// - `WorkerFatal` when the worker must not continue
    fn fetch(
        &self,
        item: &I,
        timeout: Duration,
    ) -> impl Future<Output = Result<FetchBatch, ContractError>> + Send;
}
