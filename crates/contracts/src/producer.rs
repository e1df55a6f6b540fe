//! WorkProducer trait - origin of work items

use std::future::Future;

use crate::{ContractError, Envelope, WorkItem};

/// Work producer
///
/// Called repeatedly by the orchestrator until it yields
/// `Envelope::EndOfStream`. A producer is the single writer of the first stage
/// queue, so the orchestrator closes that queue as soon as the producer ends.
pub trait WorkProducer<I: WorkItem>: Send {
    /// Producer name (used for logging)
    fn name(&self) -> &str;

    /// Produce the next item, waiting as long as needed
    fn next_item(&mut self) -> impl Future<Output = Result<Envelope<I>, ContractError>> + Send;
}
