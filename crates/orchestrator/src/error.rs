//! Orchestrator errors

use contracts::ContractError;
use dispatcher::DispatcherError;
use stage_queue::QueueError;
use thiserror::Error;

/// Errors that stop a pipeline as a whole
///
/// Worker failures never show up here; they end up in the report.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// A stage could not be set up
    #[error(transparent)]
    Startup(ContractError),

    /// The consumer stage could not be built
    #[error("consumer stage startup failed: {0}")]
    Dispatcher(#[from] DispatcherError),

    /// Results were read while a worker still held the aggregator
    #[error("result aggregator is still shared by {holders} owners")]
    AggregatorBusy { holders: usize },

    /// The task supervising the pipeline died
    #[error("pipeline supervisor failed: {0}")]
    Supervisor(#[from] tokio::task::JoinError),
}

impl OrchestratorError {
    pub fn startup(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Startup(ContractError::startup(stage, message))
    }
}

impl From<ContractError> for OrchestratorError {
    fn from(err: ContractError) -> Self {
        Self::Startup(err)
    }
}

impl From<QueueError> for OrchestratorError {
    fn from(err: QueueError) -> Self {
        Self::Startup(err.into())
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
