//! # Orchestrator
//!
//! Wires stages together, starts workers and shuts everything down in stage
//! order.
//!
//! - [`QueuePipeline`]: producer -> `StageQueue` -> fetch worker pool ->
//!   `StageQueue` -> consumers. A stage's outbound queue is closed only after
//!   every worker of that stage was joined.
//! - [`StaticPipeline`]: the work list is partitioned up front, one chunk per
//!   worker; counts are read only after every worker was joined.
//!
//! Both feed a [`ResultAggregator`] and end in a [`PipelineReport`]. Worker
//! failures never abort a run; only [`OrchestratorError`] does. A
//! [`PipelineHandle::shutdown`] stops intake, never a running task, so the
//! report of an interrupted run still accounts for every item.

mod aggregator;
mod error;
mod handle;
mod join;
mod launch;
mod producer;
mod queue_pipeline;
mod report;
mod stage;
mod static_pipeline;

pub use aggregator::{PipelineSummary, ResultAggregator, WorkerExit, WorkerReport};
pub use error::{OrchestratorError, Result};
pub use handle::{PipelineHandle, ShutdownTrigger};
pub use launch::{run_blueprint, source_queries, source_urls, start_blueprint};
pub use producer::{IntervalProducer, ListProducer, TemplateUrls};
pub use queue_pipeline::QueuePipeline;
pub use report::PipelineReport;
pub use stage::{StageState, StageTracker};
pub use static_pipeline::StaticPipeline;
