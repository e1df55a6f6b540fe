//! # Worker
//!
//! Fetch stage workers.
//!
//! A [`FetchWorker`] takes one item at a time, suppresses consecutive
//! duplicates, fetches with a bounded retry, stores every resource and pushes
//! one [`FetchResult`](contracts::FetchResult) per resource downstream.
//!
//! Two drivers share the same per-item processing:
//! - [`FetchWorker::run`] pulls from a shared [`StageQueue`](stage_queue::StageQueue)
//!   until end-of-stream
//! - [`FetchWorker::run_chunk`] iterates a fixed slice from [`partition`]

mod dedup;
mod error;
mod partition;
mod retry;
mod state;
mod worker;

pub use dedup::{Deduplicator, SharedLastSeen};
pub use error::{Result, WorkerError};
pub use partition::partition;
pub use retry::RetryPolicy;
pub use state::{WorkerState, WorkerStats};
pub use worker::{FetchWorker, WorkerSettings};
