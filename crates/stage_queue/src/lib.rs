//! # Stage Queue
//!
//! Typed, bounded queue connecting two adjacent pipeline stages.
//!
//! Responsibilities:
//! - Backpressure: `put` waits while the queue is full, nothing is dropped
//! - Explicit end-of-stream via `close`, delivered after buffered items
//! - Shared per-queue metrics
//!
//! ## Usage Example
//!
//! ```ignore
//! use stage_queue::StageQueue;
//! use contracts::Envelope;
//!
//! let queue = StageQueue::bounded("queries", 64)?;
//! queue.put("colombo".to_string()).await?;
//! queue.close();
//! while let Envelope::Item(query) = queue.get().await {
//!     // Process item
//! }
//! ```

mod error;
mod metrics;
mod queue;

pub use contracts::Envelope;
pub use error::{QueueError, Result};
pub use metrics::{QueueMetrics, QueueSnapshot};
pub use queue::StageQueue;
