//! # Dispatcher
//!
//! 最终消费阶段。
//!
//! 负责：
//! - 从结果队列消费 `FetchResult` 直到 end-of-stream
//! - 将已存储的 artifact fan-out 到多个 consumers
//! - 统计失败结果（失败结果不交给 consumer）
//! - 每个 consumer 独立队列，满时阻塞（不丢弃）

pub mod consumers;
pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;

pub use contracts::{ArtifactConsumer, ArtifactHandle, FetchResult};
pub use consumers::{LogConsumer, ManifestConsumer};
pub use dispatcher::{create_dispatcher, DispatchReport, Dispatcher};
pub use error::DispatcherError;
pub use handle::ConsumerHandle;
pub use metrics::{ConsumerMetrics, MetricsSnapshot};
