//! # Contracts
//!
//! Frozen interface contracts, defining inter-stage data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Data Flow
//! - `WorkProducer` yields `Envelope<I>` until end-of-stream
//! - `Fetcher` resolves one item into a `FetchBatch` of `Resource`s
//! - `ArtifactStore` turns a `Resource` into an `ArtifactHandle`
//! - `ResultRecorder` collects every `FetchResult` for the final report
//! - `ArtifactConsumer` acts on stored artifacts

mod blueprint;
mod consumer;
mod envelope;
mod error;
mod fetch;
mod fetcher;
mod producer;
mod query;
mod recorder;
mod store;

pub use blueprint::*;
pub use consumer::{ArtifactConsumer, LocalArtifactConsumer};
pub use envelope::{Envelope, WorkItem};
pub use error::*;
pub use fetch::*;
pub use fetcher::Fetcher;
pub use producer::WorkProducer;
pub use query::Query;
pub use recorder::{NoopRecorder, ResultRecorder};
pub use store::{ArtifactStore, LocalArtifactStore};
