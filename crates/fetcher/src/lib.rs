//! # Fetcher
//!
//! Fetch capabilities injected into fetch workers.
//!
//! - [`HttpFetcher`]: one URL in, one resource out
//! - [`SearchFetcher`]: one query in, every search hit downloaded
//! - [`MockFetcher`]: scripted fetcher for tests (no network)
//!
//! Every fetcher enforces the caller-provided timeout on each network call.

mod http;
mod mock;
mod search;

pub use http::HttpFetcher;
pub use mock::{MockFetcher, MockResponse};
pub use search::SearchFetcher;
