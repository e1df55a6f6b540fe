//! PipelineBlueprint - Config Loader output
//!
//! Describes the complete pipeline: topology, dedup, fetch policy, work
//! source, search endpoint, storage and consumers.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::Range;
use std::path::PathBuf;
use std::time::Duration;
use validator::Validate;

use crate::ContractError;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete pipeline blueprint
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PipelineBlueprint {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Topology and queue sizing
    #[serde(default)]
    #[validate(nested)]
    pub pipeline: PipelineSettings,

    /// Consecutive duplicate suppression
    #[serde(default)]
    pub dedup: DedupConfig,

    /// Per-item fetch policy
    #[serde(default)]
    #[validate(nested)]
    pub fetch: FetchConfig,

    /// Where work items come from
    pub source: SourceConfig,

    /// Search endpoint, required for query sources
    #[serde(default)]
    #[validate(nested)]
    pub search: Option<SearchConfig>,

    /// Artifact storage
    #[serde(default)]
    pub storage: StorageConfig,

    /// Downstream consumers of stored artifacts
    #[serde(default)]
    #[validate(nested)]
    pub consumers: Vec<ConsumerConfig>,
}

/// Pipeline topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineMode {
    /// Producer -> shared queue -> worker pool -> queue -> consumers
    #[default]
    Queue,
    /// Fixed work list split into contiguous chunks, one per worker
    Static,
}

/// Topology and queue sizing
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PipelineSettings {
    /// Topology
    #[serde(default)]
    pub mode: PipelineMode,

    /// Number of fetch workers
    #[serde(default = "default_workers")]
    #[validate(range(min = 1, max = 1024))]
    pub workers: usize,

    /// Capacity of the producer -> workers queue
    #[serde(default = "default_capacity")]
    #[validate(range(min = 1))]
    pub inbound_capacity: usize,

    /// Capacity of the workers -> consumers queue
    #[serde(default = "default_capacity")]
    #[validate(range(min = 1))]
    pub outbound_capacity: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            mode: PipelineMode::default(),
            workers: default_workers(),
            inbound_capacity: default_capacity(),
            outbound_capacity: default_capacity(),
        }
    }
}

fn default_workers() -> usize {
    4
}

fn default_capacity() -> usize {
    64
}

/// Which workers share the last-seen item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupScope {
    /// Each worker compares against the last item it took itself
    #[default]
    PerWorker,
    /// All workers of the stage compare against the last item any of them took
    Shared,
}

/// Consecutive duplicate suppression
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Skip a fetch when the item equals the previous one
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Scope of the previous-item comparison
    #[serde(default)]
    pub scope: DedupScope,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scope: DedupScope::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Per-item fetch policy
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FetchConfig {
    /// Timeout for one network call (milliseconds)
    #[serde(default = "default_timeout_ms")]
    #[validate(range(min = 1))]
    pub timeout_ms: u64,

    /// Attempts per item, including the first one
    #[serde(default = "default_max_attempts")]
    #[validate(range(min = 1, max = 10))]
    pub max_attempts: u32,

    /// Fixed pause between attempts (milliseconds)
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    #[validate(length(min = 1))]
    pub user_agent: String,
}

impl FetchConfig {
    /// Timeout as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Retry pause as a Duration
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    250
}

fn default_user_agent() -> String {
    concat!("fetchpipe/", env!("CARGO_PKG_VERSION")).to_string()
}

/// Work source
///
/// Exactly one of `queries`, `urls` or `template` must be set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Search terms resolved through `[search]`
    #[serde(default)]
    pub queries: Vec<String>,

    /// Direct download URLs
    #[serde(default)]
    pub urls: Vec<String>,

    /// Generated download URLs
    #[serde(default)]
    pub template: Option<UrlTemplate>,

    /// Pause between produced items (milliseconds, 0 = none)
    #[serde(default)]
    pub interval_ms: u64,

    /// How many times the list is replayed (queue mode only)
    #[serde(default = "default_rounds")]
    pub rounds: u32,
}

fn default_rounds() -> u32 {
    1
}

/// What kind of work items a source produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Search terms
    Queries,
    /// Download URLs (explicit or generated)
    Urls,
}

impl SourceConfig {
    /// Kind of items this source yields, `None` if it is empty or ambiguous
    pub fn kind(&self) -> Option<SourceKind> {
        let has_queries = !self.queries.is_empty();
        let has_urls = !self.urls.is_empty() || self.template.is_some();
        match (has_queries, has_urls) {
            (true, false) => Some(SourceKind::Queries),
            (false, true) if self.urls.is_empty() || self.template.is_none() => {
                Some(SourceKind::Urls)
            }
            _ => None,
        }
    }

    /// Pause between items
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// URL template, `{i}` is replaced by the item index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlTemplate {
    /// e.g. `https://picsum.photos/id/{i}/400/600`
    pub pattern: String,

    /// Number of URLs to generate
    pub count: u64,

    /// First index
    #[serde(default)]
    pub start: u64,
}

impl UrlTemplate {
    /// Most URLs one template may generate
    pub const MAX_COUNT: u64 = 1_000_000;

    /// Placeholder replaced by the index
    pub const PLACEHOLDER: &'static str = "{i}";

    /// One past the last index, `None` if `start + count` overflows
    pub fn end(&self) -> Option<u64> {
        self.start.checked_add(self.count)
    }

    /// Index range covered by the template, checked against overflow
    pub fn indices(&self) -> Result<Range<u64>, ContractError> {
        let end = self.end().ok_or_else(|| {
            ContractError::config_validation(
                "source.template",
                format!("start {} + count {} overflows u64", self.start, self.count),
            )
        })?;
        Ok(self.start..end)
    }

    /// The URL for `index`
    pub fn render(&self, index: u64) -> String {
        self.pattern.replace(Self::PLACEHOLDER, &index.to_string())
    }
}

/// Search endpoint that resolves a query into downloadable resources
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SearchConfig {
    /// Search URL, queried as `{endpoint}?page={page}&query={query}`
    #[validate(length(min = 1))]
    pub endpoint: String,

    /// Result page to request
    #[serde(default = "default_page")]
    #[validate(range(min = 1))]
    pub page: u32,

    /// API key, sent as `Authorization: Client-ID <key>`
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// JSON pointer to the result array
    #[serde(default = "default_results_pointer")]
    pub results_pointer: String,

    /// JSON pointer (relative to one result) to the download URL
    #[serde(default = "default_url_pointer")]
    pub url_pointer: String,

    /// Download at most this many results per query
    #[serde(default)]
    pub max_results: Option<usize>,
}

fn default_page() -> u32 {
    1
}

fn default_results_pointer() -> String {
    "/results".to_string()
}

fn default_url_pointer() -> String {
    "/urls/raw".to_string()
}

/// Artifact storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory artifacts are written into
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,

    /// File extension appended to artifact names
    #[serde(default = "default_extension")]
    pub extension: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            extension: default_extension(),
        }
    }
}

fn default_base_dir() -> PathBuf {
    PathBuf::from("images")
}

fn default_extension() -> String {
    "jpg".to_string()
}

/// Consumer configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ConsumerConfig {
    /// Consumer name
    #[validate(length(min = 1))]
    pub name: String,

    /// Consumer type
    pub kind: ConsumerKind,

    /// Queue capacity in front of the consumer
    #[serde(default = "default_queue_capacity")]
    #[validate(range(min = 1))]
    pub queue_capacity: usize,

    /// Type-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_queue_capacity() -> usize {
    100
}

/// Consumer type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumerKind {
    /// Log each artifact
    Log,
    /// Append each artifact to a JSON-lines manifest
    Manifest,
}

impl PipelineBlueprint {
    /// Minimal blueprint for a list of search queries
    pub fn for_queries(queries: &[&str], endpoint: impl Into<String>) -> Self {
        Self {
            version: ConfigVersion::V1,
            pipeline: PipelineSettings::default(),
            dedup: DedupConfig::default(),
            fetch: FetchConfig::default(),
            source: SourceConfig {
                queries: queries.iter().map(|q| q.to_string()).collect(),
                rounds: 1,
                ..Default::default()
            },
            search: Some(SearchConfig {
                endpoint: endpoint.into(),
                page: default_page(),
                api_key: None,
                results_pointer: default_results_pointer(),
                url_pointer: default_url_pointer(),
                max_results: None,
            }),
            storage: StorageConfig::default(),
            consumers: Vec::new(),
        }
    }

    /// Total number of items the source yields per round, if known up front
    pub fn source_len(&self) -> u64 {
        if !self.source.queries.is_empty() {
            return self.source.queries.len() as u64;
        }
        if !self.source.urls.is_empty() {
            return self.source.urls.len() as u64;
        }
        self.source.template.as_ref().map(|t| t.count).unwrap_or(0)
    }
}
