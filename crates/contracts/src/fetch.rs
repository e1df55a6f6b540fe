//! Fetch data model - what a fetch worker produces
//!
//! `Resource` is raw fetched content, `ArtifactHandle` is the stored form,
//! `FetchResult` is what flows into the outbound stage queue.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::ContractError;

/// Index of a worker inside its stage (0-based)
pub type WorkerId = usize;

/// A fetched resource, before it is stored
#[derive(Debug, Clone)]
pub struct Resource {
    /// Stable identity of the resource (usually its URL)
    pub identity: String,

    /// Raw content (zero-copy)
    pub content: Bytes,

    /// Content type reported by the server, if any
    pub content_type: Option<String>,
}

impl Resource {
    /// Create a resource without content type information
    pub fn new(identity: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            identity: identity.into(),
            content: content.into(),
            content_type: None,
        }
    }
}

/// Everything a single fetch of one work item yielded.
///
/// A query can fan out to many resources, some of which may fail on their own
/// without failing the whole item.
#[derive(Debug, Default)]
pub struct FetchBatch {
    /// Successfully fetched resources
    pub resources: Vec<Resource>,

    /// Per-resource failures (the item itself was resolved)
    pub failures: Vec<ContractError>,
}

impl FetchBatch {
    /// Batch holding exactly one resource
    pub fn single(resource: Resource) -> Self {
        Self {
            resources: vec![resource],
            failures: Vec::new(),
        }
    }

    /// Total outcomes in this batch
    pub fn len(&self) -> usize {
        self.resources.len() + self.failures.len()
    }

    /// True when the item resolved to nothing at all
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle to a stored artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactHandle {
    /// Where the artifact was written
    pub path: PathBuf,

    /// Identity of the resource the artifact came from
    pub identity: String,

    /// Size in bytes
    pub size: u64,
}

/// Failure classes that can be recorded per item
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Network/HTTP failure (possibly after retries)
    Transient,
    /// Content could not be parsed or stored
    Malformed,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => write!(f, "transient"),
            Self::Malformed => write!(f, "malformed"),
        }
    }
}

/// Failure marker carried downstream in place of an artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchFailure {
    /// The work item (or resource) that failed, rendered for reporting
    pub item: String,

    /// Failure class
    pub kind: FailureKind,

    /// Human readable cause
    pub message: String,
}

impl FetchFailure {
    /// Build a failure record from an error
    pub fn from_error(item: impl Into<String>, error: &ContractError) -> Self {
        Self {
            item: item.into(),
            kind: error.failure_kind(),
            message: error.to_string(),
        }
    }
}

/// Outcome of processing one resource of one work item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    /// Resource fetched and stored
    Stored(ArtifactHandle),
    /// Fetch or store failed
    Failed(FetchFailure),
}

impl FetchResult {
    /// Check if this result carries an artifact
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Stored(_))
    }

    /// Stored artifact, if any
    pub fn artifact(&self) -> Option<&ArtifactHandle> {
        match self {
            Self::Stored(handle) => Some(handle),
            Self::Failed(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_len_counts_failures() {
        let mut batch = FetchBatch::single(Resource::new("https://x/a", "data"));
        assert_eq!(batch.len(), 1);
        batch
            .failures
            .push(ContractError::transient("https://x/b", Some(500), "boom"));
        assert_eq!(batch.len(), 2);
        assert!(!batch.is_empty());
        assert!(FetchBatch::default().is_empty());
    }

    #[test]
    fn test_failure_kind_from_error() {
        let err = ContractError::malformed("colombo", "bad json");
        let failure = FetchFailure::from_error("colombo", &err);
        assert_eq!(failure.kind, FailureKind::Malformed);
        assert!(failure.message.contains("bad json"));
    }
}
