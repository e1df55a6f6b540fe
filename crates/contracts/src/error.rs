//! Layered error definitions
//!
//! Categorized by source: config / fetch / worker / pipeline / storage / consumer

use thiserror::Error;

use crate::FailureKind;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Fetch Errors =====
    /// Network/HTTP failure on one item
    #[error("fetch of '{item}' failed (status {status:?}): {message}")]
    TransientFetch {
        item: String,
        status: Option<u16>,
        message: String,
    },

    /// Fetch did not complete within the caller-specified timeout
    #[error("fetch of '{item}' timed out after {timeout_ms}ms")]
    Timeout { item: String, timeout_ms: u64 },

    /// Fetched content could not be parsed
    #[error("malformed content for '{item}': {message}")]
    MalformedItem { item: String, message: String },

    // ===== Worker / Pipeline Errors =====
    /// Unrecoverable error escaping a worker loop
    #[error("worker fatal error: {message}")]
    WorkerFatal { message: String },

    /// A stage could not launch any workers
    #[error("pipeline startup failed at stage '{stage}': {message}")]
    PipelineStartup { stage: String, message: String },

    /// Queue was closed while a value was being written
    #[error("queue '{queue}' is closed")]
    QueueClosed { queue: String },

    // ===== Storage Errors =====
    /// Artifact write error
    #[error("failed to store '{identity}': {message}")]
    StorageWrite { identity: String, message: String },

    // ===== Consumer Errors =====
    /// Consumer write error
    #[error("consumer '{consumer}' write error: {message}")]
    ConsumerWrite { consumer: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create transient fetch error
    pub fn transient(
        item: impl Into<String>,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        Self::TransientFetch {
            item: item.into(),
            status,
            message: message.into(),
        }
    }

    /// Create malformed item error
    pub fn malformed(item: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedItem {
            item: item.into(),
            message: message.into(),
        }
    }

    /// Create worker fatal error
    pub fn worker_fatal(message: impl Into<String>) -> Self {
        Self::WorkerFatal {
            message: message.into(),
        }
    }

    /// Create pipeline startup error
    pub fn startup(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PipelineStartup {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Create storage write error
    pub fn storage_write(identity: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StorageWrite {
            identity: identity.into(),
            message: message.into(),
        }
    }

    /// Create consumer write error
    pub fn consumer_write(consumer: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConsumerWrite {
            consumer: consumer.into(),
            message: message.into(),
        }
    }

    /// Whether another attempt at the same fetch may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::TransientFetch { status, .. } => match status {
                // 4xx other than 408/429 will not change on retry
                Some(code) => !(400..500).contains(code) || *code == 408 || *code == 429,
                None => true,
            },
            Self::Timeout { .. } => true,
            _ => false,
        }
    }

    /// Whether this error must terminate the worker that hit it
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::WorkerFatal { .. } | Self::QueueClosed { .. })
    }

    /// Failure class used when this error is recorded as a `FetchResult`
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::MalformedItem { .. } | Self::StorageWrite { .. } | Self::ConfigParse { .. } => {
                FailureKind::Malformed
            }
            _ => FailureKind::Transient,
        }
    }
}
