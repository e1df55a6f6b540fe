//! ManifestConsumer - appends one JSON line per artifact

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use contracts::{ArtifactConsumer, ArtifactHandle, ContractError};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

/// One manifest line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub identity: String,
    pub path: PathBuf,
    pub size: u64,
    /// RFC 3339 time the artifact reached the consumer
    pub consumed_at: String,
}

/// Consumer that records every artifact in a JSON-lines file
///
/// Params:
/// - `path`: manifest file (default `./manifest.jsonl`)
/// - `append`: `true` to keep existing lines (default truncates)
pub struct ManifestConsumer {
    name: String,
    path: PathBuf,
    writer: BufWriter<File>,
}

impl ManifestConsumer {
    /// Open (or create) the manifest at `path`
    pub fn new(
        name: impl Into<String>,
        path: impl AsRef<Path>,
        append: bool,
    ) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(&path)?;

        Ok(Self {
            name: name.into(),
            path,
            writer: BufWriter::new(file),
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        let path = params
            .get("path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./manifest.jsonl"));
        let append = params.get("append").is_some_and(|v| v == "true");
        Self::new(name, path, append)
    }

    /// Manifest file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append_entry(&mut self, artifact: &ArtifactHandle) -> std::io::Result<()> {
        let entry = ManifestEntry {
            identity: artifact.identity.clone(),
            path: artifact.path.clone(),
            size: artifact.size,
            consumed_at: Utc::now().to_rfc3339(),
        };
        serde_json::to_writer(&mut self.writer, &entry)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        self.writer.write_all(b"\n")
    }

    fn write_failed(&self, e: std::io::Error) -> ContractError {
        error!(consumer = %self.name, path = %self.path.display(), error = %e, "Write failed");
        ContractError::consumer_write(&self.name, e.to_string())
    }
}

impl ArtifactConsumer for ManifestConsumer {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "manifest_consumer_consume",
        skip(self, artifact),
        fields(consumer = %self.name, identity = %artifact.identity)
    )]
    async fn consume(&mut self, artifact: &ArtifactHandle) -> Result<(), ContractError> {
        self.append_entry(artifact).map_err(|e| self.write_failed(e))
    }

    #[instrument(name = "manifest_consumer_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        self.writer.flush().map_err(|e| self.write_failed(e))
    }

    #[instrument(name = "manifest_consumer_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.writer.flush().map_err(|e| self.write_failed(e))?;
        debug!(consumer = %self.name, path = %self.path.display(), "ManifestConsumer closed");
        Ok(())
    }
}
