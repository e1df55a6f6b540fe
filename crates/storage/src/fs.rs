//! FsArtifactStore - writes resources into one directory

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use contracts::{ArtifactHandle, ArtifactStore, ContractError, Resource, StorageConfig};
use tracing::{debug, error, instrument};

use crate::naming::artifact_file_name;

/// Store that writes every resource to `base_dir/<identity-derived name>`.
///
/// Writes go to a temporary file that is renamed into place, so concurrent
/// stores of the same identity never leave a torn file behind.
#[derive(Debug)]
pub struct FsArtifactStore {
    base_dir: PathBuf,
    extension: String,
    next_tmp: AtomicU64,
}

impl FsArtifactStore {
    /// Create the store, creating `base_dir` if needed
    pub fn new(config: &StorageConfig) -> Result<Self, ContractError> {
        std::fs::create_dir_all(&config.base_dir).map_err(|e| {
            ContractError::startup(
                "storage",
                format!("cannot create '{}': {e}", config.base_dir.display()),
            )
        })?;

        Ok(Self {
            base_dir: config.base_dir.clone(),
            extension: config.extension.clone(),
            next_tmp: AtomicU64::new(0),
        })
    }

    /// Directory artifacts are written to
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Where the resource with `identity` is (or would be) stored
    pub fn path_for(&self, identity: &str) -> PathBuf {
        self.base_dir
            .join(artifact_file_name(identity, &self.extension))
    }
}

impl ArtifactStore for FsArtifactStore {
    #[instrument(
        name = "artifact_store",
        skip(self, resource),
        fields(identity = %resource.identity, size = resource.content.len())
    )]
    async fn store(&self, resource: &Resource) -> Result<ArtifactHandle, ContractError> {
        let path = self.path_for(&resource.identity);
        let tmp = self.base_dir.join(format!(
            ".{}.{}.part",
            artifact_file_name(&resource.identity, ""),
            self.next_tmp.fetch_add(1, Ordering::Relaxed)
        ));

        let write = async {
            tokio::fs::write(&tmp, &resource.content).await?;
            tokio::fs::rename(&tmp, &path).await
        };

        if let Err(e) = write.await {
            error!(path = %path.display(), error = %e, "Write failed");
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(ContractError::storage_write(&resource.identity, e.to_string()));
        }

        debug!(path = %path.display(), "artifact stored");

        Ok(ArtifactHandle {
            path,
            identity: resource.identity.clone(),
            size: resource.content.len() as u64,
        })
    }
}
