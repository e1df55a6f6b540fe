//! ArtifactStore trait - storage capability
//!
//! The worker calls `store` for every fetched resource; the medium behind it
//! is up to the implementation.

use crate::{ArtifactHandle, ContractError, Resource};

/// Artifact storage trait
///
/// Implementations are shared by every worker of a stage, so `store` takes
/// `&self`. Storing the same resource twice must yield the same handle.
#[trait_variant::make(ArtifactStore: Send)]
pub trait LocalArtifactStore {
    /// Persist a fetched resource
    ///
    /// # Errors
    /// `StorageWrite` when the medium rejects the write
    async fn store(&self, resource: &Resource) -> Result<ArtifactHandle, ContractError>;
}
