//! ArtifactConsumer trait - final stage output interface
//!
//! Defines the abstract interface for whatever acts on stored artifacts.

use crate::{ArtifactHandle, ContractError};

/// Artifact consumer trait
///
/// All consumer implementations must implement this trait.
#[trait_variant::make(ArtifactConsumer: Send)]
pub trait LocalArtifactConsumer {
    /// Consumer name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Accept one stored artifact
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn consume(&mut self, artifact: &ArtifactHandle) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close consumer
    async fn close(&mut self) -> Result<(), ContractError>;
}
