//! LogConsumer - logs every stored artifact via tracing

use contracts::{ArtifactConsumer, ArtifactHandle, ContractError};
use tracing::{info, instrument};

/// Consumer that logs artifact summaries
pub struct LogConsumer {
    name: String,
    seen: u64,
    bytes: u64,
}

impl LogConsumer {
    /// Create a new LogConsumer with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            seen: 0,
            bytes: 0,
        }
    }
}

impl ArtifactConsumer for LogConsumer {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_consumer_consume",
        skip(self, artifact),
        fields(consumer = %self.name)
    )]
    async fn consume(&mut self, artifact: &ArtifactHandle) -> Result<(), ContractError> {
        self.seen += 1;
        self.bytes += artifact.size;
        info!(
            consumer = %self.name,
            path = %artifact.path.display(),
            identity = %artifact.identity,
            size = artifact.size,
            "Image successfully downloaded"
        );
        Ok(())
    }

    #[instrument(name = "log_consumer_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        // Nothing to flush for log consumer
        Ok(())
    }

    #[instrument(name = "log_consumer_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(
            consumer = %self.name,
            artifacts = self.seen,
            bytes = self.bytes,
            "LogConsumer closed"
        );
        Ok(())
    }
}
