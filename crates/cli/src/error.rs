//! Error types for CLI operations.

use contracts::ContractError;
use thiserror::Error;

/// Exit status for a run stopped by SIGINT or SIGTERM
pub const EXIT_INTERRUPTED: u8 = 130;
/// Exit status for a missing, unreadable or invalid configuration
pub const EXIT_CONFIG: u8 = 2;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Command line overrides produced an invalid configuration
    #[error("Configuration invalid after command line overrides: {message}")]
    InvalidOverride { message: String },

    /// The run ended without any completed worker
    #[error("Pipeline produced no result: {message}")]
    PipelineExecution { message: String },

    /// A shutdown signal stopped the run before the source was exhausted
    #[error("Pipeline interrupted: {stored} artifacts stored, {abandoned} items abandoned")]
    Interrupted { stored: u64, abandoned: u64 },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn invalid_override(message: impl Into<String>) -> Self {
        Self::InvalidOverride {
            message: message.into(),
        }
    }

    pub fn pipeline_execution(message: impl Into<String>) -> Self {
        Self::PipelineExecution {
            message: message.into(),
        }
    }

    pub fn interrupted(stored: u64, abandoned: u64) -> Self {
        Self::Interrupted { stored, abandoned }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Self::ConfigNotFound { .. } | Self::InvalidOverride { .. } => EXIT_CONFIG,
            Self::PipelineExecution { .. } => 1,
            Self::Interrupted { .. } => EXIT_INTERRUPTED,
        }
    }
}

/// Process exit status for a failed command
pub fn exit_code(err: &anyhow::Error) -> u8 {
    if let Some(cli) = err.downcast_ref::<CliError>() {
        return cli.exit_code();
    }
    match err.downcast_ref::<ContractError>() {
        Some(ContractError::ConfigParse { .. } | ContractError::ConfigValidation { .. }) => {
            EXIT_CONFIG
        }
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_exit_codes() {
        let interrupted = anyhow::Error::from(CliError::interrupted(12, 30));
        assert_eq!(exit_code(&interrupted), EXIT_INTERRUPTED);
        assert_eq!(
            interrupted.to_string(),
            "Pipeline interrupted: 12 artifacts stored, 30 items abandoned"
        );

        let missing = anyhow::Error::from(CliError::config_not_found("fetchpipe.toml"));
        assert_eq!(exit_code(&missing), EXIT_CONFIG);

        let idle = anyhow::Error::from(CliError::pipeline_execution("no worker"));
        assert_eq!(exit_code(&idle), 1);
    }

    #[test]
    fn test_config_errors_behind_context() {
        let invalid: Result<(), _> = Err(ContractError::config_validation(
            "pipeline.workers",
            "must be greater than 0",
        ));
        let err = invalid.context("Failed to load config from fetchpipe.toml").unwrap_err();
        assert_eq!(exit_code(&err), EXIT_CONFIG);

        let other = anyhow::anyhow!("connection refused");
        assert_eq!(exit_code(&other), 1);
    }
}
