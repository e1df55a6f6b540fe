//! Dispatcher error types

use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Consumer creation error
    #[error("failed to create consumer '{name}': {message}")]
    ConsumerCreation { name: String, message: String },

    /// Consumer error (from contract)
    #[error("consumer error: {0}")]
    Contract(#[from] contracts::ContractError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DispatcherError {
    /// Create a consumer creation error
    pub fn consumer_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConsumerCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}
