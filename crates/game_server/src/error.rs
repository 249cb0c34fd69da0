//! Error types for the game server.

use thiserror::Error;

/// Failures surfaced while starting, running or stopping the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Socket creation, binding or accept failures.
    #[error("Network error: {0}")]
    Network(String),
    /// Rejected configuration values.
    #[error("Configuration error: {0}")]
    Config(String),
    /// Background task failures.
    #[error("Internal error: {0}")]
    Internal(String),
    /// Tasks did not finish within the shutdown grace period.
    #[error("Shutdown did not complete within {0:?}")]
    ShutdownTimeout(std::time::Duration),
}

impl From<vanilla_pump::PolicyError> for ServerError {
    fn from(err: vanilla_pump::PolicyError) -> Self {
        ServerError::Config(err.to_string())
    }
}
