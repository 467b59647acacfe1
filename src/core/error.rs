//! Error types for the simulator.

use thiserror::Error;

/// Errors produced while building or running a simulation.
#[derive(Debug, Error)]
pub enum SimError {
    /// Configuration rejected during validation.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// Message transport failed in a way that is not "no message available".
    #[error("transport failure: {0}")]
    Transport(String),
    /// Log file or report I/O failed.
    #[error("log i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
