//! Supervisor error types

use storage::StorageError;
use thiserror::Error;

/// Errors that abort a supervision cycle or startup
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// Query or commit failed inside a phase
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Cycle task panicked or was cancelled
    #[error("Cycle task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, SupervisorError>;
