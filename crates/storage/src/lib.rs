//! Storage Layer
//!
//! Service, service state and alert records behind the [`Repository`] trait,
//! with an in-memory implementation and a SQLite implementation.

mod memory;
mod model;
mod repository;
mod sqlite;

pub use memory::MemoryRepository;
pub use model::{
    Alert, NewAlert, PendingAlert, Service, ServiceKey, ServiceState, StateValue,
    UncheckedState, CHANNEL_SERVICE, CHANNEL_SERVICE_STATE,
};
pub use repository::{ChangeSet, Repository};
pub use sqlite::SqliteRepository;

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StorageError::NotFound("row".to_string()),
            other => StorageError::DatabaseError(other.to_string()),
        }
    }
}
