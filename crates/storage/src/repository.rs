//! Repository interface used by the supervisor

use async_trait::async_trait;

use crate::model::{NewAlert, PendingAlert, Service, UncheckedState};
use crate::StorageError;

/// Mutations produced by one supervisor phase, applied in a single transaction
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    /// Alerts to create
    pub new_alerts: Vec<NewAlert>,
    /// State record ids to mark `checked`
    pub checked_states: Vec<i64>,
    /// `(service_id, timed_out)` flag updates
    pub timed_out: Vec<(i64, bool)>,
    /// Alert ids to mark `reported`
    pub reported_alerts: Vec<i64>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.new_alerts.is_empty()
            && self.checked_states.is_empty()
            && self.timed_out.is_empty()
            && self.reported_alerts.is_empty()
    }
}

/// Queries and commits needed by one supervision cycle
#[async_trait]
pub trait Repository: Send + Sync {
    /// All state records with `checked = false`, oldest first
    async fn unchecked_states(&self) -> Result<Vec<UncheckedState>, StorageError>;

    /// All services with a reporting period and a known current state
    async fn timeout_candidates(&self) -> Result<Vec<Service>, StorageError>;

    /// All alerts with `reported = false`
    async fn pending_alerts(&self) -> Result<Vec<PendingAlert>, StorageError>;

    /// Apply every change in `changes` atomically
    async fn commit(&self, changes: ChangeSet) -> Result<(), StorageError>;
}
