//! Test doubles shared by the component tests

use alerting::{AlertSink, AlertsConfig, DeliveryOutcome};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use storage::{
    ChangeSet, MemoryRepository, PendingAlert, Repository, Service, StorageError, UncheckedState,
};

/// Sink that records messages and fails those containing `fail_marker`
#[derive(Default)]
pub struct RecordingSink {
    pub messages: Mutex<Vec<String>>,
    pub fail_marker: Option<String>,
}

impl RecordingSink {
    pub fn failing_on(marker: &str) -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            fail_marker: Some(marker.to_string()),
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertSink for RecordingSink {
    async fn deliver(&self, _config: &AlertsConfig, message: &str) -> DeliveryOutcome {
        self.messages.lock().unwrap().push(message.to_string());
        match &self.fail_marker {
            Some(marker) if message.contains(marker.as_str()) => DeliveryOutcome::Failed {
                reason: "simulated transport failure".to_string(),
            },
            _ => DeliveryOutcome::Delivered,
        }
    }
}

/// Memory repository whose timeout query can be switched to fail
pub struct FlakyRepository {
    pub inner: Arc<MemoryRepository>,
    pub fail_timeouts: AtomicBool,
}

impl FlakyRepository {
    pub fn new(inner: Arc<MemoryRepository>) -> Self {
        Self {
            inner,
            fail_timeouts: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl Repository for FlakyRepository {
    async fn unchecked_states(&self) -> Result<Vec<UncheckedState>, StorageError> {
        self.inner.unchecked_states().await
    }

    async fn timeout_candidates(&self) -> Result<Vec<Service>, StorageError> {
        if self.fail_timeouts.load(Ordering::SeqCst) {
            return Err(StorageError::DatabaseError("connection reset".to_string()));
        }
        self.inner.timeout_candidates().await
    }

    async fn pending_alerts(&self) -> Result<Vec<PendingAlert>, StorageError> {
        self.inner.pending_alerts().await
    }

    async fn commit(&self, changes: ChangeSet) -> Result<(), StorageError> {
        self.inner.commit(changes).await
    }
}
