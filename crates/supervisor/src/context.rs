//! Explicit execution context for a supervision cycle

use alerting::{AlertSink, AlertsConfig};
use std::sync::Arc;
use storage::Repository;

/// Everything a cycle needs from the outside world
#[derive(Clone)]
pub struct SupervisorContext {
    pub repository: Arc<dyn Repository>,
    pub sink: Arc<dyn AlertSink>,
    /// Delivery configuration handed to the sink with every message
    pub alerts: AlertsConfig,
}

impl SupervisorContext {
    pub fn new(
        repository: Arc<dyn Repository>,
        sink: Arc<dyn AlertSink>,
        alerts: AlertsConfig,
    ) -> Self {
        Self {
            repository,
            sink,
            alerts,
        }
    }
}
