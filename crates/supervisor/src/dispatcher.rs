//! Pending alert delivery

use alerting::{AlertSink, AlertsConfig, DeliveryOutcome};
use std::sync::Arc;
use storage::{ChangeSet, PendingAlert, Repository};
use tracing::{debug, warn};

use crate::error::Result;

/// Hands unreported alerts to the sink and marks them reported.
///
/// Each alert gets exactly one delivery attempt. It is marked reported
/// whatever the sink's outcome, so a broken transport drops alerts instead
/// of re-sending them every cycle.
pub struct AlertDispatcher {
    repository: Arc<dyn Repository>,
    sink: Arc<dyn AlertSink>,
    config: AlertsConfig,
}

impl AlertDispatcher {
    pub fn new(
        repository: Arc<dyn Repository>,
        sink: Arc<dyn AlertSink>,
        config: AlertsConfig,
    ) -> Self {
        Self {
            repository,
            sink,
            config,
        }
    }

    /// Deliver every pending alert; returns how many were processed
    pub async fn send_pending(&self) -> Result<usize> {
        let pending = self.repository.pending_alerts().await?;
        let mut changes = ChangeSet::new();

        for p in &pending {
            debug!(
                "Sending alert #{}: service={}, [{}/{}]",
                p.alert.id, p.service, p.alert.channel, p.alert.event
            );

            let message = render_message(p);
            if let DeliveryOutcome::Failed { reason } =
                self.sink.deliver(&self.config, &message).await
            {
                warn!(
                    "Alert #{} was not delivered ({}), marking it reported anyway",
                    p.alert.id, reason
                );
            }
            changes.reported_alerts.push(p.alert.id);
        }

        if !changes.is_empty() {
            self.repository.commit(changes).await?;
        }
        Ok(pending.len())
    }
}

/// Alert identity line, plus the service's current state when known
pub fn render_message(pending: &PendingAlert) -> String {
    let mut message = format!("{}\n", pending);
    if let Some((state, info)) = &pending.current_state {
        message.push_str(&format!(
            "Current: {}: {}\n",
            state,
            info.as_deref().unwrap_or("")
        ));
    }
    message
}
