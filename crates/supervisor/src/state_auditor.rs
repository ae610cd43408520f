//! State transition detection

use std::sync::Arc;
use storage::{ChangeSet, NewAlert, Repository, StateValue};
use tracing::debug;

use crate::error::Result;

/// Turns newly recorded service states into "changed" and "unk" alerts
pub struct StateAuditor {
    repository: Arc<dyn Repository>,
}

impl StateAuditor {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    /// Check every unchecked state record, oldest first.
    ///
    /// A service's first record is compared against an implicit `OK`
    /// baseline and never raises "unk". All records are marked checked and
    /// committed together with the alerts. Returns the number of alerts
    /// created.
    pub async fn check_new_states(&self) -> Result<usize> {
        let unchecked = self.repository.unchecked_states().await?;
        let mut changes = ChangeSet::new();

        for entry in &unchecked {
            let s = &entry.state;
            debug!(
                "Checking service {} state #{}: {}",
                entry.service, s.id, s.state
            );

            let baseline = entry.prev_state.unwrap_or(StateValue::Ok);
            if s.state != baseline {
                changes
                    .new_alerts
                    .push(NewAlert::state_changed(s, entry.prev_state, s.state));
            }
            if s.state == StateValue::Unk && entry.prev_state.is_some() {
                changes.new_alerts.push(NewAlert::state_unknown(s));
            }

            changes.checked_states.push(s.id);
        }

        let new_alerts = changes.new_alerts.len();
        if !changes.is_empty() {
            self.repository.commit(changes).await?;
        }
        Ok(new_alerts)
    }
}
