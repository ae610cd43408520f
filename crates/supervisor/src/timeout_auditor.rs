//! Liveness timeout detection

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use storage::{ChangeSet, NewAlert, Repository, Service};
use tracing::debug;

use crate::error::Result;

/// Flags services that stopped reporting within their period, and clears
/// the flag when they come back
pub struct TimeoutAuditor {
    repository: Arc<dyn Repository>,
}

impl TimeoutAuditor {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    /// Check timeouts against the wall clock
    pub async fn check_timeouts(&self) -> Result<usize> {
        self.check_timeouts_at(Utc::now()).await
    }

    /// Recompute `timed_out` for every service with a period and a state.
    ///
    /// Only edges produce alerts: "offline" when a service becomes timed out,
    /// "online" when it recovers. Returns the number of alerts created.
    pub async fn check_timeouts_at(&self, now: DateTime<Utc>) -> Result<usize> {
        let services = self.repository.timeout_candidates().await?;
        let mut changes = ChangeSet::new();

        for service in &services {
            let Some((timed_out, seen_ago)) = evaluate(service, now) else {
                continue;
            };
            debug!(
                "Checking service {}: timed_out={}, seen_ago={}",
                service.key,
                timed_out,
                format_elapsed(seen_ago)
            );

            if timed_out == service.timed_out {
                continue;
            }
            let alert = if timed_out {
                NewAlert::offline(service, &format_elapsed(seen_ago))
            } else {
                NewAlert::online(service)
            };
            changes.new_alerts.push(alert);
            changes.timed_out.push((service.id, timed_out));
        }

        let new_alerts = changes.new_alerts.len();
        if !changes.is_empty() {
            self.repository.commit(changes).await?;
        }
        Ok(new_alerts)
    }
}

/// Timed-out flag and elapsed time since last report, if the service can be judged
fn evaluate(service: &Service, now: DateTime<Utc>) -> Option<(bool, Duration)> {
    let period = Duration::seconds(service.period?);
    let seen_ago = now - service.last_seen?;
    Some((seen_ago > period, seen_ago))
}

/// Render whole seconds as `H:MM:SS`, with a leading day count when needed
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.num_seconds().max(0);
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;

    let clock = format!("{}:{:02}:{:02}", hours, minutes, seconds);
    match days {
        0 => clock,
        1 => format!("1 day, {}", clock),
        n => format!("{} days, {}", n, clock),
    }
}
