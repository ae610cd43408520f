//! In-memory repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::model::{
    Alert, PendingAlert, Service, ServiceKey, ServiceState, StateValue, UncheckedState,
};
use crate::repository::{ChangeSet, Repository};
use crate::StorageError;

#[derive(Debug, Default)]
struct Tables {
    services: BTreeMap<i64, Service>,
    states: BTreeMap<i64, ServiceState>,
    alerts: BTreeMap<i64, Alert>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn service(&self, id: i64) -> Result<&Service, StorageError> {
        self.services
            .get(&id)
            .ok_or_else(|| StorageError::NotFound(format!("service #{}", id)))
    }
}

/// Repository keeping all records in memory.
///
/// Ids are allocated from one counter shared by all tables, so creation
/// order is the id order.
pub struct MemoryRepository {
    tables: Mutex<Tables>,
}

impl MemoryRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        info!("Creating in-memory repository");
        Self {
            tables: Mutex::new(Tables::default()),
        }
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StorageError> {
        self.tables
            .lock()
            .map_err(|e| StorageError::DatabaseError(format!("Lock error: {}", e)))
    }

    /// Register a service
    pub fn add_service(
        &self,
        server: &str,
        name: &str,
        period: Option<i64>,
    ) -> Result<i64, StorageError> {
        let mut tables = self.tables()?;
        let id = tables.next_id();
        tables.services.insert(
            id,
            Service {
                id,
                key: ServiceKey {
                    server: server.to_string(),
                    name: name.to_string(),
                },
                period,
                state_id: None,
                timed_out: false,
                last_seen: None,
            },
        );
        debug!("Added service #{} {}:{}", id, server, name);
        Ok(id)
    }

    /// Record a new observation, linking it to the service's current state
    pub fn record_state(
        &self,
        service_id: i64,
        state: StateValue,
        info: Option<&str>,
        rtime: DateTime<Utc>,
    ) -> Result<i64, StorageError> {
        let mut tables = self.tables()?;
        let prev_id = tables.service(service_id)?.state_id;
        let id = tables.next_id();
        tables.states.insert(
            id,
            ServiceState {
                id,
                service_id,
                rtime,
                state,
                info: info.map(str::to_string),
                checked: false,
                prev_id,
            },
        );
        if let Some(service) = tables.services.get_mut(&service_id) {
            service.state_id = Some(id);
            service.last_seen = Some(rtime);
        }
        Ok(id)
    }

    pub fn service(&self, id: i64) -> Result<Service, StorageError> {
        self.tables()?.service(id).cloned()
    }

    pub fn state(&self, id: i64) -> Result<ServiceState, StorageError> {
        self.tables()?
            .states
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("service state #{}", id)))
    }

    /// All alerts in creation order
    pub fn alerts(&self) -> Result<Vec<Alert>, StorageError> {
        Ok(self.tables()?.alerts.values().cloned().collect())
    }
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn unchecked_states(&self) -> Result<Vec<UncheckedState>, StorageError> {
        let tables = self.tables()?;
        tables
            .states
            .values()
            .filter(|s| !s.checked)
            .map(|s| {
                let service = tables.service(s.service_id)?;
                let prev_state = s
                    .prev_id
                    .and_then(|id| tables.states.get(&id))
                    .map(|p| p.state);
                Ok(UncheckedState {
                    state: s.clone(),
                    service: service.key.clone(),
                    prev_state,
                })
            })
            .collect()
    }

    async fn timeout_candidates(&self) -> Result<Vec<Service>, StorageError> {
        let tables = self.tables()?;
        Ok(tables
            .services
            .values()
            .filter(|s| s.period.is_some() && s.state_id.is_some() && s.last_seen.is_some())
            .cloned()
            .collect())
    }

    async fn pending_alerts(&self) -> Result<Vec<PendingAlert>, StorageError> {
        let tables = self.tables()?;
        tables
            .alerts
            .values()
            .filter(|a| !a.reported)
            .map(|a| {
                let service = tables.service(a.service_id)?;
                let current_state = service
                    .state_id
                    .and_then(|id| tables.states.get(&id))
                    .map(|s| (s.state, s.info.clone()));
                Ok(PendingAlert {
                    alert: a.clone(),
                    service: service.key.clone(),
                    current_state,
                })
            })
            .collect()
    }

    async fn commit(&self, changes: ChangeSet) -> Result<(), StorageError> {
        let mut tables = self.tables()?;

        // Validate everything first so a failing commit leaves no trace
        for alert in &changes.new_alerts {
            tables.service(alert.service_id)?;
        }
        for id in &changes.checked_states {
            if !tables.states.contains_key(id) {
                return Err(StorageError::NotFound(format!("service state #{}", id)));
            }
        }
        for (id, _) in &changes.timed_out {
            tables.service(*id)?;
        }
        for id in &changes.reported_alerts {
            if !tables.alerts.contains_key(id) {
                return Err(StorageError::NotFound(format!("alert #{}", id)));
            }
        }

        let now = Utc::now();
        for new_alert in changes.new_alerts {
            let id = tables.next_id();
            tables.alerts.insert(
                id,
                Alert {
                    id,
                    service_id: new_alert.service_id,
                    service_state_id: new_alert.service_state_id,
                    ctime: now,
                    channel: new_alert.channel.to_string(),
                    event: new_alert.event.to_string(),
                    message: new_alert.message,
                    reported: false,
                },
            );
        }
        for id in changes.checked_states {
            if let Some(state) = tables.states.get_mut(&id) {
                state.checked = true;
            }
        }
        for (id, timed_out) in changes.timed_out {
            if let Some(service) = tables.services.get_mut(&id) {
                service.timed_out = timed_out;
            }
        }
        for id in changes.reported_alerts {
            if let Some(alert) = tables.alerts.get_mut(&id) {
                alert.reported = true;
            }
        }
        Ok(())
    }
}
