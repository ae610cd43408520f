//! Record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::StorageError;

/// Channel for alerts about a service as a whole (liveness)
pub const CHANNEL_SERVICE: &str = "service";
/// Channel for alerts about a service's reported state
pub const CHANNEL_SERVICE_STATE: &str = "service:state";

/// Reported health of a service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StateValue {
    Ok,
    Warn,
    Err,
    Unk,
}

impl StateValue {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateValue::Ok => "OK",
            StateValue::Warn => "WARN",
            StateValue::Err => "ERR",
            StateValue::Unk => "UNK",
        }
    }
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StateValue {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, StorageError> {
        match s {
            "OK" => Ok(StateValue::Ok),
            "WARN" => Ok(StateValue::Warn),
            "ERR" => Ok(StateValue::Err),
            "UNK" => Ok(StateValue::Unk),
            other => Err(StorageError::InvalidData(format!(
                "unknown service state {:?}",
                other
            ))),
        }
    }
}

/// Server and name identifying a service
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceKey {
    pub server: String,
    pub name: String,
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.server, self.name)
    }
}

/// A monitored service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: i64,
    pub key: ServiceKey,
    /// Expected reporting period in seconds
    pub period: Option<i64>,
    /// Current state record
    pub state_id: Option<i64>,
    pub timed_out: bool,
    /// Time of the most recent state report
    pub last_seen: Option<DateTime<Utc>>,
}

/// One health observation of a service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceState {
    pub id: i64,
    pub service_id: i64,
    pub rtime: DateTime<Utc>,
    pub state: StateValue,
    pub info: Option<String>,
    pub checked: bool,
    /// Preceding record for the same service
    pub prev_id: Option<i64>,
}

/// A stored alert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,
    pub service_id: i64,
    pub service_state_id: Option<i64>,
    pub ctime: DateTime<Utc>,
    pub channel: String,
    pub event: String,
    pub message: String,
    pub reported: bool,
}

/// An alert about to be created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAlert {
    pub service_id: i64,
    pub service_state_id: Option<i64>,
    pub channel: &'static str,
    pub event: &'static str,
    pub message: String,
}

impl NewAlert {
    /// State differs from its baseline; `from` is `None` for a service's first record
    pub fn state_changed(state: &ServiceState, from: Option<StateValue>, to: StateValue) -> Self {
        let from = from.map_or("(?)", |s| s.as_str());
        Self {
            service_id: state.service_id,
            service_state_id: Some(state.id),
            channel: CHANNEL_SERVICE_STATE,
            event: "changed",
            message: format!("State changed: \"{}\" -> \"{}\"", from, to),
        }
    }

    pub fn state_unknown(state: &ServiceState) -> Self {
        Self {
            service_id: state.service_id,
            service_state_id: Some(state.id),
            channel: CHANNEL_SERVICE_STATE,
            event: "unk",
            message: "Service state unknown!".to_string(),
        }
    }

    /// Service stopped reporting; `seen_ago` is already formatted
    pub fn offline(service: &Service, seen_ago: &str) -> Self {
        Self {
            service_id: service.id,
            service_state_id: None,
            channel: CHANNEL_SERVICE,
            event: "offline",
            message: format!("Service offline: last seen {} ago", seen_ago),
        }
    }

    pub fn online(service: &Service) -> Self {
        Self {
            service_id: service.id,
            service_state_id: None,
            channel: CHANNEL_SERVICE,
            event: "online",
            message: "Service back online".to_string(),
        }
    }
}

/// Unchecked state record joined with its service and predecessor
#[derive(Debug, Clone)]
pub struct UncheckedState {
    pub state: ServiceState,
    pub service: ServiceKey,
    /// State value of `state.prev_id`, if there is one
    pub prev_state: Option<StateValue>,
}

/// Unreported alert joined with its service and the service's current state
#[derive(Debug, Clone)]
pub struct PendingAlert {
    pub alert: Alert,
    pub service: ServiceKey,
    pub current_state: Option<(StateValue, Option<String>)>,
}

impl fmt::Display for PendingAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}/{}]: {}",
            self.service, self.alert.channel, self.alert.event, self.alert.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(id: i64, value: StateValue) -> ServiceState {
        ServiceState {
            id,
            service_id: 7,
            rtime: Utc::now(),
            state: value,
            info: None,
            checked: false,
            prev_id: None,
        }
    }

    #[test]
    fn test_state_value_parsing() {
        assert_eq!("WARN".parse::<StateValue>().unwrap(), StateValue::Warn);
        assert_eq!(StateValue::Unk.to_string(), "UNK");
        assert!(matches!(
            "FAIL".parse::<StateValue>(),
            Err(StorageError::InvalidData(_))
        ));
    }

    #[test]
    fn test_state_changed_message() {
        let s = state(3, StateValue::Err);
        let alert = NewAlert::state_changed(&s, Some(StateValue::Ok), StateValue::Err);
        assert_eq!(alert.message, "State changed: \"OK\" -> \"ERR\"");
        assert_eq!(alert.channel, CHANNEL_SERVICE_STATE);
        assert_eq!(alert.service_state_id, Some(3));

        let first = NewAlert::state_changed(&s, None, StateValue::Err);
        assert_eq!(first.message, "State changed: \"(?)\" -> \"ERR\"");
    }

    #[test]
    fn test_pending_alert_display() {
        let pending = PendingAlert {
            alert: Alert {
                id: 1,
                service_id: 7,
                service_state_id: None,
                ctime: Utc::now(),
                channel: CHANNEL_SERVICE.to_string(),
                event: "online".to_string(),
                message: "Service back online".to_string(),
                reported: false,
            },
            service: ServiceKey {
                server: "db1".to_string(),
                name: "postgres".to_string(),
            },
            current_state: None,
        };
        assert_eq!(
            pending.to_string(),
            "db1:postgres [service/online]: Service back online"
        );
    }
}
