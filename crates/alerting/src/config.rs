//! Delivery configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One alert recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberConfig {
    /// Subscriber name, used in logs
    pub name: String,
    /// Plugin in the `alert.d` directory that reaches this subscriber
    pub plugin: String,
    /// Extra plugin arguments (address, channel, ...)
    #[serde(default)]
    pub args: Vec<String>,
}

/// Alert delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    /// Directory holding alert plugins
    #[serde(default = "default_alertd_path")]
    pub alertd_path: PathBuf,
    /// Who gets alerts
    #[serde(default)]
    pub subscribers: Vec<SubscriberConfig>,
}

fn default_alertd_path() -> PathBuf {
    PathBuf::from("instance/alert.d")
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            alertd_path: default_alertd_path(),
            subscribers: Vec::new(),
        }
    }
}

impl AlertsConfig {
    /// Resolve a subscriber's plugin inside `alertd_path`
    pub fn plugin_path(&self, subscriber: &SubscriberConfig) -> PathBuf {
        self.alertd_path.join(&subscriber.plugin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_fields_missing() {
        let config: AlertsConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.alertd_path, PathBuf::from("instance/alert.d"));
        assert!(config.subscribers.is_empty());
    }

    #[test]
    fn test_plugin_path() {
        let config: AlertsConfig = serde_json::from_str(
            r#"{
                "alertd_path": "/srv/supervisor/alert.d",
                "subscribers": [{ "name": "ops", "plugin": "email.sh", "args": ["ops@example.com"] }]
            }"#,
        )
        .unwrap();

        let ops = &config.subscribers[0];
        assert_eq!(ops.args, vec!["ops@example.com".to_string()]);
        assert_eq!(
            config.plugin_path(ops),
            PathBuf::from("/srv/supervisor/alert.d/email.sh")
        );
    }
}
