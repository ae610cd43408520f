//! Alert sinks

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::AlertsConfig;

/// Result of handing one message to a sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Every subscriber was reached
    Delivered,
    /// Delivery failed and the sink already logged why
    Failed { reason: String },
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered)
    }
}

/// Transport for rendered alert messages.
///
/// Implementations own their error handling and logging. They report
/// failures through [`DeliveryOutcome`] and never return an error, so a
/// broken transport cannot abort the caller.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn deliver(&self, config: &AlertsConfig, message: &str) -> DeliveryOutcome;
}

/// Sink that writes each message to the log once per subscriber
#[derive(Debug, Default, Clone)]
pub struct LogSink;

impl LogSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AlertSink for LogSink {
    async fn deliver(&self, config: &AlertsConfig, message: &str) -> DeliveryOutcome {
        if config.subscribers.is_empty() {
            warn!("No alert subscribers configured, dropping alert: {}", message.trim_end());
            return DeliveryOutcome::Failed {
                reason: "no subscribers configured".to_string(),
            };
        }

        for subscriber in &config.subscribers {
            info!(
                subscriber = %subscriber.name,
                plugin = %config.plugin_path(subscriber).display(),
                "Alert: {}",
                message.trim_end()
            );
        }
        DeliveryOutcome::Delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SubscriberConfig;

    #[tokio::test]
    async fn test_log_sink_without_subscribers_fails() {
        let outcome = LogSink::new()
            .deliver(&AlertsConfig::default(), "web1:nginx [service/offline]\n")
            .await;
        assert!(!outcome.is_delivered());
    }

    #[tokio::test]
    async fn test_log_sink_delivers_to_subscribers() {
        let config = AlertsConfig {
            subscribers: vec![SubscriberConfig {
                name: "ops".to_string(),
                plugin: "email.sh".to_string(),
                args: Vec::new(),
            }],
            ..Default::default()
        };
        let outcome = LogSink::new()
            .deliver(&config, "web1:nginx [service/online]\n")
            .await;
        assert_eq!(outcome, DeliveryOutcome::Delivered);
    }
}
