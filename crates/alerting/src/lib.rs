//! Alerting
//!
//! The seam between the supervisor and whatever transports alert messages
//! to subscribers.

mod config;
mod sink;

pub use config::{AlertsConfig, SubscriberConfig};
pub use sink::{AlertSink, DeliveryOutcome, LogSink};
