//! Service Supervisor
//!
//! Periodically audits recorded service states and liveness, turns
//! transitions into alerts, and hands pending alerts to an alert sink:
//!
//! 1. [`StateAuditor`]: state changes and unknown states
//! 2. [`TimeoutAuditor`]: services that stopped (or resumed) reporting
//! 3. [`AlertDispatcher`]: delivery of unreported alerts
//!
//! [`SupervisorCycle`] runs the three in order and [`SupervisorLoop`] repeats
//! the cycle forever, logging and surviving any failure.

pub mod config;
mod context;
mod cycle;
mod dispatcher;
mod error;
mod logging;
mod runner;
mod state_auditor;
mod timeout_auditor;

#[cfg(test)]
mod testing;

pub use config::SupervisorConfig;
pub use context::SupervisorContext;
pub use cycle::{Cycle, CycleReport, SupervisorCycle};
pub use dispatcher::{render_message, AlertDispatcher};
pub use error::{Result, SupervisorError};
pub use logging::init_logging;
pub use runner::{LoopStats, SupervisorLoop};
pub use state_auditor::StateAuditor;
pub use timeout_auditor::{format_elapsed, TimeoutAuditor};
