//! Supervisor main loop

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::cycle::{Cycle, CycleReport};
use crate::error::{Result, SupervisorError};

/// Loop counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub cycles: u64,
    pub failures: u64,
}

/// Runs a [`Cycle`] forever with a fixed pause between runs.
///
/// A failing cycle, whether it returns an error or panics, is logged and
/// the loop carries on after the usual pause. There is no backoff and no
/// failure limit.
pub struct SupervisorLoop<C: Cycle> {
    cycle: Arc<C>,
    interval: Duration,
    cycles: AtomicU64,
    failures: AtomicU64,
}

impl<C: Cycle> SupervisorLoop<C> {
    pub fn new(cycle: C, interval: Duration) -> Self {
        Self {
            cycle: Arc::new(cycle),
            interval,
            cycles: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Run one supervised cycle without sleeping
    pub async fn tick(&self) -> Result<CycleReport> {
        self.cycles.fetch_add(1, Ordering::Relaxed);

        // A separate task turns a panic into a JoinError instead of unwinding the loop
        let cycle = self.cycle.clone();
        let result = match tokio::spawn(async move { cycle.run_once().await }).await {
            Ok(result) => result,
            Err(e) => Err(SupervisorError::Task(e.to_string())),
        };

        match &result {
            Ok(report) => debug!(
                "Cycle finished: {} new alerts, {} sent",
                report.new_alerts, report.sent_alerts
            ),
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                error!("Supervise loop error: {}", e);
            }
        }
        result
    }

    /// Run cycles until the process is terminated
    pub async fn run(&self) {
        info!("Starting supervisor loop (interval: {:?})", self.interval);
        loop {
            // Errors are already logged by `tick`
            let _ = self.tick().await;
            tokio::time::sleep(self.interval).await;
        }
    }

    pub fn stats(&self) -> LoopStats {
        LoopStats {
            cycles: self.cycles.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}
