//! Service Supervisor - Main Entry Point

use alerting::LogSink;
use anyhow::Context;
use std::sync::Arc;
use storage::SqliteRepository;
use supervisor::{
    init_logging, Cycle, SupervisorConfig, SupervisorContext, SupervisorCycle, SupervisorLoop,
};
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = SupervisorConfig::load().context("failed to load configuration")?;
    init_logging(&config.logging);

    info!("=== Service Supervisor v{} ===", env!("CARGO_PKG_VERSION"));

    let repository = SqliteRepository::connect(&config.database.url, config.database.max_connections)
        .await
        .with_context(|| format!("failed to open database {}", config.database.url))?;
    if config.database.init_schema {
        repository.init_schema().await.context("failed to create schema")?;
    }

    let ctx = SupervisorContext::new(Arc::new(repository), Arc::new(LogSink::new()), config.alerts);
    let cycle = SupervisorCycle::new(ctx);

    if config.supervisor.once {
        let report = cycle.run_once().await?;
        info!(
            "Single cycle finished: {} new alerts, {} sent",
            report.new_alerts, report.sent_alerts
        );
        return Ok(());
    }

    let supervisor = SupervisorLoop::new(cycle, config.supervisor.interval());
    tokio::select! {
        _ = supervisor.run() => {}
        _ = shutdown_signal() => {
            let stats = supervisor.stats();
            info!(
                "Shutting down after {} cycles ({} failed)",
                stats.cycles, stats.failures
            );
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
