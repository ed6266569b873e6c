//! Binary bootstrap: init tracing, load config, construct the broker,
//! and run the background maintenance task until Ctrl-C. Headless —
//! unlike the teacher's TUI entry point there is no terminal to set up
//! or tear down.

use std::sync::Arc;

use localbus_broker::background;
use localbus_broker::{Broker, BrokerConfig};
use tracing_appender::non_blocking::WorkerGuard;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = BrokerConfig::load();
    let _log_guard = init_tracing(&config);

    tracing::info!("starting localbus-broker");

    let sweep_interval = config.sweep_interval();
    let broker = Arc::new(Broker::new(config));
    let maintenance = background::spawn(Arc::clone(&broker), sweep_interval);

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");

    maintenance.shutdown().await;
    Ok(())
}

/// Stdout logging, plus a rolling file appender when `log_to_file` is
/// set (mirrors the teacher's `AppSettings::log_to_file` toggle). The
/// returned guard must stay alive for the process lifetime or buffered
/// lines are lost on exit.
fn init_tracing(config: &BrokerConfig) -> Option<WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if config.log_to_file {
        let file_appender = tracing_appender::rolling::daily(".", "localbus-broker.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(non_blocking)
            .init();
        Some(guard)
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        None
    }
}
