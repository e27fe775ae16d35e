use std::sync::Arc;

use adapters::create_quote_source;
use common::init_logger;
use corelib::AppConfig;
use engine::AlertFileLogger;
use monitor::{MonitorEventLogger, build_monitor};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let is_production = std::env::var("APP_ENV").unwrap_or_default() == "production";
    init_logger("monitor", is_production);

    tracing::info!("Starting crypto price monitor...");

    let cfg = AppConfig::from_env()?;
    let source = create_quote_source(&cfg.api)?;
    let monitor = build_monitor(&cfg, source)?;

    if let Ok(path) = std::env::var("MONITOR_ALERT_LOG") {
        tracing::info!(path = %path, "appending alerts to file");
        monitor
            .alert_manager()
            .add_observer(Arc::new(AlertFileLogger::new(path)));
    }
    monitor.add_observer(Arc::new(MonitorEventLogger));

    monitor.start().await;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    monitor.stop();

    let status = monitor.get_status();
    tracing::info!(
        symbol = %status.symbol,
        total_checks = status.stats.total_checks,
        errors = status.stats.errors_count,
        alerts = monitor.alert_manager().get_stats().total,
        "monitor shut down"
    );

    Ok(())
}
