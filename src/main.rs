use std::process::ExitCode;

use kafka_offset_monitor::config::{EnvConfig, MonitorConfig};
use kafka_offset_monitor::OffsetMonitor;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

// ========================================
// MAIN ENTRY POINT
// ========================================

#[tokio::main]
async fn main() -> ExitCode {
    let env = EnvConfig::load();

    let filter = EnvFilter::try_new(&env.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🚀 Kafka Offset Monitor v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = match MonitorConfig::from_file(&env.config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load {}: {}", env.config_path, e);
            return ExitCode::FAILURE;
        }
    };

    let mut monitor = match OffsetMonitor::new(config) {
        Ok(monitor) => monitor,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = monitor.start().await {
        error!("Startup failed: {}", e);
        monitor.close().await;
        return ExitCode::FAILURE;
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Cannot listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
    monitor.close().await;
    ExitCode::SUCCESS
}
