//! Service entry point: configuration, logging, bootstrap and the long-poll
//! loop, with a health endpoint on the side.

use anyhow::Context;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use aktly_core::config::{AppConfig, LoadOptions, LogFormat, LoggingConfig};

mod act_tool;
mod bootstrap;
mod delivery;
mod docgen;
mod health;
mod service;

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match config.format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config =
        AppConfig::load(LoadOptions::default()).context("configuration failed to load")?;
    init_logging(&config.logging);

    let app = bootstrap::bootstrap(config).await.context("application failed to start")?;
    let _health = health::spawn(
        app.db_pool.clone(),
        &app.config.server.bind_address,
        app.config.server.health_check_port,
    )
    .await
    .context("health endpoint failed to start")?;

    info!(event_name = "startup.complete", "aktly is running");

    tokio::select! {
        result = app.runner.start() => result.context("long poll loop failed")?,
        _ = signal::ctrl_c() => {
            info!(event_name = "shutdown.signal_received", "shutdown signal received");
        }
    }

    let grace = std::time::Duration::from_secs(app.config.server.graceful_shutdown_secs.max(1));
    if tokio::time::timeout(grace, app.db_pool.close()).await.is_err() {
        tracing::warn!("database pool did not close within the shutdown grace period");
    }
    info!(event_name = "shutdown.complete", "aktly stopped");
    Ok(())
}
