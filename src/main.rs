//! volwatch - volatility alert daemon
//!
//! Polls the metrics API on a fixed interval and posts deduplicated
//! alerts to a Discord webhook. Runs until CTRL+C.
//!
//! Usage:
//!   cargo run --release
//!
//! Configuration is environment-driven; see `MonitorConfig::from_env`
//! for the full variable list. `DISCORD_WEBHOOK_URL` is required.

use dotenv::dotenv;
use log::{error, info};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use volwatch::monitor::{
    api::MetricsClient,
    config::MonitorConfig,
    ledger::{NotificationLedger, SqliteStore},
    notifier::DiscordNotifier,
    scheduler::{monitor_loop, Monitor},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("🚀 volwatch - volatility alert daemon");

    // Configuration errors are fatal; the daemon never starts half-configured.
    let config = MonitorConfig::from_env()?;

    info!("   ├─ API: {}", config.volatility_url);
    info!(
        "   ├─ Timeframe: {} | threshold: {}% | direction: {}",
        config.timeframe, config.threshold, config.direction
    );
    info!(
        "   ├─ Max notifications: {} | renotify buffer: {}min",
        config.max_notifications, config.renotify_buffer_minutes
    );
    if config.volume_threshold > 0.0 {
        info!("   ├─ Volume gate: {} (quote turnover)", config.volume_threshold);
    }
    info!("   └─ Poll interval: {}s", config.check_interval_seconds);

    // Initialize the notification ledger (idempotent schema init).
    if let Some(dir) = Path::new(&config.db_path).parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }
    let store = Arc::new(SqliteStore::open(Path::new(&config.db_path))?);
    info!("✅ Notification ledger ready: {}", config.db_path);

    let timeout = Duration::from_secs(config.http_timeout_secs);
    let client = MetricsClient::new(
        config.volatility_url.clone(),
        config.volume_url.clone(),
        timeout,
    )?;
    let notifier = Arc::new(DiscordNotifier::new(config.webhook_url.clone(), timeout)?);
    let ledger = NotificationLedger::new(store, config.renotify_buffer_minutes);

    let monitor = Monitor::new(client, ledger, notifier, &config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poll_interval = Duration::from_secs(config.check_interval_seconds);
    let loop_handle = tokio::spawn(monitor_loop(monitor, poll_interval, shutdown_rx));

    info!("🔄 Press CTRL+C to shutdown gracefully");

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("⚠️  Received CTRL+C, shutting down..."),
        Err(err) => error!("❌ Failed to listen for CTRL+C: {}", err),
    }

    let _ = shutdown_tx.send(true);
    let _ = loop_handle.await;

    info!("✅ Monitor stopped");
    Ok(())
}
