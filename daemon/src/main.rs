//! DriftFX Daemon Binary
//!
//! Hosts one synthetic FX market: daily stochastic rate updates and the
//! digest broadcast.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use driftfx_daemon::{DaemonConfig, DailyScheduler, LogSink, MarketDaemon};
use driftfx_market::{MemoryAdapter, RateSimulator, RateStore, StoreConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting DriftFX daemon");

    // Load configuration
    let config = DaemonConfig::from_env();
    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }

    let node_id = config
        .node_id
        .clone()
        .unwrap_or_else(|| format!("market-{}", uuid::Uuid::new_v4()));
    info!(node_id = %node_id, "Node ID assigned");

    // Open the market store. A durable adapter slots in here; the
    // in-memory adapter keeps the daemon self-contained.
    let adapter = Arc::new(MemoryAdapter::new());
    let store_config = StoreConfig {
        persist_timeout: config.persist_timeout,
        seed_default_market: config.seed_default_market,
    };
    let store = Arc::new(RateStore::open(adapter, store_config).await?);

    if config.channel_id.is_some() {
        store.set_channel(config.channel_id.clone()).await?;
    }
    if config.manager_role_id.is_some() {
        store.set_manager_role(config.manager_role_id.clone()).await?;
    }

    let scheduler = Arc::new(DailyScheduler::new(
        store.clone(),
        RateSimulator::new(store.clone()),
        Some(Arc::new(LogSink::new())),
        config.scheduler.clone(),
    ));

    let daemon = Arc::new(MarketDaemon::new(node_id.clone(), store, scheduler));

    // Set up graceful shutdown
    let daemon_clone = daemon.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for Ctrl+C");
        info!("Shutdown signal received");
        if let Err(e) = daemon_clone.stop().await {
            error!(error = %e, "Error during shutdown");
        }
    });

    daemon.start().await?;
    info!(
        node_id = %node_id,
        tick_hour = config.scheduler.tick_hour,
        "Daemon running"
    );

    // Keep running until shutdown
    loop {
        if !daemon.is_running() {
            break;
        }
        tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;
    }

    info!("Daemon shutdown complete");
    Ok(())
}
