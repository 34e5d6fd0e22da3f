//! SmartThings bridge daemon
//!
//! Main entry point: loads configuration, restores config entries, sets
//! them up against the cloud, and serves the webhook endpoint until
//! interrupted.

use std::sync::Arc;

use anyhow::Result;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use st_bridge::config::BridgeConfig;
use st_bridge::lifecycle::Bridge;
use st_bridge::webhook;
use st_broker::SmartAppManager;
use st_config_entries::{ConfigEntries, ConfigEntry, Storage};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "configuration.yaml".to_string());
    let config = BridgeConfig::load(&config_path)?;
    info!(path = %config_path, "Loaded configuration");

    let storage = Arc::new(Storage::new(&config.config_dir));
    let entries = Arc::new(ConfigEntries::new(storage));
    entries.load().await?;

    // Seed the configured entry on first start.
    if let Some(seed) = &config.entry {
        let entry = ConfigEntry::new(seed.title.clone(), seed.data.clone());
        if entries.get_by_unique_id(&entry.unique_id).is_none() {
            entries.add(entry).await?;
        }
    }

    let smartapp = Arc::new(SmartAppManager::new());
    let bridge = Bridge::new(
        Arc::clone(&entries),
        Arc::clone(&smartapp),
        config.api_base_url.clone(),
    );
    bridge.setup_all().await;

    let app = webhook::router(smartapp).layer(TraceLayer::new_for_http());
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    info!(addr = %config.listen_addr, "Webhook endpoint listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    bridge.unload_all();
    info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Failed to listen for shutdown signal");
    }
}
