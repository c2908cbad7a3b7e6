//! Reservoir Server binary.

use std::sync::Arc;

use anyhow::Context;
use reservoir_core::{CacheParams, InvalidationBus};
use reservoir_server::{
    AppState, JsonFileLoader, ServerSettings, metrics::init_metrics, run_server_with_state,
    spawn_reload_on_hangup,
};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = ServerSettings::load().context("failed to load server settings")?;
    let addr = settings.addr()?;

    tracing::info!(
        "Starting Reservoir Server v{}",
        env!("CARGO_PKG_VERSION")
    );
    tracing::info!("Dataset: {}", settings.dataset_path.display());
    tracing::info!("Cache: {}", settings.cache.name);

    let prometheus = init_metrics().context("failed to initialize metrics")?;

    // SIGHUP -> bus -> cache invalidation
    let bus = InvalidationBus::new("sighup");

    let cache = CacheParams::builder(settings.cache.name.clone())
        .loader(JsonFileLoader::new(&settings.dataset_path))
        .settings(&settings.cache)
        .invalidation_source(bus.subscribe())
        .start()
        .await
        .context("failed to load the initial dataset")?;

    spawn_reload_on_hangup(bus);

    let state = AppState::new(Arc::new(cache));

    run_server_with_state(addr, state, prometheus).await?;

    Ok(())
}
