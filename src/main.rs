mod api;
mod config;
mod models;
mod search;
mod storage;

use std::sync::Arc;

use anyhow::Context;
use config::Config;
use storage::{ListingStore, MemoryStore, PgStore};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("🏠 Campus Nest - student housing search");

    let config = Config::from_env().context("Environment misconfigured")?;

    let store: Arc<dyn ListingStore> = match &config.database_url {
        Some(url) => Arc::new(PgStore::connect(url, config.db_max_connections).await?),
        None => {
            warn!("DATABASE_URL not set, listings are kept in memory");
            Arc::new(MemoryStore::new())
        }
    };

    if let Some(path) = &config.seed_file {
        storage::seed_from_file(store.as_ref(), path).await?;
    }

    api::serve(&config, store).await
}
