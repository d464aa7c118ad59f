pub mod memory;
pub mod postgres;
pub mod traits;

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;
use validator::Validate;

use crate::models::{validation_messages, NewProperty};

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use traits::ListingStore;

/// Load listings from a JSON array of `NewProperty` (prices in dollars).
/// Skipped when the store already holds listings.
pub async fn seed_from_file(store: &dyn ListingStore, path: &Path) -> Result<usize> {
    let existing = store.count_properties().await?;
    if existing > 0 {
        info!(
            "{} already holds {} listings, skipping seed file",
            store.backend_name(),
            existing
        );
        return Ok(0);
    }

    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read seed file {}", path.display()))?;
    let listings: Vec<NewProperty> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse seed file {}", path.display()))?;

    let mut inserted = 0;
    for (i, listing) in listings.into_iter().enumerate() {
        listing
            .validate()
            .map_err(|errors| {
                anyhow::anyhow!(
                    "Seed listing {i} is invalid: {}",
                    validation_messages(&errors).join("; ")
                )
            })?;
        store.create_property(listing).await?;
        inserted += 1;
    }

    info!("💾 Seeded {} listings from {}", inserted, path.display());
    Ok(inserted)
}
