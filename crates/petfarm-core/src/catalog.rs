//! Catalog seeding from the `catalog` config section.
//!
//! Pet types are matched to existing records by name and store items by
//! key, so re-running the seed on every startup keeps ids stable and only
//! rewrites the tunable fields.

use petfarm_db::{DbError, RecordStore};
use petfarm_types::{PetType, PetTypeId, StoreItem, StoreItemId};

use crate::config::{CatalogConfig, PetTypeSeed, StoreItemSeed};

/// Counts reported by [`seed_catalog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SeedReport {
    /// Pet types written.
    pub pet_types: usize,
    /// Store items written.
    pub items: usize,
}

fn pet_type_from_seed(id: PetTypeId, seed: &PetTypeSeed) -> PetType {
    PetType {
        id,
        name: seed.name.clone(),
        default_stats: seed.default_stats,
        decay: seed.decay,
        time_natural_minutes: seed.time_natural_minutes,
        income_per_claim: seed.income_per_claim,
        max_income_per_claim: seed.max_income_per_claim,
        max_income: seed.max_income,
        cost: seed.cost,
    }
}

fn item_from_seed(id: StoreItemId, seed: &StoreItemSeed) -> StoreItem {
    StoreItem {
        id,
        key: seed.key.clone(),
        name: seed.name.clone(),
        category: seed.category,
        cost: seed.cost,
        effect: seed.effect,
    }
}

/// Upsert every pet type and store item in `catalog`.
///
/// # Errors
///
/// Returns [`DbError`] if a read or upsert fails. Entries written before
/// the failure stay written; seeding is safe to re-run.
pub async fn seed_catalog(
    store: &RecordStore,
    catalog: &CatalogConfig,
) -> Result<SeedReport, DbError> {
    let existing = store.pet_types().await?;
    let mut report = SeedReport::default();

    for seed in &catalog.pet_types {
        if seed.time_natural_minutes == 0 {
            tracing::warn!(
                pet_type = %seed.name,
                "time_natural_minutes is 0; pets of this type never grow or earn"
            );
        }
        let id = existing
            .iter()
            .find(|t| t.name == seed.name)
            .map_or_else(PetTypeId::new, |t| t.id);
        store.upsert_pet_type(&pet_type_from_seed(id, seed)).await?;
        report.pet_types = report.pet_types.saturating_add(1);
    }

    for seed in &catalog.items {
        let id = store
            .get_store_item(&seed.key)
            .await?
            .map_or_else(StoreItemId::new, |i| i.id);
        store.upsert_store_item(&item_from_seed(id, seed)).await?;
        report.items = report.items.saturating_add(1);
    }

    tracing::info!(
        pet_types = report.pet_types,
        items = report.items,
        "Catalog seeded"
    );
    Ok(report)
}
