//! Atomic player-action flows.
//!
//! Every flow follows the same unit of work:
//!
//! 1. Load the authoritative player, pet, and catalog documents.
//! 2. Run the pure rule in `petfarm-sim`, which validates and returns
//!    mutated copies (or a typed [`Rejection`]).
//! 3. Commit the copies and the ledger entry as one [`WriteSet`].
//! 4. Only after the commit, patch the session mirror.
//!
//! A version conflict during the commit means another writer (a job or a
//! second connection) got there first; the whole unit is re-run from step 1
//! a bounded number of times. Rejections are never retried.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use petfarm_db::{Committed, DbError, RecordStore, WriteSet};
use petfarm_sim::actions::{self, Payment};
use petfarm_sim::{Rejection, RulesConfig};
use petfarm_types::{
    InventoryEntry, Pet, PetId, PetType, PetTypeId, Player, PlayerId, Poop, PoopId,
    RejectionReason, Stat, StoreItem,
};
use serde::Serialize;

use crate::session::SessionRegistry;

/// Why a flow did not commit.
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    /// Validation failed. Nothing was written.
    #[error(transparent)]
    Rejected(#[from] Rejection),

    /// The record store failed. The write set was rolled back.
    #[error("persistence failed: {0}")]
    Persistence(#[from] DbError),
}

impl TransactionError {
    /// The reason reported to the client.
    pub const fn reason(&self) -> RejectionReason {
        match self {
            Self::Rejected(rejection) => rejection.reason,
            Self::Persistence(_) => RejectionReason::StoreFailure,
        }
    }

    fn rejected(reason: RejectionReason, message: impl Into<String>) -> Self {
        Self::Rejected(Rejection::new(reason, message))
    }
}

// ---------------------------------------------------------------------------
// Receipts
// ---------------------------------------------------------------------------

/// Result of [`TransactionManager::buy_item`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemReceipt {
    /// Item bought.
    pub item_key: String,
    /// Units bought.
    pub quantity: u32,
    /// Inventory entry after the purchase.
    pub inventory: InventoryEntry,
    /// Token balance after the purchase.
    pub tokens: u64,
}

/// Result of [`TransactionManager::buy_pet`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PetReceipt {
    /// The new pet as stored.
    pub pet: Pet,
    /// Token balance after the purchase.
    pub tokens: u64,
}

/// Result of the feed and play flows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatReceipt {
    /// Pet the item was used on.
    pub pet_id: PetId,
    /// Stat restored.
    pub stat: Stat,
    /// Stat value after the restore.
    pub value: u32,
    /// Item used.
    pub item_key: String,
    /// Units of the item still held.
    pub remaining: u32,
    /// Token balance after the flow.
    pub tokens: u64,
}

/// Result of the cleaning flows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanReceipt {
    /// Pet cleaned.
    pub pet_id: PetId,
    /// Poop removed.
    pub poop_id: PoopId,
    /// Cleanliness after the restore.
    pub cleanliness: u32,
    /// Item used.
    pub item_key: String,
    /// Units of the item still held.
    pub remaining: u32,
    /// Token balance after the flow.
    pub tokens: u64,
}

/// Result of [`TransactionManager::create_poop`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoopReceipt {
    /// The new poop.
    pub poop: Poop,
    /// Poops now on the pet.
    pub outstanding: usize,
}

/// Result of [`TransactionManager::claim_income`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaimReceipt {
    /// Pet claimed from.
    pub pet_id: PetId,
    /// Tokens moved into the balance.
    pub amount: u64,
    /// Token balance after the claim.
    pub tokens: u64,
}

/// The store catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogView {
    /// Pet types, ordered by name.
    pub pet_types: Vec<PetType>,
    /// Store items, ordered by key.
    pub items: Vec<StoreItem>,
}

/// A player's balance and inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryView {
    /// Token balance.
    pub tokens: u64,
    /// Item key to held quantity.
    pub inventory: BTreeMap<String, InventoryEntry>,
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// Runs player-action flows against the record store.
pub struct TransactionManager {
    store: RecordStore,
    sessions: Arc<SessionRegistry>,
    rules: RulesConfig,
    max_conflict_retries: u32,
}

impl TransactionManager {
    /// Create a manager.
    pub const fn new(
        store: RecordStore,
        sessions: Arc<SessionRegistry>,
        rules: RulesConfig,
        max_conflict_retries: u32,
    ) -> Self {
        Self {
            store,
            sessions,
            rules,
            max_conflict_retries,
        }
    }

    /// Re-run `attempt` while it fails with a version conflict, up to the
    /// configured number of retries.
    async fn with_retries<T, F, Fut>(
        &self,
        flow: &'static str,
        mut attempt: F,
    ) -> Result<T, TransactionError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransactionError>>,
    {
        let mut retries = 0_u32;
        loop {
            match attempt().await {
                Err(TransactionError::Persistence(e))
                    if e.is_conflict() && retries < self.max_conflict_retries =>
                {
                    retries = retries.saturating_add(1);
                    tracing::debug!(flow, retries, error = %e, "Version conflict, re-running");
                }
                Err(TransactionError::Persistence(e)) => {
                    tracing::warn!(flow, retries, error = %e, "Transaction failed");
                    return Err(TransactionError::Persistence(e));
                }
                other => return other,
            }
        }
    }

    // -----------------------------------------------------------------------
    // Loads
    // -----------------------------------------------------------------------

    async fn load_player(&self, id: PlayerId) -> Result<Player, TransactionError> {
        self.store.get_player(id).await?.ok_or_else(|| {
            TransactionError::rejected(RejectionReason::UnknownPlayer, format!("player {id}"))
        })
    }

    async fn load_pet(&self, id: PetId) -> Result<Pet, TransactionError> {
        self.store.get_pet(id).await?.ok_or_else(|| {
            TransactionError::rejected(RejectionReason::UnknownPet, format!("pet {id}"))
        })
    }

    async fn load_item(&self, key: &str) -> Result<StoreItem, TransactionError> {
        self.store.get_store_item(key).await?.ok_or_else(|| {
            TransactionError::rejected(RejectionReason::UnknownItem, format!("item {key}"))
        })
    }

    async fn load_pet_type(&self, id: PetTypeId) -> Result<PetType, TransactionError> {
        self.store.get_pet_type(id).await?.ok_or_else(|| {
            TransactionError::rejected(RejectionReason::UnknownPetType, format!("pet type {id}"))
        })
    }

    /// Commit `writes` and patch the session mirror with what was stored.
    async fn commit(&self, writes: WriteSet) -> Result<Committed, TransactionError> {
        let committed = self.store.commit(writes).await?;
        for player in &committed.players {
            self.sessions.patch_player(player).await;
        }
        for pet in &committed.pets {
            self.sessions.patch_pet(pet).await;
        }
        Ok(committed)
    }

    fn stored_tokens(committed: &Committed, fallback: &Player) -> u64 {
        committed
            .player(fallback.id)
            .map_or(fallback.tokens, |p| p.tokens)
    }

    // -----------------------------------------------------------------------
    // Purchases
    // -----------------------------------------------------------------------

    /// Buy `quantity` units of `item_key` into the inventory.
    pub async fn buy_item(
        &self,
        player_id: PlayerId,
        item_key: &str,
        quantity: u32,
    ) -> Result<ItemReceipt, TransactionError> {
        self.with_retries("buy_item", || self.try_buy_item(player_id, item_key, quantity))
            .await
    }

    async fn try_buy_item(
        &self,
        player_id: PlayerId,
        item_key: &str,
        quantity: u32,
    ) -> Result<ItemReceipt, TransactionError> {
        let player = self.load_player(player_id).await?;
        let item = self.load_item(item_key).await?;
        let outcome = actions::buy_item(&player, &item, quantity, &self.rules, Utc::now())?;

        let inventory = outcome
            .player
            .inventory
            .get(&item.key)
            .copied()
            .unwrap_or_default();
        let writes = WriteSet::new()
            .update_player(outcome.player.clone())
            .ledger(outcome.ledger);
        let committed = self.commit(writes).await?;

        tracing::info!(player_id = %player_id, item = %item.key, quantity, "Item purchased");
        Ok(ItemReceipt {
            item_key: item.key,
            quantity,
            inventory,
            tokens: Self::stored_tokens(&committed, &outcome.player),
        })
    }

    /// Buy a new pet of `pet_type_id`.
    pub async fn buy_pet(
        &self,
        player_id: PlayerId,
        pet_type_id: PetTypeId,
        name: Option<&str>,
    ) -> Result<PetReceipt, TransactionError> {
        self.with_retries("buy_pet", || self.try_buy_pet(player_id, pet_type_id, name))
            .await
    }

    async fn try_buy_pet(
        &self,
        player_id: PlayerId,
        pet_type_id: PetTypeId,
        name: Option<&str>,
    ) -> Result<PetReceipt, TransactionError> {
        let player = self.load_player(player_id).await?;
        let pet_type = self.load_pet_type(pet_type_id).await?;
        let outcome = {
            let mut rng = rand::rng();
            actions::buy_pet(&player, &pet_type, name, &mut rng, Utc::now())?
        };

        let pet_id = outcome.pet.id;
        let writes = WriteSet::new()
            .update_player(outcome.player.clone())
            .insert_pet(outcome.pet.clone())
            .ledger(outcome.ledger);
        let committed = self.commit(writes).await?;

        tracing::info!(
            player_id = %player_id,
            pet_id = %pet_id,
            pet_type = %pet_type.name,
            "Pet purchased"
        );
        Ok(PetReceipt {
            pet: committed.pet(pet_id).cloned().unwrap_or(outcome.pet),
            tokens: Self::stored_tokens(&committed, &outcome.player),
        })
    }

    // -----------------------------------------------------------------------
    // Stat restores
    // -----------------------------------------------------------------------

    /// Feed `pet_id` one unit of `item_key`, paid with tokens or taken from
    /// the inventory.
    pub async fn feed(
        &self,
        player_id: PlayerId,
        pet_id: PetId,
        item_key: &str,
        payment: Payment,
    ) -> Result<StatReceipt, TransactionError> {
        self.with_retries("feed", || {
            self.try_restore(player_id, pet_id, item_key, payment, actions::feed)
        })
        .await
    }

    /// Play with `pet_id` using a toy from the inventory.
    pub async fn play(
        &self,
        player_id: PlayerId,
        pet_id: PetId,
        item_key: &str,
    ) -> Result<StatReceipt, TransactionError> {
        self.with_retries("play", || {
            self.try_restore(player_id, pet_id, item_key, Payment::Inventory, actions::play)
        })
        .await
    }

    async fn try_restore<F>(
        &self,
        player_id: PlayerId,
        pet_id: PetId,
        item_key: &str,
        payment: Payment,
        rule: F,
    ) -> Result<StatReceipt, TransactionError>
    where
        F: Fn(
            &Player,
            &Pet,
            &StoreItem,
            Payment,
            &RulesConfig,
            chrono::DateTime<Utc>,
        ) -> Result<actions::ItemUse, Rejection>,
    {
        let player = self.load_player(player_id).await?;
        let pet = self.load_pet(pet_id).await?;
        let item = self.load_item(item_key).await?;
        let outcome = rule(&player, &pet, &item, payment, &self.rules, Utc::now())?;

        let remaining = outcome.player.quantity_of(&item.key);
        let writes = WriteSet::new()
            .update_player(outcome.player.clone())
            .update_pet(outcome.pet)
            .ledger(outcome.ledger);
        let committed = self.commit(writes).await?;

        tracing::info!(
            player_id = %player_id,
            pet_id = %pet_id,
            item = %item.key,
            stat = ?outcome.stat,
            value = outcome.value,
            "Stat restored"
        );
        Ok(StatReceipt {
            pet_id,
            stat: outcome.stat,
            value: outcome.value,
            item_key: item.key,
            remaining,
            tokens: Self::stored_tokens(&committed, &outcome.player),
        })
    }

    // -----------------------------------------------------------------------
    // Poops
    // -----------------------------------------------------------------------

    /// Remove `poop_id` from `pet_id` with a cleaning item, paid with tokens
    /// or taken from the inventory.
    pub async fn clean(
        &self,
        player_id: PlayerId,
        pet_id: PetId,
        item_key: &str,
        poop_id: PoopId,
        payment: Payment,
    ) -> Result<CleanReceipt, TransactionError> {
        self.with_retries("clean", || {
            self.try_clean(player_id, pet_id, item_key, poop_id, payment)
        })
        .await
    }

    async fn try_clean(
        &self,
        player_id: PlayerId,
        pet_id: PetId,
        item_key: &str,
        poop_id: PoopId,
        payment: Payment,
    ) -> Result<CleanReceipt, TransactionError> {
        let player = self.load_player(player_id).await?;
        let pet = self.load_pet(pet_id).await?;
        let item = self.load_item(item_key).await?;
        let outcome = actions::clean(
            &player,
            &pet,
            &item,
            poop_id,
            payment,
            &self.rules,
            Utc::now(),
        )?;

        let remaining = outcome.player.quantity_of(&item.key);
        let writes = WriteSet::new()
            .update_player(outcome.player.clone())
            .update_pet(outcome.pet)
            .ledger(outcome.ledger);
        let committed = self.commit(writes).await?;

        tracing::info!(
            player_id = %player_id,
            pet_id = %pet_id,
            poop_id = %outcome.removed.id,
            cleanliness = outcome.cleanliness,
            "Poop cleaned"
        );
        Ok(CleanReceipt {
            pet_id,
            poop_id: outcome.removed.id,
            cleanliness: outcome.cleanliness,
            item_key: item.key,
            remaining,
            tokens: Self::stored_tokens(&committed, &outcome.player),
        })
    }

    /// Spawn a poop on `pet_id`.
    pub async fn create_poop(
        &self,
        player_id: PlayerId,
        pet_id: PetId,
    ) -> Result<PoopReceipt, TransactionError> {
        self.with_retries("create_poop", || self.try_create_poop(player_id, pet_id))
            .await
    }

    async fn try_create_poop(
        &self,
        player_id: PlayerId,
        pet_id: PetId,
    ) -> Result<PoopReceipt, TransactionError> {
        let player = self.load_player(player_id).await?;
        let pet = self.load_pet(pet_id).await?;
        let (pet, poop) = {
            let mut rng = rand::rng();
            actions::create_poop(&player, &pet, &self.rules, &mut rng, Utc::now())?
        };

        let outstanding = pet.poops.len();
        self.commit(WriteSet::new().update_pet(pet)).await?;

        tracing::info!(pet_id = %pet_id, poop_id = %poop.id, outstanding, "Poop created");
        Ok(PoopReceipt { poop, outstanding })
    }

    // -----------------------------------------------------------------------
    // Income
    // -----------------------------------------------------------------------

    /// Move `pet_id`'s accrued income into the player's balance.
    pub async fn claim_income(
        &self,
        player_id: PlayerId,
        pet_id: PetId,
    ) -> Result<ClaimReceipt, TransactionError> {
        self.with_retries("claim_income", || self.try_claim_income(player_id, pet_id))
            .await
    }

    async fn try_claim_income(
        &self,
        player_id: PlayerId,
        pet_id: PetId,
    ) -> Result<ClaimReceipt, TransactionError> {
        let player = self.load_player(player_id).await?;
        let pet = self.load_pet(pet_id).await?;
        let outcome = actions::claim_income(&player, &pet, Utc::now())?;

        let writes = WriteSet::new()
            .update_player(outcome.player.clone())
            .update_pet(outcome.pet)
            .ledger(outcome.ledger);
        let committed = self.commit(writes).await?;

        tracing::info!(
            player_id = %player_id,
            pet_id = %pet_id,
            amount = outcome.amount,
            "Income claimed"
        );
        Ok(ClaimReceipt {
            pet_id,
            amount: outcome.amount,
            tokens: Self::stored_tokens(&committed, &outcome.player),
        })
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// The store catalog.
    pub async fn catalog(&self) -> Result<CatalogView, TransactionError> {
        Ok(CatalogView {
            pet_types: self.store.pet_types().await?,
            items: self.store.store_items().await?,
        })
    }

    /// The player's balance and inventory, from the authoritative record.
    pub async fn inventory(&self, player_id: PlayerId) -> Result<InventoryView, TransactionError> {
        let player = self.load_player(player_id).await?;
        Ok(InventoryView {
            tokens: player.tokens,
            inventory: player.inventory,
        })
    }
}
