//! In-memory record store.
//!
//! Holds every collection behind one [`RwLock`], so a commit validates and
//! applies its whole write set under a single write guard. Fault injection
//! hooks let tests force commit failures, version conflicts, and outages.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use petfarm_types::{
    Pet, PetId, PetStatus, PetType, PetTypeId, Player, PlayerId, StoreItem, TokenLedgerEntry,
};
use tokio::sync::RwLock;

use crate::error::DbError;
use crate::store::{Committed, WriteSet, next_version};

#[derive(Default)]
struct Collections {
    players: BTreeMap<PlayerId, Player>,
    pets: BTreeMap<PetId, Pet>,
    pet_types: BTreeMap<PetTypeId, PetType>,
    store_items: BTreeMap<String, StoreItem>,
    ledger: Vec<TokenLedgerEntry>,
}

#[derive(Default)]
struct Faults {
    failing_commits: AtomicU32,
    conflicts: AtomicU32,
    unavailable: AtomicBool,
}

/// Decrement `counter` if it is nonzero. Returns whether it was.
fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

fn conflict(collection: &'static str, id: impl ToString, expected: u64) -> DbError {
    DbError::Conflict {
        collection,
        id: id.to_string(),
        expected,
    }
}

/// Process-local record store. Cloning shares the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Arc<RwLock<Collections>>,
    faults: Arc<Faults>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Fault injection
    // =========================================================================

    /// Make the next `count` commits fail with [`DbError::Unavailable`]
    /// before writing anything.
    pub fn fail_next_commits(&self, count: u32) {
        self.faults.failing_commits.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` conditional writes fail with
    /// [`DbError::Conflict`].
    pub fn inject_conflicts(&self, count: u32) {
        self.faults.conflicts.store(count, Ordering::SeqCst);
    }

    /// Make every operation fail with [`DbError::Unavailable`] while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), DbError> {
        if self.faults.unavailable.load(Ordering::SeqCst) {
            Err(DbError::Unavailable(String::from("memory store marked unavailable")))
        } else {
            Ok(())
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub(crate) async fn get_pet(&self, id: PetId) -> Result<Option<Pet>, DbError> {
        self.check_available()?;
        Ok(self.data.read().await.pets.get(&id).cloned())
    }

    pub(crate) async fn get_player(&self, id: PlayerId) -> Result<Option<Player>, DbError> {
        self.check_available()?;
        Ok(self.data.read().await.players.get(&id).cloned())
    }

    pub(crate) async fn find_player_by_wallet(
        &self,
        wallet: &str,
    ) -> Result<Option<Player>, DbError> {
        self.check_available()?;
        Ok(self
            .data
            .read()
            .await
            .players
            .values()
            .find(|p| p.wallet == wallet)
            .cloned())
    }

    pub(crate) async fn pets_by_owner(&self, owner: PlayerId) -> Result<Vec<Pet>, DbError> {
        self.check_available()?;
        let data = self.data.read().await;
        let mut pets: Vec<Pet> = data
            .pets
            .values()
            .filter(|p| p.owner_id == owner)
            .cloned()
            .collect();
        pets.sort_by_key(|p| p.created_at);
        Ok(pets)
    }

    pub(crate) async fn active_pets(&self) -> Result<Vec<Pet>, DbError> {
        self.check_available()?;
        Ok(self
            .data
            .read()
            .await
            .pets
            .values()
            .filter(|p| p.status == PetStatus::Active)
            .cloned()
            .collect())
    }

    pub(crate) async fn income_eligible_pets(&self) -> Result<Vec<Pet>, DbError> {
        self.check_available()?;
        let data = self.data.read().await;
        Ok(data
            .pets
            .values()
            .filter(|p| {
                data.pet_types
                    .get(&p.pet_type_id)
                    .is_some_and(|t| p.total_income < t.max_income)
            })
            .cloned()
            .collect())
    }

    pub(crate) async fn get_pet_type(&self, id: PetTypeId) -> Result<Option<PetType>, DbError> {
        self.check_available()?;
        Ok(self.data.read().await.pet_types.get(&id).cloned())
    }

    pub(crate) async fn pet_types(&self) -> Result<Vec<PetType>, DbError> {
        self.check_available()?;
        let mut types: Vec<PetType> = self.data.read().await.pet_types.values().cloned().collect();
        types.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(types)
    }

    pub(crate) async fn get_store_item(&self, key: &str) -> Result<Option<StoreItem>, DbError> {
        self.check_available()?;
        Ok(self.data.read().await.store_items.get(key).cloned())
    }

    pub(crate) async fn store_items(&self) -> Result<Vec<StoreItem>, DbError> {
        self.check_available()?;
        Ok(self.data.read().await.store_items.values().cloned().collect())
    }

    pub(crate) async fn ledger_for_player(
        &self,
        player: PlayerId,
    ) -> Result<Vec<TokenLedgerEntry>, DbError> {
        self.check_available()?;
        Ok(self
            .data
            .read()
            .await
            .ledger
            .iter()
            .filter(|e| e.player_id == player)
            .cloned()
            .collect())
    }

    // =========================================================================
    // Writes
    // =========================================================================

    pub(crate) async fn update_pet(&self, pet: &Pet) -> Result<Pet, DbError> {
        self.check_available()?;
        if take_one(&self.faults.conflicts) {
            return Err(conflict("pets", pet.id, pet.version));
        }
        let mut data = self.data.write().await;
        let stored = data
            .pets
            .get_mut(&pet.id)
            .ok_or_else(|| DbError::NotFound(format!("pet {}", pet.id)))?;
        if stored.version != pet.version {
            return Err(conflict("pets", pet.id, pet.version));
        }
        let mut next = pet.clone();
        next.version = next_version(pet.version);
        *stored = next.clone();
        Ok(next)
    }

    pub(crate) async fn commit(&self, writes: WriteSet) -> Result<Committed, DbError> {
        self.check_available()?;
        if take_one(&self.faults.failing_commits) {
            return Err(DbError::Unavailable(String::from("injected commit failure")));
        }
        if !(writes.updated_players.is_empty() && writes.updated_pets.is_empty())
            && take_one(&self.faults.conflicts)
        {
            let (id, expected) = writes
                .updated_players
                .first()
                .map(|p| (p.id.to_string(), p.version))
                .or_else(|| writes.updated_pets.first().map(|p| (p.id.to_string(), p.version)))
                .unwrap_or_default();
            return Err(conflict("write_set", id, expected));
        }

        let mut data = self.data.write().await;
        validate(&data, &writes)?;

        let committed = writes.into_committed();
        for player in &committed.players {
            data.players.insert(player.id, player.clone());
        }
        for pet in &committed.pets {
            data.pets.insert(pet.id, pet.clone());
        }
        data.ledger.extend(committed.ledger.iter().cloned());
        Ok(committed)
    }

    pub(crate) async fn upsert_pet_type(&self, pet_type: &PetType) -> Result<(), DbError> {
        self.check_available()?;
        self.data
            .write()
            .await
            .pet_types
            .insert(pet_type.id, pet_type.clone());
        Ok(())
    }

    pub(crate) async fn upsert_store_item(&self, item: &StoreItem) -> Result<(), DbError> {
        self.check_available()?;
        self.data
            .write()
            .await
            .store_items
            .insert(item.key.clone(), item.clone());
        Ok(())
    }
}

/// Check every precondition of `writes` against `data` without mutating.
fn validate(data: &Collections, writes: &WriteSet) -> Result<(), DbError> {
    for player in &writes.inserted_players {
        if data.players.contains_key(&player.id)
            || data.players.values().any(|p| p.wallet == player.wallet)
        {
            return Err(conflict("players", player.id, 0));
        }
    }
    for player in &writes.updated_players {
        let stored = data
            .players
            .get(&player.id)
            .ok_or_else(|| DbError::NotFound(format!("player {}", player.id)))?;
        if stored.version != player.version {
            return Err(conflict("players", player.id, player.version));
        }
    }
    for pet in &writes.inserted_pets {
        if data.pets.contains_key(&pet.id) {
            return Err(conflict("pets", pet.id, 0));
        }
    }
    for pet in &writes.updated_pets {
        let stored = data
            .pets
            .get(&pet.id)
            .ok_or_else(|| DbError::NotFound(format!("pet {}", pet.id)))?;
        if stored.version != pet.version {
            return Err(conflict("pets", pet.id, pet.version));
        }
    }
    Ok(())
}
