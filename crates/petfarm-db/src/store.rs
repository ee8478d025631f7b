//! The record store: point reads, eligibility queries, conditional updates,
//! and multi-document commits.
//!
//! Every mutable document (`Player`, `Pet`) carries a `version`. A write
//! names the version it read; the store applies it only if the stored
//! version still matches and then bumps it by one. A [`WriteSet`] groups
//! inserts, conditional updates, and ledger entries that must land together:
//! either every write applies or none does.
//!
//! [`RecordStore`] dispatches over the concrete backends with an enum
//! instead of a trait object, since async methods are not dyn-compatible.

use petfarm_types::{
    Pet, PetId, PetType, PetTypeId, Player, PlayerId, StoreItem, TokenLedgerEntry,
};

use crate::error::DbError;
use crate::memory::MemoryStore;
use crate::pg_store::PgRecordStore;

/// The version a document gets after a successful write.
pub(crate) const fn next_version(version: u64) -> u64 {
    version.saturating_add(1)
}

// ---------------------------------------------------------------------------
// Write sets
// ---------------------------------------------------------------------------

/// Documents and ledger entries to persist atomically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSet {
    /// New players. Their `version` is ignored; they are stored at 1.
    pub inserted_players: Vec<Player>,
    /// Existing players, applied only if their `version` is current.
    pub updated_players: Vec<Player>,
    /// New pets. Their `version` is ignored; they are stored at 1.
    pub inserted_pets: Vec<Pet>,
    /// Existing pets, applied only if their `version` is current.
    pub updated_pets: Vec<Pet>,
    /// Ledger entries recording the balance changes in this set.
    pub ledger: Vec<TokenLedgerEntry>,
}

impl WriteSet {
    /// An empty write set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new player.
    #[must_use]
    pub fn insert_player(mut self, player: Player) -> Self {
        self.inserted_players.push(player);
        self
    }

    /// Add a conditional player update.
    #[must_use]
    pub fn update_player(mut self, player: Player) -> Self {
        self.updated_players.push(player);
        self
    }

    /// Add a new pet.
    #[must_use]
    pub fn insert_pet(mut self, pet: Pet) -> Self {
        self.inserted_pets.push(pet);
        self
    }

    /// Add a conditional pet update.
    #[must_use]
    pub fn update_pet(mut self, pet: Pet) -> Self {
        self.updated_pets.push(pet);
        self
    }

    /// Add a ledger entry, if any.
    #[must_use]
    pub fn ledger(mut self, entry: impl Into<Option<TokenLedgerEntry>>) -> Self {
        if let Some(entry) = entry.into() {
            self.ledger.push(entry);
        }
        self
    }

    /// Whether the set writes nothing.
    pub fn is_empty(&self) -> bool {
        self.inserted_players.is_empty()
            && self.updated_players.is_empty()
            && self.inserted_pets.is_empty()
            && self.updated_pets.is_empty()
            && self.ledger.is_empty()
    }

    /// Apply the version bumps a successful commit performs.
    pub(crate) fn into_committed(self) -> Committed {
        let players = self
            .inserted_players
            .into_iter()
            .map(|mut p| {
                p.version = 1;
                p
            })
            .chain(self.updated_players.into_iter().map(|mut p| {
                p.version = next_version(p.version);
                p
            }))
            .collect();
        let pets = self
            .inserted_pets
            .into_iter()
            .map(|mut p| {
                p.version = 1;
                p
            })
            .chain(self.updated_pets.into_iter().map(|mut p| {
                p.version = next_version(p.version);
                p
            }))
            .collect();
        Committed {
            players,
            pets,
            ledger: self.ledger,
        }
    }
}

/// The documents as stored after a successful commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Committed {
    /// Players with their new versions.
    pub players: Vec<Player>,
    /// Pets with their new versions.
    pub pets: Vec<Pet>,
    /// Ledger entries written.
    pub ledger: Vec<TokenLedgerEntry>,
}

impl Committed {
    /// The committed copy of player `id`.
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    /// The committed copy of pet `id`.
    pub fn pet(&self, id: PetId) -> Option<&Pet> {
        self.pets.iter().find(|p| p.id == id)
    }
}

// ---------------------------------------------------------------------------
// Backend dispatch
// ---------------------------------------------------------------------------

/// A record store backend.
#[derive(Clone)]
pub enum RecordStore {
    /// Process-local maps. Used by tests and local runs.
    Memory(MemoryStore),
    /// `PostgreSQL` documents.
    Postgres(PgRecordStore),
}

impl RecordStore {
    /// Human-readable name for logging.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::Postgres(_) => "postgres",
        }
    }

    /// Release backend connections. Call once, after every user of the
    /// store has stopped.
    pub async fn close(&self) {
        match self {
            Self::Memory(_) => {}
            Self::Postgres(s) => s.close().await,
        }
    }

    /// Point lookup of a pet.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend read fails.
    pub async fn get_pet(&self, id: PetId) -> Result<Option<Pet>, DbError> {
        match self {
            Self::Memory(s) => s.get_pet(id).await,
            Self::Postgres(s) => s.get_pet(id).await,
        }
    }

    /// Point lookup of a player.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend read fails.
    pub async fn get_player(&self, id: PlayerId) -> Result<Option<Player>, DbError> {
        match self {
            Self::Memory(s) => s.get_player(id).await,
            Self::Postgres(s) => s.get_player(id).await,
        }
    }

    /// Look up a player by wallet.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend read fails.
    pub async fn find_player_by_wallet(&self, wallet: &str) -> Result<Option<Player>, DbError> {
        match self {
            Self::Memory(s) => s.find_player_by_wallet(wallet).await,
            Self::Postgres(s) => s.find_player_by_wallet(wallet).await,
        }
    }

    /// All pets owned by `owner`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend read fails.
    pub async fn pets_by_owner(&self, owner: PlayerId) -> Result<Vec<Pet>, DbError> {
        match self {
            Self::Memory(s) => s.pets_by_owner(owner).await,
            Self::Postgres(s) => s.pets_by_owner(owner).await,
        }
    }

    /// All pets in Active status.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend read fails.
    pub async fn active_pets(&self) -> Result<Vec<Pet>, DbError> {
        match self {
            Self::Memory(s) => s.active_pets().await,
            Self::Postgres(s) => s.active_pets().await,
        }
    }

    /// Pets whose lifetime income is below their type's ceiling.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend read fails.
    pub async fn income_eligible_pets(&self) -> Result<Vec<Pet>, DbError> {
        match self {
            Self::Memory(s) => s.income_eligible_pets().await,
            Self::Postgres(s) => s.income_eligible_pets().await,
        }
    }

    /// Point lookup of a pet type.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend read fails.
    pub async fn get_pet_type(&self, id: PetTypeId) -> Result<Option<PetType>, DbError> {
        match self {
            Self::Memory(s) => s.get_pet_type(id).await,
            Self::Postgres(s) => s.get_pet_type(id).await,
        }
    }

    /// Every pet type, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend read fails.
    pub async fn pet_types(&self) -> Result<Vec<PetType>, DbError> {
        match self {
            Self::Memory(s) => s.pet_types().await,
            Self::Postgres(s) => s.pet_types().await,
        }
    }

    /// Look up a catalog item by key.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend read fails.
    pub async fn get_store_item(&self, key: &str) -> Result<Option<StoreItem>, DbError> {
        match self {
            Self::Memory(s) => s.get_store_item(key).await,
            Self::Postgres(s) => s.get_store_item(key).await,
        }
    }

    /// Every catalog item, ordered by key.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend read fails.
    pub async fn store_items(&self) -> Result<Vec<StoreItem>, DbError> {
        match self {
            Self::Memory(s) => s.store_items().await,
            Self::Postgres(s) => s.store_items().await,
        }
    }

    /// Ledger entries for `player`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend read fails.
    pub async fn ledger_for_player(
        &self,
        player: PlayerId,
    ) -> Result<Vec<TokenLedgerEntry>, DbError> {
        match self {
            Self::Memory(s) => s.ledger_for_player(player).await,
            Self::Postgres(s) => s.ledger_for_player(player).await,
        }
    }

    /// Conditionally replace a single pet. Returns the stored copy.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Conflict`] if the stored version differs from
    /// `pet.version`, [`DbError::NotFound`] if the pet does not exist, or a
    /// backend error.
    pub async fn update_pet(&self, pet: &Pet) -> Result<Pet, DbError> {
        match self {
            Self::Memory(s) => s.update_pet(pet).await,
            Self::Postgres(s) => s.update_pet(pet).await,
        }
    }

    /// Apply every write in `writes` atomically.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Conflict`] if any conditional update is stale,
    /// [`DbError::NotFound`] if an updated document does not exist, or a
    /// backend error. Nothing is written on error.
    pub async fn commit(&self, writes: WriteSet) -> Result<Committed, DbError> {
        match self {
            Self::Memory(s) => s.commit(writes).await,
            Self::Postgres(s) => s.commit(writes).await,
        }
    }

    /// Insert or replace a pet type (catalog seeding).
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend write fails.
    pub async fn upsert_pet_type(&self, pet_type: &PetType) -> Result<(), DbError> {
        match self {
            Self::Memory(s) => s.upsert_pet_type(pet_type).await,
            Self::Postgres(s) => s.upsert_pet_type(pet_type).await,
        }
    }

    /// Insert or replace a catalog item (catalog seeding).
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the backend write fails.
    pub async fn upsert_store_item(&self, item: &StoreItem) -> Result<(), DbError> {
        match self {
            Self::Memory(s) => s.upsert_store_item(item).await,
            Self::Postgres(s) => s.upsert_store_item(item).await,
        }
    }
}

impl From<MemoryStore> for RecordStore {
    fn from(store: MemoryStore) -> Self {
        Self::Memory(store)
    }
}

impl From<PgRecordStore> for RecordStore {
    fn from(store: PgRecordStore) -> Self {
        Self::Postgres(store)
    }
}
