//! `PostgreSQL` record store.
//!
//! Documents live in JSONB `doc` columns; the columns the store filters or
//! version-checks on (`owner_id`, `status`, `total_income`, `version`, ...)
//! are written alongside on every insert and update. Conditional updates use
//! `WHERE id = $1 AND version = $expected` and treat zero affected rows as a
//! conflict (or a missing row). A [`WriteSet`] runs inside one transaction,
//! which is dropped (rolled back) on the first failing statement.
//!
//! Uses runtime query construction, like the rest of the data layer.

use chrono::{DateTime, Utc};
use petfarm_types::{
    LedgerEntryId, LedgerEntryKind, Pet, PetId, PetStatus, PetType, PetTypeId, Player, PlayerId,
    StoreItem, TokenLedgerEntry,
};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::DbError;
use crate::store::{Committed, WriteSet};

/// Convert a non-negative counter to a `BIGINT`, saturating.
fn to_db_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Convert a [`PetStatus`] to its column value.
const fn status_to_db(status: PetStatus) -> &'static str {
    match status {
        PetStatus::Active => "active",
        PetStatus::Inactive => "inactive",
    }
}

/// Convert a [`LedgerEntryKind`] to its column value.
const fn kind_to_db(kind: LedgerEntryKind) -> &'static str {
    match kind {
        LedgerEntryKind::StarterGrant => "starter_grant",
        LedgerEntryKind::PurchaseItem => "purchase_item",
        LedgerEntryKind::PurchasePet => "purchase_pet",
        LedgerEntryKind::Feed => "feed",
        LedgerEntryKind::Clean => "clean",
        LedgerEntryKind::Play => "play",
        LedgerEntryKind::Claim => "claim",
    }
}

/// Parse a ledger `kind` column value.
fn kind_from_db(kind: &str) -> Result<LedgerEntryKind, DbError> {
    match kind {
        "starter_grant" => Ok(LedgerEntryKind::StarterGrant),
        "purchase_item" => Ok(LedgerEntryKind::PurchaseItem),
        "purchase_pet" => Ok(LedgerEntryKind::PurchasePet),
        "feed" => Ok(LedgerEntryKind::Feed),
        "clean" => Ok(LedgerEntryKind::Clean),
        "play" => Ok(LedgerEntryKind::Play),
        "claim" => Ok(LedgerEntryKind::Claim),
        other => Err(DbError::Config(format!("unknown ledger kind in database: {other}"))),
    }
}

/// A row from the `token_ledger` table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct LedgerRow {
    id: Uuid,
    player_id: Uuid,
    pet_id: Option<Uuid>,
    kind: String,
    amount: i64,
    reason: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<LedgerRow> for TokenLedgerEntry {
    type Error = DbError;

    fn try_from(row: LedgerRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: LedgerEntryId::from(row.id),
            player_id: PlayerId::from(row.player_id),
            pet_id: row.pet_id.map(PetId::from),
            kind: kind_from_db(&row.kind)?,
            amount: row.amount,
            reason: row.reason,
            created_at: row.created_at,
        })
    }
}

/// Record store backed by `PostgreSQL`.
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    /// Create a store over an existing pool.
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Close the pool, waiting for checked-out connections to return.
    pub(crate) async fn close(&self) {
        self.pool.close().await;
        tracing::info!("PostgreSQL pool closed");
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub(crate) async fn get_pet(&self, id: PetId) -> Result<Option<Pet>, DbError> {
        let doc = sqlx::query_scalar::<_, Json<Pet>>("SELECT doc FROM pets WHERE id = $1")
            .bind(id.into_inner())
            .fetch_optional(&self.pool)
            .await?;
        Ok(doc.map(|Json(pet)| pet))
    }

    pub(crate) async fn get_player(&self, id: PlayerId) -> Result<Option<Player>, DbError> {
        let doc = sqlx::query_scalar::<_, Json<Player>>("SELECT doc FROM players WHERE id = $1")
            .bind(id.into_inner())
            .fetch_optional(&self.pool)
            .await?;
        Ok(doc.map(|Json(player)| player))
    }

    pub(crate) async fn find_player_by_wallet(
        &self,
        wallet: &str,
    ) -> Result<Option<Player>, DbError> {
        let doc =
            sqlx::query_scalar::<_, Json<Player>>("SELECT doc FROM players WHERE wallet = $1")
                .bind(wallet)
                .fetch_optional(&self.pool)
                .await?;
        Ok(doc.map(|Json(player)| player))
    }

    pub(crate) async fn pets_by_owner(&self, owner: PlayerId) -> Result<Vec<Pet>, DbError> {
        let docs = sqlx::query_scalar::<_, Json<Pet>>(
            "SELECT doc FROM pets WHERE owner_id = $1 ORDER BY created_at",
        )
        .bind(owner.into_inner())
        .fetch_all(&self.pool)
        .await?;
        Ok(docs.into_iter().map(|Json(pet)| pet).collect())
    }

    pub(crate) async fn active_pets(&self) -> Result<Vec<Pet>, DbError> {
        let docs = sqlx::query_scalar::<_, Json<Pet>>(
            "SELECT doc FROM pets WHERE status = $1 ORDER BY id",
        )
        .bind(status_to_db(PetStatus::Active))
        .fetch_all(&self.pool)
        .await?;
        Ok(docs.into_iter().map(|Json(pet)| pet).collect())
    }

    pub(crate) async fn income_eligible_pets(&self) -> Result<Vec<Pet>, DbError> {
        let docs = sqlx::query_scalar::<_, Json<Pet>>(
            r"SELECT p.doc FROM pets p
              JOIN pet_types t ON t.id = p.pet_type_id
              WHERE p.total_income < t.max_income
              ORDER BY p.id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(docs.into_iter().map(|Json(pet)| pet).collect())
    }

    pub(crate) async fn get_pet_type(&self, id: PetTypeId) -> Result<Option<PetType>, DbError> {
        let doc = sqlx::query_scalar::<_, Json<PetType>>("SELECT doc FROM pet_types WHERE id = $1")
            .bind(id.into_inner())
            .fetch_optional(&self.pool)
            .await?;
        Ok(doc.map(|Json(t)| t))
    }

    pub(crate) async fn pet_types(&self) -> Result<Vec<PetType>, DbError> {
        let docs = sqlx::query_scalar::<_, Json<PetType>>("SELECT doc FROM pet_types ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(docs.into_iter().map(|Json(t)| t).collect())
    }

    pub(crate) async fn get_store_item(&self, key: &str) -> Result<Option<StoreItem>, DbError> {
        let doc = sqlx::query_scalar::<_, Json<StoreItem>>("SELECT doc FROM store_items WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(doc.map(|Json(item)| item))
    }

    pub(crate) async fn store_items(&self) -> Result<Vec<StoreItem>, DbError> {
        let docs = sqlx::query_scalar::<_, Json<StoreItem>>("SELECT doc FROM store_items ORDER BY key")
            .fetch_all(&self.pool)
            .await?;
        Ok(docs.into_iter().map(|Json(item)| item).collect())
    }

    pub(crate) async fn ledger_for_player(
        &self,
        player: PlayerId,
    ) -> Result<Vec<TokenLedgerEntry>, DbError> {
        let rows = sqlx::query_as::<_, LedgerRow>(
            r"SELECT id, player_id, pet_id, kind, amount, reason, created_at
              FROM token_ledger
              WHERE player_id = $1
              ORDER BY created_at, id",
        )
        .bind(player.into_inner())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TokenLedgerEntry::try_from).collect()
    }

    // =========================================================================
    // Writes
    // =========================================================================

    pub(crate) async fn update_pet(&self, pet: &Pet) -> Result<Pet, DbError> {
        let mut conn = self.pool.acquire().await?;
        let committed = WriteSet::new().update_pet(pet.clone()).into_committed();
        let stored = committed
            .pets
            .into_iter()
            .next()
            .ok_or_else(|| DbError::NotFound(format!("pet {}", pet.id)))?;
        update_pet_row(&mut conn, &stored, pet.version).await?;
        Ok(stored)
    }

    pub(crate) async fn commit(&self, writes: WriteSet) -> Result<Committed, DbError> {
        let inserted_players = writes.inserted_players.len();
        let inserted_pets = writes.inserted_pets.len();
        let expected_players: Vec<u64> = writes.updated_players.iter().map(|p| p.version).collect();
        let expected_pets: Vec<u64> = writes.updated_pets.iter().map(|p| p.version).collect();
        let committed = writes.into_committed();

        let mut tx = self.pool.begin().await?;

        let (new_players, updated_players) = committed.players.split_at(inserted_players);
        for player in new_players {
            insert_player_row(&mut tx, player).await?;
        }
        for (player, expected) in updated_players.iter().zip(expected_players) {
            update_player_row(&mut tx, player, expected).await?;
        }

        let (new_pets, updated_pets) = committed.pets.split_at(inserted_pets);
        for pet in new_pets {
            insert_pet_row(&mut tx, pet).await?;
        }
        for (pet, expected) in updated_pets.iter().zip(expected_pets) {
            update_pet_row(&mut tx, pet, expected).await?;
        }

        for entry in &committed.ledger {
            insert_ledger_row(&mut tx, entry).await?;
        }

        tx.commit().await?;
        tracing::debug!(
            players = committed.players.len(),
            pets = committed.pets.len(),
            ledger = committed.ledger.len(),
            "Committed write set"
        );
        Ok(committed)
    }

    pub(crate) async fn upsert_pet_type(&self, pet_type: &PetType) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO pet_types (id, name, max_income, doc)
              VALUES ($1, $2, $3, $4)
              ON CONFLICT (id) DO UPDATE
              SET name = EXCLUDED.name, max_income = EXCLUDED.max_income, doc = EXCLUDED.doc",
        )
        .bind(pet_type.id.into_inner())
        .bind(&pet_type.name)
        .bind(to_db_int(pet_type.max_income))
        .bind(Json(pet_type))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub(crate) async fn upsert_store_item(&self, item: &StoreItem) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO store_items (id, key, doc)
              VALUES ($1, $2, $3)
              ON CONFLICT (id) DO UPDATE SET key = EXCLUDED.key, doc = EXCLUDED.doc",
        )
        .bind(item.id.into_inner())
        .bind(&item.key)
        .bind(Json(item))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

// =============================================================================
// Row writers
// =============================================================================

async fn insert_player_row(conn: &mut PgConnection, player: &Player) -> Result<(), DbError> {
    let result = sqlx::query(
        r"INSERT INTO players (id, wallet, version, doc, created_at)
          VALUES ($1, $2, $3, $4, $5)
          ON CONFLICT DO NOTHING",
    )
    .bind(player.id.into_inner())
    .bind(&player.wallet)
    .bind(to_db_int(player.version))
    .bind(Json(player))
    .bind(player.created_at)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::Conflict {
            collection: "players",
            id: player.id.to_string(),
            expected: 0,
        });
    }
    Ok(())
}

async fn update_player_row(
    conn: &mut PgConnection,
    player: &Player,
    expected: u64,
) -> Result<(), DbError> {
    let result = sqlx::query(
        r"UPDATE players SET wallet = $2, version = $3, doc = $4
          WHERE id = $1 AND version = $5",
    )
    .bind(player.id.into_inner())
    .bind(&player.wallet)
    .bind(to_db_int(player.version))
    .bind(Json(player))
    .bind(to_db_int(expected))
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(missing_or_conflict(conn, "players", player.id.into_inner(), expected).await);
    }
    Ok(())
}

async fn insert_pet_row(conn: &mut PgConnection, pet: &Pet) -> Result<(), DbError> {
    let result = sqlx::query(
        r"INSERT INTO pets (id, owner_id, pet_type_id, status, total_income, version, doc, created_at)
          VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
          ON CONFLICT DO NOTHING",
    )
    .bind(pet.id.into_inner())
    .bind(pet.owner_id.into_inner())
    .bind(pet.pet_type_id.into_inner())
    .bind(status_to_db(pet.status))
    .bind(to_db_int(pet.total_income))
    .bind(to_db_int(pet.version))
    .bind(Json(pet))
    .bind(pet.created_at)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::Conflict {
            collection: "pets",
            id: pet.id.to_string(),
            expected: 0,
        });
    }
    Ok(())
}

async fn update_pet_row(conn: &mut PgConnection, pet: &Pet, expected: u64) -> Result<(), DbError> {
    let result = sqlx::query(
        r"UPDATE pets SET owner_id = $2, status = $3, total_income = $4, version = $5, doc = $6
          WHERE id = $1 AND version = $7",
    )
    .bind(pet.id.into_inner())
    .bind(pet.owner_id.into_inner())
    .bind(status_to_db(pet.status))
    .bind(to_db_int(pet.total_income))
    .bind(to_db_int(pet.version))
    .bind(Json(pet))
    .bind(to_db_int(expected))
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(missing_or_conflict(conn, "pets", pet.id.into_inner(), expected).await);
    }
    Ok(())
}

async fn insert_ledger_row(conn: &mut PgConnection, entry: &TokenLedgerEntry) -> Result<(), DbError> {
    sqlx::query(
        r"INSERT INTO token_ledger (id, player_id, pet_id, kind, amount, reason, created_at)
          VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(entry.id.into_inner())
    .bind(entry.player_id.into_inner())
    .bind(entry.pet_id.map(PetId::into_inner))
    .bind(kind_to_db(entry.kind))
    .bind(entry.amount)
    .bind(&entry.reason)
    .bind(entry.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Tell a stale version apart from a missing row after a zero-row update.
async fn missing_or_conflict(
    conn: &mut PgConnection,
    collection: &'static str,
    id: Uuid,
    expected: u64,
) -> DbError {
    let query = match collection {
        "players" => "SELECT EXISTS (SELECT 1 FROM players WHERE id = $1)",
        _ => "SELECT EXISTS (SELECT 1 FROM pets WHERE id = $1)",
    };
    match sqlx::query_scalar::<_, bool>(query)
        .bind(id)
        .fetch_one(&mut *conn)
        .await
    {
        Ok(true) => DbError::Conflict {
            collection,
            id: id.to_string(),
            expected,
        },
        Ok(false) => DbError::NotFound(format!("{collection} {id}")),
        Err(e) => DbError::Postgres(e),
    }
}
