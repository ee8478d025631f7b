//! Core document structs: pets, pet types, poops, players, store items,
//! and token ledger entries.
//!
//! These are the shapes persisted in the record store and mirrored into
//! connected sessions. Every mutable document carries a `version` that the
//! store increments on each persisted write; conditional updates compare it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{ItemCategory, LedgerEntryKind, LifecycleStage, PetStatus, Stat};
use crate::ids::{LedgerEntryId, PetId, PetTypeId, PlayerId, PoopId, StoreItemId};

/// Upper bound of every stat.
pub const MAX_STAT: u32 = 100;

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// A single stat value with its decay checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct StatValue {
    /// Current value in `[0, 100]`.
    pub value: u32,
    /// Decay checkpoint. Advances in whole hours only.
    pub last_update: DateTime<Utc>,
}

impl StatValue {
    /// Create a stat at `value` (clamped to 100) checkpointed at `at`.
    pub fn new(value: u32, at: DateTime<Utc>) -> Self {
        Self {
            value: value.min(MAX_STAT),
            last_update: at,
        }
    }
}

/// The three condition stats of a pet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PetStats {
    /// Fullness.
    pub hunger: StatValue,
    /// Mood.
    pub happiness: StatValue,
    /// Hygiene.
    pub cleanliness: StatValue,
}

impl PetStats {
    /// All stats at 100, checkpointed at `at`.
    pub fn full(at: DateTime<Utc>) -> Self {
        Self {
            hunger: StatValue::new(MAX_STAT, at),
            happiness: StatValue::new(MAX_STAT, at),
            cleanliness: StatValue::new(MAX_STAT, at),
        }
    }

    /// Stats initialised from a pet type's defaults.
    pub fn from_defaults(defaults: &DefaultStats, at: DateTime<Utc>) -> Self {
        Self {
            hunger: StatValue::new(defaults.hunger, at),
            happiness: StatValue::new(defaults.happiness, at),
            cleanliness: StatValue::new(defaults.cleanliness, at),
        }
    }

    /// Borrow one stat.
    pub const fn get(&self, stat: Stat) -> &StatValue {
        match stat {
            Stat::Hunger => &self.hunger,
            Stat::Happiness => &self.happiness,
            Stat::Cleanliness => &self.cleanliness,
        }
    }

    /// Mutably borrow one stat.
    pub const fn get_mut(&mut self, stat: Stat) -> &mut StatValue {
        match stat {
            Stat::Hunger => &mut self.hunger,
            Stat::Happiness => &mut self.happiness,
            Stat::Cleanliness => &mut self.cleanliness,
        }
    }
}

/// Starting stat values for a pet type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DefaultStats {
    /// Starting hunger.
    pub hunger: u32,
    /// Starting happiness.
    pub happiness: u32,
    /// Starting cleanliness.
    pub cleanliness: u32,
}

impl Default for DefaultStats {
    fn default() -> Self {
        Self {
            hunger: MAX_STAT,
            happiness: MAX_STAT,
            cleanliness: MAX_STAT,
        }
    }
}

/// Inclusive range a per-hour decay rate is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DecayRange {
    /// Lowest rate, points per hour.
    pub min_per_hour: u32,
    /// Highest rate, points per hour.
    pub max_per_hour: u32,
}

/// Per-stat decay ranges of a pet type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DecayRanges {
    /// Hunger decay range.
    pub hunger: DecayRange,
    /// Happiness decay range.
    pub happiness: DecayRange,
    /// Cleanliness decay range.
    pub cleanliness: DecayRange,
}

impl DecayRanges {
    /// Borrow the range for one stat.
    pub const fn get(&self, stat: Stat) -> &DecayRange {
        match stat {
            Stat::Hunger => &self.hunger,
            Stat::Happiness => &self.happiness,
            Stat::Cleanliness => &self.cleanliness,
        }
    }
}

/// Decay rates fixed on a pet when it is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DecayRates {
    /// Hunger points lost per hour.
    pub hunger: u32,
    /// Happiness points lost per hour.
    pub happiness: u32,
    /// Cleanliness points lost per hour.
    pub cleanliness: u32,
}

impl DecayRates {
    /// The rate for one stat.
    pub const fn get(&self, stat: Stat) -> u32 {
        match stat {
            Stat::Hunger => self.hunger,
            Stat::Happiness => self.happiness,
            Stat::Cleanliness => self.cleanliness,
        }
    }
}

// ---------------------------------------------------------------------------
// Pet types
// ---------------------------------------------------------------------------

/// A species definition. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PetType {
    /// Unique identifier.
    pub id: PetTypeId,
    /// Display name, unique across the catalog.
    pub name: String,
    /// Starting stats for starter-grant pets.
    pub default_stats: DefaultStats,
    /// Per-stat decay ranges.
    pub decay: DecayRanges,
    /// Minutes required for one growth/income cycle.
    pub time_natural_minutes: u64,
    /// Tokens earned per full cycle.
    pub income_per_claim: u64,
    /// Ceiling on unclaimed `token_income`.
    pub max_income_per_claim: u64,
    /// Lifetime ceiling on `total_income`.
    pub max_income: u64,
    /// Tokens charged to buy a pet of this type.
    pub cost: u64,
}

// ---------------------------------------------------------------------------
// Poops
// ---------------------------------------------------------------------------

/// A waste object attached to a pet. Removed exactly once by cleaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Poop {
    /// Unique identifier.
    pub id: PoopId,
    /// The pet it belongs to.
    pub pet_id: PetId,
    /// Horizontal position, display only.
    pub x: u32,
    /// Vertical position, display only.
    pub y: u32,
    /// When it appeared.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Pets
// ---------------------------------------------------------------------------

/// A persistent virtual creature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Pet {
    /// Unique identifier.
    pub id: PetId,
    /// Owning player.
    pub owner_id: PlayerId,
    /// Species.
    pub pet_type_id: PetTypeId,
    /// Display name.
    pub name: String,
    /// Condition stats with decay checkpoints.
    pub stats: PetStats,
    /// Decay rates drawn from the type's ranges at creation.
    pub decay_rates: DecayRates,
    /// Growth stage.
    pub lifecycle_stage: LifecycleStage,
    /// Participation in the recurring passes.
    pub status: PetStatus,
    /// Unclaimed income.
    pub token_income: u64,
    /// Lifetime income. Never decreases.
    pub total_income: u64,
    /// Last income accrual. `None` until the first accrual.
    pub last_claim: Option<DateTime<Utc>>,
    /// Outstanding poops, oldest first.
    pub poops: Vec<Poop>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Optimistic concurrency counter.
    pub version: u64,
}

impl Pet {
    /// The timestamp income and growth are measured from.
    pub fn claim_anchor(&self) -> DateTime<Utc> {
        self.last_claim.unwrap_or(self.created_at)
    }

    /// Whether a poop with `id` is on this pet.
    pub fn has_poop(&self, id: PoopId) -> bool {
        self.poops.iter().any(|p| p.id == id)
    }
}

// ---------------------------------------------------------------------------
// Players
// ---------------------------------------------------------------------------

/// Quantity of one item held by a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct InventoryEntry {
    /// Units currently held.
    pub quantity: u32,
    /// Units ever acquired.
    pub total_acquired: u32,
}

/// A player account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Player {
    /// Unique identifier.
    pub id: PlayerId,
    /// Wallet or session key the player authenticates with.
    pub wallet: String,
    /// Spendable token balance.
    pub tokens: u64,
    /// Item key to held quantity.
    pub inventory: BTreeMap<String, InventoryEntry>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Optimistic concurrency counter.
    pub version: u64,
}

impl Player {
    /// Units of `item_key` currently held.
    pub fn quantity_of(&self, item_key: &str) -> u32 {
        self.inventory.get(item_key).map_or(0, |e| e.quantity)
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// The stat an item restores and by how much.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct StatEffect {
    /// Stat restored.
    pub stat: Stat,
    /// Points restored, capped at 100 on application.
    pub amount: u32,
}

/// A catalog item. Read-only to the simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct StoreItem {
    /// Unique identifier.
    pub id: StoreItemId,
    /// Stable lookup key, also the inventory key.
    pub key: String,
    /// Display name.
    pub name: String,
    /// Item category.
    pub category: ItemCategory,
    /// Token price per unit.
    pub cost: u64,
    /// Stat restored when used.
    pub effect: Option<StatEffect>,
}

// ---------------------------------------------------------------------------
// Token ledger
// ---------------------------------------------------------------------------

/// One movement of a player's token balance.
///
/// Written in the same transaction as the balance change it records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TokenLedgerEntry {
    /// Unique identifier.
    pub id: LedgerEntryId,
    /// Player whose balance moved.
    pub player_id: PlayerId,
    /// Pet involved, if any.
    pub pet_id: Option<PetId>,
    /// Category of movement.
    pub kind: LedgerEntryKind,
    /// Signed change: negative for debits.
    pub amount: i64,
    /// Free-form reason.
    pub reason: String,
    /// When it was recorded.
    pub created_at: DateTime<Utc>,
}

impl TokenLedgerEntry {
    /// Build a debit entry of `amount` tokens.
    pub fn debit(
        player_id: PlayerId,
        pet_id: Option<PetId>,
        kind: LedgerEntryKind,
        amount: u64,
        reason: String,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: LedgerEntryId::new(),
            player_id,
            pet_id,
            kind,
            amount: i64::try_from(amount).map_or(i64::MIN, |a| a.saturating_neg()),
            reason,
            created_at: at,
        }
    }

    /// Build a credit entry of `amount` tokens.
    pub fn credit(
        player_id: PlayerId,
        pet_id: Option<PetId>,
        kind: LedgerEntryKind,
        amount: u64,
        reason: String,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: LedgerEntryId::new(),
            player_id,
            pet_id,
            kind,
            amount: i64::try_from(amount).unwrap_or(i64::MAX),
            reason,
            created_at: at,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn stat_value_clamps_on_construction() {
        let stat = StatValue::new(250, Utc::now());
        assert_eq!(stat.value, MAX_STAT);
    }

    #[test]
    fn claim_anchor_falls_back_to_creation() {
        let now = Utc::now();
        let pet = Pet {
            id: PetId::new(),
            owner_id: PlayerId::new(),
            pet_type_id: PetTypeId::new(),
            name: String::from("Mochi"),
            stats: PetStats::full(now),
            decay_rates: DecayRates::default(),
            lifecycle_stage: LifecycleStage::Juvenile,
            status: PetStatus::Active,
            token_income: 0,
            total_income: 0,
            last_claim: None,
            poops: Vec::new(),
            created_at: now,
            version: 0,
        };
        assert_eq!(pet.claim_anchor(), now);
    }

    #[test]
    fn ledger_debit_is_negative() {
        let entry = TokenLedgerEntry::debit(
            PlayerId::new(),
            None,
            LedgerEntryKind::PurchaseItem,
            25,
            String::from("apple x1"),
            Utc::now(),
        );
        assert_eq!(entry.amount, -25);
    }

    #[test]
    fn pet_round_trips_through_json() {
        let now = Utc::now();
        let mut inventory = BTreeMap::new();
        inventory.insert(
            String::from("apple"),
            InventoryEntry {
                quantity: 2,
                total_acquired: 5,
            },
        );
        let player = Player {
            id: PlayerId::new(),
            wallet: String::from("0xabc"),
            tokens: 10,
            inventory,
            created_at: now,
            version: 3,
        };
        let json = serde_json::to_string(&player).unwrap();
        let back: Player = serde_json::from_str(&json).unwrap();
        assert_eq!(back, player);
        assert_eq!(back.quantity_of("apple"), 2);
        assert_eq!(back.quantity_of("ball"), 0);
    }
}
