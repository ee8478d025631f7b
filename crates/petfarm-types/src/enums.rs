//! Enumeration types shared across the workspace.
//!
//! Lifecycle stages, stats, item categories, ledger entry kinds, and the
//! typed rejection reasons returned to clients.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Pets
// ---------------------------------------------------------------------------

/// Growth stage of a pet.
///
/// The only transition is `Juvenile` to `Adult`, and it never reverses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum LifecycleStage {
    /// Newly created pet. Earns no income from the evolution pass.
    Juvenile,
    /// Grown pet. Terminal stage.
    Adult,
}

/// Whether a pet participates in the recurring simulation passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum PetStatus {
    /// Visible to the evolution and decay passes.
    Active,
    /// Parked administratively. Skipped by the evolution and decay passes.
    Inactive,
}

/// One of the three condition stats every pet carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Stat {
    /// Fullness. Restored by food.
    Hunger,
    /// Mood. Restored by toys.
    Happiness,
    /// Hygiene. Restored by cleaning items.
    Cleanliness,
}

impl Stat {
    /// All stats in a fixed order.
    pub const ALL: [Self; 3] = [Self::Hunger, Self::Happiness, Self::Cleanliness];
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Category of a store catalog item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ItemCategory {
    /// Restores hunger when fed.
    Food,
    /// Restores happiness when played with.
    Toy,
    /// Removes a poop and restores cleanliness.
    Cleaning,
    /// Decorative or otherwise inert item.
    Other,
}

impl ItemCategory {
    /// The stat items of this category restore, if any.
    pub const fn restores(self) -> Option<Stat> {
        match self {
            Self::Food => Some(Stat::Hunger),
            Self::Toy => Some(Stat::Happiness),
            Self::Cleaning => Some(Stat::Cleanliness),
            Self::Other => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Token ledger
// ---------------------------------------------------------------------------

/// Why a player's token balance moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum LedgerEntryKind {
    /// Tokens granted to a brand-new player.
    StarterGrant,
    /// Tokens spent on inventory items.
    PurchaseItem,
    /// Tokens spent on a new pet.
    PurchasePet,
    /// Tokens spent on food fed directly to a pet.
    Feed,
    /// Tokens spent on a cleaning item used directly on a pet.
    Clean,
    /// Tokens spent on a toy used directly on a pet.
    Play,
    /// Accrued pet income moved into the player balance.
    Claim,
}

// ---------------------------------------------------------------------------
// Rejections
// ---------------------------------------------------------------------------

/// The reason a player action was rejected.
///
/// A rejected action never mutates state and is never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum RejectionReason {
    /// The acting player has no record.
    UnknownPlayer,
    /// The target pet does not exist.
    UnknownPet,
    /// The requested pet type does not exist.
    UnknownPetType,
    /// The referenced store item does not exist.
    UnknownItem,
    /// The pet belongs to another player.
    NotOwner,
    /// The player cannot afford the action.
    InsufficientTokens,
    /// The player holds none of the referenced inventory item.
    OutOfStock,
    /// The item cannot be used for this action.
    WrongItemCategory,
    /// The stat is already above the configured allow threshold.
    StatAboveThreshold,
    /// The referenced poop is not on the pet.
    PoopNotFound,
    /// The pet already carries the maximum number of poops.
    PoopLimitReached,
    /// The pet has no accrued income to claim.
    NothingToClaim,
    /// A requested quantity was zero or overflowed.
    InvalidQuantity,
    /// The pet is not active.
    PetInactive,
    /// The player has no connected session.
    NoSession,
    /// No subscriber handled the request.
    Unhandled,
    /// The record store failed; the action was rolled back.
    StoreFailure,
}
