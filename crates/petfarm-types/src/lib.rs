//! Shared type definitions for the Petfarm simulation.
//!
//! This crate is the single source of truth for all document and message
//! types used across the workspace. Client-facing types flow to `TypeScript`
//! via `ts-rs`.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for all identifiers
//! - [`enums`] -- Lifecycle stages, stats, item categories, rejection reasons
//! - [`structs`] -- Persisted documents (pets, pet types, players, items, ledger)
//! - [`messages`] -- Client actions, acknowledgments, and server events
//! - [`jobs`] -- Recurring job options, repeat definitions, execution history

pub mod enums;
pub mod ids;
pub mod jobs;
pub mod messages;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{ItemCategory, LedgerEntryKind, LifecycleStage, PetStatus, RejectionReason, Stat};
pub use ids::{LedgerEntryId, PetId, PetTypeId, PlayerId, PoopId, RequestId, StoreItemId};
pub use jobs::{
    Backoff, BackoffKind, ExecutionOutcome, ExecutionRecord, JobOptions, JobSummary,
    RepeatDefinition,
};
pub use messages::{Ack, ClientAction, Envelope, Outbound, ServerEvent, Topic};
pub use structs::{
    DecayRange, DecayRanges, DecayRates, DefaultStats, InventoryEntry, MAX_STAT, Pet, PetStats,
    PetType, Player, Poop, StatEffect, StatValue, StoreItem, TokenLedgerEntry,
};

#[cfg(test)]
mod tests {
    //! Integration tests for type exports and `TypeScript` binding generation.

    #[test]
    fn export_bindings() {
        // ts-rs writes bindings for every #[ts(export)] type; exporting the
        // roots pulls in their dependencies.
        use ts_rs::TS;

        let _ = crate::structs::Pet::export_all();
        let _ = crate::structs::PetType::export_all();
        let _ = crate::structs::Player::export_all();
        let _ = crate::structs::StoreItem::export_all();
        let _ = crate::structs::TokenLedgerEntry::export_all();
        let _ = crate::messages::Envelope::export_all();
        let _ = crate::messages::Outbound::export_all();
        let _ = crate::jobs::RepeatDefinition::export_all();
        let _ = crate::jobs::ExecutionRecord::export_all();
    }
}
