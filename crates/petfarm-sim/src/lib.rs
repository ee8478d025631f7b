//! Pure simulation rules for Petfarm pets.
//!
//! Everything here is deterministic given its inputs (randomness is passed
//! in as an [`rand::Rng`]) and performs no I/O. The record store, session
//! mirror, and scheduler live in `petfarm-core`.
//!
//! # Modules
//!
//! - [`decay`] -- Whole-hour stat decay with remainder carry
//! - [`growth`] -- Juvenile to Adult transition and income accrual
//! - [`poop`] -- Poop spawning and removal
//! - [`pet`] -- Pet construction and decay-rate rolls
//! - [`actions`] -- Validation and mutation for player actions
//! - [`config`] -- Tunable thresholds and limits
//! - [`error`] -- Typed rejections

pub mod actions;
pub mod config;
pub mod decay;
pub mod error;
pub mod growth;
pub mod pet;
pub mod poop;

pub use actions::{Cleaning, IncomeClaim, ItemPurchase, ItemUse, PetPurchase, Payment};
pub use config::RulesConfig;
pub use decay::{DecayOutcome, decay, decay_pet_stats, restore};
pub use error::Rejection;
pub use growth::{EvolutionOutcome, IncomeOutcome, evolution_step, income_step};
pub use pet::{PetOrigin, new_pet, roll_decay_rates};
