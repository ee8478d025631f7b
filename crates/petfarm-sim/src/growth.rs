//! Growth (Juvenile to Adult) and income accrual steps.
//!
//! Both recurring passes measure whole minutes since the pet's claim anchor
//! (`last_claim`, or creation when unset) against the type's
//! `time_natural_minutes`. Income for a pass is
//!
//! ```text
//! raw = floor(elapsed_minutes * income_per_claim / time_natural_minutes)
//! ```
//!
//! and is then clamped so that neither ceiling can be crossed:
//!
//! ```text
//! increment = min(raw,
//!                 max_income_per_claim - token_income,
//!                 max_income - total_income)          (floored at 0)
//! ```
//!
//! The same clamp is used by the evolution pass and the income pass, so a
//! pet can never end a pass above either ceiling regardless of which pass
//! reached it first. Every accrual moves `last_claim` to "now", which makes
//! a second pass in the same cycle a no-op.

use chrono::{DateTime, Utc};
use petfarm_types::{LifecycleStage, Pet, PetType};

/// Seconds in one growth minute.
const SECONDS_PER_MINUTE: i64 = 60;

/// What the evolution pass did to one pet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvolutionOutcome {
    /// Not enough time since the claim anchor.
    NotDue {
        /// Whole minutes elapsed.
        elapsed_minutes: u64,
    },
    /// The pet became an adult. No income this pass.
    Evolved,
    /// Income was added.
    Accrued {
        /// Tokens added to both counters.
        increment: u64,
    },
    /// An adult whose income is at a ceiling.
    Capped,
}

impl EvolutionOutcome {
    /// Whether the pet document changed and must be persisted.
    pub const fn changed(self) -> bool {
        matches!(self, Self::Evolved | Self::Accrued { .. })
    }
}

/// What the income pass did to one pet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncomeOutcome {
    /// Not enough time since the claim anchor.
    NotDue {
        /// Whole minutes elapsed.
        elapsed_minutes: u64,
    },
    /// Income was added.
    Accrued {
        /// Tokens added to both counters.
        increment: u64,
    },
    /// Income is at a ceiling.
    Capped,
}

impl IncomeOutcome {
    /// Whether the pet document changed and must be persisted.
    pub const fn changed(self) -> bool {
        matches!(self, Self::Accrued { .. })
    }
}

/// Whole minutes from `since` to `now`. Negative spans count as zero.
pub fn elapsed_minutes(since: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let secs = now.signed_duration_since(since).num_seconds().max(0);
    let minutes = secs.checked_div(SECONDS_PER_MINUTE).unwrap_or(0);
    u64::try_from(minutes).unwrap_or(0)
}

/// Unclamped income for `elapsed_minutes`.
///
/// Zero when the type has no cycle length.
pub fn raw_increment(elapsed_minutes: u64, pet_type: &PetType) -> u64 {
    let scaled = u128::from(elapsed_minutes).saturating_mul(u128::from(pet_type.income_per_claim));
    let cycles = scaled
        .checked_div(u128::from(pet_type.time_natural_minutes))
        .unwrap_or(0);
    u64::try_from(cycles).unwrap_or(u64::MAX)
}

/// Clamp `raw` so that neither income ceiling is exceeded.
pub fn clamp_increment(raw: u64, pet: &Pet, pet_type: &PetType) -> u64 {
    let claim_headroom = pet_type
        .max_income_per_claim
        .saturating_sub(pet.token_income);
    let lifetime_headroom = pet_type.max_income.saturating_sub(pet.total_income);
    raw.min(claim_headroom).min(lifetime_headroom)
}

/// Whether a full cycle has passed since the claim anchor.
fn cycle_elapsed(pet: &Pet, pet_type: &PetType, now: DateTime<Utc>) -> Result<u64, u64> {
    let elapsed = elapsed_minutes(pet.claim_anchor(), now);
    if pet_type.time_natural_minutes == 0 || elapsed < pet_type.time_natural_minutes {
        Err(elapsed)
    } else {
        Ok(elapsed)
    }
}

/// Add `increment` to both counters and move the claim anchor.
fn accrue(pet: &mut Pet, increment: u64, now: DateTime<Utc>) {
    pet.token_income = pet.token_income.saturating_add(increment);
    pet.total_income = pet.total_income.saturating_add(increment);
    pet.last_claim = Some(now);
}

/// Run one evolution pass over `pet`.
///
/// A due juvenile becomes an adult and earns nothing this pass; its claim
/// anchor is left alone. A due adult below the per-claim ceiling accrues
/// the clamped increment.
pub fn evolution_step(pet: &mut Pet, pet_type: &PetType, now: DateTime<Utc>) -> EvolutionOutcome {
    let elapsed = match cycle_elapsed(pet, pet_type, now) {
        Ok(elapsed) => elapsed,
        Err(elapsed_minutes) => return EvolutionOutcome::NotDue { elapsed_minutes },
    };

    if pet.lifecycle_stage == LifecycleStage::Juvenile {
        pet.lifecycle_stage = LifecycleStage::Adult;
        return EvolutionOutcome::Evolved;
    }

    if pet.token_income >= pet_type.max_income_per_claim {
        return EvolutionOutcome::Capped;
    }

    let increment = clamp_increment(raw_increment(elapsed, pet_type), pet, pet_type);
    if increment == 0 {
        return EvolutionOutcome::Capped;
    }
    accrue(pet, increment, now);
    EvolutionOutcome::Accrued { increment }
}

/// Run one income pass over `pet`, regardless of lifecycle stage.
pub fn income_step(pet: &mut Pet, pet_type: &PetType, now: DateTime<Utc>) -> IncomeOutcome {
    if pet.total_income >= pet_type.max_income {
        return IncomeOutcome::Capped;
    }

    let elapsed = match cycle_elapsed(pet, pet_type, now) {
        Ok(elapsed) => elapsed,
        Err(elapsed_minutes) => return IncomeOutcome::NotDue { elapsed_minutes },
    };

    let increment = clamp_increment(raw_increment(elapsed, pet_type), pet, pet_type);
    if increment == 0 {
        return IncomeOutcome::Capped;
    }
    accrue(pet, increment, now);
    IncomeOutcome::Accrued { increment }
}
