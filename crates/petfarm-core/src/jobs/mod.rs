//! The recurring simulation passes.
//!
//! Each pass loads its eligible pets, applies a pure step from
//! `petfarm-sim` to a working copy, and writes changed pets back with a
//! conditional update. A pet that fails (missing type, store error,
//! repeated conflict) is logged and counted; the rest of the batch carries
//! on. Only a failure to load the batch fails the attempt.
//!
//! # Modules
//!
//! - [`evolution`] -- Juvenile to Adult, then adult income
//! - [`income`] -- Income accrual for every pet below its lifetime ceiling
//! - [`decay`] -- Whole-hour stat decay

pub mod decay;
pub mod evolution;
pub mod income;

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use futures::future::BoxFuture;
use petfarm_db::{DbError, RecordStore};
use petfarm_types::{JobSummary, Pet, PetType, PetTypeId};

use crate::events::Notifier;
use crate::scheduler::{JobError, Runnable};
use crate::session::SessionRegistry;

/// Stable id of the evolution pass.
pub const EVOLUTION_JOB_ID: &str = "pets.evolution";
/// Stable id of the income pass.
pub const INCOME_JOB_ID: &str = "pets.income";
/// Stable id of the decay pass.
pub const DECAY_JOB_ID: &str = "pets.decay";

// ---------------------------------------------------------------------------
// Shared context
// ---------------------------------------------------------------------------

/// A record store that may not be connected yet.
#[derive(Clone, Default)]
pub struct StoreSlot {
    inner: Arc<OnceLock<RecordStore>>,
}

impl StoreSlot {
    /// An empty slot.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A slot already holding `store`.
    pub fn ready(store: RecordStore) -> Self {
        let slot = Self::empty();
        slot.set(store);
        slot
    }

    /// Fill the slot. Returns `false` if it was already filled.
    pub fn set(&self, store: RecordStore) -> bool {
        self.inner.set(store).is_ok()
    }

    /// The store, or [`JobError::StoreNotInitialized`].
    pub fn get(&self) -> Result<RecordStore, JobError> {
        self.inner.get().cloned().ok_or(JobError::StoreNotInitialized)
    }
}

/// What every pass needs.
#[derive(Clone)]
pub struct JobContext {
    /// The record store.
    pub store: StoreSlot,
    /// Open sessions to patch.
    pub sessions: Arc<SessionRegistry>,
    /// Outbound events.
    pub notifier: Notifier,
}

/// Pet types loaded once per pass.
struct TypeCache<'a> {
    store: &'a RecordStore,
    types: HashMap<PetTypeId, PetType>,
}

impl<'a> TypeCache<'a> {
    fn new(store: &'a RecordStore) -> Self {
        Self {
            store,
            types: HashMap::new(),
        }
    }

    async fn get(&mut self, id: PetTypeId) -> Result<PetType, DbError> {
        if let Some(pet_type) = self.types.get(&id) {
            return Ok(pet_type.clone());
        }
        let pet_type = self
            .store
            .get_pet_type(id)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("pet type {id}")))?;
        self.types.insert(id, pet_type.clone());
        Ok(pet_type)
    }
}

/// Apply `step` to a copy of `pet` and persist it if the step reports a
/// change. On a version conflict the pet is re-read and the step applied
/// once more to the fresh copy.
///
/// Returns the stored pet and the step's report, or `None` when nothing
/// changed.
async fn advance_pet<T, F>(
    store: &RecordStore,
    pet: &Pet,
    mut step: F,
) -> Result<Option<(Pet, T)>, DbError>
where
    F: FnMut(&mut Pet) -> Option<T>,
{
    let mut working = pet.clone();
    let Some(report) = step(&mut working) else {
        return Ok(None);
    };
    match store.update_pet(&working).await {
        Ok(stored) => Ok(Some((stored, report))),
        Err(e) if e.is_conflict() => {
            tracing::debug!(pet_id = %pet.id, "Pet changed during pass, re-reading");
            let mut fresh = store
                .get_pet(pet.id)
                .await?
                .ok_or_else(|| DbError::NotFound(format!("pet {}", pet.id)))?;
            let Some(report) = step(&mut fresh) else {
                return Ok(None);
            };
            let stored = store.update_pet(&fresh).await?;
            Ok(Some((stored, report)))
        }
        Err(e) => Err(e),
    }
}

/// Tally one pet's result into `summary`.
fn tally<T>(summary: &mut JobSummary, result: &Result<Option<T>, DbError>) {
    let counter = match result {
        Ok(Some(_)) => &mut summary.updated,
        Ok(None) => &mut summary.skipped,
        Err(_) => &mut summary.failed,
    };
    *counter = counter.saturating_add(1);
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// The three recurring passes.
#[derive(Clone)]
pub enum SimulationJob {
    /// Growth and adult income.
    Evolution(JobContext),
    /// Income below the lifetime ceiling.
    Income(JobContext),
    /// Stat decay.
    Decay(JobContext),
}

impl SimulationJob {
    /// The stable job id.
    pub const fn job_id(&self) -> &'static str {
        match self {
            Self::Evolution(_) => EVOLUTION_JOB_ID,
            Self::Income(_) => INCOME_JOB_ID,
            Self::Decay(_) => DECAY_JOB_ID,
        }
    }
}

impl Runnable for SimulationJob {
    fn name(&self) -> &'static str {
        self.job_id()
    }

    fn run(&self) -> BoxFuture<'_, Result<JobSummary, JobError>> {
        Box::pin(async move {
            match self {
                Self::Evolution(ctx) => evolution::run(ctx).await,
                Self::Income(ctx) => income::run(ctx).await,
                Self::Decay(ctx) => decay::run(ctx).await,
            }
        })
    }
}
