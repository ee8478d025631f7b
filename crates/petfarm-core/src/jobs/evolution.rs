//! Evolution pass: Juvenile to Adult, then income for adults.
//!
//! Runs over every Active pet. A due juvenile becomes an adult without
//! earning; a due adult below its per-claim ceiling accrues the clamped
//! increment and moves its claim anchor to now.

use chrono::Utc;
use petfarm_sim::{EvolutionOutcome, evolution_step};
use petfarm_types::JobSummary;

use super::{JobContext, TypeCache, advance_pet, tally};
use crate::scheduler::JobError;

/// Run one evolution pass.
pub async fn run(ctx: &JobContext) -> Result<JobSummary, JobError> {
    let store = ctx.store.get()?;
    let pets = store.active_pets().await?;
    let now = Utc::now();
    let mut types = TypeCache::new(&store);
    let mut summary = JobSummary::default();

    for pet in &pets {
        summary.examined = summary.examined.saturating_add(1);
        let result = match types.get(pet.pet_type_id).await {
            Ok(pet_type) => {
                advance_pet(&store, pet, |p| {
                    let outcome = evolution_step(p, &pet_type, now);
                    outcome.changed().then_some(outcome)
                })
                .await
            }
            Err(e) => Err(e),
        };
        tally(&mut summary, &result);

        match result {
            Ok(Some((stored, EvolutionOutcome::Evolved))) => {
                tracing::info!(pet_id = %stored.id, owner_id = %stored.owner_id, "Pet evolved");
                ctx.sessions.patch_pet(&stored).await;
                ctx.notifier.pet_evolved(&stored);
            }
            Ok(Some((stored, EvolutionOutcome::Accrued { increment }))) => {
                tracing::debug!(
                    pet_id = %stored.id,
                    increment,
                    token_income = stored.token_income,
                    total_income = stored.total_income,
                    "Adult income accrued"
                );
                ctx.sessions.patch_pet(&stored).await;
                ctx.notifier.income_accrued(&stored, increment);
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(pet_id = %pet.id, error = %e, "Evolution failed for pet");
            }
        }
    }

    Ok(summary)
}
