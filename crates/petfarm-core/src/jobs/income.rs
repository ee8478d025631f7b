//! Income pass: accrual for every pet below its lifetime ceiling.
//!
//! Independent of lifecycle stage and status. Uses the same clamp as the
//! evolution pass, so neither ceiling can be crossed whichever pass runs
//! first.

use chrono::Utc;
use petfarm_sim::{IncomeOutcome, income_step};
use petfarm_types::JobSummary;

use super::{JobContext, TypeCache, advance_pet, tally};
use crate::scheduler::JobError;

/// Run one income pass.
pub async fn run(ctx: &JobContext) -> Result<JobSummary, JobError> {
    let store = ctx.store.get()?;
    let pets = store.income_eligible_pets().await?;
    let now = Utc::now();
    let mut types = TypeCache::new(&store);
    let mut summary = JobSummary::default();

    for pet in &pets {
        summary.examined = summary.examined.saturating_add(1);
        let result = match types.get(pet.pet_type_id).await {
            Ok(pet_type) => {
                advance_pet(&store, pet, |p| match income_step(p, &pet_type, now) {
                    IncomeOutcome::Accrued { increment } => Some(increment),
                    IncomeOutcome::NotDue { .. } | IncomeOutcome::Capped => None,
                })
                .await
            }
            Err(e) => Err(e),
        };
        tally(&mut summary, &result);

        match result {
            Ok(Some((stored, increment))) => {
                tracing::debug!(
                    pet_id = %stored.id,
                    increment,
                    total_income = stored.total_income,
                    "Income accrued"
                );
                ctx.sessions.patch_pet(&stored).await;
                ctx.notifier.income_accrued(&stored, increment);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(pet_id = %pet.id, error = %e, "Income accrual failed for pet");
            }
        }
    }

    Ok(summary)
}
