//! Decay pass: bring every Active pet's stats current.
//!
//! Checkpoints advance by whole hours only, so running this pass more often
//! than hourly is harmless.

use chrono::Utc;
use petfarm_sim::decay_pet_stats;
use petfarm_types::JobSummary;

use super::{JobContext, advance_pet, tally};
use crate::scheduler::JobError;

/// Run one decay pass.
pub async fn run(ctx: &JobContext) -> Result<JobSummary, JobError> {
    let store = ctx.store.get()?;
    let pets = store.active_pets().await?;
    let now = Utc::now();
    let mut summary = JobSummary::default();

    for pet in &pets {
        summary.examined = summary.examined.saturating_add(1);
        let result = advance_pet(&store, pet, |p| decay_pet_stats(p, now).then_some(())).await;
        tally(&mut summary, &result);

        match result {
            Ok(Some((stored, ()))) => {
                tracing::debug!(
                    pet_id = %stored.id,
                    hunger = stored.stats.hunger.value,
                    happiness = stored.stats.happiness.value,
                    cleanliness = stored.stats.cleanliness.value,
                    "Stats decayed"
                );
                ctx.sessions.patch_pet(&stored).await;
                ctx.notifier.stats_decayed(&stored);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(pet_id = %pet.id, error = %e, "Decay failed for pet"),
        }
    }

    Ok(summary)
}
