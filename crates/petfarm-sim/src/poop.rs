//! Poop spawning and removal.
//!
//! Poops live on the pet document (`Pet::poops`) so spawning and cleaning
//! persist with the same conditional write as the rest of the pet.

use chrono::{DateTime, Utc};
use petfarm_types::{Pet, Poop, PoopId, RejectionReason};
use rand::Rng;

use crate::config::RulesConfig;
use crate::error::Rejection;

/// A uniformly drawn coordinate in `[0, extent)`, or 0 for an empty axis.
fn coordinate<R: Rng + ?Sized>(rng: &mut R, extent: u32) -> u32 {
    if extent == 0 {
        0
    } else {
        rng.random_range(0..extent)
    }
}

/// Attach a new poop to `pet` at a random position in the play area.
///
/// Rejected with `PoopLimitReached` when the pet already carries
/// `max_poops_per_pet` poops.
pub fn spawn_poop<R: Rng + ?Sized>(
    pet: &mut Pet,
    rules: &RulesConfig,
    rng: &mut R,
    now: DateTime<Utc>,
) -> Result<Poop, Rejection> {
    if pet.poops.len() >= rules.max_poops_per_pet {
        return Err(Rejection::new(
            RejectionReason::PoopLimitReached,
            format!(
                "pet {} already has {} poops",
                pet.id, rules.max_poops_per_pet
            ),
        ));
    }

    let poop = Poop {
        id: PoopId::new(),
        pet_id: pet.id,
        x: coordinate(rng, rules.play_area_width),
        y: coordinate(rng, rules.play_area_height),
        created_at: now,
    };
    pet.poops.push(poop);
    Ok(poop)
}

/// Detach poop `poop_id` from `pet`, returning it.
pub fn remove_poop(pet: &mut Pet, poop_id: PoopId) -> Result<Poop, Rejection> {
    let index = pet
        .poops
        .iter()
        .position(|p| p.id == poop_id)
        .ok_or_else(|| {
            Rejection::new(
                RejectionReason::PoopNotFound,
                format!("poop {poop_id} is not on pet {}", pet.id),
            )
        })?;
    Ok(pet.poops.remove(index))
}
