//! Pet construction.

use chrono::{DateTime, Utc};
use petfarm_types::{
    DecayRange, DecayRanges, DecayRates, LifecycleStage, Pet, PetId, PetStats, PetStatus,
    PetType, PlayerId, Stat,
};
use rand::Rng;

/// How a pet came into existence. Decides its starting stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PetOrigin {
    /// Bought with tokens: starts at 100/100/100.
    Purchase,
    /// Granted on first login: starts at the type's default stats.
    StarterGrant,
}

/// Draw one rate from an inclusive range. A reversed range uses its lower
/// bound.
fn roll_rate<R: Rng + ?Sized>(range: &DecayRange, rng: &mut R) -> u32 {
    if range.min_per_hour >= range.max_per_hour {
        range.min_per_hour.min(range.max_per_hour)
    } else {
        rng.random_range(range.min_per_hour..=range.max_per_hour)
    }
}

/// Draw a pet's fixed decay rates from its type's ranges.
pub fn roll_decay_rates<R: Rng + ?Sized>(ranges: &DecayRanges, rng: &mut R) -> DecayRates {
    DecayRates {
        hunger: roll_rate(ranges.get(Stat::Hunger), rng),
        happiness: roll_rate(ranges.get(Stat::Happiness), rng),
        cleanliness: roll_rate(ranges.get(Stat::Cleanliness), rng),
    }
}

/// Build a new juvenile pet of `pet_type` for `owner_id`.
///
/// `name` falls back to the type name when absent or blank. The returned
/// document has version 0; the store assigns version 1 on insert.
pub fn new_pet<R: Rng + ?Sized>(
    owner_id: PlayerId,
    pet_type: &PetType,
    name: Option<&str>,
    origin: PetOrigin,
    rng: &mut R,
    now: DateTime<Utc>,
) -> Pet {
    let stats = match origin {
        PetOrigin::Purchase => PetStats::full(now),
        PetOrigin::StarterGrant => PetStats::from_defaults(&pet_type.default_stats, now),
    };
    let name = name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(&pet_type.name)
        .to_owned();

    Pet {
        id: PetId::new(),
        owner_id,
        pet_type_id: pet_type.id,
        name,
        stats,
        decay_rates: roll_decay_rates(&pet_type.decay, rng),
        lifecycle_stage: LifecycleStage::Juvenile,
        status: PetStatus::Active,
        token_income: 0,
        total_income: 0,
        last_claim: None,
        poops: Vec::new(),
        created_at: now,
        version: 0,
    }
}

#[cfg(test)]
mod tests {
    use petfarm_types::{DefaultStats, MAX_STAT, PetTypeId};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn pet_type() -> PetType {
        PetType {
            id: PetTypeId::new(),
            name: String::from("Fox"),
            default_stats: DefaultStats {
                hunger: 70,
                happiness: 60,
                cleanliness: 50,
            },
            decay: DecayRanges {
                hunger: DecayRange {
                    min_per_hour: 2,
                    max_per_hour: 4,
                },
                happiness: DecayRange {
                    min_per_hour: 1,
                    max_per_hour: 1,
                },
                cleanliness: DecayRange {
                    min_per_hour: 9,
                    max_per_hour: 3,
                },
            },
            time_natural_minutes: 30,
            income_per_claim: 2,
            max_income_per_claim: 10,
            max_income: 500,
            cost: 40,
        }
    }

    #[test]
    fn rolled_rates_stay_in_range() {
        let ty = pet_type();
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..100 {
            let rates = roll_decay_rates(&ty.decay, &mut rng);
            assert!((2..=4).contains(&rates.hunger));
            assert_eq!(rates.happiness, 1);
            assert_eq!(rates.cleanliness, 3);
        }
    }

    #[test]
    fn purchased_pet_starts_full() {
        let ty = pet_type();
        let mut rng = StdRng::seed_from_u64(5);
        let pet = new_pet(PlayerId::new(), &ty, Some("Rusty"), PetOrigin::Purchase, &mut rng, Utc::now());
        assert_eq!(pet.stats.hunger.value, MAX_STAT);
        assert_eq!(pet.stats.happiness.value, MAX_STAT);
        assert_eq!(pet.stats.cleanliness.value, MAX_STAT);
        assert_eq!(pet.name, "Rusty");
        assert_eq!(pet.lifecycle_stage, LifecycleStage::Juvenile);
        assert!(pet.last_claim.is_none());
    }

    #[test]
    fn starter_pet_uses_type_defaults_and_name() {
        let ty = pet_type();
        let mut rng = StdRng::seed_from_u64(5);
        let pet = new_pet(PlayerId::new(), &ty, Some("   "), PetOrigin::StarterGrant, &mut rng, Utc::now());
        assert_eq!(pet.stats.hunger.value, 70);
        assert_eq!(pet.stats.cleanliness.value, 50);
        assert_eq!(pet.name, "Fox");
        assert_eq!(pet.pet_type_id, ty.id);
    }
}
