//! Whole-hour stat decay with remainder carry.
//!
//! A stat loses `rate_per_hour` points for every *complete* hour since its
//! checkpoint. The checkpoint then advances by whole hours only, so the
//! partial hour left over is counted on the next run instead of being lost
//! or double-counted:
//!
//! ```text
//! last_update = T, now = T + 150min, rate = 5/h, value = 40
//!   hours      = floor(9000s / 3600) = 2
//!   value      = 40 - 2 * 5          = 30
//!   checkpoint = now - (9000 mod 3600)s = T + 120min
//! ```
//!
//! Re-running against the same checkpoint and "now" gives the same answer,
//! and a "now" that moved less than an hour is a no-op. That makes the
//! calculator safe under job retries and under a player action racing a
//! decay pass.
//!
//! All arithmetic saturates. Negative elapsed time (clock skew) counts as
//! zero.

use chrono::{DateTime, TimeDelta, Utc};
use petfarm_types::{MAX_STAT, Pet, Stat, StatValue};

/// Seconds in one decay period.
pub const SECONDS_PER_HOUR: i64 = 3_600;

/// Result of one calculator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecayOutcome {
    /// New stat value in `[0, 100]`.
    pub value: u32,
    /// New checkpoint.
    pub last_update: DateTime<Utc>,
    /// Complete hours consumed.
    pub hours: u64,
}

/// Compute a decayed stat value and its new checkpoint.
///
/// Returns the input unchanged (value clamped to 100) when less than one
/// complete hour has elapsed.
pub fn decay(
    last_update: DateTime<Utc>,
    current_value: u32,
    rate_per_hour: u32,
    now: DateTime<Utc>,
) -> DecayOutcome {
    let current = current_value.min(MAX_STAT);
    let elapsed_secs = now.signed_duration_since(last_update).num_seconds().max(0);
    let whole_hours = elapsed_secs.checked_div(SECONDS_PER_HOUR).unwrap_or(0);

    if whole_hours == 0 {
        return DecayOutcome {
            value: current,
            last_update,
            hours: 0,
        };
    }

    let remainder = elapsed_secs.checked_rem(SECONDS_PER_HOUR).unwrap_or(0);
    let hours = u64::try_from(whole_hours).unwrap_or(0);
    let loss = hours.saturating_mul(u64::from(rate_per_hour));
    let value = u64::from(current).saturating_sub(loss);

    DecayOutcome {
        value: u32::try_from(value).unwrap_or(0),
        last_update: now
            .checked_sub_signed(TimeDelta::seconds(remainder))
            .unwrap_or(now),
        hours,
    }
}

/// Raise a stat by `amount`, capped at 100.
pub fn restore(value: u32, amount: u32) -> u32 {
    value.saturating_add(amount).min(MAX_STAT)
}

/// Apply [`decay`] to one stat in place. Returns whether it changed.
pub fn decay_stat(stat: &mut StatValue, rate_per_hour: u32, now: DateTime<Utc>) -> bool {
    let outcome = decay(stat.last_update, stat.value, rate_per_hour, now);
    if outcome.hours == 0 {
        return false;
    }
    stat.value = outcome.value;
    stat.last_update = outcome.last_update;
    true
}

/// Bring every stat of `pet` current using its own decay rates.
///
/// Returns whether any stat changed.
pub fn decay_pet_stats(pet: &mut Pet, now: DateTime<Utc>) -> bool {
    let mut changed = false;
    for stat in Stat::ALL {
        let rate = pet.decay_rates.get(stat);
        changed |= decay_stat(pet.stats.get_mut(stat), rate, now);
    }
    changed
}
