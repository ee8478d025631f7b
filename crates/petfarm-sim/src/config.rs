//! Tunable game rules for player actions and the poop mechanic.
//!
//! The [`RulesConfig`] struct bundles every threshold so that callers
//! (transaction manager, tests) can override defaults. The server builds it
//! from the `rules` section of `petfarm-config.yaml`.

use petfarm_types::Stat;
use serde::Deserialize;

/// Configuration for player-action validation and poop spawning.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Feeding is rejected while hunger is above this value (default: 90).
    pub feed_allow_threshold: u32,

    /// Playing is rejected while happiness is above this value (default: 90).
    pub play_allow_threshold: u32,

    /// Cleaning is rejected while cleanliness is above this value (default: 90).
    pub clean_allow_threshold: u32,

    /// Outstanding poops a pet may carry (default: 5).
    pub max_poops_per_pet: usize,

    /// Width of the area poops are placed in (default: 100).
    pub play_area_width: u32,

    /// Height of the area poops are placed in (default: 100).
    pub play_area_height: u32,

    /// Largest quantity accepted by a single item purchase (default: 99).
    pub max_purchase_quantity: u32,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            feed_allow_threshold: 90,
            play_allow_threshold: 90,
            clean_allow_threshold: 90,
            max_poops_per_pet: 5,
            play_area_width: 100,
            play_area_height: 100,
            max_purchase_quantity: 99,
        }
    }
}

impl RulesConfig {
    /// Allow threshold guarding restores of `stat`.
    pub const fn allow_threshold(&self, stat: Stat) -> u32 {
        match stat {
            Stat::Hunger => self.feed_allow_threshold,
            Stat::Happiness => self.play_allow_threshold,
            Stat::Cleanliness => self.clean_allow_threshold,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_map_to_their_stat() {
        let config = RulesConfig {
            feed_allow_threshold: 1,
            play_allow_threshold: 2,
            clean_allow_threshold: 3,
            ..RulesConfig::default()
        };
        assert_eq!(config.allow_threshold(Stat::Hunger), 1);
        assert_eq!(config.allow_threshold(Stat::Happiness), 2);
        assert_eq!(config.allow_threshold(Stat::Cleanliness), 3);
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let config: RulesConfig =
            serde_json::from_str(r#"{"clean_allow_threshold": 70}"#).unwrap();
        assert_eq!(config.clean_allow_threshold, 70);
        assert_eq!(config.feed_allow_threshold, 90);
        assert_eq!(config.max_poops_per_pet, 5);
    }
}
