//! Combat resolution.
//!
//! Two kinds of fights exist:
//! - **Strikes**: an agent on an attack or defend mission closes to
//!   `strike_range` and swings once per `attack_cooldown`. Each swing hits
//!   with probability `hit_chance` for uniform damage in
//!   `damage_min..damage_max`.
//! - **Duels**: when two agents touch and one of them is targeting the
//!   other, a bravery check may send either side running; otherwise the
//!   fight is decided in one roll weighted by each side's magic number.
//!
//! Kinship is checked by the caller before anything here runs.

use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::math::{percent, Fixed, Vec2Fixed};
use crate::rng::RandomSource;

/// Result of a single swing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strike {
    /// The swing missed.
    Miss,
    /// The swing landed.
    Hit {
        /// Damage rolled.
        damage: Fixed,
        /// Target health after the hit, floored at zero.
        remaining: Fixed,
    },
}

impl Strike {
    /// True if the hit took the target to zero health.
    #[must_use]
    pub fn is_lethal(&self) -> bool {
        matches!(self, Self::Hit { remaining, .. } if *remaining == Fixed::ZERO)
    }
}

/// Roll one swing against a target with `target_health`.
pub fn resolve_strike(
    rng: &mut impl RandomSource,
    config: &SimConfig,
    target_health: Fixed,
) -> Strike {
    if !rng.chance(config.hit_chance) {
        return Strike::Miss;
    }
    let damage = rng.uniform(config.damage_min, config.damage_max);
    Strike::Hit {
        damage,
        remaining: apply_damage(target_health, damage),
    }
}

/// Subtract damage, never going below zero.
#[must_use]
pub fn apply_damage(health: Fixed, damage: Fixed) -> Fixed {
    (health - damage).max(Fixed::ZERO)
}

/// True if two centers are close enough to strike.
#[must_use]
pub fn within_strike_range(
    attacker: Vec2Fixed,
    target: Vec2Fixed,
    config: &SimConfig,
) -> bool {
    attacker.distance_squared(target) <= config.strike_range * config.strike_range
}

/// One participant in a duel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Duelist {
    /// Probability of standing ground.
    pub bravery: Fixed,
    /// Aggregate fitness score.
    pub magic: Fixed,
}

/// Which participant an outcome refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    /// The initiating agent.
    First,
    /// The agent being targeted.
    Second,
}

/// How a duel ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DuelOutcome {
    /// One side lost its nerve and runs from the other. Nobody is hurt.
    Fled(Side),
    /// One side killed the other.
    Won(Side),
}

/// Probability that the first duelist wins a fought duel.
///
/// Proportional to magic numbers; an even split when both are zero.
#[must_use]
pub fn win_chance(first: Fixed, second: Fixed) -> Fixed {
    let total = first + second;
    if total <= Fixed::ZERO {
        percent(50)
    } else {
        first / total
    }
}

/// Run the bravery checks (first side, then second) and the weighted roll.
pub fn resolve_duel(rng: &mut impl RandomSource, first: Duelist, second: Duelist) -> DuelOutcome {
    if rng.unit() > first.bravery {
        return DuelOutcome::Fled(Side::First);
    }
    if rng.unit() > second.bravery {
        return DuelOutcome::Fled(Side::Second);
    }
    if rng.chance(win_chance(first.magic, second.magic)) {
        DuelOutcome::Won(Side::First)
    } else {
        DuelOutcome::Won(Side::Second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::ScriptedRng;

    #[test]
    fn test_strike_miss_when_roll_exceeds_hit_chance() {
        let config = SimConfig::default();
        let mut rng = ScriptedRng::constant(percent(90));
        assert_eq!(resolve_strike(&mut rng, &config, Fixed::from_num(50)), Strike::Miss);
    }

    #[test]
    fn test_strike_damage_within_range() {
        let config = SimConfig::default();
        // hit roll, then damage fraction 0.5 -> 10
        let mut rng = ScriptedRng::new([percent(10), percent(50)], Fixed::ZERO);
        let strike = resolve_strike(&mut rng, &config, Fixed::from_num(50));
        assert_eq!(
            strike,
            Strike::Hit {
                damage: Fixed::from_num(10),
                remaining: Fixed::from_num(40),
            }
        );
        assert!(!strike.is_lethal());
    }

    #[test]
    fn test_health_floors_at_zero() {
        assert_eq!(apply_damage(Fixed::from_num(3), Fixed::from_num(12)), Fixed::ZERO);
        let config = SimConfig::default();
        let mut rng = ScriptedRng::new([Fixed::ZERO, percent(99)], Fixed::ZERO);
        let strike = resolve_strike(&mut rng, &config, Fixed::from_num(4));
        assert!(strike.is_lethal());
    }

    #[test]
    fn test_win_chance_proportional() {
        assert_eq!(win_chance(Fixed::from_num(3), Fixed::from_num(1)), percent(75));
        assert_eq!(win_chance(Fixed::ZERO, Fixed::ZERO), percent(50));
        assert_eq!(win_chance(Fixed::ZERO, Fixed::from_num(5)), Fixed::ZERO);
    }

    #[test]
    fn test_coward_flees_before_fight() {
        let brave = Duelist {
            bravery: percent(90),
            magic: Fixed::from_num(10),
        };
        let timid = Duelist {
            bravery: percent(20),
            magic: Fixed::from_num(10),
        };
        // First roll 0.5 passes for the brave side, second roll 0.5 fails for the timid one.
        let mut rng = ScriptedRng::constant(percent(50));
        assert_eq!(resolve_duel(&mut rng, brave, timid), DuelOutcome::Fled(Side::Second));
        let mut rng = ScriptedRng::constant(percent(50));
        assert_eq!(resolve_duel(&mut rng, timid, brave), DuelOutcome::Fled(Side::First));
    }

    #[test]
    fn test_duel_weighted_by_magic() {
        let strong = Duelist {
            bravery: Fixed::from_num(1),
            magic: Fixed::from_num(9),
        };
        let weak = Duelist {
            bravery: Fixed::from_num(1),
            magic: Fixed::from_num(1),
        };
        // Bravery rolls pass, win roll 0.85 < 0.9.
        let mut rng = ScriptedRng::new([Fixed::ZERO, Fixed::ZERO, percent(85)], Fixed::ZERO);
        assert_eq!(resolve_duel(&mut rng, strong, weak), DuelOutcome::Won(Side::First));
        let mut rng = ScriptedRng::new([Fixed::ZERO, Fixed::ZERO, percent(95)], Fixed::ZERO);
        assert_eq!(resolve_duel(&mut rng, strong, weak), DuelOutcome::Won(Side::Second));
    }

    #[test]
    fn test_strike_range() {
        let config = SimConfig::default();
        let a = Vec2Fixed::from_ints(0, 0);
        assert!(within_strike_range(a, Vec2Fixed::from_ints(6, 8), &config));
        assert!(!within_strike_range(a, Vec2Fixed::from_ints(8, 8), &config));
    }
}
