//! Simulation tunables.
//!
//! Every threshold, speed and probability the behaviour code consults
//! lives here. The host reads a config once at startup (RON, see
//! [`SimConfig::from_ron_str`]) and hands it to
//! [`Simulation::new`](crate::simulation::Simulation::new).
//!
//! Fractional values are written as decimal strings in RON so they map
//! exactly onto [`Fixed`]:
//!
//! ```ron
//! (
//!     hunger_rate: "0.16",
//!     max_population: 40,
//! )
//! ```
//!
//! Missing fields fall back to the defaults below.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::math::{percent, Aabb, Fixed, Vec2Fixed};

/// Inclusive range a temperament trait is rolled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraitRange {
    /// Lower bound.
    pub min: Fixed,
    /// Upper bound.
    pub max: Fixed,
}

impl TraitRange {
    /// Create a range from two percentages (`50, 150` is `0.5..1.5`).
    #[must_use]
    pub fn percent(min: i32, max: i32) -> Self {
        Self {
            min: percent(min),
            max: percent(max),
        }
    }
}

/// Flat set of named tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    // === Pen ===
    /// Top-left corner of the playfield.
    pub pen_origin: Vec2Fixed,
    /// Playfield width and height.
    pub pen_size: Vec2Fixed,
    /// Distance from the walls agents are clamped to.
    pub pen_margin: Fixed,

    // === Population ===
    /// Agents seeded by [`Simulation::seed_population`](crate::simulation::Simulation::seed_population).
    pub initial_population: u32,
    /// Births are skipped at or above this many live agents.
    pub max_population: u32,
    /// Half width/height of an agent's body.
    pub agent_half_extents: Vec2Fixed,
    /// Starting and maximum health.
    pub max_health: Fixed,

    // === Temperament ===
    /// Greed roll range.
    pub greed: TraitRange,
    /// Curiosity roll range.
    pub curiosity: TraitRange,
    /// Territorial desire roll range.
    pub territorial: TraitRange,
    /// Legacy desire roll range.
    pub legacy_desire: TraitRange,
    /// Bravery roll range.
    pub bravery: TraitRange,

    // === Movement ===
    /// Base movement speed in units per second.
    pub base_speed: Fixed,
    /// Extra speed while fleeing.
    pub flee_speed_bonus: Fixed,
    /// Speed factor while exploring.
    pub explore_speed_factor: Fixed,
    /// Speed factor while closing in on a roaming partner.
    pub roam_speed_factor: Fixed,
    /// Speed factor of the idle shuffle next to a roaming partner.
    pub roam_jitter_factor: Fixed,
    /// Roamers stop closing in once this near their partner.
    pub roam_follow_distance: Fixed,
    /// Distance at which a waypoint counts as reached.
    pub arrival_epsilon: Fixed,
    /// Center-to-center radius other agents are kept out of.
    pub personal_space: Fixed,
    /// Speed factor of the separation step.
    pub separation_speed_factor: Fixed,
    /// Barrier distance below which speed is damped.
    pub damping_radius: Fixed,
    /// Lowest speed factor damping can reach.
    pub damping_floor: Fixed,
    /// Net movement below this counts as stuck.
    pub stuck_epsilon: Fixed,
    /// Seconds of being stuck before the perpendicular nudge.
    pub stuck_timeout: Fixed,

    // === Hunger & feeding ===
    /// Hunger gained per second.
    pub hunger_rate: Fixed,
    /// Hunger above which the starvation timer runs.
    pub starvation_threshold: Fixed,
    /// Seconds over the threshold before dying.
    pub starvation_time_limit: Fixed,
    /// Agents look for food once hunger exceeds `eat_hunger_base - greed`.
    pub eat_hunger_base: Fixed,
    /// Health is multiplied by this on feeding, capped at `max_health`.
    pub feed_health_multiplier: Fixed,

    // === Birth ===
    /// Hunger below which satiety accumulates.
    pub sated_threshold: Fixed,
    /// Seconds of satiety before becoming birth-eligible.
    pub birthing_time: Fixed,
    /// Eligible parents give birth once hunger exceeds this.
    pub birthing_hunger_min: Fixed,
    /// Children appear within this distance of the parent on each axis.
    pub birth_spread: Fixed,

    // === Missions ===
    /// Seconds before any mission expires.
    pub mission_timeout: Fixed,
    /// Seconds between survival pre-emption checks.
    pub decision_interval: Fixed,
    /// Health below which agents flee.
    pub flee_health: Fixed,
    /// Radius around own legacy markers (and the agent) that triggers defence.
    pub defend_radius: Fixed,
    /// Territorial desire needed to consider patrolling.
    pub patrol_territorial_min: Fixed,
    /// Chance of patrolling when eligible.
    pub patrol_chance: Fixed,
    /// Distance at which a patrolled marker counts as visited.
    pub patrol_arrival: Fixed,
    /// Chance of roaming with an ally.
    pub roam_chance: Fixed,
    /// Radius within which enemies provoke attacks.
    pub aggression_radius: Fixed,
    /// Chance of attacking a nearby enemy.
    pub attack_chance: Fixed,
    /// Lifetime after which agents may leave legacies and wear a badge.
    pub mature_age: Fixed,
    /// Seconds between two legacy markers of one agent.
    pub legacy_cooldown: Fixed,
    /// Scales `(territorial + legacy_desire) / 2` into a probability.
    pub legacy_chance_scale: Fixed,
    /// Food items scattered around a fresh legacy marker.
    pub legacy_food: u32,
    /// Legacy marker edge length; markers snap to a grid of this size.
    pub legacy_size: Fixed,

    // === Combat ===
    /// Center distance within which strikes land.
    pub strike_range: Fixed,
    /// Probability a strike hits.
    pub hit_chance: Fixed,
    /// Minimum damage per hit.
    pub damage_min: Fixed,
    /// Maximum damage per hit.
    pub damage_max: Fixed,
    /// Seconds between strikes.
    pub attack_cooldown: Fixed,

    // === Neighbours & alliances ===
    /// Seconds between ally/enemy cache refreshes.
    pub scan_interval: Fixed,
    /// Seconds between alliance scans.
    pub alliance_interval: Fixed,
    /// Radius of the alliance scan.
    pub alliance_radius: Fixed,
    /// Largest per-trait difference that still counts as compatible.
    pub trait_tolerance: Fixed,

    // === Repulsion & demolition ===
    /// Seconds between repulsion checks.
    pub repel_interval: Fixed,
    /// Barriers closer than this push agents away.
    pub barrier_repel_distance: Fixed,
    /// Corpses closer than this push agents away.
    pub corpse_repel_distance: Fixed,
    /// Speed of a repulsion step.
    pub repel_speed: Fixed,
    /// Rival legacy markers closer than this may be demolished.
    pub demolish_radius: Fixed,
    /// Scales `territorial` into a demolition probability.
    pub demolish_scale: Fixed,

    // === World ===
    /// Seconds a corpse stays in the pen.
    pub corpse_lifetime: Fixed,
    /// Seconds between automatic food drops (0 disables them).
    pub food_spawn_interval: Fixed,
    /// Automatic food keeps this far from the walls.
    pub food_margin: Fixed,
    /// Automatic food stops at this many items.
    pub max_food: u32,
    /// Half width/height of a food item.
    pub food_half_extents: Vec2Fixed,
    /// News lines kept before the oldest are dropped.
    pub news_capacity: usize,
    /// Detect agent/agent and agent/food overlaps inside `tick`.
    ///
    /// Hosts with their own collision events turn this off and call the
    /// contact handlers themselves.
    pub builtin_contacts: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            pen_origin: Vec2Fixed::from_ints(20, 20),
            pen_size: Vec2Fixed::from_ints(760, 560),
            pen_margin: Fixed::from_num(5),

            initial_population: 20,
            max_population: 60,
            agent_half_extents: Vec2Fixed::from_ints(6, 6),
            max_health: Fixed::from_num(100),

            greed: TraitRange::percent(50, 150),
            curiosity: TraitRange::percent(50, 150),
            territorial: TraitRange::percent(50, 150),
            legacy_desire: TraitRange::percent(50, 150),
            bravery: TraitRange::percent(30, 100),

            base_speed: Fixed::from_num(40),
            flee_speed_bonus: Fixed::from_num(20),
            explore_speed_factor: percent(50),
            roam_speed_factor: percent(40),
            roam_jitter_factor: percent(20),
            roam_follow_distance: Fixed::from_num(30),
            arrival_epsilon: Fixed::from_num(3),
            personal_space: Fixed::from_num(10),
            separation_speed_factor: percent(30),
            damping_radius: Fixed::from_num(25),
            damping_floor: percent(60),
            stuck_epsilon: Fixed::from_num(2),
            stuck_timeout: percent(150),

            hunger_rate: percent(16),
            starvation_threshold: Fixed::from_num(5),
            starvation_time_limit: Fixed::from_num(10),
            eat_hunger_base: Fixed::from_num(3),
            feed_health_multiplier: percent(150),

            sated_threshold: Fixed::from_num(2),
            birthing_time: Fixed::from_num(7),
            birthing_hunger_min: percent(50),
            birth_spread: Fixed::from_num(20),

            mission_timeout: Fixed::from_num(10),
            decision_interval: percent(50),
            flee_health: Fixed::from_num(30),
            defend_radius: Fixed::from_num(60),
            patrol_territorial_min: percent(50),
            patrol_chance: percent(20),
            patrol_arrival: Fixed::from_num(15),
            roam_chance: percent(30),
            aggression_radius: Fixed::from_num(80),
            attack_chance: percent(25),
            mature_age: Fixed::from_num(60),
            legacy_cooldown: Fixed::from_num(30),
            legacy_chance_scale: percent(50),
            legacy_food: 3,
            legacy_size: Fixed::from_num(10),

            strike_range: Fixed::from_num(10),
            hit_chance: percent(85),
            damage_min: Fixed::from_num(5),
            damage_max: Fixed::from_num(15),
            attack_cooldown: Fixed::from_num(1),

            scan_interval: Fixed::from_num(1),
            alliance_interval: Fixed::from_num(5),
            alliance_radius: Fixed::from_num(80),
            trait_tolerance: percent(50),

            repel_interval: percent(50),
            barrier_repel_distance: Fixed::from_num(20),
            corpse_repel_distance: Fixed::from_num(20),
            repel_speed: Fixed::from_num(20),
            demolish_radius: Fixed::from_num(20),
            demolish_scale: percent(30),

            corpse_lifetime: Fixed::from_num(22),
            food_spawn_interval: Fixed::from_num(2),
            food_margin: Fixed::from_num(40),
            max_food: 80,
            food_half_extents: Vec2Fixed::from_ints(4, 4),
            news_capacity: 50,
            builtin_contacts: true,
        }
    }
}

impl SimConfig {
    /// Parse a config from RON text and validate it.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        let config: Self = ron::from_str(ron)?;
        config.validate()?;
        Ok(config)
    }

    /// Smallest position an agent may occupy.
    #[must_use]
    pub fn bounds_min(&self) -> Vec2Fixed {
        Vec2Fixed::new(
            self.pen_origin.x + self.pen_margin,
            self.pen_origin.y + self.pen_margin,
        )
    }

    /// Largest position an agent may occupy.
    #[must_use]
    pub fn bounds_max(&self) -> Vec2Fixed {
        let far = self.pen_origin + self.pen_size;
        Vec2Fixed::new(far.x - self.pen_margin, far.y - self.pen_margin)
    }

    /// Box an agent center may occupy, from [`Self::bounds_min`] to
    /// [`Self::bounds_max`].
    #[must_use]
    pub fn movement_area(&self) -> Aabb {
        let min = self.bounds_min();
        Aabb::from_corner(min, self.bounds_max() - min)
    }

    /// True if the point lies within the pen rectangle itself.
    #[must_use]
    pub fn in_pen(&self, point: Vec2Fixed) -> bool {
        let far = self.pen_origin + self.pen_size;
        point.x > self.pen_origin.x
            && point.x < far.x
            && point.y > self.pen_origin.y
            && point.y < far.y
    }

    /// Check every tunable for a usable value.
    pub fn validate(&self) -> Result<()> {
        let zero = Fixed::ZERO;
        let one = Fixed::from_num(1);

        if self.pen_size.x <= zero || self.pen_size.y <= zero {
            return Err(invalid("pen_size", "width and height must be positive"));
        }
        if self.pen_margin < zero
            || self.pen_margin * Fixed::from_num(2) >= self.pen_size.x.min(self.pen_size.y)
        {
            return Err(invalid("pen_margin", "must leave room inside the pen"));
        }
        let food_band = self.food_margin * Fixed::from_num(2);
        if self.food_margin < zero || food_band >= self.pen_size.x.min(self.pen_size.y) {
            return Err(invalid("food_margin", "must leave room inside the pen"));
        }
        if self.max_population == 0 {
            return Err(invalid("max_population", "must be at least 1"));
        }
        if self.max_health <= zero {
            return Err(invalid("max_health", "must be positive"));
        }
        if self.agent_half_extents.x <= zero || self.agent_half_extents.y <= zero {
            return Err(invalid("agent_half_extents", "must be positive"));
        }

        for (field, range) in [
            ("greed", self.greed),
            ("curiosity", self.curiosity),
            ("territorial", self.territorial),
            ("legacy_desire", self.legacy_desire),
            ("bravery", self.bravery),
        ] {
            if range.min > range.max {
                return Err(invalid(field, "min must not exceed max"));
            }
        }

        for (field, value) in [
            ("patrol_chance", self.patrol_chance),
            ("roam_chance", self.roam_chance),
            ("attack_chance", self.attack_chance),
            ("hit_chance", self.hit_chance),
            ("legacy_chance_scale", self.legacy_chance_scale),
            ("demolish_scale", self.demolish_scale),
            ("damping_floor", self.damping_floor),
        ] {
            if value < zero || value > one {
                return Err(invalid(field, "must be between 0 and 1"));
            }
        }

        if self.damage_min < zero || self.damage_min > self.damage_max {
            return Err(invalid("damage_min", "must be between 0 and damage_max"));
        }

        for (field, value) in [
            ("mission_timeout", self.mission_timeout),
            ("decision_interval", self.decision_interval),
            ("scan_interval", self.scan_interval),
            ("alliance_interval", self.alliance_interval),
            ("repel_interval", self.repel_interval),
            ("starvation_time_limit", self.starvation_time_limit),
            ("legacy_size", self.legacy_size),
        ] {
            if value <= zero {
                return Err(invalid(field, "must be positive"));
            }
        }

        for (field, value) in [
            ("base_speed", self.base_speed),
            ("hunger_rate", self.hunger_rate),
            ("attack_cooldown", self.attack_cooldown),
            ("corpse_lifetime", self.corpse_lifetime),
            ("food_spawn_interval", self.food_spawn_interval),
        ] {
            if value < zero {
                return Err(invalid(field, "must not be negative"));
            }
        }

        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> SimError {
    SimError::InvalidConfig {
        field,
        reason: reason.to_string(),
    }
}
