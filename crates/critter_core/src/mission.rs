//! Mission selection.
//!
//! An agent pursues exactly one [`Mission`] at a time. A new one is chosen
//! when the current mission is absent, has run for `mission_timeout`
//! seconds, or its target no longer resolves. Selection walks a fixed
//! priority list and the first rule whose condition holds and whose target
//! exists wins:
//!
//! 1. flee
//! 2. eat
//! 3. defend
//! 4. patrol
//! 5. roam
//! 6. attack
//! 7. legacy
//! 8. explore (always applies)
//!
//! The selector is pure over an [`Agent`] and a [`Surroundings`] snapshot the
//! simulation gathers beforehand, which keeps it testable without a world.

use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::entities::{Agent, AgentId, BarrierId, FoodId};
use crate::locomotion::explore_waypoint;
use crate::math::{percent, Fixed, Vec2Fixed};
use crate::rng::RandomSource;

/// The goal an agent is currently pursuing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mission {
    /// Nothing chosen yet.
    #[default]
    None,
    /// Walk to a food item.
    Eat {
        /// Food being approached.
        food: FoodId,
    },
    /// Hunt down a rival.
    Attack {
        /// Agent being hunted.
        target: AgentId,
    },
    /// Run away, from a threat if one is known.
    Flee {
        /// Agent being fled from.
        threat: Option<AgentId>,
    },
    /// Fight an intruder or an ally's attacker.
    Defend {
        /// Agent being fought.
        target: AgentId,
    },
    /// Visit an own-family legacy marker.
    Patrol {
        /// Marker being visited.
        marker: BarrierId,
    },
    /// Stay close to an ally.
    Roam {
        /// Ally being followed.
        ally: AgentId,
    },
    /// Drop a legacy marker where the agent stands.
    Legacy,
    /// Zig-zag across the pen.
    Explore {
        /// Current leg's end point.
        waypoint: Vec2Fixed,
    },
}

/// Fieldless mirror of [`Mission`] for display and statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionKind {
    /// No mission.
    None,
    /// Eating.
    Eat,
    /// Attacking.
    Attack,
    /// Fleeing.
    Flee,
    /// Defending.
    Defend,
    /// Patrolling.
    Patrol,
    /// Roaming.
    Roam,
    /// Leaving a legacy.
    Legacy,
    /// Exploring.
    Explore,
}

impl MissionKind {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Eat => "eat",
            Self::Attack => "attack",
            Self::Flee => "flee",
            Self::Defend => "defend",
            Self::Patrol => "patrol",
            Self::Roam => "roam",
            Self::Legacy => "legacy",
            Self::Explore => "explore",
        }
    }
}

impl Mission {
    /// Fieldless kind.
    #[must_use]
    pub const fn kind(&self) -> MissionKind {
        match self {
            Self::None => MissionKind::None,
            Self::Eat { .. } => MissionKind::Eat,
            Self::Attack { .. } => MissionKind::Attack,
            Self::Flee { .. } => MissionKind::Flee,
            Self::Defend { .. } => MissionKind::Defend,
            Self::Patrol { .. } => MissionKind::Patrol,
            Self::Roam { .. } => MissionKind::Roam,
            Self::Legacy => MissionKind::Legacy,
            Self::Explore { .. } => MissionKind::Explore,
        }
    }

    /// Agent this mission fights, if any.
    #[must_use]
    pub const fn combat_target(&self) -> Option<AgentId> {
        match self {
            Self::Attack { target } | Self::Defend { target } => Some(*target),
            _ => None,
        }
    }

    /// Agent this mission is hostile toward: the one fought or fled from.
    #[must_use]
    pub const fn hostile_target(&self) -> Option<AgentId> {
        match self {
            Self::Attack { target } | Self::Defend { target } => Some(*target),
            Self::Flee { threat } => *threat,
            _ => None,
        }
    }

    /// True for missions the survival rules may interrupt.
    #[must_use]
    pub const fn is_interruptible(&self) -> bool {
        !matches!(self, Self::None | Self::Flee { .. } | Self::Eat { .. })
    }

    /// Brightness multiplier applied to the family color while rendering.
    #[must_use]
    pub fn color_factor(&self) -> Fixed {
        match self {
            Self::Attack { .. } | Self::Defend { .. } | Self::Eat { .. } => percent(130),
            Self::Flee { .. } => percent(70),
            _ => Fixed::from_num(1),
        }
    }
}

/// A mission and how long it has been running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct MissionState {
    /// Current mission.
    pub mission: Mission,
    /// Seconds since it was chosen.
    pub elapsed: Fixed,
}

impl MissionState {
    /// Start a new mission with a fresh timer.
    pub fn assign(&mut self, mission: Mission) {
        self.mission = mission;
        self.elapsed = Fixed::ZERO;
    }

    /// Drop the current mission so a new one is chosen next update.
    pub fn clear(&mut self) {
        self.assign(Mission::None);
    }

    /// True once the mission has outlived `timeout`.
    #[must_use]
    pub fn expired(&self, timeout: Fixed) -> bool {
        self.elapsed >= timeout
    }
}

/// What an agent can see when choosing a mission.
///
/// Built by the simulation from the world and the agent's cached
/// ally/enemy lists. Every handle in here resolved when it was gathered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Surroundings {
    /// Nearest living non-kin agent.
    pub nearest_enemy: Option<AgentId>,
    /// Nearest non-kin agent within `aggression_radius`.
    pub enemy_in_reach: Option<AgentId>,
    /// Nearest food item.
    pub nearest_food: Option<FoodId>,
    /// Non-kin agent within `defend_radius` of an own-family marker.
    pub marker_intruder: Option<AgentId>,
    /// Non-kin threat of a fleeing ally, within `defend_radius` of this agent.
    pub ally_threat: Option<AgentId>,
    /// Nearest own-family legacy marker.
    pub own_marker: Option<BarrierId>,
    /// Living allies.
    pub allies: Vec<AgentId>,
}

/// True if the agent is hungry enough to look for food.
#[must_use]
pub fn wants_food(agent: &Agent, config: &SimConfig) -> bool {
    agent.hunger > config.eat_hunger_base - agent.temperament.greed
}

/// True if the agent is hurt badly enough to run.
#[must_use]
pub fn wants_to_flee(agent: &Agent, config: &SimConfig) -> bool {
    agent.health < config.flee_health
}

/// True if the agent may place a legacy marker now, ignoring the dice.
#[must_use]
pub fn legacy_due(agent: &Agent, config: &SimConfig) -> bool {
    let lifetime = agent.stats.lifetime;
    lifetime > config.mature_age
        && agent
            .last_legacy_at
            .map_or(true, |last| lifetime - last >= config.legacy_cooldown)
}

/// Probability of choosing the legacy mission when it is due.
#[must_use]
pub fn legacy_chance(agent: &Agent, config: &SimConfig) -> Fixed {
    let t = agent.temperament;
    (t.territorial + t.legacy_desire) / Fixed::from_num(2) * config.legacy_chance_scale
}

/// Choose the highest-priority applicable mission.
pub fn select_mission(
    agent: &Agent,
    near: &Surroundings,
    config: &SimConfig,
    rng: &mut impl RandomSource,
) -> Mission {
    if wants_to_flee(agent, config) {
        return Mission::Flee {
            threat: near.nearest_enemy,
        };
    }

    if wants_food(agent, config) {
        if let Some(food) = near.nearest_food {
            return Mission::Eat { food };
        }
    }

    if let Some(target) = near.marker_intruder.or(near.ally_threat) {
        return Mission::Defend { target };
    }

    if agent.temperament.territorial > config.patrol_territorial_min {
        if let Some(marker) = near.own_marker {
            if rng.chance(config.patrol_chance) {
                return Mission::Patrol { marker };
            }
        }
    }

    if !near.allies.is_empty() && rng.chance(config.roam_chance) {
        let ally = near.allies[rng.index(near.allies.len())];
        return Mission::Roam { ally };
    }

    if let Some(target) = near.enemy_in_reach {
        if rng.chance(config.attack_chance) {
            return Mission::Attack { target };
        }
    }

    if legacy_due(agent, config) && rng.chance(legacy_chance(agent, config)) {
        return Mission::Legacy;
    }

    Mission::Explore {
        waypoint: explore_waypoint(agent.position, agent.explore_axis, config, rng),
    }
}

/// True if a running mission should be dropped for a survival need.
///
/// Low health interrupts anything except fleeing. Hunger interrupts
/// interruptible missions when food is available.
#[must_use]
pub fn should_preempt(agent: &Agent, near: &Surroundings, config: &SimConfig) -> bool {
    let mission = &agent.mission.mission;
    if wants_to_flee(agent, config) {
        return !matches!(mission, Mission::Flee { .. });
    }
    mission.is_interruptible() && wants_food(agent, config) && near.nearest_food.is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{AgentSeed, FamilyColor, Temperament};
    use crate::rng::ScriptedRng;
    use slotmap::SlotMap;

    fn agent() -> Agent {
        Agent::new(
            AgentSeed {
                name: "Ba".into(),
                parent: None,
                parent_lineage: Vec::new(),
                family: FamilyColor::new(200, 40, 40),
                position: Vec2Fixed::from_ints(300, 300),
                temperament: Temperament {
                    greed: Fixed::from_num(1),
                    curiosity: Fixed::from_num(1),
                    territorial: Fixed::from_num(1),
                    legacy_desire: Fixed::from_num(1),
                    bravery: percent(50),
                },
                heading: Vec2Fixed::ZERO,
            },
            &SimConfig::default(),
        )
    }

    fn ids() -> (AgentId, FoodId, BarrierId) {
        let mut agents: SlotMap<AgentId, ()> = SlotMap::with_key();
        let mut food: SlotMap<FoodId, ()> = SlotMap::with_key();
        let mut barriers: SlotMap<BarrierId, ()> = SlotMap::with_key();
        (agents.insert(()), food.insert(()), barriers.insert(()))
    }

    #[test]
    fn test_low_health_beats_hunger() {
        let config = SimConfig::default();
        let (enemy, food, _) = ids();
        let mut a = agent();
        a.health = Fixed::from_num(20);
        a.hunger = Fixed::from_num(10);
        let near = Surroundings {
            nearest_enemy: Some(enemy),
            nearest_food: Some(food),
            ..Surroundings::default()
        };
        let mut rng = ScriptedRng::constant(Fixed::ZERO);
        assert_eq!(
            select_mission(&a, &near, &config, &mut rng),
            Mission::Flee {
                threat: Some(enemy)
            }
        );
    }

    #[test]
    fn test_flee_without_enemy() {
        let config = SimConfig::default();
        let mut a = agent();
        a.health = Fixed::from_num(5);
        let mut rng = ScriptedRng::constant(Fixed::ZERO);
        assert_eq!(
            select_mission(&a, &Surroundings::default(), &config, &mut rng),
            Mission::Flee { threat: None }
        );
    }

    #[test]
    fn test_hungry_agent_eats_when_food_exists() {
        let config = SimConfig::default();
        let (_, food, _) = ids();
        let mut a = agent();
        a.hunger = Fixed::from_num(3);
        let near = Surroundings {
            nearest_food: Some(food),
            ..Surroundings::default()
        };
        let mut rng = ScriptedRng::constant(Fixed::ZERO);
        assert_eq!(select_mission(&a, &near, &config, &mut rng), Mission::Eat { food });
    }

    #[test]
    fn test_hungry_without_food_falls_through() {
        let config = SimConfig::default();
        let mut a = agent();
        a.hunger = Fixed::from_num(3);
        // Every chance roll fails, so only explore remains.
        let mut rng = ScriptedRng::constant(percent(99));
        let mission = select_mission(&a, &Surroundings::default(), &config, &mut rng);
        assert_eq!(mission.kind(), MissionKind::Explore);
    }

    #[test]
    fn test_defend_marker_before_patrol() {
        let config = SimConfig::default();
        let (intruder, _, marker) = ids();
        let a = agent();
        let near = Surroundings {
            marker_intruder: Some(intruder),
            own_marker: Some(marker),
            ..Surroundings::default()
        };
        let mut rng = ScriptedRng::constant(Fixed::ZERO);
        assert_eq!(
            select_mission(&a, &near, &config, &mut rng),
            Mission::Defend { target: intruder }
        );
    }

    #[test]
    fn test_help_fleeing_ally() {
        let config = SimConfig::default();
        let (threat, _, _) = ids();
        let a = agent();
        let near = Surroundings {
            ally_threat: Some(threat),
            ..Surroundings::default()
        };
        let mut rng = ScriptedRng::constant(Fixed::ZERO);
        assert_eq!(
            select_mission(&a, &near, &config, &mut rng),
            Mission::Defend { target: threat }
        );
    }

    #[test]
    fn test_patrol_requires_territorial_drive() {
        let config = SimConfig::default();
        let (_, _, marker) = ids();
        let mut a = agent();
        let near = Surroundings {
            own_marker: Some(marker),
            ..Surroundings::default()
        };
        let mut rng = ScriptedRng::constant(Fixed::ZERO);
        assert_eq!(
            select_mission(&a, &near, &config, &mut rng),
            Mission::Patrol { marker }
        );

        a.temperament.territorial = percent(40);
        let mut rng = ScriptedRng::constant(Fixed::ZERO);
        assert_ne!(
            select_mission(&a, &near, &config, &mut rng),
            Mission::Patrol { marker }
        );
    }

    #[test]
    fn test_roam_then_attack_order() {
        let config = SimConfig::default();
        let (ally, _, _) = ids();
        let mut agents: SlotMap<AgentId, ()> = SlotMap::with_key();
        agents.insert(());
        let enemy = agents.insert(());
        let a = agent();
        let near = Surroundings {
            allies: vec![ally],
            enemy_in_reach: Some(enemy),
            ..Surroundings::default()
        };

        // Roam roll succeeds.
        let mut rng = ScriptedRng::constant(Fixed::ZERO);
        assert_eq!(select_mission(&a, &near, &config, &mut rng), Mission::Roam { ally });

        // Roam roll fails (0.3), attack roll succeeds (0.1 < 0.25).
        let mut rng = ScriptedRng::new([percent(50), percent(10)], percent(99));
        assert_eq!(
            select_mission(&a, &near, &config, &mut rng),
            Mission::Attack { target: enemy }
        );
    }

    #[test]
    fn test_legacy_needs_maturity_and_cooldown() {
        let config = SimConfig::default();
        let mut a = agent();
        assert!(!legacy_due(&a, &config));

        a.stats.lifetime = Fixed::from_num(61);
        assert!(legacy_due(&a, &config));

        a.last_legacy_at = Some(Fixed::from_num(50));
        assert!(!legacy_due(&a, &config));

        a.stats.lifetime = Fixed::from_num(80);
        assert!(legacy_due(&a, &config));

        let mut rng = ScriptedRng::constant(percent(10));
        assert_eq!(
            select_mission(&a, &Surroundings::default(), &config, &mut rng),
            Mission::Legacy
        );
    }

    #[test]
    fn test_preemption_rules() {
        let config = SimConfig::default();
        let (_, food, _) = ids();
        let near = Surroundings {
            nearest_food: Some(food),
            ..Surroundings::default()
        };
        let mut a = agent();
        a.mission.assign(Mission::Explore {
            waypoint: Vec2Fixed::from_ints(10, 10),
        });
        assert!(!should_preempt(&a, &near, &config));

        a.hunger = Fixed::from_num(4);
        assert!(should_preempt(&a, &near, &config));
        assert!(!should_preempt(&a, &Surroundings::default(), &config));

        a.mission.assign(Mission::Eat { food });
        assert!(!should_preempt(&a, &near, &config));

        a.health = Fixed::from_num(10);
        assert!(should_preempt(&a, &near, &config));
        a.mission.assign(Mission::Flee { threat: None });
        assert!(!should_preempt(&a, &near, &config));
    }

    #[test]
    fn test_mission_timer() {
        let mut state = MissionState::default();
        state.assign(Mission::Legacy);
        state.elapsed = Fixed::from_num(10);
        assert!(state.expired(Fixed::from_num(10)));
        state.clear();
        assert_eq!(state.mission, Mission::None);
        assert_eq!(state.elapsed, Fixed::ZERO);
    }
}
