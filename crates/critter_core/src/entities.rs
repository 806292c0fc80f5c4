//! Entity definitions.
//!
//! Plain data for everything that lives in the pen: agents, food,
//! barriers (walls and legacy markers) and corpses. Behaviour lives in
//! the system modules; this module only holds state and small accessors.
//!
//! Cross-entity references are generational [`slotmap`] keys. A key to a
//! removed entity simply fails to resolve, so stale targets are detected
//! by lookup instead of by bookkeeping.

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

use crate::config::SimConfig;
use crate::math::{Aabb, Fixed, Vec2Fixed};
use crate::mission::MissionState;

new_key_type! {
    /// Generational handle of an agent.
    pub struct AgentId;
    /// Generational handle of a food item.
    pub struct FoodId;
    /// Generational handle of a barrier or legacy marker.
    pub struct BarrierId;
    /// Generational handle of a corpse.
    pub struct CorpseId;
}

/// Family color; the unit of kinship and alliance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FamilyColor {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl FamilyColor {
    /// Create a color.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Brighten or darken every channel, saturating at 255.
    #[must_use]
    pub fn scaled(self, factor: Fixed) -> Self {
        let channel = |c: u8| -> u8 {
            let value = Fixed::from_num(c) * factor;
            value.clamp(Fixed::ZERO, Fixed::from_num(255)).to_num::<u8>()
        };
        Self::new(channel(self.r), channel(self.g), channel(self.b))
    }
}

impl std::fmt::Display for FamilyColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Immutable personality, rolled once at birth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Temperament {
    /// Lowers the hunger level at which food is sought.
    pub greed: Fixed,
    /// Drives idle shuffling next to allies.
    pub curiosity: Fixed,
    /// Drives patrols, legacy placement and demolition of rival markers.
    pub territorial: Fixed,
    /// Drives legacy placement.
    pub legacy_desire: Fixed,
    /// Chance of standing ground in a duel.
    pub bravery: Fixed,
}

/// Lifetime counters, also used for the magic number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AgentStats {
    /// Seconds alive.
    pub lifetime: Fixed,
    /// Children born.
    pub kids: u32,
    /// Food items eaten.
    pub foods: u32,
    /// Agents killed.
    pub kills: u32,
}

impl AgentStats {
    /// Aggregate fitness score: mean of lifetime, kids, foods and kills.
    #[must_use]
    pub fn magic_number(&self) -> Fixed {
        (self.lifetime
            + Fixed::from_num(self.kids)
            + Fixed::from_num(self.foods)
            + Fixed::from_num(self.kills))
            / Fixed::from_num(4)
    }
}

/// Axis of the zig-zag exploration pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Axis {
    /// Horizontal leg.
    #[default]
    X,
    /// Vertical leg.
    Y,
}

impl Axis {
    /// The perpendicular axis.
    #[must_use]
    pub const fn flipped(self) -> Self {
        match self {
            Self::X => Self::Y,
            Self::Y => Self::X,
        }
    }
}

/// Per-agent throttle timers. Each counts seconds since its last firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AgentTimers {
    /// Ally/enemy cache refresh.
    pub scan: Fixed,
    /// Barrier/corpse repulsion and demolition.
    pub repel: Fixed,
    /// Alliance scan.
    pub alliance: Fixed,
    /// Survival pre-emption check.
    pub decision: Fixed,
}

/// Sliding-window displacement tracker used to break deadlocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StuckTracker {
    /// Position the window started at.
    pub anchor: Vec2Fixed,
    /// Seconds spent within `stuck_epsilon` of the anchor while trying to move.
    pub time: Fixed,
    /// Last non-zero direction the agent asked to move in.
    pub last_direction: Vec2Fixed,
}

/// Everything needed to create an agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSeed {
    /// Unique first name.
    pub name: String,
    /// Parent's first name, if born in the pen.
    pub parent: Option<String>,
    /// Parent's lineage chain (empty for founders).
    pub parent_lineage: Vec<String>,
    /// Inherited or freshly rolled family color.
    pub family: FamilyColor,
    /// Spawn position.
    pub position: Vec2Fixed,
    /// Rolled temperament.
    pub temperament: Temperament,
    /// Initial heading (unit vector or zero).
    pub heading: Vec2Fixed,
}

/// An individual creature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    /// Unique first name.
    pub name: String,
    /// Parent's name with a `z` suffix, for pen-born agents.
    pub last_name: Option<String>,
    /// Parent's first name.
    pub parent: Option<String>,
    /// Names from the founding ancestor down to this agent.
    pub lineage: Vec<String>,
    /// Kinship tag shared with every ancestor and descendant.
    pub family: FamilyColor,

    /// Body center.
    pub position: Vec2Fixed,
    /// Half body size.
    pub half_extents: Vec2Fixed,
    /// Wander heading; components flip when clamped at the pen walls.
    pub heading: Vec2Fixed,

    /// Health, `0..=max_health`.
    pub health: Fixed,
    /// Grows with time, reset by eating.
    pub hunger: Fixed,
    /// Seconds spent above the starvation threshold.
    pub hunger_time: Fixed,

    /// Fixed personality.
    pub temperament: Temperament,
    /// Current goal.
    pub mission: MissionState,
    /// Cached kin handles (may be stale).
    pub allies: Vec<AgentId>,
    /// Cached non-kin handles (may be stale).
    pub enemies: Vec<AgentId>,
    /// Seconds until the next strike is allowed.
    pub attack_cooldown: Fixed,

    /// Lifetime counters.
    pub stats: AgentStats,
    /// Full names of agents this one killed.
    pub victims: Vec<String>,
    /// First names of children.
    pub offspring: Vec<String>,
    /// Legacy markers placed by this agent.
    pub legacy_markers: Vec<BarrierId>,
    /// Lifetime at which the last marker was placed.
    pub last_legacy_at: Option<Fixed>,
    /// Current zig-zag leg.
    pub explore_axis: Axis,

    /// Seconds spent below the sated threshold.
    pub sated_time: Fixed,
    /// Set once sated long enough; cleared by a birth.
    pub ready_to_birth: bool,

    /// Throttle timers.
    pub timers: AgentTimers,
    /// Deadlock detection.
    pub stuck: StuckTracker,
    /// False from the moment of death until removal.
    pub alive: bool,
    /// Gold badge shown once the agent is mature.
    pub badge: bool,
}

impl Agent {
    /// Create a fresh agent at full health.
    #[must_use]
    pub fn new(seed: AgentSeed, config: &SimConfig) -> Self {
        let mut lineage = seed.parent_lineage;
        lineage.push(seed.name.clone());
        let last_name = seed.parent.as_ref().map(|p| format!("{p}z"));

        Self {
            name: seed.name,
            last_name,
            parent: seed.parent,
            lineage,
            family: seed.family,
            position: seed.position,
            half_extents: config.agent_half_extents,
            heading: seed.heading,
            health: config.max_health,
            hunger: Fixed::ZERO,
            hunger_time: Fixed::ZERO,
            temperament: seed.temperament,
            mission: MissionState::default(),
            allies: Vec::new(),
            enemies: Vec::new(),
            attack_cooldown: Fixed::ZERO,
            stats: AgentStats::default(),
            victims: Vec::new(),
            offspring: Vec::new(),
            legacy_markers: Vec::new(),
            last_legacy_at: None,
            explore_axis: Axis::X,
            sated_time: Fixed::ZERO,
            ready_to_birth: false,
            timers: AgentTimers::default(),
            stuck: StuckTracker {
                anchor: seed.position,
                ..StuckTracker::default()
            },
            alive: true,
            badge: false,
        }
    }

    /// First and last name joined, as shown in ledgers.
    #[must_use]
    pub fn full_name(&self) -> String {
        match &self.last_name {
            Some(last) => format!("{} {}", self.name, last),
            None => self.name.clone(),
        }
    }

    /// Body box at the current position.
    #[must_use]
    pub fn aabb(&self) -> Aabb {
        Aabb::new(self.position, self.half_extents)
    }

    /// Aggregate fitness score.
    #[must_use]
    pub fn magic_number(&self) -> Fixed {
        self.stats.magic_number()
    }

    /// Family color tinted by the current mission.
    #[must_use]
    pub fn display_color(&self) -> FamilyColor {
        self.family.scaled(self.mission.mission.color_factor())
    }
}

/// A consumable food item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Food {
    /// Center position.
    pub position: Vec2Fixed,
    /// Half size.
    pub half_extents: Vec2Fixed,
}

impl Food {
    /// Body box.
    #[must_use]
    pub fn aabb(&self) -> Aabb {
        Aabb::new(self.position, self.half_extents)
    }
}

/// What a barrier is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BarrierKind {
    /// Host-placed obstacle.
    Wall,
    /// Territorial marker left by a mature agent.
    Legacy {
        /// Family that owns the marker.
        family: FamilyColor,
        /// Agent that placed it (may be dead).
        owner: AgentId,
    },
}

/// Static axis-aligned obstacle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Barrier {
    /// Extents in world space.
    pub bounds: Aabb,
    /// Wall or legacy marker.
    pub kind: BarrierKind,
}

impl Barrier {
    /// Owning family, for legacy markers.
    #[must_use]
    pub fn legacy_family(&self) -> Option<FamilyColor> {
        match self.kind {
            BarrierKind::Legacy { family, .. } => Some(family),
            BarrierKind::Wall => None,
        }
    }
}

/// How an agent died.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum DeathCause {
    /// Hunger stayed above the threshold too long.
    Starvation,
    /// Killed by another agent.
    Combat {
        /// Killer's full name.
        killer: String,
    },
    /// Removed by the host.
    Removed,
}

impl DeathCause {
    /// Short label for ledgers.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Starvation => "starvation",
            Self::Combat { .. } => "combat",
            Self::Removed => "removed",
        }
    }
}

/// Transient marker at a death position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Corpse {
    /// Death position.
    pub position: Vec2Fixed,
    /// Why the agent died.
    pub cause: DeathCause,
    /// Seconds until the corpse disappears.
    pub remaining: Fixed,
}

/// Tags the host can query by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityTag {
    /// Living agents.
    Agent,
    /// Food items.
    Food,
    /// All barriers, walls and legacy markers alike.
    Barrier,
    /// Legacy markers only.
    Legacy,
    /// Corpses.
    Corpse,
}

/// Handle to any entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityHandle {
    /// An agent.
    Agent(AgentId),
    /// A food item.
    Food(FoodId),
    /// A wall or legacy marker.
    Barrier(BarrierId),
    /// A corpse.
    Corpse(CorpseId),
}
