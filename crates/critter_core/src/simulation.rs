//! Core simulation loop.
//!
//! [`Simulation`] owns every entity in the pen and advances them by the
//! elapsed time the host passes to [`Simulation::tick`]. Each tick runs a
//! fixed sequence of steps:
//!
//! 1. **Food** - drop a food item every `food_spawn_interval` seconds
//! 2. **Agents** - update each living agent in handle order (hunger,
//!    neighbour scan, mission choice, movement, strikes, repulsion,
//!    alliances, birth, pen clamp)
//! 3. **Contacts** - overlapping agent pairs and agent/food pairs are
//!    dispatched to [`Simulation::on_agent_contact`] and
//!    [`Simulation::on_food_contact`] (skipped when the host delivers its
//!    own collision events)
//! 4. **Corpses** - expire old corpses
//!
//! # Determinism
//!
//! - No floating-point math (uses fixed-point via [`Fixed`])
//! - Every roll goes through the simulation's [`RandomSource`]
//! - Agents are visited in slot-map key order
//! - Same seed and inputs always produce the same [`Simulation::state_hash`]
//!
//! # Example
//!
//! ```
//! use critter_core::config::SimConfig;
//! use critter_core::simulation::Simulation;
//! use critter_core::math::percent;
//!
//! let mut sim = Simulation::with_seed(SimConfig::default(), 42).unwrap();
//! sim.seed_population();
//!
//! for _ in 0..20 {
//!     sim.tick(percent(5));
//! }
//! assert_eq!(sim.current_tick(), 20);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use crate::combat::{resolve_duel, resolve_strike, within_strike_range, DuelOutcome, Duelist, Side, Strike};
use crate::config::{SimConfig, TraitRange};
use crate::entities::{
    Agent, AgentId, AgentSeed, Barrier, BarrierId, BarrierKind, Corpse, CorpseId, DeathCause,
    EntityHandle, EntityTag, FamilyColor, Food, FoodId, Temperament,
};
use crate::error::{Result, SimError};
use crate::events::{LabelKind, SimEvent, TickEvents};
use crate::lifecycle::{
    advance_hunger, advance_satiety, birth_decision, defer_birth, feed, record_birth,
    AncestorLedger, AncestorRecord, BirthDecision, HungerOutcome, NewsFeed,
};
use crate::lineage::{traits_compatible, AllianceTable, NameGenerator};
use crate::locomotion::{
    arrived, bounce, clamp_point, damping_factor, distance_to_box, random_direction,
    separation_direction, settle_in_area, track_stuck, try_move,
};
use crate::math::{Aabb, Fixed, Vec2Fixed};
use crate::mission::{select_mission, should_preempt, Mission, MissionKind, Surroundings};
use crate::rng::{RandomSource, SeededRng};

/// Ticks per second the headless host runs at.
pub const TICK_RATE: u32 = 20;

/// Food scattered around a fresh legacy marker lands within this many units of it.
const LEGACY_FOOD_SPREAD: i32 = 30;
/// Legacy food keeps at least this far from the pen walls.
const LEGACY_FOOD_INSET: i32 = 10;
/// Host-placed walls are removed by a point within this distance of their center.
const WALL_PICK_RADIUS: i32 = 10;
/// Brightest channel of a freshly rolled family color is at least this.
const MIN_COLOR_CHANNEL: u8 = 40;

/// Seconds per tick at [`TICK_RATE`].
#[must_use]
pub fn tick_seconds() -> Fixed {
    Fixed::from_num(1) / Fixed::from_num(TICK_RATE)
}

/// Snap a point down to the corner of its grid cell, measured from `origin`.
#[must_use]
pub fn snap_to_grid(point: Vec2Fixed, origin: Vec2Fixed, cell: Fixed) -> Vec2Fixed {
    if cell <= Fixed::ZERO {
        return point;
    }
    let snap = |v: Fixed, o: Fixed| ((v - o) / cell).floor() * cell + o;
    Vec2Fixed::new(snap(point.x, origin.x), snap(point.y, origin.y))
}

/// Closest candidate to `origin`, ties broken by handle.
fn nearest(origin: Vec2Fixed, candidates: impl Iterator<Item = (AgentId, Vec2Fixed)>) -> Option<AgentId> {
    candidates
        .map(|(id, p)| (origin.distance_squared(p), id))
        .min()
        .map(|(_, id)| id)
}

/// Something the host wants added to the pen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpawnRequest {
    /// A founder agent. Missing fields are rolled.
    Agent {
        /// Spawn position (clamped into the pen).
        position: Vec2Fixed,
        /// Family color; a random one when absent.
        family: Option<FamilyColor>,
        /// First name; a generated one when absent.
        name: Option<String>,
        /// Temperament; rolled from the configured ranges when absent.
        temperament: Option<Temperament>,
    },
    /// A food item.
    Food {
        /// Center position.
        position: Vec2Fixed,
    },
    /// A host-placed wall.
    Wall {
        /// Wall extents.
        bounds: Aabb,
    },
    /// A legacy marker dropped at an agent's position, as if it chose to.
    Legacy {
        /// Agent leaving the marker.
        owner: AgentId,
    },
    /// A corpse.
    Corpse {
        /// Where it lies.
        position: Vec2Fixed,
        /// Recorded cause.
        cause: DeathCause,
    },
}

/// One row of the live statistics table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSummary {
    /// Handle.
    pub id: AgentId,
    /// Full name.
    pub name: String,
    /// Family color.
    pub family: FamilyColor,
    /// Family color tinted by the current mission.
    pub display_color: FamilyColor,
    /// Position.
    pub position: Vec2Fixed,
    /// Health.
    pub health: Fixed,
    /// Hunger.
    pub hunger: Fixed,
    /// Current mission.
    pub mission: MissionKind,
    /// Seconds alive.
    pub lifetime: Fixed,
    /// Children born.
    pub kids: u32,
    /// Food eaten.
    pub foods: u32,
    /// Agents killed.
    pub kills: u32,
    /// Fitness score.
    pub magic_number: Fixed,
    /// Bravery, shown as a hint of temperament.
    pub bravery: Fixed,
    /// Gold badge.
    pub badge: bool,
}

/// A requested movement for one agent.
#[derive(Debug, Clone, Copy)]
struct Step {
    direction: Vec2Fixed,
    speed: Fixed,
    damped: bool,
    exempt: Option<AgentId>,
}

impl Step {
    fn new(direction: Vec2Fixed, speed: Fixed) -> Self {
        Self {
            direction,
            speed,
            damped: true,
            exempt: None,
        }
    }

    fn undamped(mut self) -> Self {
        self.damped = false;
        self
    }

    fn exempt(mut self, other: Option<AgentId>) -> Self {
        self.exempt = other;
        self
    }
}

/// The pen and everything in it.
///
/// Generic over the [`RandomSource`] so tests can script every roll; the
/// default is a seeded ChaCha generator.
#[derive(Debug, Clone)]
pub struct Simulation<R: RandomSource = SeededRng> {
    tick: u64,
    elapsed: Fixed,
    config: SimConfig,
    rng: R,
    agents: SlotMap<AgentId, Agent>,
    food: SlotMap<FoodId, Food>,
    barriers: SlotMap<BarrierId, Barrier>,
    corpses: SlotMap<CorpseId, Corpse>,
    alliances: AllianceTable,
    ledger: AncestorLedger,
    news: NewsFeed,
    names: NameGenerator,
    food_timer: Fixed,
    paused: bool,
    /// Events raised outside `tick` (contacts, spawns, removals), delivered
    /// with the next tick's batch.
    outbox: Vec<SimEvent>,
}

impl Simulation<SeededRng> {
    /// Create an empty pen with a seeded ChaCha generator.
    pub fn with_seed(config: SimConfig, seed: u64) -> Result<Self> {
        Self::new(config, SeededRng::new(seed))
    }
}

impl<R: RandomSource> Simulation<R> {
    /// Create an empty pen.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] if the config fails validation.
    pub fn new(config: SimConfig, rng: R) -> Result<Self> {
        config.validate()?;
        let news = NewsFeed::with_capacity(config.news_capacity);
        Ok(Self {
            tick: 0,
            elapsed: Fixed::ZERO,
            config,
            rng,
            agents: SlotMap::with_key(),
            food: SlotMap::with_key(),
            barriers: SlotMap::with_key(),
            corpses: SlotMap::with_key(),
            alliances: AllianceTable::new(),
            ledger: AncestorLedger::new(),
            news,
            names: NameGenerator::new(),
            food_timer: Fixed::ZERO,
            paused: false,
            outbox: Vec::new(),
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Number of completed ticks.
    #[must_use]
    pub const fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Simulated seconds since creation.
    #[must_use]
    pub const fn elapsed(&self) -> Fixed {
        self.elapsed
    }

    /// Active tunables.
    #[must_use]
    pub const fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Look up an agent.
    #[must_use]
    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(id)
    }

    /// Look up an agent for modification.
    pub fn agent_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agents.get_mut(id)
    }

    /// Living agents in handle order.
    pub fn agents(&self) -> impl Iterator<Item = (AgentId, &Agent)> {
        self.agents.iter()
    }

    /// Look up a food item.
    #[must_use]
    pub fn food(&self, id: FoodId) -> Option<&Food> {
        self.food.get(id)
    }

    /// Look up a barrier or legacy marker.
    #[must_use]
    pub fn barrier(&self, id: BarrierId) -> Option<&Barrier> {
        self.barriers.get(id)
    }

    /// Look up a corpse.
    #[must_use]
    pub fn corpse(&self, id: CorpseId) -> Option<&Corpse> {
        self.corpses.get(id)
    }

    /// Number of living agents.
    #[must_use]
    pub fn population(&self) -> usize {
        self.agents.len()
    }

    /// Number of food items.
    #[must_use]
    pub fn food_count(&self) -> usize {
        self.food.len()
    }

    /// Recorded alliances.
    #[must_use]
    pub const fn alliances(&self) -> &AllianceTable {
        &self.alliances
    }

    /// History of the dead.
    #[must_use]
    pub const fn ledger(&self) -> &AncestorLedger {
        &self.ledger
    }

    /// Recent news.
    #[must_use]
    pub const fn news(&self) -> &NewsFeed {
        &self.news
    }

    /// True while ticking is suspended.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    /// Suspend or resume ticking. State is kept as is.
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Kinship between two living agents.
    #[must_use]
    pub fn are_kin(&self, a: AgentId, b: AgentId) -> bool {
        match (self.agents.get(a), self.agents.get(b)) {
            (Some(x), Some(y)) => self.alliances.is_kin(x.family, y.family),
            _ => false,
        }
    }

    // ========================================================================
    // Host boundary
    // ========================================================================

    /// Handles of every entity with `tag`, in handle order.
    #[must_use]
    pub fn query(&self, tag: EntityTag) -> Vec<EntityHandle> {
        match tag {
            EntityTag::Agent => self.agents.keys().map(EntityHandle::Agent).collect(),
            EntityTag::Food => self.food.keys().map(EntityHandle::Food).collect(),
            EntityTag::Barrier => self.barriers.keys().map(EntityHandle::Barrier).collect(),
            EntityTag::Legacy => self
                .barriers
                .iter()
                .filter(|(_, b)| b.legacy_family().is_some())
                .map(|(id, _)| EntityHandle::Barrier(id))
                .collect(),
            EntityTag::Corpse => self.corpses.keys().map(EntityHandle::Corpse).collect(),
        }
    }

    /// Add an entity.
    ///
    /// # Errors
    ///
    /// - [`SimError::InvalidState`] if an explicit agent name is taken.
    /// - [`SimError::EntityNotFound`] if a legacy owner does not exist.
    pub fn spawn(&mut self, request: SpawnRequest) -> Result<EntityHandle> {
        match request {
            SpawnRequest::Agent {
                position,
                family,
                name,
                temperament,
            } => {
                let name = match name {
                    Some(name) => {
                        if !self.names.reserve(&name) {
                            return Err(SimError::InvalidState(format!(
                                "agent name '{name}' is already taken"
                            )));
                        }
                        name
                    }
                    None => self.names.generate(&mut self.rng),
                };
                let family = family.unwrap_or_else(|| self.roll_family());
                let temperament = temperament.unwrap_or_else(|| self.roll_temperament());
                let (position, _) = clamp_point(position, &self.config.movement_area());
                let heading = random_direction(&mut self.rng);
                let id = self.insert_agent(AgentSeed {
                    name,
                    parent: None,
                    parent_lineage: Vec::new(),
                    family,
                    position,
                    temperament,
                    heading,
                });
                Ok(EntityHandle::Agent(id))
            }
            SpawnRequest::Food { position } => Ok(EntityHandle::Food(self.insert_food(position))),
            SpawnRequest::Wall { bounds } => Ok(EntityHandle::Barrier(self.barriers.insert(Barrier {
                bounds,
                kind: BarrierKind::Wall,
            }))),
            SpawnRequest::Legacy { owner } => self
                .place_legacy(owner)
                .map(EntityHandle::Barrier)
                .ok_or_else(|| SimError::EntityNotFound(format!("{owner:?}"))),
            SpawnRequest::Corpse { position, cause } => Ok(EntityHandle::Corpse(self.corpses.insert(Corpse {
                position,
                cause,
                remaining: self.config.corpse_lifetime,
            }))),
        }
    }

    /// Remove an entity. Removing an agent counts as a death.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::EntityNotFound`] if the handle is stale.
    pub fn destroy(&mut self, handle: EntityHandle) -> Result<()> {
        let missing = || SimError::EntityNotFound(format!("{handle:?}"));
        match handle {
            EntityHandle::Agent(id) => {
                if !self.agents.contains_key(id) {
                    return Err(missing());
                }
                self.kill_agent(id, DeathCause::Removed);
            }
            EntityHandle::Food(id) => {
                self.food.remove(id).ok_or_else(missing)?;
            }
            EntityHandle::Barrier(id) => {
                self.remove_barrier(id).ok_or_else(missing)?;
            }
            EntityHandle::Corpse(id) => {
                self.corpses.remove(id).ok_or_else(missing)?;
            }
        }
        Ok(())
    }

    /// Spawn the configured number of founders at random positions.
    pub fn seed_population(&mut self) -> Vec<AgentId> {
        let count = self.config.initial_population;
        let mut spawned = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let position = self.random_inner_point(self.config.food_margin);
            if let Ok(EntityHandle::Agent(id)) = self.spawn(SpawnRequest::Agent {
                position,
                family: None,
                name: None,
                temperament: None,
            }) {
                spawned.push(id);
            }
        }
        tracing::info!(count = spawned.len(), "Seeded founding population");
        spawned
    }

    /// Drop a food item where the host clicked, if the point is inside the pen.
    pub fn drop_food(&mut self, point: Vec2Fixed) -> Option<FoodId> {
        self.config.in_pen(point).then(|| self.insert_food(point))
    }

    /// Place a wall on the grid cell under `point`.
    ///
    /// Returns `None` if the point is outside the pen or the cell already
    /// holds a wall.
    pub fn place_wall(&mut self, point: Vec2Fixed) -> Option<BarrierId> {
        if !self.config.in_pen(point) {
            return None;
        }
        let cell = self.config.legacy_size;
        let corner = snap_to_grid(point, self.config.pen_origin, cell);
        let bounds = Aabb::from_corner(corner, Vec2Fixed::new(cell, cell));
        let occupied = self
            .barriers
            .values()
            .any(|b| b.kind == BarrierKind::Wall && b.bounds.center == bounds.center);
        if occupied {
            return None;
        }
        Some(self.barriers.insert(Barrier {
            bounds,
            kind: BarrierKind::Wall,
        }))
    }

    /// Remove the first wall whose center is within reach of `point`.
    pub fn remove_wall_near(&mut self, point: Vec2Fixed) -> Option<BarrierId> {
        let reach = Fixed::from_num(WALL_PICK_RADIUS);
        let hit = self
            .barriers
            .iter()
            .find(|(_, b)| {
                b.kind == BarrierKind::Wall && b.bounds.center.distance_squared(point) < reach * reach
            })
            .map(|(id, _)| id)?;
        self.remove_barrier(hit).map(|_| hit)
    }

    /// Rows for the live statistics table, in handle order.
    #[must_use]
    pub fn live_stats(&self) -> Vec<AgentSummary> {
        self.agents
            .iter()
            .map(|(id, a)| AgentSummary {
                id,
                name: a.full_name(),
                family: a.family,
                display_color: a.display_color(),
                position: a.position,
                health: a.health,
                hunger: a.hunger,
                mission: a.mission.mission.kind(),
                lifetime: a.stats.lifetime,
                kids: a.stats.kids,
                foods: a.stats.foods,
                kills: a.stats.kills,
                magic_number: a.magic_number(),
                bravery: a.temperament.bravery,
                badge: a.badge,
            })
            .collect()
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// Advance the pen by `dt` seconds.
    ///
    /// While paused this returns an empty batch and changes nothing.
    pub fn tick(&mut self, dt: Fixed) -> TickEvents {
        if self.paused {
            return TickEvents::new(self.tick);
        }

        self.spawn_periodic_food(dt);

        let ids: Vec<AgentId> = self.agents.keys().collect();
        for id in ids {
            self.update_agent(id, dt);
        }

        if self.config.builtin_contacts {
            self.detect_contacts();
        }

        self.expire_corpses(dt);

        self.tick += 1;
        self.elapsed += dt;

        #[cfg(feature = "debug-validation")]
        if let Err(e) = self.check_invariants() {
            tracing::error!(tick = self.tick, error = %e, "Invariant violated");
        }

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::trace!(tick = self.tick, state_hash = hash, "Simulation state hash");
        }

        TickEvents {
            tick: self.tick,
            events: std::mem::take(&mut self.outbox),
        }
    }

    fn spawn_periodic_food(&mut self, dt: Fixed) {
        if self.config.food_spawn_interval <= Fixed::ZERO {
            return;
        }
        self.food_timer += dt;
        if self.food_timer < self.config.food_spawn_interval {
            return;
        }
        self.food_timer = Fixed::ZERO;
        if self.food.len() >= self.config.max_food as usize {
            return;
        }
        let position = self.random_inner_point(self.config.food_margin);
        self.insert_food(position);
    }

    fn expire_corpses(&mut self, dt: Fixed) {
        for corpse in self.corpses.values_mut() {
            corpse.remaining -= dt;
        }
        self.corpses.retain(|_, c| c.remaining > Fixed::ZERO);
    }

    fn detect_contacts(&mut self) {
        let ids: Vec<AgentId> = self.agents.keys().collect();
        for (i, &a) in ids.iter().enumerate() {
            for &b in &ids[i + 1..] {
                let touching = match (self.agents.get(a), self.agents.get(b)) {
                    (Some(x), Some(y)) => x.aabb().intersects(&y.aabb()),
                    _ => false,
                };
                if touching {
                    self.on_agent_contact(a, b);
                }
            }
        }

        for id in ids {
            let Some(body) = self.agents.get(id).map(Agent::aabb) else {
                continue;
            };
            let meal = self
                .food
                .iter()
                .find(|(_, f)| f.aabb().intersects(&body))
                .map(|(fid, _)| fid);
            if let Some(food) = meal {
                self.on_food_contact(id, food);
            }
        }
    }

    // ========================================================================
    // Per-agent update
    // ========================================================================

    fn update_agent(&mut self, id: AgentId, dt: Fixed) {
        let Some(agent) = self.agents.get_mut(id) else {
            return;
        };

        if advance_hunger(agent, dt, &self.config) == HungerOutcome::Starved {
            self.kill_agent(id, DeathCause::Starvation);
            return;
        }

        agent.mission.elapsed += dt;
        agent.attack_cooldown = (agent.attack_cooldown - dt).max(Fixed::ZERO);
        agent.timers.scan += dt;
        agent.timers.repel += dt;
        agent.timers.alliance += dt;
        agent.timers.decision += dt;
        if agent.stats.lifetime > self.config.mature_age {
            agent.badge = true;
        }

        self.refresh_neighbours(id);
        self.choose_mission(id);
        self.execute_mission(id, dt);
        self.repel_and_demolish(id, dt);
        self.scan_for_alliances(id);
        self.check_birth(id, dt);

        let boxes = self.barrier_boxes();
        let area = self.config.movement_area();
        if let Some(agent) = self.agents.get_mut(id) {
            agent.position = settle_in_area(agent.aabb(), &boxes, &area);
        }
    }

    fn refresh_neighbours(&mut self, id: AgentId) {
        let Some(me) = self.agents.get(id) else {
            return;
        };
        if me.timers.scan < self.config.scan_interval {
            return;
        }
        let family = me.family;
        let (mut allies, mut enemies) = (Vec::new(), Vec::new());
        for (other, agent) in &self.agents {
            if other == id {
                continue;
            }
            if self.alliances.is_kin(family, agent.family) {
                allies.push(other);
            } else {
                enemies.push(other);
            }
        }
        if let Some(me) = self.agents.get_mut(id) {
            me.allies = allies;
            me.enemies = enemies;
            me.timers.scan = Fixed::ZERO;
        }
    }

    fn mission_still_valid(&self, id: AgentId, mission: &Mission) -> bool {
        let hostile_ok = |target: AgentId| target != id && self.agents.contains_key(target) && !self.are_kin(id, target);
        match *mission {
            Mission::None => false,
            Mission::Eat { food } => self.food.contains_key(food),
            Mission::Attack { target } | Mission::Defend { target } => hostile_ok(target),
            Mission::Flee { threat } => threat.map_or(true, |t| self.agents.contains_key(t)),
            Mission::Patrol { marker } => self.barriers.contains_key(marker),
            Mission::Roam { ally } => ally != id && self.agents.contains_key(ally),
            Mission::Legacy | Mission::Explore { .. } => true,
        }
    }

    fn choose_mission(&mut self, id: AgentId) {
        let Some(agent) = self.agents.get(id) else {
            return;
        };
        let current = agent.mission;
        let needs_new = !self.mission_still_valid(id, &current.mission)
            || current.expired(self.config.mission_timeout);
        let survival_check = agent.health < self.config.flee_health
            || agent.timers.decision >= self.config.decision_interval;
        if !needs_new && !survival_check {
            return;
        }

        let near = self.surroundings(id);
        let Some(agent) = self.agents.get(id) else {
            return;
        };
        if !needs_new && !should_preempt(agent, &near, &self.config) {
            if let Some(agent) = self.agents.get_mut(id) {
                agent.timers.decision = Fixed::ZERO;
            }
            return;
        }

        let mission = select_mission(agent, &near, &self.config, &mut self.rng);
        tracing::debug!(
            agent = %agent.name,
            from = current.mission.kind().as_str(),
            to = mission.kind().as_str(),
            "Mission selected"
        );
        if let Some(agent) = self.agents.get_mut(id) {
            agent.mission.assign(mission);
            agent.timers.decision = Fixed::ZERO;
        }
    }

    /// Gather what `id` can see for mission selection.
    #[must_use]
    pub fn surroundings(&self, id: AgentId) -> Surroundings {
        let Some(me) = self.agents.get(id) else {
            return Surroundings::default();
        };
        let pos = me.position;
        let config = &self.config;
        let enemies: Vec<(AgentId, Vec2Fixed)> = me
            .enemies
            .iter()
            .filter_map(|&e| self.agents.get(e).map(|a| (e, a)))
            .filter(|(e, a)| *e != id && !self.alliances.is_kin(me.family, a.family))
            .map(|(e, a)| (e, a.position))
            .collect();
        let allies: Vec<AgentId> = me
            .allies
            .iter()
            .copied()
            .filter(|&a| a != id && self.agents.contains_key(a))
            .collect();

        let nearest_enemy = nearest(pos, enemies.iter().copied());
        let reach = config.aggression_radius * config.aggression_radius;
        let enemy_in_reach = nearest(
            pos,
            enemies.iter().copied().filter(|(_, p)| pos.distance_squared(*p) <= reach),
        );

        let nearest_food = self
            .food
            .iter()
            .map(|(fid, f)| (pos.distance_squared(f.position), fid))
            .min()
            .map(|(_, fid)| fid);

        let own_markers: Vec<(BarrierId, Vec2Fixed)> = self
            .barriers
            .iter()
            .filter(|(_, b)| b.legacy_family() == Some(me.family))
            .map(|(bid, b)| (bid, b.bounds.center))
            .collect();
        let own_marker = own_markers
            .iter()
            .map(|(bid, c)| (pos.distance_squared(*c), *bid))
            .min()
            .map(|(_, bid)| bid);

        let defend = config.defend_radius * config.defend_radius;
        let marker_intruder = nearest(
            pos,
            enemies.iter().copied().filter(|(_, p)| {
                own_markers.iter().any(|(_, c)| c.distance_squared(*p) <= defend)
            }),
        );

        let ally_threat = allies
            .iter()
            .filter_map(|&a| self.agents.get(a))
            .filter_map(|ally| match ally.mission.mission {
                Mission::Flee { threat: Some(t) } => Some(t),
                _ => None,
            })
            .filter(|&t| t != id)
            .filter_map(|t| self.agents.get(t).map(|a| (t, a)))
            .filter(|(_, a)| !self.alliances.is_kin(me.family, a.family))
            .map(|(t, a)| (t, a.position))
            .filter(|(_, p)| pos.distance_squared(*p) <= defend)
            .min_by_key(|(_, p)| pos.distance_squared(*p))
            .map(|(t, _)| t);

        Surroundings {
            nearest_enemy,
            enemy_in_reach,
            nearest_food,
            marker_intruder,
            ally_threat,
            own_marker,
            allies,
        }
    }

    fn execute_mission(&mut self, id: AgentId, dt: Fixed) {
        let Some(agent) = self.agents.get(id) else {
            return;
        };
        let pos = agent.position;
        let heading = agent.heading;
        let curiosity = agent.temperament.curiosity;
        let mission = agent.mission.mission;
        let base = self.config.base_speed;

        match mission {
            Mission::None => {}
            Mission::Eat { food } => {
                if let Some(f) = self.food.get(food) {
                    let step = Step::new(f.position - pos, base).undamped();
                    self.move_agent(id, step, dt);
                }
            }
            Mission::Attack { target } | Mission::Defend { target } => {
                if let Some(t) = self.agents.get(target) {
                    let step = Step::new(t.position - pos, base).exempt(Some(target));
                    self.move_agent(id, step, dt);
                    self.try_strike(id, target);
                }
            }
            Mission::Flee { threat } => {
                let away = threat
                    .and_then(|t| self.agents.get(t))
                    .map(|t| pos - t.position)
                    .filter(|v| !v.is_zero());
                let direction = match away {
                    Some(v) => v,
                    None if !heading.is_zero() => heading,
                    None => random_direction(&mut self.rng),
                };
                let step = Step::new(direction, base + self.config.flee_speed_bonus).exempt(threat);
                self.move_agent(id, step, dt);
            }
            Mission::Patrol { marker } => {
                if let Some(center) = self.barriers.get(marker).map(|b| b.bounds.center) {
                    if arrived(pos, center, self.config.patrol_arrival) {
                        self.clear_mission(id);
                    } else {
                        self.move_agent(id, Step::new(center - pos, base), dt);
                    }
                }
            }
            Mission::Roam { ally } => {
                if let Some(ally_pos) = self.agents.get(ally).map(|a| a.position) {
                    let follow = self.config.roam_follow_distance;
                    if pos.distance_squared(ally_pos) > follow * follow {
                        let step = Step::new(ally_pos - pos, base * self.config.roam_speed_factor)
                            .exempt(Some(ally));
                        self.move_agent(id, step, dt);
                    } else if self.rng.chance(curiosity) {
                        let direction = random_direction(&mut self.rng);
                        let step = Step::new(direction, base * self.config.roam_jitter_factor)
                            .exempt(Some(ally));
                        self.move_agent(id, step, dt);
                    }
                }
            }
            Mission::Legacy => {
                self.place_legacy(id);
                self.clear_mission(id);
            }
            Mission::Explore { waypoint } => {
                if arrived(pos, waypoint, self.config.arrival_epsilon) {
                    if let Some(agent) = self.agents.get_mut(id) {
                        agent.explore_axis = agent.explore_axis.flipped();
                        agent.mission.clear();
                    }
                } else {
                    let step = Step::new(waypoint - pos, base * self.config.explore_speed_factor);
                    self.move_agent(id, step, dt);
                }
            }
        }
    }

    fn clear_mission(&mut self, id: AgentId) {
        if let Some(agent) = self.agents.get_mut(id) {
            agent.mission.clear();
        }
    }

    fn barrier_boxes(&self) -> Vec<Aabb> {
        self.barriers.values().map(|b| b.bounds).collect()
    }

    /// Collision-checked step (or a separation step instead of it), then the
    /// stuck nudge.
    ///
    /// If the unobstructed destination lies inside another agent's personal
    /// space, the agent backs away from its neighbours at separation speed
    /// rather than taking the step. A step that runs into the pen edge
    /// bounces the heading; an explorer also switches axis and drops its
    /// waypoint.
    fn move_agent(&mut self, id: AgentId, step: Step, dt: Fixed) {
        let boxes = self.barrier_boxes();
        let area = self.config.movement_area();
        let neighbours: Vec<Vec2Fixed> = self
            .agents
            .iter()
            .filter(|(other, _)| *other != id && Some(*other) != step.exempt)
            .map(|(_, a)| a.position)
            .collect();
        let config = &self.config;
        let Some(agent) = self.agents.get_mut(id) else {
            return;
        };

        let factor = if step.damped {
            damping_factor(agent.position, &boxes, config)
        } else {
            Fixed::from_num(1)
        };
        let distance = step.speed * factor * dt;
        let destination = agent.position + step.direction.normalize().scale(distance);
        let away = separation_direction(destination, neighbours, config);

        let outcome = if away.is_zero() {
            try_move(agent.aabb(), step.direction, distance, &boxes, &area)
        } else {
            let push = config.base_speed * config.separation_speed_factor * dt;
            try_move(agent.aabb(), away, push, &boxes, &area)
        };
        agent.position = outcome.position;
        if let Some(unit) = step.direction.try_normalize() {
            agent.heading = unit;
        }
        if away.is_zero() && !outcome.edge.is_zero() {
            agent.heading = bounce(agent.heading, outcome.edge);
            if matches!(agent.mission.mission, Mission::Explore { .. }) {
                agent.explore_axis = agent.explore_axis.flipped();
                agent.mission.clear();
            }
        }

        if let Some(nudge) = track_stuck(&mut agent.stuck, agent.position, step.direction, dt, config) {
            tracing::debug!(agent = %agent.name, "Stuck, nudging sideways");
            agent.position = try_move(agent.aabb(), nudge, step.speed * dt, &boxes, &area).position;
        }
    }

    // ========================================================================
    // Combat
    // ========================================================================

    fn try_strike(&mut self, attacker: AgentId, target: AgentId) {
        if attacker == target || self.are_kin(attacker, target) {
            return;
        }
        let (Some(a), Some(t)) = (self.agents.get(attacker), self.agents.get(target)) else {
            return;
        };
        if a.attack_cooldown > Fixed::ZERO || !within_strike_range(a.position, t.position, &self.config) {
            return;
        }

        let strike = resolve_strike(&mut self.rng, &self.config, t.health);
        if let Some(a) = self.agents.get_mut(attacker) {
            a.attack_cooldown = self.config.attack_cooldown;
        }
        let Strike::Hit { damage, remaining } = strike else {
            return;
        };

        let attacker_name = self.agents.get(attacker).map(|a| a.name.clone()).unwrap_or_default();
        let Some(t) = self.agents.get_mut(target) else {
            return;
        };
        t.health = remaining;
        let (target_name, target_full, target_pos) = (t.name.clone(), t.full_name(), t.position);

        self.outbox.push(SimEvent::Struck {
            attacker,
            target,
            damage,
        });
        self.outbox.push(SimEvent::FloatingLabel {
            position: target_pos,
            text: format!("-{}", damage.to_num::<i32>()),
            kind: LabelKind::Damage,
        });
        self.post_news(format!(
            "{attacker_name} attacks {target_name} for {} damage!",
            damage.to_num::<i32>()
        ));

        if strike.is_lethal() {
            self.credit_kill(attacker, target_full);
            let killer = self.agents.get(attacker).map(Agent::full_name).unwrap_or_default();
            self.kill_agent(target, DeathCause::Combat { killer });
            self.clear_mission(attacker);
        }
    }

    fn credit_kill(&mut self, killer: AgentId, victim: String) {
        if let Some(k) = self.agents.get_mut(killer) {
            k.stats.kills += 1;
            k.victims.push(victim);
        }
    }

    /// Two agents touched.
    ///
    /// Nothing happens unless one of them is hostile toward the other
    /// (attacking, defending against or fleeing from it). Kin drop their
    /// missions instead of fighting; otherwise the duel decides who runs
    /// or who dies. Returns the duel outcome, if one was fought.
    pub fn on_agent_contact(&mut self, a: AgentId, b: AgentId) -> Option<DuelOutcome> {
        if a == b {
            return None;
        }
        let (x, y) = (self.agents.get(a)?, self.agents.get(b)?);
        let (first, second) = if x.mission.mission.hostile_target() == Some(b) {
            (a, b)
        } else if y.mission.mission.hostile_target() == Some(a) {
            (b, a)
        } else {
            return None;
        };

        if self.are_kin(first, second) {
            tracing::debug!("Kin contact, disengaging");
            self.clear_mission(first);
            self.clear_mission(second);
            return None;
        }

        let duelist = |agent: &Agent| Duelist {
            bravery: agent.temperament.bravery,
            magic: agent.magic_number(),
        };
        let (d1, d2) = (duelist(self.agents.get(first)?), duelist(self.agents.get(second)?));
        let outcome = resolve_duel(&mut self.rng, d1, d2);
        let pick = |side: Side| match side {
            Side::First => (first, second),
            Side::Second => (second, first),
        };

        match outcome {
            DuelOutcome::Fled(side) => {
                let (coward, other) = pick(side);
                if let Some(agent) = self.agents.get_mut(coward) {
                    agent.mission.assign(Mission::Flee { threat: Some(other) });
                }
            }
            DuelOutcome::Won(side) => {
                let (winner, loser) = pick(side);
                let loser_full = self.agents.get(loser).map(Agent::full_name).unwrap_or_default();
                let winner_full = self.agents.get(winner).map(Agent::full_name).unwrap_or_default();
                self.credit_kill(winner, loser_full.clone());
                self.post_news(format!("{winner_full} defeated {loser_full}"));
                self.kill_agent(loser, DeathCause::Combat { killer: winner_full });
                self.clear_mission(winner);
            }
        }
        Some(outcome)
    }

    /// An agent touched a food item: it eats it.
    ///
    /// Returns `true` if the food was consumed.
    pub fn on_food_contact(&mut self, agent: AgentId, food: FoodId) -> bool {
        if !self.agents.contains_key(agent) || !self.food.contains_key(food) {
            return false;
        }
        self.food.remove(food);
        if let Some(a) = self.agents.get_mut(agent) {
            feed(a, &self.config);
            tracing::debug!(agent = %a.name, foods = a.stats.foods, "Ate");
        }
        self.outbox.push(SimEvent::Ate { agent, food });
        true
    }

    // ========================================================================
    // Territory
    // ========================================================================

    fn repel_and_demolish(&mut self, id: AgentId, dt: Fixed) {
        let Some(me) = self.agents.get(id) else {
            return;
        };
        if me.timers.repel < self.config.repel_interval {
            return;
        }
        let pos = me.position;
        let family = me.family;
        let territorial = me.temperament.territorial;
        let config = &self.config;

        let mut pushes = Vec::new();
        let mut rival_markers = Vec::new();
        for (bid, barrier) in &self.barriers {
            let dist = distance_to_box(pos, &barrier.bounds);
            if dist < config.barrier_repel_distance {
                pushes.push(pos - barrier.bounds.center);
            }
            if let Some(owner_family) = barrier.legacy_family() {
                if dist < config.demolish_radius && !self.alliances.is_kin(family, owner_family) {
                    rival_markers.push(bid);
                }
            }
        }
        for corpse in self.corpses.values() {
            if pos.distance_squared(corpse.position) < config.corpse_repel_distance * config.corpse_repel_distance {
                pushes.push(pos - corpse.position);
            }
        }

        let boxes = self.barrier_boxes();
        let area = self.config.movement_area();
        let distance = self.config.repel_speed * dt;
        if let Some(agent) = self.agents.get_mut(id) {
            agent.timers.repel = Fixed::ZERO;
            for away in pushes {
                agent.position = try_move(agent.aabb(), away, distance, &boxes, &area).position;
            }
        }

        let chance = territorial * self.config.demolish_scale;
        for marker in rival_markers {
            if self.rng.chance(chance) {
                self.remove_barrier(marker);
                let name = self.agents.get(id).map(|a| a.name.clone()).unwrap_or_default();
                tracing::info!(agent = %name, "Demolished a rival legacy");
                self.outbox.push(SimEvent::LegacyDemolished { marker, by: id });
                self.post_news(format!("{name} tore down a rival legacy"));
            }
        }
    }

    fn place_legacy(&mut self, owner: AgentId) -> Option<BarrierId> {
        let agent = self.agents.get(owner)?;
        let (pos, family, lifetime, name) = (agent.position, agent.family, agent.stats.lifetime, agent.name.clone());
        let size = self.config.legacy_size;
        let corner = snap_to_grid(pos, self.config.pen_origin, size);
        let marker = self.barriers.insert(Barrier {
            bounds: Aabb::from_corner(corner, Vec2Fixed::new(size, size)),
            kind: BarrierKind::Legacy { family, owner },
        });
        if let Some(agent) = self.agents.get_mut(owner) {
            agent.legacy_markers.push(marker);
            agent.last_legacy_at = Some(lifetime);
        }

        let spread = Fixed::from_num(LEGACY_FOOD_SPREAD);
        let inset = Fixed::from_num(LEGACY_FOOD_INSET);
        let low = self.config.pen_origin + Vec2Fixed::new(inset, inset);
        let high = self.config.pen_origin + self.config.pen_size - Vec2Fixed::new(inset, inset);
        for _ in 0..self.config.legacy_food {
            let dx = self.rng.uniform(-spread, spread);
            let dy = self.rng.uniform(-spread, spread);
            let spot = Vec2Fixed::new((corner.x + dx).clamp(low.x, high.x), (corner.y + dy).clamp(low.y, high.y));
            self.insert_food(spot);
        }

        tracing::info!(agent = %name, "Legacy placed");
        self.outbox.push(SimEvent::LegacyPlaced { marker, owner, family });
        self.post_news(format!("{name} left a legacy"));
        Some(marker)
    }

    fn remove_barrier(&mut self, id: BarrierId) -> Option<Barrier> {
        let barrier = self.barriers.remove(id)?;
        if let BarrierKind::Legacy { owner, .. } = barrier.kind {
            if let Some(agent) = self.agents.get_mut(owner) {
                agent.legacy_markers.retain(|m| *m != id);
            }
        }
        Some(barrier)
    }

    // ========================================================================
    // Alliances
    // ========================================================================

    fn scan_for_alliances(&mut self, id: AgentId) {
        let Some(me) = self.agents.get(id) else {
            return;
        };
        if me.timers.alliance < self.config.alliance_interval {
            return;
        }
        let (pos, temperament, name) = (me.position, me.temperament, me.name.clone());
        let radius = self.config.alliance_radius * self.config.alliance_radius;
        let candidates: Vec<(String, FamilyColor, Vec2Fixed, Temperament)> = self
            .agents
            .iter()
            .filter(|(other, a)| *other != id && pos.distance_squared(a.position) < radius)
            .map(|(_, a)| (a.name.clone(), a.family, a.position, a.temperament))
            .collect();

        if let Some(me) = self.agents.get_mut(id) {
            me.timers.alliance = Fixed::ZERO;
        }

        for (other_name, other_family, other_pos, other_temperament) in candidates {
            let Some(my_family) = self.agents.get(id).map(|a| a.family) else {
                return;
            };
            if self.alliances.is_kin(my_family, other_family)
                || !traits_compatible(&temperament, &other_temperament, self.config.trait_tolerance)
            {
                continue;
            }
            if self.alliances.record(my_family, other_family) {
                tracing::info!(a = %name, b = %other_name, "Alliance formed");
                self.outbox.push(SimEvent::AllianceFormed {
                    first: my_family,
                    second: other_family,
                });
                for position in [pos, other_pos] {
                    self.outbox.push(SimEvent::FloatingLabel {
                        position,
                        text: "ally".to_string(),
                        kind: LabelKind::Alliance,
                    });
                }
                self.post_news(format!("{name}'s family allied with {other_name}'s family!"));
            }
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    fn check_birth(&mut self, id: AgentId, dt: Fixed) {
        let population = self.agents.len();
        let Some(parent) = self.agents.get_mut(id) else {
            return;
        };
        advance_satiety(parent, dt, &self.config);
        match birth_decision(parent, population, &self.config) {
            BirthDecision::Wait => {}
            BirthDecision::PenFull => {
                defer_birth(parent);
                tracing::debug!(agent = %parent.name, "Birth deferred, pen is full");
            }
            BirthDecision::GiveBirth => {
                self.give_birth(id);
            }
        }
    }

    fn give_birth(&mut self, parent_id: AgentId) -> Option<AgentId> {
        let parent = self.agents.get(parent_id)?;
        let (parent_name, lineage, family, parent_pos) = (
            parent.name.clone(),
            parent.lineage.clone(),
            parent.family,
            parent.position,
        );

        let spread = self.config.birth_spread;
        let offset = Vec2Fixed::new(self.rng.uniform(-spread, spread), self.rng.uniform(-spread, spread));
        let area = self.config.movement_area();
        let (mut position, _) = clamp_point(parent_pos + offset, &area);
        let body = Aabb::new(position, self.config.agent_half_extents);
        if self.barriers.values().any(|b| b.bounds.intersects(&body)) {
            position = clamp_point(parent_pos, &area).0;
        }
        let name = self.names.generate(&mut self.rng);
        let temperament = self.roll_temperament();
        let heading = random_direction(&mut self.rng);

        let child = self.insert_agent(AgentSeed {
            name: name.clone(),
            parent: Some(parent_name.clone()),
            parent_lineage: lineage,
            family,
            position,
            temperament,
            heading,
        });
        if let Some(parent) = self.agents.get_mut(parent_id) {
            record_birth(parent, &name);
        }
        let child_name = self.agents.get(child).map(Agent::full_name).unwrap_or(name);

        tracing::info!(parent = %parent_name, child = %child_name, "Birth");
        self.outbox.push(SimEvent::Born {
            child,
            parent: parent_id,
            name: child_name.clone(),
        });
        self.outbox.push(SimEvent::FloatingLabel {
            position,
            text: "new".to_string(),
            kind: LabelKind::Birth,
        });
        self.post_news(format!("{parent_name} gave birth to {child_name}"));
        Some(child)
    }

    /// Remove an agent: corpse, markers, ledger entry, event.
    fn kill_agent(&mut self, id: AgentId, cause: DeathCause) {
        let Some(mut agent) = self.agents.remove(id) else {
            return;
        };
        agent.alive = false;

        self.corpses.insert(Corpse {
            position: agent.position,
            cause: cause.clone(),
            remaining: self.config.corpse_lifetime,
        });
        for marker in &agent.legacy_markers {
            self.barriers.remove(*marker);
        }

        let name = agent.full_name();
        tracing::info!(agent = %name, cause = cause.label(), lifetime = %agent.stats.lifetime, "Death");
        let line = match &cause {
            DeathCause::Starvation => format!("{name} starved"),
            DeathCause::Combat { killer } => format!("{name} was killed by {killer}"),
            DeathCause::Removed => format!("{name} was removed"),
        };
        self.ledger.push(AncestorRecord::from_agent(&agent, cause.clone(), self.tick));
        self.outbox.push(SimEvent::Died {
            agent: id,
            name,
            cause,
            position: agent.position,
        });
        self.post_news(line);
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn insert_agent(&mut self, seed: AgentSeed) -> AgentId {
        let mut agent = Agent::new(seed, &self.config);
        // Scan neighbours on the first update.
        agent.timers.scan = self.config.scan_interval;
        tracing::debug!(agent = %agent.name, family = %agent.family, "Agent spawned");
        self.agents.insert(agent)
    }

    fn insert_food(&mut self, position: Vec2Fixed) -> FoodId {
        self.food.insert(Food {
            position,
            half_extents: self.config.food_half_extents,
        })
    }

    fn post_news(&mut self, text: String) {
        self.news.push(self.tick, text.clone());
        self.outbox.push(SimEvent::News { text });
    }

    fn random_inner_point(&mut self, margin: Fixed) -> Vec2Fixed {
        let low = self.config.pen_origin + Vec2Fixed::new(margin, margin);
        let high = self.config.pen_origin + self.config.pen_size - Vec2Fixed::new(margin, margin);
        Vec2Fixed::new(self.rng.uniform(low.x, high.x), self.rng.uniform(low.y, high.y))
    }

    fn roll_trait(&mut self, range: TraitRange) -> Fixed {
        self.rng.uniform(range.min, range.max)
    }

    fn roll_temperament(&mut self) -> Temperament {
        let c = &self.config;
        let (greed, curiosity, territorial, legacy_desire, bravery) =
            (c.greed, c.curiosity, c.territorial, c.legacy_desire, c.bravery);
        Temperament {
            greed: self.roll_trait(greed),
            curiosity: self.roll_trait(curiosity),
            territorial: self.roll_trait(territorial),
            legacy_desire: self.roll_trait(legacy_desire),
            bravery: self.roll_trait(bravery),
        }
    }

    fn roll_family(&mut self) -> FamilyColor {
        let span = usize::from(u8::MAX - MIN_COLOR_CHANNEL) + 1;
        let mut channel = || MIN_COLOR_CHANNEL + self.rng.index(span) as u8;
        FamilyColor::new(channel(), channel(), channel())
    }

    /// Check the structural invariants of the pen.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidState`] describing the first violation.
    pub fn check_invariants(&self) -> Result<()> {
        let (min, max) = (self.config.bounds_min(), self.config.bounds_max());
        for (id, agent) in &self.agents {
            if agent.health < Fixed::ZERO || agent.health > self.config.max_health {
                return Err(SimError::InvalidState(format!(
                    "{} has health {} outside 0..={}",
                    agent.name, agent.health, self.config.max_health
                )));
            }
            let p = agent.position;
            if p.x < min.x || p.y < min.y || p.x > max.x || p.y > max.y {
                return Err(SimError::InvalidState(format!("{} left the pen", agent.name)));
            }
            for marker in &agent.legacy_markers {
                let owned = self
                    .barriers
                    .get(*marker)
                    .is_some_and(|b| matches!(b.kind, BarrierKind::Legacy { owner, .. } if owner == id));
                if !owned {
                    return Err(SimError::InvalidState(format!(
                        "{} lists a marker it does not own",
                        agent.name
                    )));
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // Determinism
    // ========================================================================

    /// Hash of the complete observable state.
    ///
    /// Two simulations that received the same seed and the same inputs
    /// report the same hash after every tick.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.tick.hash(&mut hasher);
        self.elapsed.to_bits().hash(&mut hasher);
        self.paused.hash(&mut hasher);

        self.agents.len().hash(&mut hasher);
        for (id, agent) in &self.agents {
            id.hash(&mut hasher);
            agent.name.hash(&mut hasher);
            agent.family.hash(&mut hasher);
            agent.position.hash(&mut hasher);
            agent.heading.hash(&mut hasher);
            agent.health.to_bits().hash(&mut hasher);
            agent.hunger.to_bits().hash(&mut hasher);
            agent.hunger_time.to_bits().hash(&mut hasher);
            agent.mission.hash(&mut hasher);
            agent.stats.lifetime.to_bits().hash(&mut hasher);
            agent.stats.kids.hash(&mut hasher);
            agent.stats.foods.hash(&mut hasher);
            agent.stats.kills.hash(&mut hasher);
        }

        self.food.len().hash(&mut hasher);
        for (id, food) in &self.food {
            id.hash(&mut hasher);
            food.position.hash(&mut hasher);
        }

        self.barriers.len().hash(&mut hasher);
        for (id, barrier) in &self.barriers {
            id.hash(&mut hasher);
            barrier.bounds.hash(&mut hasher);
            barrier.legacy_family().hash(&mut hasher);
        }

        self.corpses.len().hash(&mut hasher);
        for corpse in self.corpses.values() {
            corpse.position.hash(&mut hasher);
            corpse.remaining.to_bits().hash(&mut hasher);
        }

        for pair in self.alliances.pairs() {
            pair.hash(&mut hasher);
        }
        self.ledger.len().hash(&mut hasher);

        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Axis;
    use crate::math::percent;
    use crate::rng::ScriptedRng;

    fn quiet_config() -> SimConfig {
        SimConfig {
            food_spawn_interval: Fixed::ZERO,
            builtin_contacts: false,
            ..SimConfig::default()
        }
    }

    fn scripted(config: SimConfig) -> Simulation<ScriptedRng> {
        Simulation::new(config, ScriptedRng::constant(percent(99))).unwrap()
    }

    fn temperament() -> Temperament {
        Temperament {
            greed: Fixed::from_num(1),
            curiosity: Fixed::from_num(1),
            territorial: Fixed::from_num(1),
            legacy_desire: Fixed::from_num(1),
            bravery: percent(50),
        }
    }

    fn spawn_agent<R: RandomSource>(sim: &mut Simulation<R>, x: i32, y: i32, family: FamilyColor) -> AgentId {
        match sim
            .spawn(SpawnRequest::Agent {
                position: Vec2Fixed::from_ints(x, y),
                family: Some(family),
                name: None,
                temperament: Some(temperament()),
            })
            .unwrap()
        {
            EntityHandle::Agent(id) => id,
            other => panic!("expected agent, got {other:?}"),
        }
    }

    const RED: FamilyColor = FamilyColor::new(200, 50, 50);
    const BLUE: FamilyColor = FamilyColor::new(50, 50, 200);

    #[test]
    fn test_new_simulation_is_empty() {
        let sim = Simulation::with_seed(SimConfig::default(), 1).unwrap();
        assert_eq!(sim.current_tick(), 0);
        assert_eq!(sim.population(), 0);
        assert!(sim.query(EntityTag::Food).is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SimConfig {
            base_speed: Fixed::from_num(-1),
            ..SimConfig::default()
        };
        assert!(matches!(
            Simulation::with_seed(config, 1),
            Err(SimError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_seed_population_spawns_inside_pen() {
        let mut sim = Simulation::with_seed(SimConfig::default(), 3).unwrap();
        let ids = sim.seed_population();
        assert_eq!(ids.len(), 20);
        let config = sim.config().clone();
        for (_, agent) in sim.agents() {
            assert!(config.in_pen(agent.position));
        }
    }

    #[test]
    fn test_paused_tick_changes_nothing() {
        let mut sim = Simulation::with_seed(SimConfig::default(), 5).unwrap();
        sim.seed_population();
        let before = sim.state_hash();
        sim.set_paused(true);
        let events = sim.tick(tick_seconds());
        assert!(events.is_empty());
        assert_eq!(sim.state_hash(), before);
        assert_eq!(sim.current_tick(), 0);
    }

    #[test]
    fn test_destroy_missing_entity_errors() {
        let mut sim = scripted(quiet_config());
        let id = spawn_agent(&mut sim, 100, 100, RED);
        sim.destroy(EntityHandle::Agent(id)).unwrap();
        assert!(matches!(
            sim.destroy(EntityHandle::Agent(id)),
            Err(SimError::EntityNotFound(_))
        ));
        assert_eq!(sim.ledger().len(), 1);
        assert_eq!(sim.query(EntityTag::Corpse).len(), 1);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut sim = scripted(quiet_config());
        let request = SpawnRequest::Agent {
            position: Vec2Fixed::from_ints(100, 100),
            family: None,
            name: Some("Ko".into()),
            temperament: None,
        };
        assert!(sim.spawn(request.clone()).is_ok());
        assert!(matches!(sim.spawn(request), Err(SimError::InvalidState(_))));
    }

    #[test]
    fn test_query_separates_walls_and_legacy() {
        let mut sim = scripted(quiet_config());
        let owner = spawn_agent(&mut sim, 200, 200, RED);
        sim.place_wall(Vec2Fixed::from_ints(400, 400)).unwrap();
        sim.spawn(SpawnRequest::Legacy { owner }).unwrap();
        assert_eq!(sim.query(EntityTag::Barrier).len(), 2);
        assert_eq!(sim.query(EntityTag::Legacy).len(), 1);
        assert_eq!(sim.query(EntityTag::Food).len(), 3);
    }

    #[test]
    fn test_wall_placement_snaps_and_dedups() {
        let mut sim = scripted(quiet_config());
        let wall = sim.place_wall(Vec2Fixed::from_ints(105, 107)).unwrap();
        let bounds = sim.barrier(wall).unwrap().bounds;
        assert_eq!(bounds.min(), Vec2Fixed::from_ints(100, 100));
        assert!(sim.place_wall(Vec2Fixed::from_ints(101, 109)).is_none());
        assert!(sim.place_wall(Vec2Fixed::from_ints(0, 0)).is_none());
        assert_eq!(sim.remove_wall_near(Vec2Fixed::from_ints(108, 108)), Some(wall));
        assert!(sim.query(EntityTag::Barrier).is_empty());
    }

    #[test]
    fn test_snap_to_grid() {
        let origin = Vec2Fixed::from_ints(20, 20);
        let snapped = snap_to_grid(Vec2Fixed::from_ints(47, 33), origin, Fixed::from_num(10));
        assert_eq!(snapped, Vec2Fixed::from_ints(40, 30));
    }

    #[test]
    fn test_food_contact_feeds() {
        let mut sim = scripted(quiet_config());
        let id = spawn_agent(&mut sim, 100, 100, RED);
        let food = match sim.spawn(SpawnRequest::Food {
            position: Vec2Fixed::from_ints(100, 100),
        }) {
            Ok(EntityHandle::Food(f)) => f,
            other => panic!("unexpected {other:?}"),
        };
        sim.agent_mut(id).unwrap().hunger = Fixed::from_num(6);
        assert!(sim.on_food_contact(id, food));
        assert_eq!(sim.agent(id).unwrap().hunger, Fixed::ZERO);
        assert!(sim.food(food).is_none());
        assert!(!sim.on_food_contact(id, food));
    }

    #[test]
    fn test_kin_contact_disengages() {
        let mut sim = scripted(quiet_config());
        let a = spawn_agent(&mut sim, 100, 100, RED);
        let b = spawn_agent(&mut sim, 104, 100, RED);
        sim.agent_mut(a).unwrap().mission.assign(Mission::Attack { target: b });
        assert_eq!(sim.on_agent_contact(a, b), None);
        assert_eq!(sim.agent(a).unwrap().mission.mission, Mission::None);
        assert_eq!(sim.population(), 2);
    }

    #[test]
    fn test_contact_without_hostility_is_ignored() {
        let mut sim = scripted(quiet_config());
        let a = spawn_agent(&mut sim, 100, 100, RED);
        let b = spawn_agent(&mut sim, 104, 100, BLUE);
        assert_eq!(sim.on_agent_contact(a, b), None);
        assert_eq!(sim.on_agent_contact(a, a), None);
    }

    #[test]
    fn test_duel_kills_loser() {
        let config = quiet_config();
        // Both bravery rolls pass (0 <= bravery), win roll 0 favours the initiator.
        let mut sim = Simulation::new(config, ScriptedRng::constant(Fixed::ZERO)).unwrap();
        let a = spawn_agent(&mut sim, 100, 100, RED);
        let b = spawn_agent(&mut sim, 104, 100, BLUE);
        sim.agent_mut(b).unwrap().mission.assign(Mission::Attack { target: a });

        let outcome = sim.on_agent_contact(a, b);
        assert_eq!(outcome, Some(DuelOutcome::Won(Side::First)));
        assert!(sim.agent(a).is_none(), "the initiator b won, a died");
        let winner = sim.agent(b).unwrap();
        assert_eq!(winner.stats.kills, 1);
        assert_eq!(winner.victims.len(), 1);
        assert_eq!(sim.ledger().len(), 1);
    }

    #[test]
    fn test_strike_respects_cooldown() {
        let config = quiet_config();
        let mut sim = Simulation::new(config, ScriptedRng::constant(Fixed::ZERO)).unwrap();
        let a = spawn_agent(&mut sim, 100, 100, RED);
        let b = spawn_agent(&mut sim, 105, 100, BLUE);

        sim.try_strike(a, b);
        // Damage roll 0 gives the minimum damage.
        assert_eq!(sim.agent(b).unwrap().health, Fixed::from_num(95));
        sim.try_strike(a, b);
        assert_eq!(sim.agent(b).unwrap().health, Fixed::from_num(95));
    }

    #[test]
    fn test_lethal_strike_books_the_kill() {
        let mut sim = Simulation::new(quiet_config(), ScriptedRng::constant(Fixed::ZERO)).unwrap();
        let a = spawn_agent(&mut sim, 100, 100, RED);
        let b = spawn_agent(&mut sim, 105, 100, BLUE);
        sim.agent_mut(a).unwrap().mission.assign(Mission::Attack { target: b });
        sim.agent_mut(b).unwrap().health = Fixed::from_num(4);
        let victim = sim.agent(b).unwrap().full_name();
        let killer = sim.agent(a).unwrap().full_name();

        // Hit roll 0 lands, damage roll 0.5 is 10.
        sim.rng.push(Fixed::ZERO);
        sim.rng.push(percent(50));
        sim.try_strike(a, b);

        assert!(sim.agent(b).is_none());
        let attacker = sim.agent(a).unwrap();
        assert_eq!(attacker.stats.kills, 1);
        assert_eq!(attacker.victims, vec![victim.clone()]);
        assert_eq!(attacker.mission.mission, Mission::None);
        let record = &sim.ledger().records()[0];
        assert_eq!(record.full_name, victim);
        assert_eq!(record.cause, DeathCause::Combat { killer });
        assert!(sim.news().iter().any(|l| l.text.contains("for 10 damage")));
    }

    #[test]
    fn test_pen_edge_never_pushes_into_wall() {
        let mut sim = scripted(quiet_config());
        let wall = sim.place_wall(Vec2Fixed::from_ints(765, 105)).unwrap();
        let wall = sim.barrier(wall).unwrap().bounds;
        assert_eq!(wall.min(), Vec2Fixed::from_ints(760, 100));
        let runner = spawn_agent(&mut sim, 775, 117, RED);
        let threat = spawn_agent(&mut sim, 760, 135, BLUE);
        sim.agent_mut(runner)
            .unwrap()
            .mission
            .assign(Mission::Flee { threat: Some(threat) });

        let area = sim.config().movement_area();
        for _ in 0..20 {
            sim.tick(tick_seconds());
            for (_, agent) in sim.agents() {
                assert!(!agent.aabb().intersects(&wall), "{} entered the wall", agent.name);
                assert!(area.contains_point(agent.position));
            }
        }
    }

    #[test]
    fn test_step_into_personal_space_backs_off() {
        let mut sim = scripted(quiet_config());
        let a = spawn_agent(&mut sim, 300, 300, RED);
        let b = spawn_agent(&mut sim, 310, 300, RED);
        let enemy = spawn_agent(&mut sim, 700, 300, BLUE);
        sim.agent_mut(a).unwrap().mission.assign(Mission::Attack { target: enemy });
        {
            let kin = sim.agent_mut(b).unwrap();
            kin.position = Vec2Fixed::new(Fixed::from_num(310) + percent(50), Fixed::from_num(300));
            kin.temperament.curiosity = Fixed::ZERO;
            kin.mission.assign(Mission::Roam { ally: a });
        }

        let personal_space = sim.config().personal_space;
        for _ in 0..8 {
            sim.tick(tick_seconds());
            let gap = sim.agent(a).unwrap().position.distance(sim.agent(b).unwrap().position);
            assert!(gap >= personal_space, "gap shrank to {gap}");
        }
        assert!(sim.agent(a).unwrap().position.x < Fixed::from_num(300));
    }

    #[test]
    fn test_explorer_turns_at_pen_edge() {
        let mut sim = scripted(quiet_config());
        let id = spawn_agent(&mut sim, 775, 300, RED);
        sim.agent_mut(id).unwrap().mission.assign(Mission::Explore {
            waypoint: Vec2Fixed::from_ints(900, 300),
        });

        sim.tick(tick_seconds());

        let agent = sim.agent(id).unwrap();
        assert_eq!(agent.explore_axis, Axis::Y);
        assert_eq!(agent.mission.mission, Mission::None);
        assert!(agent.heading.x <= Fixed::ZERO);
    }

    #[test]
    fn test_agent_never_strikes_itself() {
        let mut sim = Simulation::new(quiet_config(), ScriptedRng::constant(Fixed::ZERO)).unwrap();
        let a = spawn_agent(&mut sim, 100, 100, RED);
        sim.try_strike(a, a);
        assert_eq!(sim.agent(a).unwrap().health, Fixed::from_num(100));
    }

    #[test]
    fn test_tick_events_carry_host_side_effects() {
        let mut sim = scripted(quiet_config());
        let id = spawn_agent(&mut sim, 100, 100, RED);
        sim.destroy(EntityHandle::Agent(id)).unwrap();
        let events = sim.tick(tick_seconds());
        assert_eq!(events.deaths().collect::<Vec<_>>(), vec![id]);
        assert_eq!(events.tick, 1);
    }

    #[test]
    fn test_periodic_food_respects_cap() {
        let config = SimConfig {
            food_spawn_interval: percent(10),
            max_food: 3,
            builtin_contacts: false,
            ..SimConfig::default()
        };
        let mut sim = Simulation::with_seed(config, 9).unwrap();
        for _ in 0..20 {
            sim.tick(percent(10));
        }
        assert_eq!(sim.food_count(), 3);
    }

    #[test]
    fn test_corpses_expire() {
        let mut sim = scripted(quiet_config());
        sim.spawn(SpawnRequest::Corpse {
            position: Vec2Fixed::from_ints(50, 50),
            cause: DeathCause::Starvation,
        })
        .unwrap();
        sim.tick(Fixed::from_num(21));
        assert_eq!(sim.query(EntityTag::Corpse).len(), 1);
        sim.tick(Fixed::from_num(2));
        assert!(sim.query(EntityTag::Corpse).is_empty());
    }

    #[test]
    fn test_live_stats_rows() {
        let mut sim = scripted(quiet_config());
        spawn_agent(&mut sim, 100, 100, RED);
        spawn_agent(&mut sim, 300, 300, BLUE);
        let rows = sim.live_stats();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].family, RED);
        assert_eq!(rows[0].health, Fixed::from_num(100));
    }

    #[test]
    fn test_state_hash_changes_with_tick() {
        let mut sim = Simulation::with_seed(SimConfig::default(), 2).unwrap();
        sim.seed_population();
        let before = sim.state_hash();
        sim.tick(tick_seconds());
        assert_ne!(before, sim.state_hash());
    }
}
