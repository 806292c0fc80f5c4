//! Test fixtures and helpers.
//!
//! Pre-built pens and agent configurations for consistent testing.
//! Scenario builders return the simulation plus the handles a test needs
//! to make its assertions.

use critter_core::config::SimConfig;
use critter_core::entities::{AgentId, EntityHandle, FamilyColor, FoodId, Temperament};
use critter_core::math::{Fixed, Vec2Fixed};
use critter_core::rng::{RandomSource, ScriptedRng};
use critter_core::simulation::{tick_seconds, Simulation, SpawnRequest};
use fixed::types::I32F32;

/// Red family.
pub const RED: FamilyColor = FamilyColor::new(200, 60, 60);
/// Blue family.
pub const BLUE: FamilyColor = FamilyColor::new(60, 60, 200);
/// Green family.
pub const GREEN: FamilyColor = FamilyColor::new(60, 200, 60);

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// Integer vector.
#[must_use]
pub fn vec2(x: i32, y: i32) -> Vec2Fixed {
    Vec2Fixed::from_ints(x, y)
}

/// Middle-of-the-road temperament: every drive at 1, bravery 0.65.
#[must_use]
pub fn even_temperament() -> Temperament {
    Temperament {
        greed: fixed(1),
        curiosity: fixed(1),
        territorial: fixed(1),
        legacy_desire: fixed(1),
        bravery: fixed_f(0.65),
    }
}

/// Default tunables without periodic food drops.
#[must_use]
pub fn quiet_config() -> SimConfig {
    SimConfig {
        food_spawn_interval: Fixed::ZERO,
        ..SimConfig::default()
    }
}

/// Empty pen whose every roll returns `fraction`.
///
/// With a fraction near 1 every `chance` fails, so agents only do what
/// their needs force them to.
///
/// # Panics
///
/// Panics if `config` is invalid.
#[must_use]
pub fn scripted_pen(config: SimConfig, fraction: Fixed) -> Simulation<ScriptedRng> {
    Simulation::new(config, ScriptedRng::constant(fraction)).expect("fixture config is valid")
}

/// Pen with the default config and a seeded founding population.
///
/// # Panics
///
/// Panics if the default config is invalid.
#[must_use]
pub fn seeded_pen(seed: u64) -> Simulation {
    seeded_pen_with(SimConfig::default(), seed)
}

/// Pen with `config` and a seeded founding population.
///
/// # Panics
///
/// Panics if `config` is invalid.
#[must_use]
pub fn seeded_pen_with(config: SimConfig, seed: u64) -> Simulation {
    let mut sim = Simulation::with_seed(config, seed).expect("fixture config is valid");
    sim.seed_population();
    sim
}

/// Spawn a named founder.
///
/// # Panics
///
/// Panics if the name is taken.
pub fn spawn_founder<R: RandomSource>(
    sim: &mut Simulation<R>,
    name: &str,
    position: Vec2Fixed,
    family: FamilyColor,
    temperament: Temperament,
) -> AgentId {
    let handle = sim
        .spawn(SpawnRequest::Agent {
            position,
            family: Some(family),
            name: Some(name.to_string()),
            temperament: Some(temperament),
        })
        .expect("founder spawns");
    match handle {
        EntityHandle::Agent(id) => id,
        other => panic!("expected an agent handle, got {other:?}"),
    }
}

/// Spawn a food item.
///
/// # Panics
///
/// Panics if the simulation hands back a non-food handle.
pub fn spawn_food<R: RandomSource>(sim: &mut Simulation<R>, position: Vec2Fixed) -> FoodId {
    match sim.spawn(SpawnRequest::Food { position }) {
        Ok(EntityHandle::Food(id)) => id,
        other => panic!("expected a food handle, got {other:?}"),
    }
}

/// Tick at the standard rate for roughly `seconds` of simulated time.
pub fn run_seconds<R: RandomSource>(sim: &mut Simulation<R>, seconds: u32) {
    for _ in 0..seconds * critter_core::simulation::TICK_RATE {
        sim.tick(tick_seconds());
    }
}

// ============================================================================
// Scenarios
// ============================================================================

/// A hungry agent standing on a food item.
#[derive(Debug)]
pub struct FeedingScenario {
    /// The pen.
    pub sim: Simulation<ScriptedRng>,
    /// The hungry agent.
    pub agent: AgentId,
    /// The food under it.
    pub food: FoodId,
}

/// Agent with hunger 6 (over the starvation threshold) touching food.
///
/// # Panics
///
/// Panics if the fixture entities cannot be created.
#[must_use]
pub fn feeding_scenario() -> FeedingScenario {
    let mut sim = scripted_pen(quiet_config(), fixed_f(0.99));
    let agent = spawn_founder(&mut sim, "Ba", vec2(200, 200), RED, even_temperament());
    let food = spawn_food(&mut sim, vec2(202, 200));
    let hungry = sim.agent_mut(agent).expect("agent exists");
    hungry.hunger = fixed(6);
    hungry.hunger_time = fixed(1);
    tracing::debug!("Feeding scenario ready");
    FeedingScenario { sim, agent, food }
}

/// A lone agent with nothing to eat.
///
/// # Panics
///
/// Panics if the fixture agent cannot be created.
#[must_use]
pub fn starving_scenario() -> (Simulation<ScriptedRng>, AgentId) {
    let mut sim = scripted_pen(quiet_config(), fixed_f(0.99));
    let agent = spawn_founder(&mut sim, "Ce", vec2(300, 300), BLUE, even_temperament());
    sim.agent_mut(agent).expect("agent exists").hunger = fixed(6);
    (sim, agent)
}

/// A wounded, starving agent next to food and an enemy.
///
/// Returns the pen, the wounded agent and the enemy.
///
/// # Panics
///
/// Panics if the fixture entities cannot be created.
#[must_use]
pub fn priority_scenario() -> (Simulation<ScriptedRng>, AgentId, AgentId) {
    let mut sim = scripted_pen(quiet_config(), fixed_f(0.99));
    let wounded = spawn_founder(&mut sim, "Do", vec2(300, 300), RED, even_temperament());
    let enemy = spawn_founder(&mut sim, "Fu", vec2(360, 300), BLUE, even_temperament());
    spawn_food(&mut sim, vec2(280, 300));
    let agent = sim.agent_mut(wounded).expect("agent exists");
    agent.health = fixed(20);
    agent.hunger = fixed(10);
    (sim, wounded, enemy)
}

/// Two compatible agents of different families within alliance range.
///
/// # Panics
///
/// Panics if the fixture agents cannot be created.
#[must_use]
pub fn alliance_scenario() -> (Simulation<ScriptedRng>, AgentId, AgentId) {
    let mut sim = scripted_pen(quiet_config(), fixed_f(0.99));
    let a = spawn_founder(&mut sim, "Ga", vec2(300, 300), RED, even_temperament());
    let b = spawn_founder(&mut sim, "Hi", vec2(340, 300), GREEN, even_temperament());
    (sim, a, b)
}
