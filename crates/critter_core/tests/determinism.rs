//! Same seed, same pen.

use critter_core::config::SimConfig;
use critter_core::math::percent;
use critter_core::simulation::Simulation;
use critter_test_utils::determinism::{
    find_first_divergence, run_parallel_simulations, verify_determinism,
    verify_simulation_determinism,
};
use critter_test_utils::fixtures::{seeded_pen, seeded_pen_with, vec2};

#[test]
fn test_long_run_is_deterministic() {
    assert!(verify_simulation_determinism(|| seeded_pen(2024), 20 * 120));
}

#[test]
fn test_walls_and_food_keep_determinism() {
    let setup = || {
        let mut sim = seeded_pen(31);
        for y in (100..400).step_by(10) {
            sim.place_wall(vec2(500, y));
        }
        sim.drop_food(vec2(250, 250));
        sim
    };
    assert_eq!(find_first_divergence(setup, 600), None);
}

#[test]
fn test_variable_dt_is_deterministic() {
    let result = verify_determinism(
        3,
        300,
        || seeded_pen(8),
        |sim: &mut Simulation| {
            let dt = if sim.current_tick() % 3 == 0 { percent(3) } else { percent(7) };
            sim.tick(dt);
        },
        Simulation::state_hash,
    );
    result.assert_deterministic();
}

#[test]
fn test_crowded_pen_parallel() {
    let config = SimConfig {
        initial_population: 40,
        ..SimConfig::default()
    };
    run_parallel_simulations(|| seeded_pen_with(config.clone(), 17), 4, 400).assert_deterministic();
}
