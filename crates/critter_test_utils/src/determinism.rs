//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the pen produces identical
//! results given identical seeds and inputs.
//!
//! # Testing Strategy
//!
//! Sources of non-determinism include:
//!
//! - **Floating-point math**: positions, health and timers use
//!   [`critter_core::math::Fixed`] throughout.
//!
//! - **HashMap iteration order**: agents are visited in slot-map key order
//!   and alliance tables are ordered maps.
//!
//! - **System randomness**: every roll goes through the simulation's
//!   [`critter_core::rng::RandomSource`], seeded at construction.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: scripted rolls pin individual behaviours
//! 2. **Property tests**: random seeds must still produce reproducible runs
//! 3. **Integration tests**: full scenarios are reproducible
//! 4. **Parallel tests**: running N simulations on threads all match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use critter_core::simulation::{tick_seconds, Simulation};

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run any stepped state several times and compare the final hashes.
///
/// # Example
///
/// ```
/// use critter_test_utils::determinism::verify_determinism;
///
/// let result = verify_determinism(3, 10, || 0u64, |n| *n += 1, |n| *n);
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();
        for _ in 0..ticks {
            step(&mut state);
        }
        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Run a pen twice from the same setup and compare final state hashes.
pub fn verify_simulation_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> Simulation,
{
    verify_determinism(
        2,
        num_ticks,
        &setup_fn,
        |sim| {
            sim.tick(tick_seconds());
        },
        Simulation::state_hash,
    )
    .is_deterministic
}

/// Result of parallel simulation runs.
#[derive(Debug, Clone)]
pub struct ParallelSimResult {
    /// Final state hash from each simulation.
    pub hashes: Vec<u64>,
    /// Number of ticks each simulation ran.
    pub ticks: u64,
    /// Number of simulations run.
    pub num_sims: usize,
}

impl ParallelSimResult {
    /// Check if all simulations produced identical results.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|w| w[0] == w[1])
    }

    /// Assert all simulations matched.
    ///
    /// # Panics
    ///
    /// Panics if simulations produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic() {
            panic!(
                "Parallel simulations diverged!\n\
                 Simulations: {}\n\
                 Ticks: {}\n\
                 All hashes: {:?}",
                self.num_sims, self.ticks, self.hashes
            );
        }
    }
}

/// Run N pens on scoped threads and collect their final hashes.
///
/// # Panics
///
/// Panics if a simulation thread panics.
pub fn run_parallel_simulations<F>(setup_fn: F, num_sims: usize, num_ticks: u64) -> ParallelSimResult
where
    F: Fn() -> Simulation + Sync,
{
    let hashes = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut sim = setup_fn();
                    for _ in 0..num_ticks {
                        sim.tick(tick_seconds());
                    }
                    sim.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("simulation thread panicked"))
            .collect()
    });

    ParallelSimResult {
        hashes,
        ticks: num_ticks,
        num_sims,
    }
}

/// Step two pens side by side and report the first tick where they differ.
///
/// `None` means the runs stayed identical.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64) -> Option<u64>
where
    F: Fn() -> Simulation,
{
    let mut sim1 = setup_fn();
    let mut sim2 = setup_fn();

    if sim1.state_hash() != sim2.state_hash() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        sim1.tick(tick_seconds());
        sim2.tick(tick_seconds());
        if sim1.state_hash() != sim2.state_hash() {
            tracing::warn!(tick, "Simulations diverged");
            return Some(tick);
        }
    }

    None
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for pen tests.
pub mod strategies {
    use critter_core::entities::{FamilyColor, Temperament};
    use critter_core::math::{Aabb, Fixed, Vec2Fixed};
    use proptest::prelude::*;

    /// Simulation seed.
    pub fn arb_seed() -> impl Strategy<Value = u64> {
        any::<u64>()
    }

    /// Point inside the default pen, away from the walls.
    pub fn arb_pen_point() -> impl Strategy<Value = Vec2Fixed> {
        (60i32..740, 60i32..540).prop_map(|(x, y)| Vec2Fixed::from_ints(x, y))
    }

    /// Trait value in hundredths, `lo..hi`.
    pub fn arb_trait(lo: i32, hi: i32) -> impl Strategy<Value = Fixed> {
        (lo..hi).prop_map(|v| Fixed::from_num(v) / Fixed::from_num(100))
    }

    /// Temperament within the default trait ranges.
    pub fn arb_temperament() -> impl Strategy<Value = Temperament> {
        (
            arb_trait(50, 150),
            arb_trait(50, 150),
            arb_trait(50, 150),
            arb_trait(50, 150),
            arb_trait(30, 100),
        )
            .prop_map(|(greed, curiosity, territorial, legacy_desire, bravery)| Temperament {
                greed,
                curiosity,
                territorial,
                legacy_desire,
                bravery,
            })
    }

    /// Any family color.
    pub fn arb_family() -> impl Strategy<Value = FamilyColor> {
        (any::<u8>(), any::<u8>(), any::<u8>()).prop_map(|(r, g, b)| FamilyColor::new(r, g, b))
    }

    /// Wall box with sides between 4 and 60 units.
    pub fn arb_wall() -> impl Strategy<Value = Aabb> {
        (arb_pen_point(), 2i32..30, 2i32..30)
            .prop_map(|(center, w, h)| Aabb::new(center, Vec2Fixed::from_ints(w, h)))
    }

    /// Up to `max` walls.
    pub fn arb_walls(max: usize) -> impl Strategy<Value = Vec<Aabb>> {
        proptest::collection::vec(arb_wall(), 0..max)
    }

    /// Movement direction with integer components, possibly zero.
    pub fn arb_direction() -> impl Strategy<Value = Vec2Fixed> {
        (-10i32..=10, -10i32..=10).prop_map(|(x, y)| Vec2Fixed::from_ints(x, y))
    }
}
