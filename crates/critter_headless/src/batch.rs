//! Batch runner for population studies.
//!
//! Runs one scenario under many seeds in parallel using rayon and
//! aggregates the per-run metrics.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::metrics::{BatchSummary, MetricsCollector, RunMetrics};
use crate::scenario::{Scenario, ScenarioError};

/// Configuration for a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Scenario to run
    pub scenario: Scenario,
    /// Number of runs
    pub run_count: u32,
    /// Maximum parallel runs (0 = use rayon default)
    pub parallel_runs: u32,
    /// Output directory for results
    pub output_dir: PathBuf,
    /// Seed of the first run; run `i` uses `seed_start + i`
    pub seed_start: u64,
    /// Tick limit per run (0 = scenario duration)
    pub max_ticks: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            scenario: Scenario::default(),
            run_count: 100,
            parallel_runs: 0,
            output_dir: PathBuf::from("results"),
            seed_start: 0,
            max_ticks: 0,
        }
    }
}

impl BatchConfig {
    /// Create config for a specific scenario
    pub fn new(scenario: Scenario, run_count: u32) -> Self {
        Self {
            scenario,
            run_count,
            ..Default::default()
        }
    }

    /// Set output directory
    pub fn with_output(mut self, dir: PathBuf) -> Self {
        self.output_dir = dir;
        self
    }

    /// Set seed start
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed_start = seed;
        self
    }

    /// Set tick limit
    pub fn with_max_ticks(mut self, ticks: u64) -> Self {
        self.max_ticks = ticks;
        self
    }

    fn ticks(&self) -> u64 {
        if self.max_ticks > 0 {
            self.max_ticks
        } else {
            self.scenario.total_ticks()
        }
    }
}

/// Results from a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Configuration used
    pub config: BatchConfig,
    /// Individual run metrics, in seed order
    pub runs: Vec<RunMetrics>,
    /// Aggregate summary
    pub summary: BatchSummary,
    /// Total runtime
    pub duration_seconds: f64,
    /// Errors encountered
    pub errors: Vec<BatchError>,
}

impl BatchResults {
    /// Save results to JSON file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load results from JSON file
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }
}

/// Error during batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchError {
    /// Run index
    pub run_index: u32,
    /// Seed used
    pub seed: u64,
    /// Error message
    pub message: String,
}

/// Progress tracking for batch runs
#[derive(Debug)]
pub struct BatchProgress {
    /// Total runs
    pub total: u32,
    completed: AtomicU32,
    extinct: AtomicU32,
    start_time: Instant,
}

impl BatchProgress {
    /// Create new progress tracker
    pub fn new(total: u32) -> Self {
        Self {
            total,
            completed: AtomicU32::new(0),
            extinct: AtomicU32::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a completed run
    pub fn record_completion(&self, extinct: bool) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        if extinct {
            self.extinct.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get current completion count
    pub fn current(&self) -> u32 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Runs so far that ended with an empty pen
    pub fn extinctions(&self) -> u32 {
        self.extinct.load(Ordering::Relaxed)
    }

    /// Get completion percentage
    pub fn percentage(&self) -> f64 {
        f64::from(self.current()) / f64::from(self.total.max(1)) * 100.0
    }

    /// Get estimated time remaining
    pub fn eta(&self) -> Duration {
        let completed = self.current();
        if completed == 0 {
            return Duration::from_secs(0);
        }

        let elapsed = self.start_time.elapsed();
        let per_run = elapsed.as_secs_f64() / f64::from(completed);
        let remaining = self.total.saturating_sub(completed);
        Duration::from_secs_f64(per_run * f64::from(remaining))
    }
}

/// Run one seed of a scenario to completion.
pub fn run_single(scenario: &Scenario, seed: u64, ticks: u64) -> Result<RunMetrics, ScenarioError> {
    let mut sim = scenario.build_with_seed(seed)?;
    let dt = scenario.dt();
    let mut collector = MetricsCollector::new(&scenario.name, seed, &sim);

    for _ in 0..ticks {
        let events = sim.tick(dt);
        collector.observe(&events, sim.population());
    }

    Ok(collector.finalize(&sim))
}

/// Run a batch of seeds
pub fn run_batch(config: BatchConfig) -> BatchResults {
    let start = Instant::now();
    let progress = BatchProgress::new(config.run_count);
    let ticks = config.ticks();

    info!(
        "Starting batch run: {} runs of '{}' for {} ticks",
        config.run_count, config.scenario.name, ticks
    );

    // Configure thread pool if specified
    if config.parallel_runs > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel_runs as usize)
            .build_global()
            .ok(); // Ignore if already set
    }

    let results: Vec<Result<RunMetrics, BatchError>> = (0..config.run_count)
        .into_par_iter()
        .map(|i| {
            let seed = config.seed_start.wrapping_add(u64::from(i));
            match run_single(&config.scenario, seed, ticks) {
                Ok(metrics) => {
                    progress.record_completion(metrics.is_extinct());
                    let completed = progress.current();
                    if completed % 10 == 0 {
                        debug!(
                            "Progress: {}/{} ({:.0}%, {} extinct, eta {}s)",
                            completed,
                            config.run_count,
                            progress.percentage(),
                            progress.extinctions(),
                            progress.eta().as_secs()
                        );
                    }
                    Ok(metrics)
                }
                Err(e) => {
                    warn!("Run {} failed: {}", i, e);
                    Err(BatchError {
                        run_index: i,
                        seed,
                        message: e.to_string(),
                    })
                }
            }
        })
        .collect();

    let (runs, errors): (Vec<_>, Vec<_>) = results.into_iter().partition(Result::is_ok);
    let runs: Vec<RunMetrics> = runs.into_iter().filter_map(Result::ok).collect();
    let errors: Vec<BatchError> = errors.into_iter().filter_map(Result::err).collect();

    let summary = BatchSummary::from_runs(&runs);
    let duration_seconds = start.elapsed().as_secs_f64();

    info!(
        "Batch complete: {} runs in {:.1}s ({} extinct)",
        runs.len(),
        duration_seconds,
        summary.extinctions
    );

    BatchResults {
        config,
        runs,
        summary,
        duration_seconds,
        errors,
    }
}

/// Verify determinism by running the same seed several times.
///
/// Returns `Ok(false)` if any run's final hash or metrics differ.
pub fn verify_determinism(
    scenario: &Scenario,
    seed: u64,
    ticks: u64,
    runs: u32,
) -> Result<bool, ScenarioError> {
    let results = (0..runs.max(1))
        .map(|_| run_single(scenario, seed, ticks))
        .collect::<Result<Vec<_>, _>>()?;

    let first = &results[0];
    let consistent = results.iter().all(|r| r == first);
    if !consistent {
        warn!(seed, "Runs diverged");
    }
    Ok(consistent)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short_scenario() -> Scenario {
        Scenario {
            duration_seconds: 2,
            ..Scenario::meadow()
        }
    }

    #[test]
    fn test_batch_config_default() {
        let config = BatchConfig::default();
        assert_eq!(config.run_count, 100);
        assert_eq!(config.scenario.name, "meadow");
        assert_eq!(config.ticks(), 6000);
    }

    #[test]
    fn test_batch_config_builder() {
        let config = BatchConfig::new(Scenario::duel(), 500)
            .with_output(PathBuf::from("/tmp/results"))
            .with_seed(12345)
            .with_max_ticks(10);

        assert_eq!(config.scenario.name, "duel");
        assert_eq!(config.run_count, 500);
        assert_eq!(config.seed_start, 12345);
        assert_eq!(config.ticks(), 10);
    }

    #[test]
    fn test_progress_tracking() {
        let progress = BatchProgress::new(100);
        assert_eq!(progress.current(), 0);
        assert_eq!(progress.percentage(), 0.0);

        progress.record_completion(false);
        progress.record_completion(true);
        progress.record_completion(false);

        assert_eq!(progress.current(), 3);
        assert_eq!(progress.extinctions(), 1);
        assert!((progress.percentage() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_run_batch_small() {
        let results = run_batch(BatchConfig::new(short_scenario(), 6));

        assert_eq!(results.runs.len(), 6);
        assert!(results.errors.is_empty());
        assert_eq!(results.summary.total_runs, 6);
        assert!(results.runs.iter().all(|r| r.ticks == 40));
    }

    #[test]
    fn test_seeds_are_sequential() {
        let results = run_batch(BatchConfig::new(short_scenario(), 3).with_seed(10));
        let mut seeds: Vec<u64> = results.runs.iter().map(|r| r.seed).collect();
        seeds.sort_unstable();
        assert_eq!(seeds, vec![10, 11, 12]);
    }

    #[test]
    fn test_bad_scenario_reports_errors() {
        let mut scenario = short_scenario();
        scenario.tick_ms = 0;
        let results = run_batch(BatchConfig::new(scenario, 2).with_max_ticks(5));
        assert!(results.runs.is_empty());
        assert_eq!(results.errors.len(), 2);
    }

    #[test]
    fn test_verify_determinism() {
        assert!(verify_determinism(&short_scenario(), 12345, 40, 3).unwrap());
    }

    #[test]
    fn test_batch_results_save_load() {
        let results = run_batch(BatchConfig::new(short_scenario(), 2));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("results.json");

        results.save(&path).unwrap();
        assert!(path.exists());

        let loaded = BatchResults::load(&path).unwrap();
        assert_eq!(loaded.runs.len(), 2);
        for (a, b) in loaded.runs.iter().zip(&results.runs) {
            assert_eq!(a.seed, b.seed);
            assert_eq!(a.final_state_hash, b.final_state_hash);
            assert_eq!(a.deaths_by_cause, b.deaths_by_cause);
        }
        assert_eq!(loaded.config.scenario, results.config.scenario);
    }
}
