//! Run metrics collection for population analysis.
//!
//! A [`MetricsCollector`] watches the event batches of one run; the
//! finished [`RunMetrics`] are aggregated across seeds by
//! [`BatchSummary`].

use std::collections::BTreeMap;

use critter_core::events::{SimEvent, TickEvents};
use critter_core::lifecycle::LedgerSort;
use critter_core::rng::RandomSource;
use critter_core::simulation::Simulation;
use serde::{Deserialize, Serialize};

/// Complete metrics for a single run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Scenario name.
    pub scenario: String,
    /// Random seed used.
    pub seed: u64,
    /// Ticks simulated.
    pub ticks: u64,
    /// Simulated seconds.
    pub simulated_seconds: f64,
    /// Agents alive before the first tick.
    pub initial_population: usize,
    /// Agents alive at the end.
    pub final_population: usize,
    /// Most agents alive at once.
    pub peak_population: usize,
    /// Children born.
    pub births: u32,
    /// Deaths keyed by cause label.
    pub deaths_by_cause: BTreeMap<String, u32>,
    /// Strikes that landed.
    pub strikes: u32,
    /// Food eaten.
    pub meals: u32,
    /// Alliances formed.
    pub alliances: u32,
    /// Legacy markers placed.
    pub legacies_placed: u32,
    /// Legacy markers torn down by rivals.
    pub legacies_demolished: u32,
    /// Tick the last agent died on, if the pen emptied.
    pub extinct_at_tick: Option<u64>,
    /// Longest-lived dead agent.
    pub oldest_ancestor: Option<String>,
    /// Dead agent with the most kills.
    pub deadliest_ancestor: Option<String>,
    /// Dead agent with the highest magic number.
    pub best_ancestor: Option<String>,
    /// Final simulation state hash (for determinism validation).
    pub final_state_hash: u64,
}

impl RunMetrics {
    /// Create an empty record for one run.
    #[must_use]
    pub fn new(scenario: impl Into<String>, seed: u64) -> Self {
        Self {
            scenario: scenario.into(),
            seed,
            ..Default::default()
        }
    }

    /// Total deaths of any cause.
    #[must_use]
    pub fn deaths(&self) -> u32 {
        self.deaths_by_cause.values().sum()
    }

    /// Deaths with the given cause label.
    #[must_use]
    pub fn deaths_of(&self, cause: &str) -> u32 {
        self.deaths_by_cause.get(cause).copied().unwrap_or(0)
    }

    /// True if no agent survived.
    #[must_use]
    pub fn is_extinct(&self) -> bool {
        self.extinct_at_tick.is_some()
    }
}

/// Aggregate statistics across a batch of runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Runs aggregated.
    pub total_runs: u32,
    /// Runs that ended with an empty pen.
    pub extinctions: u32,
    /// Share of runs that ended with an empty pen.
    pub extinction_rate: f64,
    /// Average final population.
    pub avg_final_population: f64,
    /// Smallest final population.
    pub min_final_population: usize,
    /// Largest final population.
    pub max_final_population: usize,
    /// Average peak population.
    pub avg_peak_population: f64,
    /// Average births per run.
    pub avg_births: f64,
    /// Average deaths per run.
    pub avg_deaths: f64,
    /// Share of all deaths per cause.
    pub death_share: BTreeMap<String, f64>,
    /// Average alliances per run.
    pub avg_alliances: f64,
    /// Average legacy markers per run.
    pub avg_legacies: f64,
}

impl BatchSummary {
    /// Calculate summary from a list of run metrics.
    #[must_use]
    pub fn from_runs(runs: &[RunMetrics]) -> Self {
        if runs.is_empty() {
            return Self::default();
        }

        let count = runs.len() as f64;
        let mut summary = Self {
            total_runs: runs.len() as u32,
            min_final_population: usize::MAX,
            ..Default::default()
        };

        let mut final_sum = 0usize;
        let mut peak_sum = 0usize;
        let mut births = 0u64;
        let mut deaths = 0u64;
        let mut alliances = 0u64;
        let mut legacies = 0u64;
        let mut by_cause: BTreeMap<String, u64> = BTreeMap::new();

        for run in runs {
            if run.is_extinct() {
                summary.extinctions += 1;
            }
            final_sum += run.final_population;
            peak_sum += run.peak_population;
            summary.min_final_population = summary.min_final_population.min(run.final_population);
            summary.max_final_population = summary.max_final_population.max(run.final_population);
            births += u64::from(run.births);
            deaths += u64::from(run.deaths());
            alliances += u64::from(run.alliances);
            legacies += u64::from(run.legacies_placed);
            for (cause, n) in &run.deaths_by_cause {
                *by_cause.entry(cause.clone()).or_default() += u64::from(*n);
            }
        }

        summary.extinction_rate = f64::from(summary.extinctions) / count;
        summary.avg_final_population = final_sum as f64 / count;
        summary.avg_peak_population = peak_sum as f64 / count;
        summary.avg_births = births as f64 / count;
        summary.avg_deaths = deaths as f64 / count;
        summary.avg_alliances = alliances as f64 / count;
        summary.avg_legacies = legacies as f64 / count;
        if deaths > 0 {
            summary.death_share = by_cause
                .into_iter()
                .map(|(cause, n)| (cause, n as f64 / deaths as f64))
                .collect();
        }

        summary
    }
}

/// Metrics collector that watches a running pen.
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    metrics: RunMetrics,
}

impl MetricsCollector {
    /// Start collecting for a pen about to run.
    #[must_use]
    pub fn new<R: RandomSource>(scenario: &str, seed: u64, sim: &Simulation<R>) -> Self {
        let mut metrics = RunMetrics::new(scenario, seed);
        metrics.initial_population = sim.population();
        metrics.peak_population = sim.population();
        Self { metrics }
    }

    /// Fold one tick's events in; `population` is the count after the tick.
    pub fn observe(&mut self, events: &TickEvents, population: usize) {
        let m = &mut self.metrics;
        for event in &events.events {
            match event {
                SimEvent::Born { .. } => m.births += 1,
                SimEvent::Died { cause, .. } => {
                    *m.deaths_by_cause.entry(cause.label().to_string()).or_default() += 1;
                }
                SimEvent::Struck { .. } => m.strikes += 1,
                SimEvent::Ate { .. } => m.meals += 1,
                SimEvent::AllianceFormed { .. } => m.alliances += 1,
                SimEvent::LegacyPlaced { .. } => m.legacies_placed += 1,
                SimEvent::LegacyDemolished { .. } => m.legacies_demolished += 1,
                SimEvent::FloatingLabel { .. } | SimEvent::News { .. } => {}
            }
        }
        m.peak_population = m.peak_population.max(population);
        if population == 0 && m.extinct_at_tick.is_none() && m.initial_population > 0 {
            m.extinct_at_tick = Some(events.tick);
        }
    }

    /// Get current metrics (for live monitoring).
    #[must_use]
    pub fn current(&self) -> &RunMetrics {
        &self.metrics
    }

    /// Close the run and fill in the end-of-run fields.
    #[must_use]
    pub fn finalize<R: RandomSource>(mut self, sim: &Simulation<R>) -> RunMetrics {
        let m = &mut self.metrics;
        m.ticks = sim.current_tick();
        m.simulated_seconds = sim.elapsed().to_num();
        m.final_population = sim.population();

        let ledger = sim.ledger();
        let top = |sort: LedgerSort| {
            ledger
                .sorted(sort)
                .first()
                .map(|record| record.full_name.clone())
        };
        m.oldest_ancestor = top(LedgerSort::Lifetime);
        m.deadliest_ancestor = top(LedgerSort::Kills);
        m.best_ancestor = top(LedgerSort::Magic);
        m.final_state_hash = sim.state_hash();

        self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(final_population: usize, starved: u32, killed: u32) -> RunMetrics {
        let mut m = RunMetrics::new("test", 0);
        m.final_population = final_population;
        m.peak_population = final_population + 5;
        m.births = 4;
        if starved > 0 {
            m.deaths_by_cause.insert("starvation".to_string(), starved);
        }
        if killed > 0 {
            m.deaths_by_cause.insert("combat".to_string(), killed);
        }
        if final_population == 0 {
            m.extinct_at_tick = Some(100);
        }
        m
    }

    #[test]
    fn test_run_metrics_new() {
        let m = RunMetrics::new("meadow", 42);
        assert_eq!(m.scenario, "meadow");
        assert_eq!(m.seed, 42);
        assert_eq!(m.deaths(), 0);
        assert!(!m.is_extinct());
    }

    #[test]
    fn test_death_counts() {
        let m = run(3, 2, 1);
        assert_eq!(m.deaths(), 3);
        assert_eq!(m.deaths_of("starvation"), 2);
        assert_eq!(m.deaths_of("removed"), 0);
    }

    #[test]
    fn test_batch_summary() {
        let runs = vec![run(10, 3, 1), run(0, 4, 0)];
        let summary = BatchSummary::from_runs(&runs);

        assert_eq!(summary.total_runs, 2);
        assert_eq!(summary.extinctions, 1);
        assert!((summary.extinction_rate - 0.5).abs() < 1e-9);
        assert!((summary.avg_final_population - 5.0).abs() < 1e-9);
        assert_eq!(summary.min_final_population, 0);
        assert_eq!(summary.max_final_population, 10);
        assert!((summary.avg_deaths - 4.0).abs() < 1e-9);
        assert!((summary.death_share["starvation"] - 0.875).abs() < 1e-9);
    }

    #[test]
    fn test_empty_batch_summary() {
        assert_eq!(BatchSummary::from_runs(&[]), BatchSummary::default());
    }

    #[test]
    fn test_collector_counts_events() {
        let mut sim = critter_core::simulation::Simulation::with_seed(
            critter_core::config::SimConfig::default(),
            7,
        )
        .unwrap();
        sim.seed_population();
        let mut collector = MetricsCollector::new("meadow", 7, &sim);
        assert_eq!(collector.current().initial_population, 20);

        let mut births = 0;
        for _ in 0..200 {
            let events = sim.tick(critter_core::simulation::tick_seconds());
            births += events.births().count() as u32;
            collector.observe(&events, sim.population());
        }
        let metrics = collector.finalize(&sim);

        assert_eq!(metrics.ticks, 200);
        assert_eq!(metrics.births, births);
        assert_eq!(metrics.final_population, sim.population());
        assert!(metrics.peak_population >= metrics.final_population);
        assert_eq!(metrics.final_state_hash, sim.state_hash());
    }
}
