//! Headless critter pen runner.
//!
//! This binary runs the pen without graphics, controlled via JSON on stdin/stdout.
//! Designed for scripted experiments, CI testing, and determinism checks.
//!
//! # Usage
//!
//! ```bash
//! # Interactive mode - read commands from stdin
//! cargo run -p critter_headless
//!
//! # Interactive mode on a scenario file
//! cargo run -p critter_headless -- run --scenario demos/divided.ron --auto-state
//!
//! # Run a scenario to the end and print its metrics
//! cargo run -p critter_headless -- simulate --scenario meadow --seed 7
//!
//! # Run 200 seeds in parallel
//! cargo run -p critter_headless -- batch --scenario meadow --count 200 --output results/
//!
//! # Check that a seed replays identically
//! cargo run -p critter_headless -- verify --scenario duel --seed 3 --runs 5
//! ```
//!
//! # Protocol
//!
//! Input (stdin): JSON commands, one per line
//! Output (stdout): JSON responses, one per line
//! Logs (stderr): Debug information, filtered by `RUST_LOG`
//!
//! See the protocol module for command/response format.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use critter_headless::{
    batch::{run_batch, run_single, verify_determinism, BatchConfig},
    runner::{HeadlessConfig, HeadlessRunner},
    scenario::Scenario,
};

#[derive(Parser)]
#[command(name = "critter_headless")]
#[command(about = "Headless critter pen runner for experiments and CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive a pen interactively over stdin/stdout
    Run {
        /// Preset name or scenario file
        #[arg(short, long)]
        scenario: Option<String>,

        /// Answer every tick with a state snapshot
        #[arg(long)]
        auto_state: bool,
    },

    /// Run one scenario to the end and print its metrics as JSON
    Simulate {
        /// Preset name or scenario file
        #[arg(short, long, default_value = "meadow")]
        scenario: String,

        /// Seed override
        #[arg(long)]
        seed: Option<u64>,

        /// Tick count override
        #[arg(long)]
        ticks: Option<u64>,
    },

    /// Run one scenario under many seeds
    Batch {
        /// Preset name or scenario file
        #[arg(short, long, default_value = "meadow")]
        scenario: String,

        /// Number of runs
        #[arg(short, long, default_value = "100")]
        count: u32,

        /// Maximum parallel runs (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: u32,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Starting random seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Tick limit per run (0 = scenario duration)
        #[arg(long, default_value = "0")]
        max_ticks: u64,
    },

    /// Verify that repeated runs of one seed end in the same state
    Verify {
        /// Preset name or scenario file
        #[arg(short, long, default_value = "meadow")]
        scenario: String,

        /// Seed to replay
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Number of runs to compare
        #[arg(short, long, default_value = "3")]
        runs: u32,

        /// Ticks per run
        #[arg(long, default_value = "1200")]
        ticks: u64,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging to stderr (stdout is for protocol)
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    match cli.command {
        Some(Commands::Run {
            scenario,
            auto_state,
        }) => cmd_run(scenario, auto_state),
        Some(Commands::Simulate {
            scenario,
            seed,
            ticks,
        }) => cmd_simulate(&scenario, seed, ticks),
        Some(Commands::Batch {
            scenario,
            count,
            parallel,
            output,
            seed,
            max_ticks,
        }) => cmd_batch(&scenario, count, parallel, output, seed, max_ticks),
        Some(Commands::Verify {
            scenario,
            seed,
            runs,
            ticks,
        }) => cmd_verify(&scenario, seed, runs, ticks),
        None => {
            // Default: interactive mode
            cmd_run(None, true);
        }
    }
}

fn load_scenario(name_or_path: &str) -> Scenario {
    match Scenario::resolve(name_or_path) {
        Ok(scenario) => scenario,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    }
}

/// Drive a pen interactively
fn cmd_run(scenario: Option<String>, auto_state: bool) {
    tracing::info!("Starting interactive session");

    let config = HeadlessConfig {
        auto_state_output: auto_state,
        scenario: scenario.as_deref().map(load_scenario).unwrap_or_default(),
    };

    let result = HeadlessRunner::new(config)
        .map_err(|e| e.to_string())
        .and_then(|mut runner| runner.run_stdio().map_err(|e| e.to_string()));
    if let Err(e) = result {
        tracing::error!("Session failed: {}", e);
        std::process::exit(1);
    }
}

/// Run one scenario to completion
fn cmd_simulate(scenario: &str, seed: Option<u64>, ticks: Option<u64>) {
    let scenario = load_scenario(scenario);
    let seed = seed.unwrap_or(scenario.seed);
    let ticks = ticks.unwrap_or_else(|| scenario.total_ticks());

    tracing::info!(
        "Simulating '{}' with seed {} for {} ticks",
        scenario.name,
        seed,
        ticks
    );

    let metrics = match run_single(&scenario, seed, ticks) {
        Ok(metrics) => metrics,
        Err(e) => {
            tracing::error!("Simulation failed: {}", e);
            std::process::exit(1);
        }
    };

    match serde_json::to_string_pretty(&metrics) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            tracing::error!("Failed to serialize metrics: {}", e);
            std::process::exit(1);
        }
    }
}

/// Run a batch of seeds
fn cmd_batch(
    scenario: &str,
    count: u32,
    parallel: u32,
    output: PathBuf,
    seed: u64,
    max_ticks: u64,
) {
    let mut config = BatchConfig::new(load_scenario(scenario), count)
        .with_output(output.clone())
        .with_seed(seed)
        .with_max_ticks(max_ticks);
    config.parallel_runs = parallel;

    let results = run_batch(config);

    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let path = output.join(format!("batch_{}_{}.json", results.config.scenario.name, timestamp));

    if let Err(e) = results.save(&path) {
        tracing::error!("Failed to save results: {}", e);
        std::process::exit(1);
    }

    let s = &results.summary;
    eprintln!("Runs:              {}", s.total_runs);
    eprintln!("Extinctions:       {} ({:.1}%)", s.extinctions, s.extinction_rate * 100.0);
    eprintln!(
        "Final population:  avg {:.1} (min {}, max {})",
        s.avg_final_population, s.min_final_population, s.max_final_population
    );
    eprintln!("Peak population:   avg {:.1}", s.avg_peak_population);
    eprintln!("Births / deaths:   {:.1} / {:.1}", s.avg_births, s.avg_deaths);
    for (cause, share) in &s.death_share {
        eprintln!("  {:<16} {:>5.1}%", cause, share * 100.0);
    }
    eprintln!("Alliances:         avg {:.1}", s.avg_alliances);
    eprintln!("Legacies:          avg {:.1}", s.avg_legacies);
    if !results.errors.is_empty() {
        eprintln!("Errors:            {}", results.errors.len());
    }
    eprintln!("Results written to {}", path.display());
}

/// Verify determinism
fn cmd_verify(scenario: &str, seed: u64, runs: u32, ticks: u64) {
    let scenario = load_scenario(scenario);
    tracing::info!(
        "Verifying determinism: {} with seed {} ({} runs, {} ticks)",
        scenario.name,
        seed,
        runs,
        ticks
    );

    match verify_determinism(&scenario, seed, ticks, runs) {
        Ok(true) => eprintln!("PASS: All {runs} runs produced identical results"),
        Ok(false) => {
            eprintln!("FAIL: Non-determinism detected!");
            std::process::exit(1);
        }
        Err(e) => {
            tracing::error!("Verification failed: {}", e);
            std::process::exit(1);
        }
    }
}
