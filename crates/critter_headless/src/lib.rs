//! Headless critter pen runner for experiments and CI verification.
//!
//! This crate drives a [`critter_core`] pen without any renderer. A
//! controller talks to it with JSON commands on stdin and reads pen state
//! on stdout. This enables:
//!
//! - **Scripted experiments**: drop food, build walls, read the ledger
//! - **Population studies**: many seeds of one scenario in parallel
//! - **CI verification**: identical seeds must end in identical states
//!
//! # Protocol
//!
//! Communication uses JSON lines (one JSON object per line):
//!
//! - **stdin**: Commands from controller (tick, query, place_barrier, etc.)
//! - **stdout**: State updates and responses (JSON)
//! - **stderr**: Debug logs (human-readable)
//!
//! See [`protocol`] module for the full command/response format.
//!
//! # Example
//!
//! ```bash
//! # Run interactively
//! echo '{"cmd":"tick","count":60}' | cargo run -p critter_headless
//!
//! # Run a scenario
//! cargo run -p critter_headless -- simulate --scenario demos/divided.ron
//! ```

pub mod batch;
pub mod metrics;
pub mod protocol;
pub mod runner;
pub mod scenario;

pub use batch::{run_batch, run_single, BatchConfig, BatchResults};
pub use metrics::{BatchSummary, MetricsCollector, RunMetrics};
pub use protocol::{Command, Response};
pub use runner::{HeadlessConfig, HeadlessRunner};
pub use scenario::{Scenario, ScenarioError};
