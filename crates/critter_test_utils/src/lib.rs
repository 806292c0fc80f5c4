//! # Critter Test Utilities
//!
//! Shared testing utilities for the pen crates:
//! - Determinism test harness
//! - Fixture spawning helpers and scenario builders
//! - Property-based testing strategies

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod determinism;
pub mod fixtures;

/// Re-export proptest for convenience.
pub use proptest;
