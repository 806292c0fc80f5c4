//! # Critter Core
//!
//! Deterministic simulation core for the animal pen.
//!
//! This crate contains **only** simulation logic:
//! - No rendering
//! - No IO
//! - No system randomness (every roll goes through [`rng::RandomSource`])
//! - No floating-point math (uses fixed-point)
//!
//! This separation enables:
//! - Headless batch runs and scenario testing
//! - Scripted rolls in unit tests
//! - Determinism testing via [`simulation::Simulation::state_hash`]
//!
//! ## Crate Structure
//!
//! - [`simulation`] - The pen and its tick loop
//! - [`entities`] - Agents, food, barriers and corpses
//! - [`mission`] - Mission priorities and selection
//! - [`locomotion`] - Collision-checked movement and steering
//! - [`combat`] - Strikes and contact duels
//! - [`lifecycle`] - Hunger, birth, death and the ancestor ledger
//! - [`lineage`] - Kinship, alliances and names
//! - [`events`] - Side effects reported to the host
//! - [`config`] - Tunables
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod combat;
pub mod config;
pub mod entities;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod lineage;
pub mod locomotion;
pub mod math;
pub mod mission;
pub mod rng;
pub mod simulation;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::SimConfig;
    pub use crate::entities::{
        Agent, AgentId, Barrier, BarrierId, Corpse, CorpseId, DeathCause, EntityHandle, EntityTag,
        FamilyColor, Food, FoodId, Temperament,
    };
    pub use crate::error::{Result, SimError};
    pub use crate::events::{SimEvent, TickEvents};
    pub use crate::lifecycle::{AncestorLedger, AncestorRecord, LedgerSort};
    pub use crate::math::{Aabb, Fixed, Vec2Fixed};
    pub use crate::mission::{Mission, MissionKind};
    pub use crate::rng::{RandomSource, ScriptedRng, SeededRng};
    pub use crate::simulation::{Simulation, SpawnRequest};
}
