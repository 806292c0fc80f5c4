//! Error types for the pen simulation.
//!
//! Behavioural edge cases (stale targets, missing food, a full pen) are
//! never errors; the simulation corrects itself on the next tick. These
//! variants cover misuse of the public API and bad configuration.

use thiserror::Error;

/// Result type alias using [`SimError`].
pub type Result<T> = std::result::Result<T, SimError>;

/// Top-level error type for simulation API errors.
#[derive(Debug, Error)]
pub enum SimError {
    /// Invalid entity reference.
    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    /// A tunable is out of range.
    #[error("Invalid config value for '{field}': {reason}")]
    InvalidConfig {
        /// Offending field name.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// Config file could not be parsed.
    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] ron::error::SpannedError),

    /// Invalid simulation state.
    #[error("Invalid simulation state: {0}")]
    InvalidState(String),
}
