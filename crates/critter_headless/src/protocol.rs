//! JSON protocol for driving the pen headlessly.
//!
//! The runner communicates via JSON lines (one JSON object per line):
//!
//! **Input (stdin):** Commands from the controller
//! **Output (stdout):** State snapshots and responses
//!
//! # Protocol Flow
//!
//! 1. Runner starts, outputs `{"type":"ready","version":"1.0","tick":0}`
//! 2. Controller sends commands as JSON lines
//! 3. `tick` answers with a state snapshot and the events of those ticks
//! 4. `quit` answers `{"type":"bye"}` and the runner exits
//!
//! # Example Session
//!
//! ```text
//! <- {"type":"ready","version":"1.0","tick":0}
//! -> {"cmd":"place_barrier","x":400,"y":300}
//! <- {"type":"ack","cmd":"place_barrier"}
//! -> {"cmd":"tick","count":20}
//! <- {"type":"state","tick":20,"paused":false,"agents":[...],"events":[...],...}
//! -> {"cmd":"ledger","sort":"kills"}
//! <- {"type":"ledger","records":[...]}
//! ```

use critter_core::entities::{EntityTag, FamilyColor};
use critter_core::events::SimEvent;
use critter_core::lifecycle::{AncestorRecord, LedgerSort, NewsLine};
use critter_core::math::{Fixed, Vec2Fixed};
use critter_core::rng::RandomSource;
use critter_core::simulation::Simulation;
use serde::{Deserialize, Serialize};

/// Protocol version reported in the ready line.
pub const PROTOCOL_VERSION: &str = "1.0";

// ============================================================================
// Input Commands (controller -> runner)
// ============================================================================

/// Commands that can be sent to the headless runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    /// Advance the pen by N ticks (default: 1).
    Tick {
        /// Number of ticks.
        #[serde(default = "default_tick_count")]
        count: u32,
    },

    /// Report the current state without advancing time.
    Query,

    /// Drop a food item (ignored outside the pen).
    SpawnFood {
        /// X coordinate.
        x: f64,
        /// Y coordinate.
        y: f64,
    },

    /// Place a wall on the grid cell under the point.
    PlaceBarrier {
        /// X coordinate.
        x: f64,
        /// Y coordinate.
        y: f64,
    },

    /// Remove the wall nearest the point.
    RemoveBarrier {
        /// X coordinate.
        x: f64,
        /// Y coordinate.
        y: f64,
    },

    /// Suspend ticking.
    Pause,

    /// Resume ticking.
    Resume,

    /// Dump the ancestor ledger.
    Ledger {
        /// Sort key.
        #[serde(default)]
        sort: LedgerSort,
    },

    /// Dump the news feed.
    News,

    /// Report the state hash (for determinism verification).
    Hash,

    /// Quit the runner.
    Quit,
}

fn default_tick_count() -> u32 {
    1
}

// ============================================================================
// Output Responses (runner -> controller)
// ============================================================================

/// Responses sent from the headless runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Runner is ready to accept commands.
    Ready {
        /// Protocol version.
        version: String,
        /// Current tick.
        tick: u64,
    },

    /// Acknowledgment of a command.
    Ack {
        /// Command name.
        cmd: String,
    },

    /// Error processing a command.
    Error {
        /// What went wrong.
        message: String,
        /// Command name, if the line parsed.
        cmd: Option<String>,
    },

    /// Snapshot of the pen.
    State(Box<PenState>),

    /// Ancestor ledger.
    Ledger {
        /// Records in the requested order.
        records: Vec<AncestorRecord>,
    },

    /// Recent news, oldest first.
    News {
        /// News lines.
        lines: Vec<NewsLine>,
    },

    /// State hash for determinism verification.
    Hash {
        /// Current tick.
        tick: u64,
        /// State hash.
        hash: u64,
    },

    /// Goodbye message before shutdown.
    Bye,
}

// ============================================================================
// State Types
// ============================================================================

/// Whole-pen snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PenState {
    /// Current tick.
    pub tick: u64,
    /// Simulated seconds.
    pub elapsed: f64,
    /// Ticking suspended.
    pub paused: bool,
    /// Living agents.
    pub agents: Vec<AgentState>,
    /// Food items.
    pub food: usize,
    /// Walls and legacy markers.
    pub barriers: usize,
    /// Legacy markers alone.
    pub legacies: usize,
    /// Corpses on the ground.
    pub corpses: usize,
    /// Dead agents recorded so far.
    pub ancestors: usize,
    /// Events since the previous snapshot.
    pub events: Vec<SimEvent>,
    /// State hash.
    pub hash: u64,
}

/// One row of the live statistics table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    /// Full name.
    pub name: String,
    /// Family color as `#rrggbb`.
    pub family: String,
    /// Mission-tinted display color as `#rrggbb`.
    pub color: String,
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Health.
    pub health: f64,
    /// Hunger.
    pub hunger: f64,
    /// Current mission.
    pub mission: String,
    /// Seconds alive.
    pub lifetime: f64,
    /// Children.
    pub kids: u32,
    /// Meals.
    pub foods: u32,
    /// Kills.
    pub kills: u32,
    /// Fitness score.
    pub magic_number: f64,
    /// Mature badge.
    pub badge: bool,
}

fn hex(color: FamilyColor) -> String {
    color.to_string()
}

impl PenState {
    /// Capture `sim` along with the events gathered since the last snapshot.
    #[must_use]
    pub fn capture<R: RandomSource>(sim: &Simulation<R>, events: Vec<SimEvent>) -> Self {
        let agents = sim
            .live_stats()
            .into_iter()
            .map(|row| AgentState {
                name: row.name,
                family: hex(row.family),
                color: hex(row.display_color),
                x: row.position.x.to_num(),
                y: row.position.y.to_num(),
                health: row.health.to_num(),
                hunger: row.hunger.to_num(),
                mission: row.mission.as_str().to_string(),
                lifetime: row.lifetime.to_num(),
                kids: row.kids,
                foods: row.foods,
                kills: row.kills,
                magic_number: row.magic_number.to_num(),
                badge: row.badge,
            })
            .collect();

        Self {
            tick: sim.current_tick(),
            elapsed: sim.elapsed().to_num(),
            paused: sim.is_paused(),
            agents,
            food: sim.food_count(),
            barriers: sim.query(EntityTag::Barrier).len(),
            legacies: sim.query(EntityTag::Legacy).len(),
            corpses: sim.query(EntityTag::Corpse).len(),
            ancestors: sim.ledger().len(),
            events,
            hash: sim.state_hash(),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Convert protocol coordinates into pen coordinates.
///
/// Returns `None` for NaN, infinities and values out of fixed-point range.
#[must_use]
pub fn point(x: f64, y: f64) -> Option<Vec2Fixed> {
    Some(Vec2Fixed::new(Fixed::checked_from_num(x)?, Fixed::checked_from_num(y)?))
}

impl Response {
    /// Create a ready response.
    #[must_use]
    pub fn ready(tick: u64) -> Self {
        Self::Ready {
            version: PROTOCOL_VERSION.to_string(),
            tick,
        }
    }

    /// Create an acknowledgment.
    #[must_use]
    pub fn ack(cmd: &str) -> Self {
        Self::Ack {
            cmd: cmd.to_string(),
        }
    }

    /// Create an error response.
    pub fn error(message: impl Into<String>, cmd: Option<&str>) -> Self {
        Self::Error {
            message: message.into(),
            cmd: cmd.map(String::from),
        }
    }

    /// Serialize to JSON line (with newline).
    #[must_use]
    pub fn to_json_line(&self) -> String {
        let mut json = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","message":"Serialization failed: {e}"}}"#)
        });
        json.push('\n');
        json
    }
}

impl Command {
    /// Parse from a JSON line.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Get command name for acknowledgment.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tick { .. } => "tick",
            Self::Query => "query",
            Self::SpawnFood { .. } => "spawn_food",
            Self::PlaceBarrier { .. } => "place_barrier",
            Self::RemoveBarrier { .. } => "remove_barrier",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Ledger { .. } => "ledger",
            Self::News => "news",
            Self::Hash => "hash",
            Self::Quit => "quit",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tick_command() {
        let cmd = Command::from_json(r#"{"cmd":"tick","count":60}"#).unwrap();
        assert_eq!(cmd, Command::Tick { count: 60 });
    }

    #[test]
    fn test_default_tick_count() {
        let cmd = Command::from_json(r#"{"cmd":"tick"}"#).unwrap();
        assert_eq!(cmd, Command::Tick { count: 1 });
    }

    #[test]
    fn test_parse_barrier_command() {
        let cmd = Command::from_json(r#"{"cmd":"place_barrier","x":100,"y":200.5}"#).unwrap();
        assert_eq!(cmd, Command::PlaceBarrier { x: 100.0, y: 200.5 });
        assert_eq!(cmd.name(), "place_barrier");
    }

    #[test]
    fn test_ledger_sort_defaults_to_death_order() {
        let cmd = Command::from_json(r#"{"cmd":"ledger"}"#).unwrap();
        assert_eq!(cmd, Command::Ledger { sort: LedgerSort::Death });
        let cmd = Command::from_json(r#"{"cmd":"ledger","sort":"magic"}"#).unwrap();
        assert_eq!(cmd, Command::Ledger { sort: LedgerSort::Magic });
    }

    #[test]
    fn test_unknown_command_rejected() {
        assert!(Command::from_json(r#"{"cmd":"teleport"}"#).is_err());
    }

    #[test]
    fn test_serialize_hash_response() {
        let json = Response::Hash { tick: 100, hash: 12345 }.to_json_line();
        assert!(json.contains(r#""type":"hash""#));
        assert!(json.contains(r#""tick":100"#));
        assert!(json.ends_with('\n'));
    }

    #[test]
    fn test_point_rejects_nan() {
        assert!(point(f64::NAN, 1.0).is_none());
        assert_eq!(point(3.0, 4.0), Some(Vec2Fixed::from_ints(3, 4)));
    }
}
