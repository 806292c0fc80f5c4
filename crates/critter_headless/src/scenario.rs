//! Scenario loading and configuration.
//!
//! A scenario fixes everything a headless run needs: the tunables, the
//! seed, hand-placed founders, walls and food, the tick length and how
//! long to run. Scenarios are RON files; every field is optional.
//!
//! ```ron
//! (
//!     name: "Divided",
//!     seed: 7,
//!     walls: [(400, 100), (400, 110), (400, 120)],
//!     founders: [(name: Some("Ada"), position: (200, 300))],
//!     duration_seconds: 120,
//! )
//! ```

use std::path::Path;

use critter_core::config::SimConfig;
use critter_core::entities::FamilyColor;
use critter_core::error::SimError;
use critter_core::math::{Fixed, Vec2Fixed};
use critter_core::simulation::{Simulation, SpawnRequest, TICK_RATE};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// Scenario values the pen cannot start from.
    #[error("Invalid scenario: {0}")]
    Invalid(String),
    /// The simulation rejected the setup.
    #[error(transparent)]
    Simulation(#[from] SimError),
}

/// A hand-placed founder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FounderPlacement {
    /// First name; generated when absent.
    #[serde(default)]
    pub name: Option<String>,
    /// Spawn position in pen coordinates.
    pub position: (i32, i32),
    /// Family color as `(r, g, b)`; random when absent.
    #[serde(default)]
    pub family: Option<(u8, u8, u8)>,
}

impl FounderPlacement {
    /// Founder at a position with everything else rolled.
    #[must_use]
    pub fn at(x: i32, y: i32) -> Self {
        Self {
            name: None,
            position: (x, y),
            family: None,
        }
    }
}

/// A complete scenario configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Seed for the pen's random stream.
    pub seed: u64,
    /// Simulation tunables.
    pub config: SimConfig,
    /// Also spawn `config.initial_population` random founders.
    pub seed_population: bool,
    /// Hand-placed founders, spawned before the random ones.
    pub founders: Vec<FounderPlacement>,
    /// Points to drop a grid wall on.
    pub walls: Vec<(i32, i32)>,
    /// Points to drop food on.
    pub food: Vec<(i32, i32)>,
    /// Length of one tick in milliseconds.
    pub tick_ms: u32,
    /// Simulated seconds a non-interactive run lasts.
    pub duration_seconds: u32,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::meadow()
    }
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Built-in scenario by name.
    #[must_use]
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "meadow" => Some(Self::meadow()),
            "divided" => Some(Self::divided()),
            "duel" => Some(Self::duel()),
            _ => None,
        }
    }

    /// A preset name or a path to a RON file.
    pub fn resolve(name_or_path: &str) -> Result<Self, ScenarioError> {
        match Self::preset(name_or_path) {
            Some(scenario) => Ok(scenario),
            None => Self::load(name_or_path),
        }
    }

    /// Open pen with the default random population.
    #[must_use]
    pub fn meadow() -> Self {
        Self {
            name: "meadow".to_string(),
            description: "Open pen with a random founding population".to_string(),
            seed: 0,
            config: SimConfig::default(),
            seed_population: true,
            founders: Vec::new(),
            walls: Vec::new(),
            food: Vec::new(),
            tick_ms: 1000 / TICK_RATE,
            duration_seconds: 300,
        }
    }

    /// Pen split by a wall with a single gap in the middle.
    #[must_use]
    pub fn divided() -> Self {
        let config = SimConfig::default();
        let cell = config.legacy_size.to_num::<i32>().max(1);
        let top = config.pen_origin.y.to_num::<i32>();
        let bottom = top + config.pen_size.y.to_num::<i32>();
        let middle = config.pen_origin.x.to_num::<i32>() + config.pen_size.x.to_num::<i32>() / 2;
        let gap = (top + bottom) / 2;

        let walls = (top + cell / 2..bottom)
            .step_by(cell as usize)
            .filter(|y| (y - gap).abs() > 2 * cell)
            .map(|y| (middle, y))
            .collect();

        Self {
            name: "divided".to_string(),
            description: "Two halves joined by one gap".to_string(),
            walls,
            food: vec![(middle - 100, gap), (middle + 100, gap)],
            ..Self::meadow()
        }
    }

    /// Two lone founders from different families facing each other.
    #[must_use]
    pub fn duel() -> Self {
        Self {
            name: "duel".to_string(),
            description: "Two founders, no random population".to_string(),
            seed_population: false,
            founders: vec![
                FounderPlacement {
                    name: Some("Ada".to_string()),
                    position: (300, 300),
                    family: Some((200, 60, 60)),
                },
                FounderPlacement {
                    name: Some("Bo".to_string()),
                    position: (500, 300),
                    family: Some((60, 60, 200)),
                },
            ],
            duration_seconds: 120,
            ..Self::meadow()
        }
    }

    /// Check values the RON parser accepts but the pen cannot run.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.tick_ms == 0 {
            return Err(ScenarioError::Invalid("tick_ms must be positive".to_string()));
        }
        self.config.validate()?;
        Ok(())
    }

    /// Length of one tick in seconds.
    #[must_use]
    pub fn dt(&self) -> Fixed {
        Fixed::from_num(self.tick_ms) / Fixed::from_num(1000)
    }

    /// Ticks a non-interactive run lasts.
    #[must_use]
    pub fn total_ticks(&self) -> u64 {
        u64::from(self.duration_seconds) * 1000 / u64::from(self.tick_ms.max(1))
    }

    /// Build the pen with the scenario's own seed.
    pub fn build(&self) -> Result<Simulation, ScenarioError> {
        self.build_with_seed(self.seed)
    }

    /// Build the pen with an overridden seed (batch runs).
    pub fn build_with_seed(&self, seed: u64) -> Result<Simulation, ScenarioError> {
        self.validate()?;
        let mut sim = Simulation::with_seed(self.config.clone(), seed)?;

        for founder in &self.founders {
            let (x, y) = founder.position;
            sim.spawn(SpawnRequest::Agent {
                position: Vec2Fixed::from_ints(x, y),
                family: founder.family.map(|(r, g, b)| FamilyColor::new(r, g, b)),
                name: founder.name.clone(),
                temperament: None,
            })?;
        }
        if self.seed_population {
            sim.seed_population();
        }

        for &(x, y) in &self.walls {
            if sim.place_wall(Vec2Fixed::from_ints(x, y)).is_none() {
                warn!(x, y, "Skipped wall outside the pen or on an occupied cell");
            }
        }
        for &(x, y) in &self.food {
            if sim.drop_food(Vec2Fixed::from_ints(x, y)).is_none() {
                warn!(x, y, "Skipped food outside the pen");
            }
        }

        debug!(
            scenario = %self.name,
            seed,
            agents = sim.population(),
            food = sim.food_count(),
            "Built scenario"
        );
        Ok(sim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use critter_core::entities::EntityTag;

    #[test]
    fn test_default_scenario() {
        let scenario = Scenario::default();
        assert_eq!(scenario.name, "meadow");
        assert!(scenario.seed_population);
        assert_eq!(scenario.tick_ms, 50);
        assert_eq!(scenario.total_ticks(), 6000);
    }

    #[test]
    fn test_parse_minimal_ron() {
        let scenario = Scenario::from_ron_str("(name: \"tiny\", duration_seconds: 10)").unwrap();
        assert_eq!(scenario.name, "tiny");
        assert_eq!(scenario.total_ticks(), 200);
        assert_eq!(scenario.config, SimConfig::default());
    }

    #[test]
    fn test_parse_founders_and_walls() {
        let ron = r#"(
            seed_population: false,
            founders: [
                (name: Some("Ada"), position: (200, 300), family: Some((255, 0, 0))),
                (position: (600, 300)),
            ],
            walls: [(400, 300)],
            food: [(250, 300)],
        )"#;
        let scenario = Scenario::from_ron_str(ron).unwrap();
        assert_eq!(scenario.founders.len(), 2);
        assert_eq!(scenario.founders[1], FounderPlacement::at(600, 300));

        let sim = scenario.build().unwrap();
        assert_eq!(sim.population(), 2);
        assert_eq!(sim.query(EntityTag::Barrier).len(), 1);
        assert_eq!(sim.food_count(), 1);
    }

    #[test]
    fn test_zero_tick_rejected() {
        let err = Scenario::from_ron_str("(tick_ms: 0)").unwrap_err();
        assert!(matches!(err, ScenarioError::Invalid(_)));
    }

    #[test]
    fn test_bad_config_rejected() {
        let err = Scenario::from_ron_str("(config: (max_population: 0))").unwrap_err();
        assert!(matches!(err, ScenarioError::Simulation(_)));
    }

    #[test]
    fn test_parse_error_reported() {
        let err = Scenario::from_ron_str("(name: ").unwrap_err();
        assert!(matches!(err, ScenarioError::ParseError(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = Scenario::load("/definitely/not/here.ron").unwrap_err();
        assert!(matches!(err, ScenarioError::FileNotFound(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pen.ron");
        std::fs::write(&path, "(name: \"from disk\", seed: 42)").unwrap();

        let scenario = Scenario::load(&path).unwrap();
        assert_eq!(scenario.name, "from disk");
        assert_eq!(scenario.seed, 42);
    }

    #[test]
    fn test_presets_resolve() {
        assert_eq!(Scenario::resolve("duel").unwrap().founders.len(), 2);
        assert!(Scenario::preset("nowhere").is_none());
    }

    #[test]
    fn test_divided_has_a_gap() {
        let scenario = Scenario::divided();
        let sim = scenario.build().unwrap();
        let walls = sim.query(EntityTag::Barrier).len();
        assert!(walls > 40);
        assert!(walls < 60);
    }

    #[test]
    fn test_duel_builds_two_founders() {
        let sim = Scenario::duel().build().unwrap();
        assert_eq!(sim.population(), 2);
    }
}
