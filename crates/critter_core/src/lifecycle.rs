//! Hunger, feeding, birth eligibility and the records left behind by the dead.
//!
//! The functions here mutate a single agent. Spawning children, dropping
//! corpses and removing agents happen in the simulation, which owns the
//! collections.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::entities::{Agent, DeathCause, FamilyColor};
use crate::math::Fixed;

/// Whether an agent survived its hunger update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HungerOutcome {
    /// Still alive.
    Alive,
    /// Spent longer than `starvation_time_limit` over the threshold.
    Starved,
}

/// Age the agent and grow its hunger.
///
/// The starvation timer runs only while hunger is above
/// `starvation_threshold` and resets as soon as it drops back.
pub fn advance_hunger(agent: &mut Agent, dt: Fixed, config: &SimConfig) -> HungerOutcome {
    agent.stats.lifetime += dt;
    agent.hunger += config.hunger_rate * dt;

    if agent.hunger > config.starvation_threshold {
        agent.hunger_time += dt;
        if agent.hunger_time > config.starvation_time_limit {
            return HungerOutcome::Starved;
        }
    } else {
        agent.hunger_time = Fixed::ZERO;
    }
    HungerOutcome::Alive
}

/// Apply a meal: hunger and the starvation timer reset, health recovers.
pub fn feed(agent: &mut Agent, config: &SimConfig) {
    agent.hunger = Fixed::ZERO;
    agent.hunger_time = Fixed::ZERO;
    agent.mission.clear();
    agent.stats.foods += 1;
    agent.health = (agent.health * config.feed_health_multiplier).min(config.max_health);
}

/// Accumulate satiety; long enough below `sated_threshold` makes the agent
/// ready to give birth.
pub fn advance_satiety(agent: &mut Agent, dt: Fixed, config: &SimConfig) {
    if agent.hunger < config.sated_threshold {
        agent.sated_time += dt;
        if agent.sated_time > config.birthing_time {
            agent.ready_to_birth = true;
        }
    } else {
        agent.sated_time = Fixed::ZERO;
    }
}

/// What the birth check decided for one agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BirthDecision {
    /// Not eligible yet.
    Wait,
    /// Spawn a child now.
    GiveBirth,
    /// Eligible, but the pen is full.
    PenFull,
}

/// Decide whether a ready agent gives birth given the live `population`.
#[must_use]
pub fn birth_decision(agent: &Agent, population: usize, config: &SimConfig) -> BirthDecision {
    if !agent.ready_to_birth || agent.hunger <= config.birthing_hunger_min {
        return BirthDecision::Wait;
    }
    if population >= config.max_population as usize {
        BirthDecision::PenFull
    } else {
        BirthDecision::GiveBirth
    }
}

/// Book a birth on the parent.
pub fn record_birth(parent: &mut Agent, child_name: &str) {
    parent.stats.kids += 1;
    parent.offspring.push(child_name.to_string());
    parent.ready_to_birth = false;
    parent.sated_time = Fixed::ZERO;
}

/// Book a birth skipped at the population cap; the parent stays eligible.
pub fn defer_birth(parent: &mut Agent) {
    parent.sated_time = Fixed::ZERO;
}

/// Snapshot of a dead agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AncestorRecord {
    /// First name.
    pub name: String,
    /// First and last name.
    pub full_name: String,
    /// Parent's first name.
    pub parent: Option<String>,
    /// Family color.
    pub family: FamilyColor,
    /// Founder-to-self name chain.
    pub lineage: Vec<String>,
    /// Children's first names.
    pub offspring: Vec<String>,
    /// Seconds lived.
    pub lifetime: Fixed,
    /// Children born.
    pub kids: u32,
    /// Food eaten.
    pub foods: u32,
    /// Agents killed.
    pub kills: u32,
    /// Fitness score at death.
    pub magic_number: Fixed,
    /// Full names of victims.
    pub victims: Vec<String>,
    /// How the agent died.
    pub cause: DeathCause,
    /// Tick on which the agent died.
    pub died_at_tick: u64,
}

impl AncestorRecord {
    /// Capture an agent at the moment of death.
    #[must_use]
    pub fn from_agent(agent: &Agent, cause: DeathCause, tick: u64) -> Self {
        Self {
            name: agent.name.clone(),
            full_name: agent.full_name(),
            parent: agent.parent.clone(),
            family: agent.family,
            lineage: agent.lineage.clone(),
            offspring: agent.offspring.clone(),
            lifetime: agent.stats.lifetime,
            kids: agent.stats.kids,
            foods: agent.stats.foods,
            kills: agent.stats.kills,
            magic_number: agent.magic_number(),
            victims: agent.victims.clone(),
            cause,
            died_at_tick: tick,
        }
    }
}

/// Column a ledger can be sorted by (descending, ties by name).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerSort {
    /// Order of death.
    #[default]
    Death,
    /// Seconds lived.
    Lifetime,
    /// Children born.
    Kids,
    /// Food eaten.
    Foods,
    /// Agents killed.
    Kills,
    /// Fitness score.
    Magic,
}

/// Append-only history of the dead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AncestorLedger {
    records: Vec<AncestorRecord>,
}

impl AncestorLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record.
    pub fn push(&mut self, record: AncestorRecord) {
        self.records.push(record);
    }

    /// Records in order of death.
    #[must_use]
    pub fn records(&self) -> &[AncestorRecord] {
        &self.records
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if nobody has died yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records whose first name is `name`.
    pub fn find<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a AncestorRecord> + 'a {
        self.records.iter().filter(move |r| r.name == name)
    }

    /// Records ordered by `sort`.
    #[must_use]
    pub fn sorted(&self, sort: LedgerSort) -> Vec<&AncestorRecord> {
        let mut rows: Vec<&AncestorRecord> = self.records.iter().collect();
        let key = |r: &AncestorRecord| -> Fixed {
            match sort {
                LedgerSort::Death => Fixed::ZERO,
                LedgerSort::Lifetime => r.lifetime,
                LedgerSort::Kids => Fixed::from_num(r.kids),
                LedgerSort::Foods => Fixed::from_num(r.foods),
                LedgerSort::Kills => Fixed::from_num(r.kills),
                LedgerSort::Magic => r.magic_number,
            }
        };
        if sort != LedgerSort::Death {
            rows.sort_by(|a, b| key(b).cmp(&key(a)).then_with(|| a.name.cmp(&b.name)));
        }
        rows
    }
}

/// One line of the news ticker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsLine {
    /// Tick the line was posted on.
    pub tick: u64,
    /// Message text.
    pub text: String,
}

/// Bounded ring of recent news; the oldest line is dropped when full.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsFeed {
    lines: VecDeque<NewsLine>,
    capacity: usize,
}

impl NewsFeed {
    /// Create a feed holding at most `capacity` lines.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Post a line.
    pub fn push(&mut self, tick: u64, text: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        while self.lines.len() >= self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(NewsLine {
            tick,
            text: text.into(),
        });
    }

    /// Lines from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &NewsLine> {
        self.lines.iter()
    }

    /// Newest line.
    #[must_use]
    pub fn latest(&self) -> Option<&NewsLine> {
        self.lines.back()
    }

    /// Number of lines held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// True if nothing was posted yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
