//! Side effects reported to the host.
//!
//! The core never draws anything. Whatever a renderer might want to show
//! (damage numbers, birth hearts, alliance banners, the news ticker) is
//! emitted as a [`SimEvent`] and collected per tick in [`TickEvents`].

use serde::{Deserialize, Serialize};

use crate::entities::{AgentId, BarrierId, DeathCause, FamilyColor, FoodId};
use crate::math::{Fixed, Vec2Fixed};

/// What a floating label announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelKind {
    /// Damage number over a struck agent.
    Damage,
    /// Alliance banner over both founders.
    Alliance,
    /// Birth marker over a newborn.
    Birth,
}

/// One thing that happened during a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SimEvent {
    /// Short-lived text the host may float above a position.
    FloatingLabel {
        /// Where to show it.
        position: Vec2Fixed,
        /// Text to show.
        text: String,
        /// Label category.
        kind: LabelKind,
    },
    /// A line for the news ticker (also kept in the news feed).
    News {
        /// Message text.
        text: String,
    },
    /// A strike landed.
    Struck {
        /// Attacking agent.
        attacker: AgentId,
        /// Struck agent.
        target: AgentId,
        /// Damage dealt.
        damage: Fixed,
    },
    /// An agent ate.
    Ate {
        /// Eating agent.
        agent: AgentId,
        /// Consumed food.
        food: FoodId,
    },
    /// An agent died and was removed.
    Died {
        /// Handle of the removed agent (no longer valid).
        agent: AgentId,
        /// Full name.
        name: String,
        /// How it died.
        cause: DeathCause,
        /// Where the corpse lies.
        position: Vec2Fixed,
    },
    /// A child was born.
    Born {
        /// Newborn.
        child: AgentId,
        /// Parent.
        parent: AgentId,
        /// Newborn's full name.
        name: String,
    },
    /// A mature agent dropped a legacy marker.
    LegacyPlaced {
        /// New marker.
        marker: BarrierId,
        /// Agent that placed it.
        owner: AgentId,
        /// Owning family.
        family: FamilyColor,
    },
    /// A rival tore down a legacy marker.
    LegacyDemolished {
        /// Removed marker (no longer valid).
        marker: BarrierId,
        /// Agent that demolished it.
        by: AgentId,
    },
    /// Two families allied.
    AllianceFormed {
        /// Family of the agent that proposed.
        first: FamilyColor,
        /// Family of the partner.
        second: FamilyColor,
    },
}

/// Events that occurred during a single tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickEvents {
    /// Tick number the events belong to.
    pub tick: u64,
    /// Events in the order they happened.
    pub events: Vec<SimEvent>,
}

impl TickEvents {
    /// Empty batch for `tick`.
    #[must_use]
    pub fn new(tick: u64) -> Self {
        Self {
            tick,
            events: Vec::new(),
        }
    }

    /// Record an event.
    pub fn push(&mut self, event: SimEvent) {
        self.events.push(event);
    }

    /// True if nothing happened.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Agents that died this tick.
    pub fn deaths(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.events.iter().filter_map(|e| match e {
            SimEvent::Died { agent, .. } => Some(*agent),
            _ => None,
        })
    }

    /// Agents born this tick.
    pub fn births(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.events.iter().filter_map(|e| match e {
            SimEvent::Born { child, .. } => Some(*child),
            _ => None,
        })
    }

    /// News lines posted this tick.
    pub fn news(&self) -> impl Iterator<Item = &str> + '_ {
        self.events.iter().filter_map(|e| match e {
            SimEvent::News { text } => Some(text.as_str()),
            _ => None,
        })
    }
}
