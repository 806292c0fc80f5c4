//! Headless pen runner implementation.

use std::io::{self, BufRead, Write};

use critter_core::events::SimEvent;
use critter_core::math::Fixed;
use critter_core::simulation::Simulation;
use tracing::{debug, info};

use crate::protocol::{point, Command, PenState, Response};
use crate::scenario::{Scenario, ScenarioError};

/// Headless runner configuration.
#[derive(Debug, Clone, Default)]
pub struct HeadlessConfig {
    /// Answer `tick` with a state snapshot (vs an ack, leaving the
    /// events for the next `query`).
    pub auto_state_output: bool,
    /// Scenario to build the pen from.
    pub scenario: Scenario,
}

/// Headless runner driven by JSON-lines commands.
#[derive(Debug)]
pub struct HeadlessRunner {
    config: HeadlessConfig,
    sim: Simulation,
    dt: Fixed,
    pending: Vec<SimEvent>,
}

impl HeadlessRunner {
    /// Build the scenario's pen and wrap it in a runner.
    pub fn new(config: HeadlessConfig) -> Result<Self, ScenarioError> {
        let sim = config.scenario.build()?;
        let dt = config.scenario.dt();
        Ok(Self {
            config,
            sim,
            dt,
            pending: Vec::new(),
        })
    }

    /// The pen being driven.
    #[must_use]
    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }

    /// Apply one command and produce its response.
    pub fn handle(&mut self, command: Command) -> Response {
        let name = command.name();
        match command {
            Command::Tick { count } => {
                for _ in 0..count {
                    let events = self.sim.tick(self.dt);
                    self.pending.extend(events.events);
                }
                if self.config.auto_state_output {
                    self.snapshot()
                } else {
                    Response::ack(name)
                }
            }
            Command::Query => self.snapshot(),
            Command::SpawnFood { x, y } => match point(x, y) {
                Some(p) if self.sim.drop_food(p).is_some() => Response::ack(name),
                Some(_) => Response::error("point is outside the pen", Some(name)),
                None => Response::error("coordinates out of range", Some(name)),
            },
            Command::PlaceBarrier { x, y } => match point(x, y) {
                Some(p) if self.sim.place_wall(p).is_some() => Response::ack(name),
                Some(_) => Response::error("cell is outside the pen or already walled", Some(name)),
                None => Response::error("coordinates out of range", Some(name)),
            },
            Command::RemoveBarrier { x, y } => match point(x, y) {
                Some(p) if self.sim.remove_wall_near(p).is_some() => Response::ack(name),
                Some(_) => Response::error("no wall near point", Some(name)),
                None => Response::error("coordinates out of range", Some(name)),
            },
            Command::Pause => {
                self.sim.set_paused(true);
                Response::ack(name)
            }
            Command::Resume => {
                self.sim.set_paused(false);
                Response::ack(name)
            }
            Command::Ledger { sort } => Response::Ledger {
                records: self.sim.ledger().sorted(sort).into_iter().cloned().collect(),
            },
            Command::News => Response::News {
                lines: self.sim.news().iter().cloned().collect(),
            },
            Command::Hash => Response::Hash {
                tick: self.sim.current_tick(),
                hash: self.sim.state_hash(),
            },
            Command::Quit => Response::Bye,
        }
    }

    /// Parse and apply one input line. Blank lines produce nothing.
    pub fn handle_line(&mut self, line: &str) -> Option<Response> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        match Command::from_json(line) {
            Ok(command) => {
                debug!(cmd = command.name(), "Processing command");
                Some(self.handle(command))
            }
            Err(e) => Some(Response::error(format!("Invalid command: {e}"), None)),
        }
    }

    /// Serve commands from `input` until `quit` or end of input.
    pub fn run<I: BufRead, O: Write>(&mut self, input: I, mut output: O) -> io::Result<()> {
        info!(scenario = %self.config.scenario.name, "Headless runner ready");
        output.write_all(Response::ready(self.sim.current_tick()).to_json_line().as_bytes())?;
        output.flush()?;

        for line in input.lines() {
            let Some(response) = self.handle_line(&line?) else {
                continue;
            };
            output.write_all(response.to_json_line().as_bytes())?;
            output.flush()?;
            if response == Response::Bye {
                info!(tick = self.sim.current_tick(), "Quit requested");
                return Ok(());
            }
        }

        info!("Input closed");
        Ok(())
    }

    /// Serve stdin/stdout.
    pub fn run_stdio(&mut self) -> io::Result<()> {
        let stdin = io::stdin();
        let stdout = io::stdout();
        self.run(stdin.lock(), stdout.lock())
    }

    fn snapshot(&mut self) -> Response {
        let events = std::mem::take(&mut self.pending);
        Response::State(Box::new(PenState::capture(&self.sim, events)))
    }
}
