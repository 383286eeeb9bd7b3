//! Interactive headless runner.
//!
//! Drives one [`Simulation`] from JSON-line commands. See [`crate::protocol`]
//! for the wire format.

use std::io::{self, BufRead, Write};

use tracing::{debug, info, warn};

use territory_core::config::SimConfig;
use territory_core::math::Vec2;
use territory_core::simulation::Simulation;

use crate::protocol::{Command, Response};
use crate::scenario::{Scenario, ScenarioError};

/// Upper bound on ticks a single `tick` command may request.
pub const MAX_TICKS_PER_COMMAND: u32 = 100_000;

/// Interactive runner configuration.
#[derive(Debug, Clone, Default)]
pub struct HeadlessConfig {
    /// Emit an `events` response after every tick that produced any.
    pub auto_events: bool,
    /// Scenario file whose simulation config and fixed spawns are loaded on
    /// startup.
    pub scenario_path: Option<String>,
}

/// Interactive runner for externally controlled sessions.
#[derive(Debug)]
pub struct HeadlessRunner {
    config: HeadlessConfig,
    sim: Simulation,
    quit: bool,
}

impl HeadlessRunner {
    /// Runner over an empty simulation with default tuning.
    #[must_use]
    pub fn new() -> Self {
        Self::from_sim(HeadlessConfig::default(), Simulation::new(SimConfig::default()))
    }

    /// Runner using `config`, loading its scenario if one is set.
    ///
    /// # Errors
    ///
    /// Fails when the scenario cannot be loaded or its fixed spawns are
    /// invalid.
    pub fn with_config(config: HeadlessConfig) -> Result<Self, ScenarioError> {
        let sim = match &config.scenario_path {
            Some(path) => {
                let scenario = Scenario::load(path)?;
                let mut sim = Simulation::new(scenario.config.clone());
                for bot in &scenario.bots {
                    if let Some((x, y)) = bot.spawn {
                        let id = sim.spawn_player(Vec2::new(x, y))?;
                        debug!(player = id, name = %bot.name, "Scenario player spawned");
                    }
                }
                info!(scenario = %scenario.name, players = sim.players().len(), "Scenario loaded");
                sim
            }
            None => Simulation::new(SimConfig::default()),
        };
        Ok(Self::from_sim(config, sim))
    }

    /// Runner wrapping an existing simulation.
    #[must_use]
    pub fn from_sim(config: HeadlessConfig, sim: Simulation) -> Self {
        Self {
            config,
            sim,
            quit: false,
        }
    }

    /// The simulation being driven.
    #[must_use]
    pub const fn simulation(&self) -> &Simulation {
        &self.sim
    }

    /// Whether a `quit` command has been handled.
    #[must_use]
    pub const fn should_quit(&self) -> bool {
        self.quit
    }

    /// Run the session loop until `quit` or end of input.
    ///
    /// # Errors
    ///
    /// Returns IO errors from reading input or writing output.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut output: W) -> io::Result<()> {
        write_response(&mut output, &Response::ready(self.sim.get_tick()))?;

        for line in input.lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let responses = match Command::from_json(trimmed) {
                Ok(cmd) => self.handle(cmd),
                Err(e) => {
                    warn!(error = %e, "Failed to parse command");
                    vec![Response::error(format!("Parse error: {e}"), None)]
                }
            };
            for response in &responses {
                write_response(&mut output, response)?;
            }
            output.flush()?;
            if self.quit {
                return Ok(());
            }
        }

        write_response(&mut output, &Response::Bye)?;
        output.flush()
    }

    /// Execute one command and return the responses to send.
    pub fn handle(&mut self, cmd: Command) -> Vec<Response> {
        let name = cmd.name();
        debug!(cmd = name, "Handling command");
        match cmd {
            Command::Tick { count } => {
                if count > MAX_TICKS_PER_COMMAND {
                    return vec![Response::error(
                        format!("tick count {count} exceeds {MAX_TICKS_PER_COMMAND}"),
                        Some(name),
                    )];
                }
                let mut responses = Vec::new();
                for _ in 0..count {
                    let events = self.sim.tick();
                    if self.config.auto_events && !events.is_empty() {
                        responses.push(Response::Events {
                            tick: self.sim.get_tick(),
                            events,
                        });
                    }
                }
                responses.push(Response::ack(name));
                responses
            }
            Command::Query => vec![Response::state(&self.sim)],
            Command::Spawn { x, y } => match self.sim.spawn_player(Vec2::new(x, y)) {
                Ok(player) => vec![Response::Spawned { player }],
                Err(e) => vec![Response::error(e.to_string(), Some(name))],
            },
            Command::Respawn { player, x, y } => {
                self.ack_or_error(name, |sim| sim.respawn_player(player, Vec2::new(x, y)))
            }
            Command::Despawn { player } => self.ack_or_error(name, |sim| sim.despawn_player(player)),
            Command::Heading { player, heading } => {
                self.ack_or_error(name, |sim| sim.set_target_heading(player, heading))
            }
            Command::Hash => vec![Response::StateHash {
                tick: self.sim.get_tick(),
                hash: self.sim.state_hash(),
            }],
            Command::Quit => {
                self.quit = true;
                vec![Response::Bye]
            }
        }
    }

    fn ack_or_error<F>(&mut self, name: &str, op: F) -> Vec<Response>
    where
        F: FnOnce(&mut Simulation) -> territory_core::error::Result<()>,
    {
        match op(&mut self.sim) {
            Ok(()) => vec![Response::ack(name)],
            Err(e) => vec![Response::error(e.to_string(), Some(name))],
        }
    }
}

impl Default for HeadlessRunner {
    fn default() -> Self {
        Self::new()
    }
}

fn write_response<W: Write>(output: &mut W, response: &Response) -> io::Result<()> {
    output.write_all(response.to_json_line().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use territory_test_utils::fixtures::{grid_arena, live_config};

    fn run_session(runner: &mut HeadlessRunner, input: &str) -> Vec<Response> {
        let mut out = Vec::new();
        runner.run(Cursor::new(input), &mut out).unwrap();
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    fn live_runner(auto_events: bool) -> HeadlessRunner {
        HeadlessRunner::from_sim(
            HeadlessConfig {
                auto_events,
                scenario_path: None,
            },
            Simulation::new(live_config()),
        )
    }

    #[test]
    fn test_session_spawn_tick_query() {
        let mut runner = live_runner(false);
        let responses = run_session(
            &mut runner,
            concat!(
                r#"{"cmd":"spawn","x":400,"y":400}"#,
                "\n",
                r#"{"cmd":"heading","player":1,"heading":0.0}"#,
                "\n\n",
                r#"{"cmd":"tick","count":10}"#,
                "\n",
                r#"{"cmd":"query"}"#,
                "\n"
            ),
        );

        assert!(matches!(responses[0], Response::Ready { tick: 0, .. }));
        assert_eq!(responses[1], Response::Spawned { player: 1 });
        assert_eq!(responses[2], Response::ack("heading"));
        assert_eq!(responses[3], Response::ack("tick"));
        match &responses[4] {
            Response::State { tick, players, .. } => {
                assert_eq!(*tick, 10);
                assert_eq!(players.len(), 1);
                assert!(players[0].x > 400.0);
            }
            other => panic!("expected state, got {other:?}"),
        }
        assert_eq!(responses.last(), Some(&Response::Bye));
    }

    #[test]
    fn test_bad_lines_report_errors() {
        let mut runner = live_runner(false);
        let responses = run_session(
            &mut runner,
            "garbage\n{\"cmd\":\"heading\",\"player\":9,\"heading\":1.0}\n",
        );
        assert!(matches!(&responses[1], Response::Error { cmd: None, .. }));
        assert!(matches!(&responses[2], Response::Error { cmd: Some(c), .. } if c == "heading"));
    }

    #[test]
    fn test_quit_stops_reading() {
        let mut runner = live_runner(false);
        let responses = run_session(&mut runner, "{\"cmd\":\"quit\"}\n{\"cmd\":\"tick\"}\n");
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[1], Response::Bye);
        assert!(runner.should_quit());
        assert_eq!(runner.simulation().get_tick(), 0);
    }

    #[test]
    fn test_auto_events_emitted() {
        let mut runner = live_runner(true);
        runner.handle(Command::Spawn { x: 400.0, y: 400.0 });
        runner.handle(Command::Heading {
            player: 1,
            heading: 0.0,
        });
        let responses = runner.handle(Command::Tick { count: 60 });
        assert!(responses
            .iter()
            .any(|r| matches!(r, Response::Events { events, .. } if !events.trail_changed.is_empty())));
        assert_eq!(responses.last(), Some(&Response::ack("tick")));
    }

    #[test]
    fn test_hash_matches_simulation() {
        let mut runner = live_runner(false);
        runner.handle(Command::Spawn { x: 300.0, y: 300.0 });
        let responses = runner.handle(Command::Hash);
        assert_eq!(
            responses,
            vec![Response::StateHash {
                tick: 0,
                hash: runner.simulation().state_hash()
            }]
        );
    }

    #[test]
    fn test_session_ticks_match_direct_ticks() {
        let mut direct = grid_arena(4, 300.0);
        let mut runner = HeadlessRunner::from_sim(HeadlessConfig::default(), grid_arena(4, 300.0));
        let responses = run_session(&mut runner, "{\"cmd\":\"tick\",\"count\":90}\n{\"cmd\":\"hash\"}\n");
        for _ in 0..90 {
            direct.tick();
        }

        assert_eq!(
            responses[2],
            Response::StateHash {
                tick: 90,
                hash: direct.state_hash(),
            }
        );
        assert_eq!(runner.simulation().players().len(), 4);
    }

    #[test]
    fn test_oversized_tick_rejected() {
        let mut runner = live_runner(false);
        let responses = runner.handle(Command::Tick {
            count: MAX_TICKS_PER_COMMAND + 1,
        });
        assert!(matches!(&responses[0], Response::Error { .. }));
        assert_eq!(runner.simulation().get_tick(), 0);
    }

    #[test]
    fn test_scenario_loaded_on_startup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("arena.ron");
        std::fs::write(
            &path,
            r#"(name: "fixed", bots: [(name: "a", spawn: Some((300.0, 300.0))), (name: "b")])"#,
        )
        .unwrap();
        let runner = HeadlessRunner::with_config(HeadlessConfig {
            auto_events: false,
            scenario_path: Some(path.display().to_string()),
        })
        .unwrap();
        assert_eq!(runner.simulation().players().len(), 1);
    }
}
