//! Bot match execution for headless testing.
//!
//! This module runs real simulations through territory_core's
//! [`Simulation`], steering every bot with its strategy and collecting
//! detailed metrics.
//!
//! # Bounds
//!
//! - The tick loop is bounded by an explicit maximum
//! - The event log has a fixed cap
//! - Progress is logged at regular intervals
//! - Slow ticks are reported, not ignored

use std::collections::BTreeMap;
use std::time::Instant;

use tracing::{debug, info, warn};

use territory_core::components::PlayerId;
use territory_core::events::TickEvents;
use territory_core::simulation::Simulation;

use crate::metrics::{GameMetrics, MetricsCollector};
use crate::scenario::{Scenario, ScenarioError};
use crate::spawn_generator::{generate_spawns, SpawnConfig, SpawnPattern};
use crate::strategies::StrategyExecutor;

/// Default tick cap: 10 minutes at 60 tps.
pub const DEFAULT_MAX_TICKS: u64 = 36_000;

/// Progress logging interval (ticks).
const PROGRESS_LOG_INTERVAL: u64 = 1000;

/// Ticks slower than this are logged.
const SLOW_TICK_THRESHOLD_MS: u128 = 100;

/// High-level game runner for headless testing.
#[derive(Debug, Clone)]
pub struct GameRunner {
    /// Max ticks used when a config leaves it at zero.
    pub default_max_ticks: u64,
}

impl Default for GameRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl GameRunner {
    /// Create a new game runner.
    #[must_use]
    pub fn new() -> Self {
        Self {
            default_max_ticks: DEFAULT_MAX_TICKS,
        }
    }

    /// Run a game with the given configuration.
    pub fn run(&self, mut config: GameConfig) -> Result<GameResult, ScenarioError> {
        if config.max_ticks == 0 {
            config.max_ticks = self.default_max_ticks;
        }
        run_game(config)
    }
}

/// Configuration for a single game run.
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Seed for spawns and bot decisions.
    pub seed: u64,
    /// Maximum ticks before timeout.
    pub max_ticks: u64,
    /// Scenario to use.
    pub scenario: Scenario,
    /// Game ID for tracking.
    pub game_id: String,
}

impl GameConfig {
    /// Config for `scenario` with the given seed.
    #[must_use]
    pub fn new(scenario: Scenario, seed: u64) -> Self {
        Self {
            seed,
            max_ticks: DEFAULT_MAX_TICKS,
            scenario,
            game_id: format!("game_{seed}"),
        }
    }
}

/// Result of running a game.
#[derive(Debug)]
pub struct GameResult {
    /// Collected metrics.
    pub metrics: GameMetrics,
    /// Hash of the final simulation state.
    pub final_state_hash: u64,
}

/// A bot seat in a running game.
struct Bot {
    id: PlayerId,
    name: String,
    brain: StrategyExecutor,
    died_at: Option<u64>,
}

/// Run a complete game.
pub fn run_game(config: GameConfig) -> Result<GameResult, ScenarioError> {
    run_game_observed(config, |_, _| {})
}

/// Run a complete game, calling `observer` after every tick.
///
/// # Errors
///
/// Fails when the scenario is invalid or a bot cannot be spawned.
pub fn run_game_observed<F>(config: GameConfig, mut observer: F) -> Result<GameResult, ScenarioError>
where
    F: FnMut(&Simulation, &TickEvents),
{
    let game_start = Instant::now();
    let scenario = &config.scenario;
    scenario.validate()?;
    info!(
        game_id = %config.game_id,
        seed = config.seed,
        max_ticks = config.max_ticks,
        scenario = %scenario.name,
        "Starting game simulation"
    );

    let mut sim = Simulation::new(scenario.config.clone());
    let mut collector = MetricsCollector::new(&config.game_id, &scenario.name, config.seed);
    let mut bots = Vec::with_capacity(scenario.bots.len());
    for (index, (setup, spawn)) in scenario
        .bots
        .iter()
        .zip(scenario.spawn_positions(config.seed))
        .enumerate()
    {
        let id = sim.spawn_player(spawn)?;
        collector.register(id, &setup.name, setup.strategy.name());
        bots.push(Bot {
            id,
            name: setup.name.clone(),
            brain: StrategyExecutor::new(setup.strategy, config.seed ^ (index as u64 + 1)),
            died_at: None,
        });
    }

    let victory = &scenario.victory;
    let max_ticks = victory
        .time_limit_ticks
        .map_or(config.max_ticks, |limit| limit.min(config.max_ticks));
    let world_area = scenario.config.world.width * scenario.config.world.height;
    let mut outcome: Option<(Option<String>, &'static str)> = None;

    while sim.get_tick() < max_ticks {
        let decisions: Vec<(PlayerId, f64)> = bots
            .iter_mut()
            .filter_map(|bot| {
                let me = sim.get_player(bot.id).filter(|p| p.is_alive())?;
                Some((bot.id, bot.brain.decide(me, &sim)))
            })
            .collect();
        for (id, heading) in decisions {
            sim.set_target_heading(id, heading)?;
        }

        let tick_start = Instant::now();
        let events = sim.tick();
        let elapsed = tick_start.elapsed().as_millis();
        if elapsed > SLOW_TICK_THRESHOLD_MS {
            warn!(tick = sim.get_tick(), elapsed_ms = elapsed, "Slow tick");
        }
        let tick = sim.get_tick();

        collector.record_tick(tick, &events);
        if !events.territory_changed.is_empty() {
            collector.record_areas(
                events
                    .territory_changed
                    .iter()
                    .filter_map(|&id| sim.get_player(id).map(|p| (id, p.territory_area()))),
            );
        }
        observer(&sim, &events);

        for bot in &mut bots {
            if events.kills.iter().any(|k| k.victim == bot.id) {
                bot.died_at = Some(tick);
            }
        }

        if let Some(delay) = victory.respawn_after_ticks {
            respawn_due(&mut sim, &mut bots, &mut collector, scenario, config.seed, delay)?;
        }

        if tick % PROGRESS_LOG_INTERVAL == 0 {
            debug!(tick, alive = sim.alive_count(), "Game progress");
        }

        if let Some(share) = victory.territory_share {
            if let Some(bot) = bots.iter().find(|b| {
                sim.get_player(b.id)
                    .is_some_and(|p| p.territory_area() >= share * world_area)
            }) {
                outcome = Some((Some(bot.name.clone()), "territory"));
                break;
            }
        }

        if victory.last_standing && bots.len() > 1 && sim.alive_count() <= 1 {
            let survivor = bots
                .iter()
                .find(|b| sim.get_player(b.id).is_some_and(|p| p.is_alive()))
                .map(|b| b.name.clone());
            outcome = Some((survivor, "last_standing"));
            break;
        }
    }

    let (winner, condition) = outcome.unwrap_or_else(|| (largest_territory(&sim, &bots), "timeout"));
    collector.record_areas(
        bots.iter()
            .filter_map(|b| sim.get_player(b.id).map(|p| (b.id, p.territory_area()))),
    );

    let final_state_hash = sim.state_hash();
    let mut metrics = collector.finalize(sim.get_tick(), winner, condition);
    metrics.final_state_hash = final_state_hash;

    info!(
        game_id = %config.game_id,
        ticks = sim.get_tick(),
        winner = ?metrics.winner,
        condition,
        wall_ms = game_start.elapsed().as_millis(),
        "Game finished"
    );

    Ok(GameResult {
        metrics,
        final_state_hash,
    })
}

fn respawn_due(
    sim: &mut Simulation,
    bots: &mut [Bot],
    collector: &mut MetricsCollector,
    scenario: &Scenario,
    seed: u64,
    delay: u64,
) -> Result<(), ScenarioError> {
    let tick = sim.get_tick();
    for bot in bots.iter_mut() {
        let Some(died_at) = bot.died_at else {
            continue;
        };
        if tick < died_at + delay {
            continue;
        }
        // A fresh random spot per respawn
        let spawn = generate_spawns(
            &scenario.config,
            1,
            seed ^ tick.rotate_left(17) ^ u64::from(bot.id),
            &SpawnConfig {
                pattern: SpawnPattern::Random,
                ..scenario.spawns.clone()
            },
        );
        if let Some(&position) = spawn.first() {
            sim.respawn_player(bot.id, position)?;
            bot.died_at = None;
            collector.on_respawn(tick, bot.id);
            debug!(bot = %bot.name, tick, "Respawned");
        }
    }
    Ok(())
}

/// Bot with the most land, or `None` on a tie or when nobody has any.
fn largest_territory(sim: &Simulation, bots: &[Bot]) -> Option<String> {
    let mut areas: BTreeMap<String, f64> = BTreeMap::new();
    for bot in bots {
        if let Some(player) = sim.get_player(bot.id) {
            areas.insert(bot.name.clone(), player.territory_area());
        }
    }
    let best = areas.values().copied().fold(0.0_f64, f64::max);
    let mut leaders = areas.iter().filter(|(_, &a)| a == best && a > 0.0);
    match (leaders.next(), leaders.next()) {
        (Some((name, _)), None) => Some(name.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::{BotSetup, VictoryConditions};
    use crate::strategies::Strategy;

    fn quick_duel() -> Scenario {
        let mut scenario = Scenario::duel();
        scenario.config.movement.spawn_countdown_secs = 0.0;
        scenario
    }

    #[test]
    fn test_game_runs_to_limit() {
        let mut config = GameConfig::new(quick_duel(), 7);
        config.max_ticks = 300;
        let result = run_game(config).unwrap();
        assert!(result.metrics.duration_ticks <= 300);
        assert_eq!(result.metrics.players.len(), 2);
        assert_ne!(result.final_state_hash, 0);
        assert_eq!(result.metrics.final_state_hash, result.final_state_hash);
    }

    #[test]
    fn test_same_seed_same_game() {
        let run = |seed| {
            let mut config = GameConfig::new(quick_duel(), seed);
            config.max_ticks = 600;
            run_game(config).unwrap().final_state_hash
        };
        assert_eq!(run(11), run(11));
    }

    #[test]
    fn test_loopers_capture_land() {
        let mut scenario = quick_duel();
        scenario.bots = vec![BotSetup::new("looper", Strategy::Looper { leg_ticks: 40 })];
        let mut config = GameConfig::new(scenario, 3);
        config.max_ticks = 600;
        let result = run_game(config).unwrap();
        let looper = &result.metrics.players["looper"];
        assert!(looper.captures > 0);
        assert!(looper.peak_area > 0.0);
    }

    #[test]
    fn test_single_idle_bot_times_out() {
        let mut scenario = quick_duel();
        scenario.bots = vec![BotSetup::new("idle", Strategy::Idle)];
        scenario.victory = VictoryConditions {
            last_standing: true,
            territory_share: None,
            time_limit_ticks: Some(120),
            respawn_after_ticks: None,
        };
        let result = GameRunner::new().run(GameConfig::new(scenario, 1)).unwrap();
        assert_eq!(result.metrics.duration_ticks, 120);
        assert_eq!(result.metrics.end_condition, "timeout");
        assert_eq!(result.metrics.winner, Some("idle".to_string()));
    }

    #[test]
    fn test_observer_sees_every_tick() {
        let mut config = GameConfig::new(quick_duel(), 5);
        config.max_ticks = 50;
        let mut seen = 0;
        run_game_observed(config, |_, _| seen += 1).unwrap();
        assert_eq!(seen, 50);
    }

    #[test]
    fn test_invalid_scenario_rejected() {
        let mut scenario = quick_duel();
        scenario.bots.clear();
        assert!(run_game(GameConfig::new(scenario, 1)).is_err());
    }
}
