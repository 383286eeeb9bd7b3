//! Parallel seeded match batches.
//!
//! Every game in a batch plays the same scenario with its own seed
//! (`seed_start + index`), so any single game can be replayed later with
//! `run --seed`. Games run on a rayon pool; results come back in seed order.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::game_runner::{run_game, GameConfig, DEFAULT_MAX_TICKS};
use crate::metrics::{BatchSummary, GameMetrics};
use crate::scenario::Scenario;

/// Log a progress line every this many finished games.
const PROGRESS_EVERY: u32 = 50;

/// What to play and how many times.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Scenario every game plays.
    pub scenario: Scenario,
    /// Games in the batch.
    pub game_count: u32,
    /// Worker threads; 0 lets rayon decide.
    pub parallel_games: u32,
    /// Where the CLI writes `batch_results.json`.
    pub output_dir: PathBuf,
    /// Seed of game 0.
    pub seed_start: u64,
    /// Tick cap applied to each game.
    pub max_ticks: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self::new(Scenario::duel(), 100)
    }
}

impl BatchConfig {
    /// `game_count` games of `scenario` from seed 0.
    #[must_use]
    pub fn new(scenario: Scenario, game_count: u32) -> Self {
        Self {
            scenario,
            game_count,
            parallel_games: 0,
            output_dir: PathBuf::from("results"),
            seed_start: 0,
            max_ticks: DEFAULT_MAX_TICKS,
        }
    }

    /// Change the output directory.
    #[must_use]
    pub fn with_output(mut self, dir: PathBuf) -> Self {
        self.output_dir = dir;
        self
    }

    /// Change the seed of game 0.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed_start = seed;
        self
    }

    /// Change the per-game tick cap.
    #[must_use]
    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    fn seed_of(&self, index: u32) -> u64 {
        self.seed_start.wrapping_add(u64::from(index))
    }

    fn game(&self, index: u32) -> GameConfig {
        let seed = self.seed_of(index);
        GameConfig {
            seed,
            max_ticks: self.max_ticks,
            scenario: self.scenario.clone(),
            game_id: format!("game_{seed}"),
        }
    }
}

/// Everything a batch produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// The batch that was run.
    pub config: BatchConfig,
    /// Metrics of every finished game, in seed order.
    pub games: Vec<GameMetrics>,
    /// Aggregates over `games`.
    pub summary: BatchSummary,
    /// Wall-clock time of the whole batch.
    pub duration_seconds: f64,
    /// Games that could not be played.
    pub errors: Vec<BatchError>,
}

impl BatchResults {
    /// Write as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let text = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    /// Read results written by [`BatchResults::save`].
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(std::io::Error::other)
    }

    /// Games per wall-clock second.
    #[must_use]
    pub fn throughput(&self) -> f64 {
        self.games.len() as f64 / self.duration_seconds.max(f64::EPSILON)
    }
}

/// A game that failed to run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchError {
    /// Position in the batch.
    pub game_index: u32,
    /// Seed of that game.
    pub seed: u64,
    /// Why it failed.
    pub message: String,
}

/// Shared finished-game counter.
#[derive(Debug)]
pub struct BatchProgress {
    /// Games in the batch.
    pub total: u32,
    done: AtomicU32,
    started: Instant,
}

impl BatchProgress {
    /// Counter for a batch of `total` games.
    #[must_use]
    pub fn new(total: u32) -> Self {
        Self {
            total,
            done: AtomicU32::new(0),
            started: Instant::now(),
        }
    }

    /// Count one more finished game and return the new total.
    pub fn record_completion(&self) -> u32 {
        self.done.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Games finished so far.
    pub fn current(&self) -> u32 {
        self.done.load(Ordering::Relaxed)
    }

    /// Share of the batch finished, in percent.
    pub fn percentage(&self) -> f64 {
        f64::from(self.current()) * 100.0 / f64::from(self.total.max(1))
    }

    /// Time left at the average pace so far. Zero before the first game ends.
    pub fn eta(&self) -> Duration {
        let done = self.current();
        if done == 0 {
            return Duration::ZERO;
        }
        let per_game = self.started.elapsed().as_secs_f64() / f64::from(done);
        Duration::from_secs_f64(per_game * f64::from(self.total.saturating_sub(done)))
    }
}

fn play(config: &BatchConfig, index: u32, progress: &BatchProgress) -> Result<GameMetrics, BatchError> {
    let seed = config.seed_of(index);
    let metrics = run_game(config.game(index))
        .map(|result| result.metrics)
        .map_err(|e| {
            warn!(game = index, seed, error = %e, "Game failed");
            BatchError {
                game_index: index,
                seed,
                message: e.to_string(),
            }
        })?;

    let done = progress.record_completion();
    if done % PROGRESS_EVERY == 0 {
        let eta = progress.eta();
        info!(
            done,
            total = progress.total,
            percent = format!("{:.1}", progress.percentage()),
            eta_secs = eta.as_secs(),
            "Batch progress"
        );
    } else {
        debug!(game = index, seed, ticks = metrics.duration_ticks, "Game finished");
    }
    Ok(metrics)
}

fn play_all(config: &BatchConfig, progress: &BatchProgress) -> Vec<Result<GameMetrics, BatchError>> {
    let run = || -> Vec<Result<GameMetrics, BatchError>> {
        (0..config.game_count)
            .into_par_iter()
            .map(|index| play(config, index, progress))
            .collect()
    };
    if config.parallel_games == 0 {
        return run();
    }
    match rayon::ThreadPoolBuilder::new()
        .num_threads(config.parallel_games as usize)
        .build()
    {
        Ok(pool) => pool.install(run),
        Err(e) => {
            warn!(error = %e, "Could not build a dedicated pool, using the global one");
            run()
        }
    }
}

/// Play every game of the batch.
pub fn run_batch(config: BatchConfig) -> BatchResults {
    let started = Instant::now();
    let progress = BatchProgress::new(config.game_count);
    info!(
        scenario = %config.scenario.name,
        games = config.game_count,
        seed_start = config.seed_start,
        max_ticks = config.max_ticks,
        "Starting batch"
    );

    let mut games = Vec::with_capacity(config.game_count as usize);
    let mut errors = Vec::new();
    for outcome in play_all(&config, &progress) {
        match outcome {
            Ok(metrics) => games.push(metrics),
            Err(error) => errors.push(error),
        }
    }

    let results = BatchResults {
        summary: BatchSummary::from_games(&games),
        duration_seconds: started.elapsed().as_secs_f64(),
        config,
        games,
        errors,
    };
    info!(
        finished = results.games.len(),
        failed = results.errors.len(),
        secs = format!("{:.1}", results.duration_seconds),
        games_per_sec = format!("{:.1}", results.throughput()),
        "Batch done"
    );
    results
}

/// Replay one seed `runs` times and compare final hashes and lengths.
///
/// Any failed run counts as a mismatch.
pub fn verify_determinism(scenario: &Scenario, seed: u64, runs: u32, max_ticks: u64) -> bool {
    let config = BatchConfig::new(scenario.clone(), 1)
        .with_seed(seed)
        .with_max_ticks(max_ticks);

    let mut reference: Option<(u64, u64)> = None;
    for run in 0..runs {
        let result = match run_game(config.game(0)) {
            Ok(result) => result,
            Err(e) => {
                warn!(run, seed, error = %e, "Verification run failed");
                return false;
            }
        };
        let fingerprint = (result.final_state_hash, result.metrics.duration_ticks);
        match reference {
            None => reference = Some(fingerprint),
            Some(expected) if expected != fingerprint => {
                warn!(
                    run,
                    seed,
                    expected_hash = expected.0,
                    actual_hash = fingerprint.0,
                    "Replay diverged"
                );
                return false;
            }
            Some(_) => {}
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_scenario() -> Scenario {
        let mut scenario = Scenario::duel();
        scenario.config.movement.spawn_countdown_secs = 0.0;
        scenario
    }

    #[test]
    fn test_builder_sets_fields() {
        let config = BatchConfig::new(quick_scenario(), 10)
            .with_seed(5)
            .with_max_ticks(100)
            .with_output(PathBuf::from("out"));
        assert_eq!(config.game_count, 10);
        assert_eq!(config.max_ticks, 100);
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.game(3).seed, 8);
        assert_eq!(config.game(3).game_id, "game_8");
    }

    #[test]
    fn test_progress_counts_up() {
        let progress = BatchProgress::new(4);
        assert_eq!(progress.eta(), Duration::ZERO);
        assert_eq!(progress.record_completion(), 1);
        assert_eq!(progress.record_completion(), 2);
        assert!((progress.percentage() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_games_come_back_in_seed_order() {
        let results = run_batch(
            BatchConfig::new(quick_scenario(), 4)
                .with_seed(20)
                .with_max_ticks(200),
        );
        assert!(results.errors.is_empty());
        assert_eq!(results.summary.total_games, 4);
        let seeds: Vec<u64> = results.games.iter().map(|g| g.seed).collect();
        assert_eq!(seeds, vec![20, 21, 22, 23]);
    }

    #[test]
    fn test_dedicated_pool() {
        let mut config = BatchConfig::new(quick_scenario(), 2).with_max_ticks(60);
        config.parallel_games = 2;
        assert_eq!(run_batch(config).games.len(), 2);
    }

    #[test]
    fn test_unplayable_scenario_is_reported_per_game() {
        let mut scenario = quick_scenario();
        scenario.bots.clear();
        let results = run_batch(BatchConfig::new(scenario, 2).with_seed(7).with_max_ticks(10));
        assert!(results.games.is_empty());
        let failed: Vec<u64> = results.errors.iter().map(|e| e.seed).collect();
        assert_eq!(failed, vec![7, 8]);
    }

    #[test]
    fn test_results_survive_a_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("batch.json");
        let results = run_batch(BatchConfig::new(quick_scenario(), 2).with_max_ticks(60));
        results.save(&path).unwrap();

        let loaded = BatchResults::load(&path).unwrap();
        assert_eq!(loaded.games.len(), 2);
        assert_eq!(
            loaded.games[1].final_state_hash,
            results.games[1].final_state_hash
        );
    }

    #[test]
    fn test_same_seed_replays_identically() {
        assert!(verify_determinism(&quick_scenario(), 42, 3, 300));
    }
}
