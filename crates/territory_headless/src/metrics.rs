//! Match metrics collection for balance analysis.
//!
//! The collector folds every tick's [`TickEvents`] into per-bot counters
//! and a bounded event log.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use territory_core::components::{KillType, PlayerId};
use territory_core::events::{SnipEvent, TickEvents};

/// Maximum events kept in a game log.
const MAX_EVENTS: usize = 100_000;

/// Complete metrics for a single game.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameMetrics {
    /// Unique game identifier.
    pub game_id: String,
    /// Scenario name.
    pub scenario: String,
    /// Seed used.
    pub seed: u64,
    /// Total game duration in ticks.
    pub duration_ticks: u64,
    /// Winning bot (None = draw).
    pub winner: Option<String>,
    /// How the game ended.
    pub end_condition: String,
    /// Per-bot metrics, keyed by bot name.
    pub players: BTreeMap<String, PlayerMetrics>,
    /// Timed events log.
    pub events: Vec<TimedEvent>,
    /// Final simulation state hash (for determinism validation).
    pub final_state_hash: u64,
}

impl GameMetrics {
    /// Create a new game metrics instance.
    #[must_use]
    pub fn new(game_id: impl Into<String>, scenario: impl Into<String>, seed: u64) -> Self {
        Self {
            game_id: game_id.into(),
            scenario: scenario.into(),
            seed,
            ..Default::default()
        }
    }

    /// Get or create bot metrics.
    pub fn player_mut(&mut self, name: &str) -> &mut PlayerMetrics {
        self.players
            .entry(name.to_string())
            .or_insert_with(|| PlayerMetrics::new(name))
    }

    /// Record a timed event. Events past the log limit are dropped.
    pub fn record_event(&mut self, tick: u64, event_type: EventType, player: &str, details: String) {
        if self.events.len() < MAX_EVENTS {
            self.events.push(TimedEvent {
                tick,
                event_type,
                player: player.to_string(),
                details,
            });
        }
    }

    /// Finalize the game with outcome.
    pub fn finalize(&mut self, duration: u64, winner: Option<String>, condition: &str) {
        self.duration_ticks = duration;
        self.winner = winner;
        self.end_condition = condition.to_string();
    }
}

/// Metrics for a single bot in a game.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerMetrics {
    /// Bot name.
    pub name: String,
    /// Strategy name.
    pub strategy: String,

    // === Territory ===
    /// Successful captures.
    pub captures: u32,
    /// Total area gained by captures.
    pub area_captured: f64,
    /// Largest territory held at any tick.
    pub peak_area: f64,
    /// Territory at the end of the game.
    pub final_area: f64,

    // === Combat ===
    /// Eliminations credited.
    pub kills: u32,
    /// Times eliminated.
    pub deaths: u32,
    /// Deaths by cause.
    pub deaths_by_type: HashMap<String, u32>,
    /// Times snipped.
    pub snips_suffered: u32,
    /// Snips survived by reaching home.
    pub escapes: u32,
    /// Drone damage dealt.
    pub damage_dealt: f64,
    /// Drone damage taken.
    pub damage_taken: f64,
    /// Highest level reached.
    pub max_level: u32,
    /// Kill/death ratio.
    pub kd_ratio: f64,
}

impl PlayerMetrics {
    /// Create new bot metrics.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_level: 1,
            ..Default::default()
        }
    }

    /// Record a death.
    pub fn record_death(&mut self, kill_type: KillType) {
        self.deaths += 1;
        *self
            .deaths_by_type
            .entry(kill_type_name(kill_type).to_string())
            .or_default() += 1;
    }

    /// Track the territory currently held.
    pub fn record_area(&mut self, area: f64) {
        self.peak_area = self.peak_area.max(area);
        self.final_area = area;
    }

    /// Calculate derived statistics.
    pub fn calculate_derived_stats(&mut self) {
        self.kd_ratio = if self.deaths > 0 {
            f64::from(self.kills) / f64::from(self.deaths)
        } else {
            f64::from(self.kills)
        };
    }
}

/// A timed event during the game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimedEvent {
    /// Tick when the event occurred.
    pub tick: u64,
    /// Type of event.
    pub event_type: EventType,
    /// Bot involved.
    pub player: String,
    /// Event details.
    pub details: String,
}

/// Types of events that can be recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    /// Territory captured.
    Capture,
    /// Bot eliminated.
    Elimination,
    /// Bot levelled up.
    LevelUp,
    /// Bot was snipped.
    Snipped,
    /// Bot outran its fuse.
    Escaped,
    /// Bot respawned.
    Respawn,
}

/// Stable name of a kill type.
#[must_use]
pub const fn kill_type_name(kill_type: KillType) -> &'static str {
    match kill_type {
        KillType::Trail => "trail",
        KillType::Body => "body",
        KillType::Trap => "trap",
        KillType::Hp => "hp",
    }
}

/// Summary statistics across multiple games.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Total games played.
    pub total_games: u32,
    /// Games won by each bot.
    pub wins_by_player: HashMap<String, u32>,
    /// Win rates by bot.
    pub win_rates: HashMap<String, f64>,
    /// Average game duration in ticks.
    pub avg_duration_ticks: f64,
    /// Shortest game.
    pub min_duration_ticks: u64,
    /// Longest game.
    pub max_duration_ticks: u64,
    /// Draws count.
    pub draws: u32,

    // === Aggregated Stats ===
    /// Average kills per game by bot.
    pub avg_kills: HashMap<String, f64>,
    /// Average peak territory per game by bot.
    pub avg_peak_area: HashMap<String, f64>,
    /// Deaths across all games by cause.
    pub deaths_by_type: HashMap<String, u32>,
    /// How games ended.
    pub end_conditions: HashMap<String, u32>,
}

impl BatchSummary {
    /// Calculate summary from a list of game metrics.
    #[must_use]
    pub fn from_games(games: &[GameMetrics]) -> Self {
        if games.is_empty() {
            return Self::default();
        }

        let mut summary = Self {
            total_games: games.len() as u32,
            min_duration_ticks: u64::MAX,
            ..Default::default()
        };

        let mut duration_sum = 0u64;
        let mut kills: HashMap<String, Vec<u32>> = HashMap::new();
        let mut peaks: HashMap<String, Vec<f64>> = HashMap::new();

        for game in games {
            duration_sum += game.duration_ticks;
            summary.min_duration_ticks = summary.min_duration_ticks.min(game.duration_ticks);
            summary.max_duration_ticks = summary.max_duration_ticks.max(game.duration_ticks);
            *summary
                .end_conditions
                .entry(game.end_condition.clone())
                .or_default() += 1;

            if let Some(winner) = &game.winner {
                *summary.wins_by_player.entry(winner.clone()).or_default() += 1;
            } else {
                summary.draws += 1;
            }

            for (name, player) in &game.players {
                kills.entry(name.clone()).or_default().push(player.kills);
                peaks.entry(name.clone()).or_default().push(player.peak_area);
                for (cause, count) in &player.deaths_by_type {
                    *summary.deaths_by_type.entry(cause.clone()).or_default() += count;
                }
            }
        }

        summary.avg_duration_ticks = duration_sum as f64 / games.len() as f64;

        for (name, wins) in &summary.wins_by_player {
            summary
                .win_rates
                .insert(name.clone(), f64::from(*wins) / f64::from(summary.total_games));
        }

        for (name, values) in kills {
            let avg = values.iter().map(|&k| f64::from(k)).sum::<f64>() / values.len() as f64;
            summary.avg_kills.insert(name, avg);
        }

        for (name, values) in peaks {
            let avg = values.iter().sum::<f64>() / values.len() as f64;
            summary.avg_peak_area.insert(name, avg);
        }

        summary
    }

    /// Check if every bot's win rate is within `threshold` of a fair share.
    #[must_use]
    pub fn is_balanced(&self, threshold: f64, bots: usize) -> bool {
        let fair = 1.0 / bots.max(1) as f64;
        self.win_rates.values().all(|rate| (rate - fair).abs() <= threshold)
    }
}

/// Metrics collector that tracks events during a game.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    /// Current game metrics.
    metrics: GameMetrics,
    /// Bot names by player id.
    names: HashMap<PlayerId, String>,
}

impl MetricsCollector {
    /// Create a new metrics collector.
    #[must_use]
    pub fn new(game_id: &str, scenario: &str, seed: u64) -> Self {
        Self {
            metrics: GameMetrics::new(game_id, scenario, seed),
            names: HashMap::new(),
        }
    }

    /// Register a bot under its simulation id.
    pub fn register(&mut self, id: PlayerId, name: &str, strategy: &str) {
        self.names.insert(id, name.to_string());
        self.metrics.player_mut(name).strategy = strategy.to_string();
    }

    fn name(&self, id: PlayerId) -> String {
        self.names
            .get(&id)
            .cloned()
            .unwrap_or_else(|| format!("player_{id}"))
    }

    /// Fold one tick of events into the metrics.
    pub fn record_tick(&mut self, tick: u64, events: &TickEvents) {
        for capture in &events.captures {
            let name = self.name(capture.player);
            let player = self.metrics.player_mut(&name);
            player.captures += 1;
            player.area_captured += capture.area_delta;
            self.metrics.record_event(
                tick,
                EventType::Capture,
                &name,
                format!("+{:.0}", capture.area_delta),
            );
        }

        for kill in &events.kills {
            let victim = self.name(kill.victim);
            self.metrics.player_mut(&victim).record_death(kill.kill_type);
            let details = match kill.attacker {
                Some(attacker) => {
                    let attacker = self.name(attacker);
                    self.metrics.player_mut(&attacker).kills += 1;
                    format!("{} by {attacker}", kill_type_name(kill.kill_type))
                }
                None => kill_type_name(kill.kill_type).to_string(),
            };
            self.metrics
                .record_event(tick, EventType::Elimination, &victim, details);
        }

        for level_up in &events.level_ups {
            let name = self.name(level_up.player);
            let player = self.metrics.player_mut(&name);
            player.max_level = player.max_level.max(level_up.new_level);
            self.metrics.record_event(
                tick,
                EventType::LevelUp,
                &name,
                level_up.new_level.to_string(),
            );
        }

        for shot in &events.hitscans {
            let owner = self.name(shot.owner);
            self.metrics.player_mut(&owner).damage_dealt += shot.damage;
            let target = self.name(shot.target);
            self.metrics.player_mut(&target).damage_taken += shot.damage;
        }

        for snip in &events.snips {
            match snip {
                SnipEvent::Started { victim, .. } => {
                    let name = self.name(*victim);
                    self.metrics.player_mut(&name).snips_suffered += 1;
                    self.metrics
                        .record_event(tick, EventType::Snipped, &name, String::new());
                }
                SnipEvent::Escaped { victim } => {
                    let name = self.name(*victim);
                    self.metrics.player_mut(&name).escapes += 1;
                    self.metrics
                        .record_event(tick, EventType::Escaped, &name, String::new());
                }
            }
        }
    }

    /// Track current territory sizes.
    pub fn record_areas(&mut self, areas: impl IntoIterator<Item = (PlayerId, f64)>) {
        for (id, area) in areas {
            let name = self.name(id);
            self.metrics.player_mut(&name).record_area(area);
        }
    }

    /// Note a respawn.
    pub fn on_respawn(&mut self, tick: u64, id: PlayerId) {
        let name = self.name(id);
        self.metrics
            .record_event(tick, EventType::Respawn, &name, String::new());
    }

    /// Finalize and return metrics.
    #[must_use]
    pub fn finalize(mut self, duration: u64, winner: Option<String>, condition: &str) -> GameMetrics {
        for player in self.metrics.players.values_mut() {
            player.calculate_derived_stats();
        }
        self.metrics.finalize(duration, winner, condition);
        self.metrics
    }

    /// Get current metrics (for live monitoring).
    #[must_use]
    pub fn current(&self) -> &GameMetrics {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use territory_core::events::{CaptureEvent, HitscanEvent, KillEvent};
    use territory_core::math::Vec2;

    #[test]
    fn test_game_metrics_new() {
        let metrics = GameMetrics::new("game_001", "duel", 12345);
        assert_eq!(metrics.game_id, "game_001");
        assert_eq!(metrics.seed, 12345);
    }

    #[test]
    fn test_kd_ratio_calculation() {
        let mut player = PlayerMetrics::new("test");
        player.kills = 2;
        player.record_death(KillType::Trail);
        player.calculate_derived_stats();

        assert!((player.kd_ratio - 2.0).abs() < 0.001);
        assert_eq!(player.deaths_by_type.get("trail"), Some(&1));
    }

    #[test]
    fn test_batch_summary() {
        let mut game1 = GameMetrics::new("g1", "test", 1);
        game1.winner = Some("looper".to_string());
        game1.duration_ticks = 1000;

        let mut game2 = GameMetrics::new("g2", "test", 2);
        game2.winner = Some("hunter".to_string());
        game2.duration_ticks = 2000;

        let game3 = GameMetrics::new("g3", "test", 3);

        let summary = BatchSummary::from_games(&[game1, game2, game3]);

        assert_eq!(summary.total_games, 3);
        assert_eq!(summary.wins_by_player.get("looper"), Some(&1));
        assert_eq!(summary.wins_by_player.get("hunter"), Some(&1));
        assert_eq!(summary.draws, 1);
        assert_eq!(summary.min_duration_ticks, 0);
        assert_eq!(summary.max_duration_ticks, 2000);
        assert!((summary.avg_duration_ticks - 1000.0).abs() < 0.001);
    }

    #[test]
    fn test_balance_check() {
        let mut summary = BatchSummary::default();
        summary.win_rates.insert("a".to_string(), 0.52);
        summary.win_rates.insert("b".to_string(), 0.48);

        assert!(summary.is_balanced(0.1, 2));
        assert!(!summary.is_balanced(0.01, 2));
    }

    #[test]
    fn test_metrics_collector() {
        let mut collector = MetricsCollector::new("test", "duel", 42);
        collector.register(1, "looper", "looper");
        collector.register(2, "hunter", "hunter");

        let events = TickEvents {
            captures: vec![CaptureEvent {
                player: 1,
                area_delta: 500.0,
                location: Vec2::ZERO,
            }],
            kills: vec![KillEvent {
                attacker: Some(2),
                victim: 1,
                kill_type: KillType::Trail,
            }],
            hitscans: vec![HitscanEvent {
                from: Vec2::ZERO,
                to: Vec2::ZERO,
                damage: 10.0,
                owner: 2,
                target: 1,
            }],
            snips: vec![SnipEvent::Escaped { victim: 1 }],
            ..Default::default()
        };
        collector.record_tick(100, &events);
        collector.record_areas([(1, 12_000.0), (2, 11_000.0)]);
        collector.record_areas([(1, 0.0)]);

        let metrics = collector.finalize(150, Some("hunter".to_string()), "last_standing");

        assert_eq!(metrics.winner, Some("hunter".to_string()));
        let looper = &metrics.players["looper"];
        assert_eq!(looper.captures, 1);
        assert_eq!(looper.deaths, 1);
        assert_eq!(looper.escapes, 1);
        assert_eq!(looper.damage_taken, 10.0);
        assert_eq!(looper.peak_area, 12_000.0);
        assert_eq!(looper.final_area, 0.0);
        let hunter = &metrics.players["hunter"];
        assert_eq!(hunter.kills, 1);
        assert_eq!(hunter.kd_ratio, 1.0);
        assert_eq!(metrics.events.len(), 3);
    }
}
