//! Scenario loading and configuration.
//!
//! Scenarios define the arena for headless runs: simulation tuning, which
//! bots take part and how a match ends.

use std::path::Path;

use serde::{Deserialize, Serialize};
use territory_core::config::SimConfig;
use territory_core::error::GameError;
use territory_core::math::Vec2;
use thiserror::Error;

use crate::spawn_generator::{generate_spawns, SpawnConfig};
use crate::strategies::Strategy;

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
    /// Scenario parsed but cannot be played.
    #[error("Invalid scenario: {0}")]
    Invalid(String),
    /// The simulation rejected the setup.
    #[error("Simulation error: {0}")]
    Game(#[from] GameError),
}

/// One bot taking part in a scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotSetup {
    /// Display name, unique within the scenario.
    pub name: String,
    /// Behaviour.
    #[serde(default)]
    pub strategy: Strategy,
    /// Fixed spawn point. Generated from the seed when absent.
    #[serde(default)]
    pub spawn: Option<(f64, f64)>,
}

impl BotSetup {
    /// Bot with a generated spawn.
    #[must_use]
    pub fn new(name: &str, strategy: Strategy) -> Self {
        Self {
            name: name.to_string(),
            strategy,
            spawn: None,
        }
    }
}

/// How a match ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VictoryConditions {
    /// End when at most one bot is alive.
    pub last_standing: bool,
    /// End when one bot owns this share of the map.
    pub territory_share: Option<f64>,
    /// Hard time limit. The largest territory wins on timeout.
    pub time_limit_ticks: Option<u64>,
    /// Respawn dead bots after this many ticks.
    pub respawn_after_ticks: Option<u64>,
}

impl Default for VictoryConditions {
    fn default() -> Self {
        Self {
            last_standing: true,
            territory_share: Some(0.5),
            time_limit_ticks: Some(60 * 60 * 5),
            respawn_after_ticks: None,
        }
    }
}

/// A complete scenario configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Simulation tuning.
    #[serde(default)]
    pub config: SimConfig,
    /// Spawn layout for bots without a fixed spawn.
    #[serde(default)]
    pub spawns: SpawnConfig,
    /// Participants.
    pub bots: Vec<BotSetup>,
    /// Victory conditions.
    #[serde(default)]
    pub victory: VictoryConditions,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::duel()
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

    /// Serialize to pretty RON.
    pub fn to_ron_string(&self) -> Result<String, ScenarioError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ScenarioError::Invalid(e.to_string()))
    }

    /// Check the scenario can be played.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        self.config.validate()?;
        if self.bots.is_empty() {
            return Err(ScenarioError::Invalid("scenario has no bots".to_string()));
        }
        for (i, bot) in self.bots.iter().enumerate() {
            if self.bots[..i].iter().any(|b| b.name == bot.name) {
                return Err(ScenarioError::Invalid(format!("duplicate bot name '{}'", bot.name)));
            }
        }
        if let Some(share) = self.victory.territory_share {
            if !(share > 0.0 && share <= 1.0) {
                return Err(ScenarioError::Invalid(format!(
                    "territory_share must be in (0, 1], got {share}"
                )));
            }
        }
        Ok(())
    }

    /// A looper against a hunter.
    #[must_use]
    pub fn duel() -> Self {
        Self {
            name: "Duel".to_string(),
            description: "A looper and a hunter on the default map".to_string(),
            config: SimConfig::default(),
            spawns: SpawnConfig::default(),
            bots: vec![
                BotSetup::new("looper", Strategy::Looper { leg_ticks: 40 }),
                BotSetup::new("hunter", Strategy::Hunter { max_outside_secs: 3.0 }),
            ],
            victory: VictoryConditions::default(),
        }
    }

    /// `count` bots cycling through every strategy, with respawns.
    #[must_use]
    pub fn free_for_all(count: usize) -> Self {
        let strategies = [
            Strategy::Looper { leg_ticks: 40 },
            Strategy::Hunter { max_outside_secs: 3.0 },
            Strategy::Wanderer {
                turn_interval: 30,
                max_outside_secs: 4.0,
            },
            Strategy::Looper { leg_ticks: 70 },
        ];
        let bots = (0..count)
            .map(|i| {
                let strategy = strategies[i % strategies.len()];
                BotSetup::new(&format!("{}_{i}", strategy.name()), strategy)
            })
            .collect();
        Self {
            name: format!("Free for all ({count})"),
            description: "Mixed bots with respawns and a time limit".to_string(),
            config: SimConfig::default(),
            spawns: SpawnConfig::default(),
            bots,
            victory: VictoryConditions {
                last_standing: false,
                territory_share: Some(0.4),
                time_limit_ticks: Some(60 * 60 * 3),
                respawn_after_ticks: Some(120),
            },
        }
    }

    /// Spawn point of every bot for a given seed.
    #[must_use]
    pub fn spawn_positions(&self, seed: u64) -> Vec<Vec2> {
        let generated = generate_spawns(&self.config, self.bots.len(), seed, &self.spawns);
        self.bots
            .iter()
            .zip(generated)
            .map(|(bot, fallback)| bot.spawn.map_or(fallback, |(x, y)| Vec2::new(x, y)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_scenarios_are_valid() {
        assert!(Scenario::duel().validate().is_ok());
        assert!(Scenario::free_for_all(6).validate().is_ok());
        assert_eq!(Scenario::free_for_all(6).bots.len(), 6);
    }

    #[test]
    fn test_parse_minimal_ron() {
        let scenario = Scenario::from_ron_str(
            r#"(
                name: "tiny",
                bots: [
                    (name: "a", spawn: Some((300.0, 300.0))),
                    (name: "b", strategy: Idle),
                ],
                config: (world: (width: 1000.0, height: 800.0)),
            )"#,
        )
        .unwrap();
        assert_eq!(scenario.bots.len(), 2);
        assert_eq!(scenario.bots[1].strategy, Strategy::Idle);
        assert_eq!(scenario.config.world.width, 1000.0);
        assert_eq!(scenario.config.world.tick_rate, SimConfig::default().world.tick_rate);
        assert_eq!(scenario.spawn_positions(1)[0], Vec2::new(300.0, 300.0));
    }

    #[test]
    fn test_ron_roundtrip() {
        let scenario = Scenario::free_for_all(3);
        let text = scenario.to_ron_string().unwrap();
        let parsed = Scenario::from_ron_str(&text).unwrap();
        assert_eq!(parsed.bots.len(), 3);
        assert_eq!(parsed.victory, scenario.victory);
    }

    #[test]
    fn test_rejects_bad_scenarios() {
        assert!(matches!(
            Scenario::from_ron_str("(name: \"empty\", bots: [])"),
            Err(ScenarioError::Invalid(_))
        ));
        assert!(matches!(
            Scenario::from_ron_str("(name: \"dup\", bots: [(name: \"a\"), (name: \"a\")])"),
            Err(ScenarioError::Invalid(_))
        ));
        assert!(matches!(
            Scenario::from_ron_str("(name: \"x\", bots: [(name: \"a\")], config: (world: (tick_rate: 0)))"),
            Err(ScenarioError::Game(_))
        ));
        assert!(matches!(Scenario::from_ron_str("not ron"), Err(ScenarioError::ParseError(_))));
        assert!(matches!(
            Scenario::load("/definitely/not/here.ron"),
            Err(ScenarioError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_spawns_are_deterministic() {
        let scenario = Scenario::free_for_all(5);
        assert_eq!(scenario.spawn_positions(8), scenario.spawn_positions(8));
    }
}
