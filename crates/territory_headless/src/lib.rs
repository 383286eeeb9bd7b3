//! Headless arena runner for bot matches and CI verification.
//!
//! This crate drives `territory_core` without any rendering. It enables:
//!
//! - **Bot matches**: Scripted strategies play full games from a scenario
//! - **Balance testing**: Batches of seeded games run in parallel
//! - **CI verification**: Determinism checks over complete matches
//! - **External control**: A JSON-lines session for outside agents
//!
//! # Protocol
//!
//! Interactive sessions use JSON lines (one JSON object per line):
//!
//! - **stdin**: Commands from controller (tick, spawn, heading, etc.)
//! - **stdout**: Responses and tick events (JSON)
//! - **stderr**: Logs (human-readable)
//!
//! See [`protocol`] module for the full command/response specification.
//!
//! # Example
//!
//! ```bash
//! # Run interactively
//! echo '{"cmd":"tick","count":60}' | cargo run -p territory_headless -- interactive
//!
//! # Run a scenario and stream events
//! cargo run -p territory_headless -- run --scenario scenarios/duel.ron --events
//!
//! # Verify determinism
//! cargo run -p territory_headless -- verify --seed 42 --runs 5
//! ```

pub mod batch;
pub mod game_runner;
pub mod metrics;
pub mod protocol;
pub mod runner;
pub mod scenario;
pub mod spawn_generator;
pub mod strategies;

pub use batch::{run_batch, verify_determinism, BatchConfig, BatchResults};
pub use game_runner::{run_game, run_game_observed, GameConfig, GameResult, GameRunner};
pub use metrics::{BatchSummary, GameMetrics, MetricsCollector};
pub use protocol::{Command, Response};
pub use runner::{HeadlessConfig, HeadlessRunner};
pub use scenario::{BotSetup, Scenario, ScenarioError, VictoryConditions};
pub use spawn_generator::{generate_spawns, SpawnConfig, SpawnPattern};
pub use strategies::{Strategy, StrategyExecutor};
