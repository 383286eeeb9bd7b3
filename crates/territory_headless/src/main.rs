//! Headless territory arena runner.
//!
//! This binary runs matches without graphics. Output is JSON on stdout,
//! logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Interactive mode - read commands from stdin
//! cargo run -p territory_headless
//!
//! # Run a single bot match, streaming tick events
//! cargo run -p territory_headless -- run --scenario scenarios/duel.ron --events
//!
//! # Run batch balance test
//! cargo run -p territory_headless -- batch --bots 4 --count 200 --output results/
//!
//! # Print the default tuning as RON
//! cargo run -p territory_headless -- default-config
//! ```

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use territory_core::config::SimConfig;
use territory_headless::{
    batch::{run_batch, verify_determinism, BatchConfig},
    game_runner::{run_game, run_game_observed, GameConfig, DEFAULT_MAX_TICKS},
    protocol::Response,
    runner::{HeadlessConfig, HeadlessRunner},
    scenario::{Scenario, ScenarioError, VictoryConditions},
};

#[derive(Parser)]
#[command(name = "territory_headless")]
#[command(about = "Headless territory arena runner for bot matches and CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single bot match
    Run {
        /// Scenario file (RON). Defaults to a built-in match
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Built-in free-for-all size when no scenario file is given
        #[arg(short, long)]
        bots: Option<usize>,

        /// Random seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Maximum ticks
        #[arg(long, default_value_t = DEFAULT_MAX_TICKS)]
        max_ticks: u64,

        /// Stream every non-empty tick's events as JSON lines
        #[arg(long)]
        events: bool,
    },

    /// Drive a simulation from JSON commands on stdin
    Interactive {
        /// Scenario file whose config and fixed spawns are loaded
        #[arg(short, long)]
        scenario: Option<String>,

        /// Emit events after every tick
        #[arg(long)]
        auto_events: bool,
    },

    /// Run batch of games for balance testing
    Batch {
        /// Scenario file (RON)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Built-in free-for-all size when no scenario file is given
        #[arg(short, long)]
        bots: Option<usize>,

        /// Number of games to run
        #[arg(short, long, default_value = "100")]
        count: u32,

        /// Maximum parallel games (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: u32,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Starting random seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Maximum ticks per game
        #[arg(long, default_value_t = DEFAULT_MAX_TICKS)]
        max_ticks: u64,
    },

    /// Verify determinism by running same seed multiple times
    Verify {
        /// Scenario file (RON)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Seed to verify
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,

        /// Maximum ticks per run
        #[arg(long, default_value = "3600")]
        max_ticks: u64,
    },

    /// Run N ticks for benchmarking
    Benchmark {
        /// Number of ticks to run
        #[arg(short, long, default_value = "36000")]
        ticks: u64,

        /// Number of bots
        #[arg(short, long, default_value = "16")]
        players: usize,
    },

    /// Print the default simulation config as RON
    DefaultConfig,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging to stderr (stdout is for output)
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    let result = match cli.command {
        Some(Commands::Run {
            scenario,
            bots,
            seed,
            max_ticks,
            events,
        }) => cmd_run(scenario, bots, seed, max_ticks, events),
        Some(Commands::Interactive {
            scenario,
            auto_events,
        }) => cmd_interactive(scenario, auto_events),
        Some(Commands::Batch {
            scenario,
            bots,
            count,
            parallel,
            output,
            seed,
            max_ticks,
        }) => cmd_batch(scenario, bots, count, parallel, output, seed, max_ticks),
        Some(Commands::Verify {
            scenario,
            seed,
            runs,
            max_ticks,
        }) => cmd_verify(scenario, seed, runs, max_ticks),
        Some(Commands::Benchmark { ticks, players }) => cmd_benchmark(ticks, players),
        Some(Commands::DefaultConfig) => cmd_default_config(),
        // Default: interactive mode
        None => cmd_interactive(None, false),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "Command failed");
        eprintln!("FATAL: {e}");
        std::process::exit(1);
    }
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Scenario from a file, or a built-in one.
fn load_scenario(path: Option<PathBuf>, bots: Option<usize>) -> Result<Scenario, ScenarioError> {
    match (path, bots) {
        (Some(path), _) => Scenario::load(path),
        (None, Some(count)) => Ok(Scenario::free_for_all(count)),
        (None, None) => Ok(Scenario::duel()),
    }
}

/// Run a single bot match
fn cmd_run(
    scenario: Option<PathBuf>,
    bots: Option<usize>,
    seed: u64,
    max_ticks: u64,
    events: bool,
) -> CliResult {
    let scenario = load_scenario(scenario, bots)?;
    let mut config = GameConfig::new(scenario, seed);
    config.max_ticks = max_ticks;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut write_error: Option<io::Error> = None;
    let result = run_game_observed(config, |sim, tick_events| {
        if !events || tick_events.is_empty() || write_error.is_some() {
            return;
        }
        let line = Response::Events {
            tick: sim.get_tick(),
            events: tick_events.clone(),
        }
        .to_json_line();
        if let Err(e) = out.write_all(line.as_bytes()) {
            write_error = Some(e);
        }
    })?;
    if let Some(e) = write_error {
        return Err(e.into());
    }

    writeln!(out, "{}", serde_json::to_string(&result.metrics)?)?;
    out.flush()?;
    Ok(())
}

/// Drive a simulation from stdin
fn cmd_interactive(scenario: Option<String>, auto_events: bool) -> CliResult {
    tracing::info!("Starting interactive session");
    let mut runner = HeadlessRunner::with_config(HeadlessConfig {
        auto_events,
        scenario_path: scenario,
    })?;
    let stdin = io::stdin();
    let stdout = io::stdout();
    runner.run(stdin.lock(), stdout.lock())?;
    Ok(())
}

/// Run batch of games for balance testing
fn cmd_batch(
    scenario: Option<PathBuf>,
    bots: Option<usize>,
    count: u32,
    parallel: u32,
    output: PathBuf,
    seed: u64,
    max_ticks: u64,
) -> CliResult {
    let scenario = load_scenario(scenario, bots)?;
    let bot_count = scenario.bots.len();
    tracing::info!(
        scenario = %scenario.name,
        count,
        parallel,
        seed,
        max_ticks,
        output = %output.display(),
        "Batch configuration"
    );
    std::fs::create_dir_all(&output)?;

    let mut config = BatchConfig::new(scenario, count)
        .with_output(output.clone())
        .with_seed(seed)
        .with_max_ticks(max_ticks);
    config.parallel_games = parallel;
    let results = run_batch(config);

    let results_path = output.join("batch_results.json");
    results.save(&results_path)?;

    eprintln!("\n{}", "=".repeat(50));
    eprintln!("BATCH COMPLETE");
    eprintln!("{}", "=".repeat(50));
    eprintln!("Games played: {}", results.games.len());
    if !results.errors.is_empty() {
        eprintln!("Games FAILED: {}", results.errors.len());
    }
    eprintln!("Duration: {:.1}s", results.duration_seconds);
    eprintln!(
        "Average length: {:.0} ticks",
        results.summary.avg_duration_ticks
    );

    eprintln!("\nWin Rates:");
    let mut rates: Vec<_> = results.summary.win_rates.iter().collect();
    rates.sort_by(|a, b| a.0.cmp(b.0));
    for (bot, rate) in rates {
        eprintln!("  {}: {:.1}%", bot, rate * 100.0);
    }
    eprintln!("Draws: {}", results.summary.draws);
    if !results.summary.is_balanced(0.15, bot_count) {
        eprintln!("\nWin rates are outside a 15% band around an even split");
    }

    for error in results.errors.iter().take(10) {
        eprintln!(
            "  Game {} (seed {}): {}",
            error.game_index, error.seed, error.message
        );
    }
    eprintln!("\nResults saved to: {}", results_path.display());
    Ok(())
}

/// Verify determinism
fn cmd_verify(scenario: Option<PathBuf>, seed: u64, runs: u32, max_ticks: u64) -> CliResult {
    let scenario = load_scenario(scenario, None)?;
    tracing::info!(scenario = %scenario.name, seed, runs, "Verifying determinism");
    if verify_determinism(&scenario, seed, runs, max_ticks) {
        eprintln!("Determinism verified: {runs} runs of seed {seed} match");
        Ok(())
    } else {
        Err(format!("determinism check failed for seed {seed}").into())
    }
}

/// Run N ticks for benchmarking
fn cmd_benchmark(ticks: u64, players: usize) -> CliResult {
    let mut scenario = Scenario::free_for_all(players.max(1));
    scenario.victory = VictoryConditions {
        last_standing: false,
        territory_share: None,
        time_limit_ticks: Some(ticks),
        respawn_after_ticks: Some(60),
    };
    let mut config = GameConfig::new(scenario, 0);
    config.max_ticks = ticks;

    tracing::info!(ticks, players, "Running benchmark");
    let start = Instant::now();
    let result = run_game(config)?;
    let elapsed = start.elapsed().as_secs_f64();

    let ran = result.metrics.duration_ticks;
    eprintln!("Ticks: {ran}");
    eprintln!("Elapsed: {elapsed:.3}s");
    eprintln!("Ticks/sec: {:.0}", ran as f64 / elapsed.max(f64::EPSILON));
    eprintln!("Final hash: {:016x}", result.final_state_hash);
    Ok(())
}

/// Print the default config
fn cmd_default_config() -> CliResult {
    println!("{}", SimConfig::default().to_ron_string()?);
    Ok(())
}
