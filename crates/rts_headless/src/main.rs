//! Headless RTS scenario runner.
//!
//! Runs scenarios without graphics and prints JSON summaries on stdout.
//! Designed for CI testing and replay verification.
//!
//! # Usage
//!
//! ```bash
//! # Run a built-in scenario or a RON file
//! cargo run -p rts_headless -- run --scenario skirmish_1v1
//! cargo run -p rts_headless -- run --scenario scenarios/bridge.ron --record bridge.replay
//!
//! # Verify determinism
//! cargo run -p rts_headless -- verify --scenario crowd_crossing --runs 5
//!
//! # Check a recording
//! cargo run -p rts_headless -- replay --file bridge.replay --verify
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rts_headless::{play_replay, RunConfig, RunError, Scenario, ScenarioRunner};
use rts_orders::replay::Replay;

#[derive(Parser)]
#[command(name = "rts_headless")]
#[command(about = "Headless RTS scenario runner for CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario and print its summary
    Run {
        /// Built-in scenario name or RON file
        #[arg(short, long, default_value = "skirmish_1v1")]
        scenario: String,

        /// Override the scenario's tick limit
        #[arg(short, long)]
        ticks: Option<u64>,

        /// Override the scenario's seed
        #[arg(long)]
        seed: Option<u64>,

        /// Sample the state hash every N ticks
        #[arg(long, default_value = "0")]
        hash_interval: u64,

        /// Write a replay file
        #[arg(short, long)]
        record: Option<PathBuf>,
    },

    /// Verify determinism by running the same scenario multiple times
    Verify {
        /// Built-in scenario name or RON file
        #[arg(short, long, default_value = "skirmish_1v1")]
        scenario: String,

        /// Seed to verify
        #[arg(long)]
        seed: Option<u64>,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,
    },

    /// Play back a recorded game
    Replay {
        /// Replay file path
        #[arg(short, long)]
        file: PathBuf,

        /// Fail unless the replay reproduces its final hash
        #[arg(long)]
        verify: bool,
    },

    /// Time a scenario's tick loop
    Benchmark {
        /// Built-in scenario name or RON file
        #[arg(short, long, default_value = "skirmish_1v1")]
        scenario: String,

        /// Number of ticks to run
        #[arg(short, long, default_value = "3600")]
        ticks: u64,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging to stderr (stdout is for summaries)
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
        Commands::Run {
            scenario,
            ticks,
            seed,
            hash_interval,
            record,
        } => cmd_run(&scenario, RunConfig {
            ticks,
            seed,
            hash_interval,
            record_path: record,
        }),
        Commands::Verify {
            scenario,
            seed,
            runs,
        } => cmd_verify(&scenario, seed, runs),
        Commands::Replay { file, verify } => cmd_replay(&file, verify),
        Commands::Benchmark { scenario, ticks } => cmd_benchmark(&scenario, ticks),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("FATAL: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), RunError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Run a single scenario
fn cmd_run(scenario: &str, config: RunConfig) -> Result<ExitCode, RunError> {
    let scenario = Scenario::resolve(scenario)?;
    let (summary, _) = ScenarioRunner::with_config(config).run(&scenario)?;
    print_json(&summary)?;
    Ok(ExitCode::SUCCESS)
}

/// Verify determinism
fn cmd_verify(scenario: &str, seed: Option<u64>, runs: u32) -> Result<ExitCode, RunError> {
    let scenario = Scenario::resolve(scenario)?;
    tracing::info!(
        "Verifying determinism: {} ({} runs)",
        scenario.name,
        runs
    );

    let runner = ScenarioRunner::with_config(RunConfig {
        seed,
        ..RunConfig::default()
    });
    let hashes = runner.verify_determinism(&scenario, runs)?;

    if hashes.windows(2).all(|w| w[0] == w[1]) {
        eprintln!("PASS: All {} runs produced identical results", hashes.len());
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("FAIL: Non-determinism detected!");
        for (run, hash) in hashes.iter().enumerate() {
            eprintln!("  run {}: {:016x}", run, hash);
        }
        Ok(ExitCode::FAILURE)
    }
}

/// Replay a recorded game
fn cmd_replay(file: &Path, verify: bool) -> Result<ExitCode, RunError> {
    tracing::info!("Playing replay: {}", file.display());
    let replay = Replay::load(file)?;

    eprintln!("Loaded replay:");
    eprintln!("  Scenario: {}", replay.scenario_id);
    eprintln!("  Seed: {}", replay.seed);
    eprintln!("  Orders: {}", replay.order_count());
    eprintln!("  Duration: {} ticks", replay.final_tick);

    let summary = play_replay(replay)?;
    print_json(&summary)?;

    if verify && !summary.verified {
        eprintln!("FAIL: Replay produced different hash!");
        eprintln!("  Expected: {:016x}", summary.expected_hash);
        eprintln!("  Actual:   {:016x}", summary.actual_hash);
        return Ok(ExitCode::FAILURE);
    }
    if verify {
        eprintln!("PASS: Replay verification successful");
    }
    Ok(ExitCode::SUCCESS)
}

/// Run benchmark
fn cmd_benchmark(scenario: &str, ticks: u64) -> Result<ExitCode, RunError> {
    let scenario = Scenario::resolve(scenario)?;
    tracing::info!("Running {} tick benchmark on {}", ticks, scenario.name);

    let runner = ScenarioRunner::with_config(RunConfig {
        ticks: Some(ticks),
        ..RunConfig::default()
    });
    let start = Instant::now();
    let (summary, _) = runner.run(&scenario)?;
    let elapsed = start.elapsed();

    let tps = ticks as f64 / elapsed.as_secs_f64().max(f64::EPSILON);

    eprintln!("\n{}", "=".repeat(50));
    eprintln!("BENCHMARK RESULTS");
    eprintln!("{}", "=".repeat(50));
    eprintln!("Ticks: {}", ticks);
    eprintln!("Duration: {:.3}s", elapsed.as_secs_f64());
    eprintln!("Ticks/second: {:.1}", tps);
    eprintln!("ms/tick: {:.4}", elapsed.as_secs_f64() * 1000.0 / ticks.max(1) as f64);
    eprintln!("Final objects: {}", summary.objects.len());
    eprintln!("State hash: {:016x}", summary.final_hash);
    Ok(ExitCode::SUCCESS)
}
