//! Simulator entry point: parse arguments, wire the journal and SIGINT
//! handling, run the coordinator under the wall-clock watchdog.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use resource_arbiter::builders::SimulationBuilder;
use resource_arbiter::config::SimConfig;
use resource_arbiter::core::{AppResult, RunOutcome, SimSummary};
use resource_arbiter::util::init_tracing;

/// Virtual-time resource arbitration simulator.
#[derive(Debug, Parser)]
#[command(name = "arbiter", version)]
struct Cli {
    /// Total number of workers to launch (1-18).
    #[arg(short = 'n', long = "processes")]
    processes: usize,

    /// Maximum number of concurrently running workers (1-18).
    #[arg(short = 's', long = "simultaneous")]
    simultaneous: usize,

    /// Simulated nanoseconds between worker spawns.
    #[arg(short = 't', long = "spawn-interval-ns")]
    spawn_interval_ns: u64,

    /// Log file path; must already exist, opened for append.
    #[arg(short = 'f', long = "logfile")]
    logfile: PathBuf,

    /// Base seed for worker randomness; runs replay deterministically.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Wall-clock watchdog in seconds; the run is torn down on expiry.
    #[arg(long = "watchdog", default_value_t = 5)]
    watchdog_secs: u64,
}

fn main() -> ExitCode {
    init_tracing();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if err.use_stderr() => {
            let rendered = err.to_string();
            eprintln!("{}", rendered.lines().next().unwrap_or("invalid arguments"));
            return ExitCode::FAILURE;
        }
        Err(err) => {
            // Help or version output.
            print!("{err}");
            return ExitCode::SUCCESS;
        }
    };

    match run(&cli) {
        Ok(summary) => {
            print_summary(&summary);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> AppResult<SimSummary> {
    let config = SimConfig::new(cli.processes, cli.simultaneous, cli.spawn_interval_ns)
        .with_seed(cli.seed)
        .with_watchdog_secs(cli.watchdog_secs);

    let mut coordinator = SimulationBuilder::new(config)
        .with_log_file(&cli.logfile, true)?
        .build()?;

    signal_hook::flag::register(signal_hook::consts::SIGINT, coordinator.shutdown_flag())
        .context("installing SIGINT handler")?;

    Ok(coordinator.run()?)
}

fn print_summary(summary: &SimSummary) {
    let outcome = match summary.outcome {
        RunOutcome::Completed => "completed",
        RunOutcome::WatchdogExpired => "watchdog expired",
        RunOutcome::Interrupted => "interrupted",
    };
    println!(
        "{outcome}: launched {} terminated {} victims {} sweeps {} at {}",
        summary.launched,
        summary.terminated,
        summary.victims,
        summary.detection_sweeps,
        summary.final_clock
    );
}
