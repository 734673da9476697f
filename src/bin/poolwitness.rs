//! Poolwitness CLI: run the scenario matrix and print the report.

use clap::{ArgAction, Parser, ValueEnum};
use serde::Serialize;
use std::process;

use poolwitness::{
    apply_env_overrides, builtin_scenarios, Aggregator, HarnessConfig, LogCollector, LogLevel,
    PoolOptions, PoolPair, Report,
};

/// Success - every reproducible scenario held on every repetition.
const EXIT_SUCCESS: i32 = 0;
/// User error - bad arguments or environment values.
const EXIT_USER_ERROR: i32 = 1;
/// Test failure - at least one reproducible scenario failed.
const EXIT_TEST_FAILURE: i32 = 10;

#[derive(Parser, Debug)]
#[command(
    name = "poolwitness",
    version,
    about = "Verify that parallel reductions execute on their designated worker pool"
)]
struct Cli {
    /// Repetitions of every scenario
    #[arg(short = 't', long = "trials")]
    trials: Option<u32>,

    /// Range size per trial; the reduction spans [1, N]
    #[arg(short = 'n', long = "stream-size", value_parser = clap::value_parser!(u64).range(1..))]
    stream_size: Option<u64>,

    /// Worker count for each of the two pools
    #[arg(short = 'p', long = "parallelism", value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..4096))]
    parallelism: Option<usize>,

    /// Output format: human, json
    #[arg(short = 'f', long = "format", value_enum, default_value_t = Format::Human)]
    format: Format,

    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbosity: u8,

    /// Suppress non-essential output
    #[arg(short = 'q', long = "quiet", action = ArgAction::SetTrue)]
    quiet: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Format {
    /// The grouped console report.
    Human,
    /// The same report as pretty-printed JSON.
    Json,
}

/// JSON envelope: the effective configuration plus the report.
#[derive(Serialize)]
struct RunOutput<'a> {
    trials: u32,
    stream_size: u64,
    parallelism: usize,
    report: &'a Report,
}

fn main() {
    // Pools shut down on drop inside run(); exit only afterwards.
    let code = run();
    process::exit(code);
}

fn run() -> i32 {
    let cli = Cli::parse();

    let mut config = HarnessConfig::default();
    if let Err(err) = apply_env_overrides(&mut config) {
        eprintln!("poolwitness: {err}");
        return EXIT_USER_ERROR;
    }
    if let Some(trials) = cli.trials {
        config.trials = trials;
    }
    if let Some(stream_size) = cli.stream_size {
        config.stream_size = stream_size;
    }
    if let Some(parallelism) = cli.parallelism {
        config.parallelism = parallelism;
    }
    config.log_level = match (cli.quiet, cli.verbosity) {
        (true, _) => LogLevel::Error,
        (false, 0) => config.log_level,
        (false, 1) => LogLevel::Debug,
        (false, _) => LogLevel::Trace,
    };

    if !cli.quiet && cli.format == Format::Human {
        println!(
            "trials: {}, stream_size: {}, available_parallelism: {}, pool_parallelism: {}",
            config.trials,
            config.stream_size,
            poolwitness::pool::default_parallelism(),
            config.parallelism,
        );
    }

    let pools = PoolPair::new(PoolOptions {
        parallelism: config.parallelism,
        ..PoolOptions::default()
    });
    let mut log = LogCollector::new(4096).with_min_level(config.log_level);

    let scenarios = builtin_scenarios();
    let report = Aggregator::new(&config, &pools).run(&scenarios, &mut log);

    match cli.format {
        Format::Human => {
            if cli.verbosity > 0 {
                for entry in log.entries() {
                    println!("{entry}");
                }
                if log.total_dropped() > 0 {
                    println!("({} log entries dropped)", log.total_dropped());
                }
            }
            println!();
            println!("{report}");
        }
        Format::Json => {
            let output = RunOutput {
                trials: config.trials,
                stream_size: config.stream_size,
                parallelism: config.parallelism,
                report: &report,
            };
            match serde_json::to_string_pretty(&output) {
                Ok(rendered) => println!("{rendered}"),
                Err(err) => {
                    eprintln!("poolwitness: failed to render report: {err}");
                    return EXIT_USER_ERROR;
                }
            }
        }
    }

    if report.is_ok() {
        EXIT_SUCCESS
    } else {
        EXIT_TEST_FAILURE
    }
}
