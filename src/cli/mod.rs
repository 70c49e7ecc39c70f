//! The rom-harness command-line interface.
//!
//! Parses arguments, sets up logging, runs the sweep and turns fatal errors
//! into a miette report and a non-zero exit status.

use std::process::ExitCode;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::args::HarnessArgs;
use crate::cli::output::Console;
use crate::error::{HarnessError, Result};
use crate::harness::Harness;

pub mod args;
pub mod output;

/// The main entry point for the CLI.
pub fn run() -> ExitCode {
    let args = HarnessArgs::parse();
    init_logging(args.log_level());

    match execute(&args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{:?}", miette::Report::new(e));
            ExitCode::FAILURE
        }
    }
}

/// Installs the stderr `tracing` subscriber. `RUST_LOG` takes precedence over
/// the level chosen on the command line.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("rom_harness={level}")));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn execute(args: &HarnessArgs) -> Result<ExitCode> {
    let config = args.to_config();
    let registry = config.registry()?;

    if args.list {
        output::print_suites(&registry, args.json)
            .map_err(|source| HarnessError::Console { source })?;
        return Ok(ExitCode::SUCCESS);
    }

    let runner = config.process_runner();
    runner.preflight()?;
    info!(
        runner = %runner.executable().display(),
        suites = registry.len(),
        jobs = config.jobs,
        "starting sweep"
    );

    let harness = Harness::new(registry, runner).with_jobs(config.jobs);
    let mut console = Console::new(config.use_colors);
    let run = harness.run_with(|suite, case| console.case(suite, case))?;
    run.write(&config.output)?;
    console.summary(&run.summary, &config.output);

    if config.fail_on_failures && !run.summary.is_clean() {
        return Ok(ExitCode::from(1));
    }
    Ok(ExitCode::SUCCESS)
}
