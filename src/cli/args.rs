//! Command-line arguments for `rom-harness`.
//!
//! Uses the `clap` derive API. Every flag is optional: with no arguments the
//! harness behaves like the classic CI job.

use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{HarnessConfig, DEFAULT_OUTPUT, DEFAULT_RUNNER};

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "rom-harness",
    version,
    about = "Runs emulator test ROMs through an external runner and writes a JUnit report."
)]
pub struct HarnessArgs {
    /// Test runner executable, invoked as `<runner> <kind> <rom>`.
    #[arg(long, env = "ROM_HARNESS_RUNNER", default_value = DEFAULT_RUNNER)]
    pub runner: PathBuf,

    /// Where to write the JUnit report. An existing file is replaced.
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// YAML or JSON suite catalog to use instead of the built-in one.
    #[arg(long, value_name = "FILE")]
    pub suites: Option<PathBuf>,

    /// Only run suites whose name contains this substring.
    #[arg(long, value_name = "SUBSTR")]
    pub filter: Option<String>,

    /// Number of ROMs to run at once.
    #[arg(short, long, default_value_t = 1)]
    pub jobs: usize,

    /// Kill a runner invocation, and any processes it started, after this
    /// many seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Exit with status 1 when any case failed or errored.
    #[arg(long)]
    pub fail_on_failures: bool,

    /// Print the selected suites and exit without running anything.
    #[arg(long)]
    pub list: bool,

    /// With --list, print the suites as JSON.
    #[arg(long, requires = "list")]
    pub json: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Only log errors.
    #[arg(short, long)]
    pub quiet: bool,
}

impl HarnessArgs {
    pub fn to_config(&self) -> HarnessConfig {
        HarnessConfig {
            runner: self.runner.clone(),
            output: self.output.clone(),
            suites_file: self.suites.clone(),
            filter: self.filter.clone(),
            jobs: self.jobs.max(1),
            timeout: self.timeout.filter(|&s| s > 0).map(Duration::from_secs),
            fail_on_failures: self.fail_on_failures,
            ..HarnessConfig::default()
        }
    }

    /// Default `tracing` filter directive derived from -v/-q.
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}
