//! Run configuration.
//!
//! Defaults reproduce the classic CI invocation: `./run_test_rom` as the
//! runner, the built-in catalog, one job, no timeout, report at `JUnit.xml`.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::Result;
use crate::runner::ProcessRunner;
use crate::suites::SuiteRegistry;

pub const DEFAULT_RUNNER: &str = "./run_test_rom";
pub const DEFAULT_OUTPUT: &str = "JUnit.xml";

/// Everything needed to run a sweep.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub runner: PathBuf,
    pub output: PathBuf,
    /// Catalog file to use instead of the built-in suites.
    pub suites_file: Option<PathBuf>,
    /// Case-insensitive substring selecting suites by name.
    pub filter: Option<String>,
    pub jobs: usize,
    pub timeout: Option<Duration>,
    /// Exit non-zero when any case failed or errored.
    pub fail_on_failures: bool,
    pub use_colors: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            runner: PathBuf::from(DEFAULT_RUNNER),
            output: PathBuf::from(DEFAULT_OUTPUT),
            suites_file: None,
            filter: None,
            jobs: 1,
            timeout: None,
            fail_on_failures: false,
            use_colors: atty::is(atty::Stream::Stdout),
        }
    }
}

impl HarnessConfig {
    /// Loads the configured catalog and applies the name filter.
    pub fn registry(&self) -> Result<SuiteRegistry> {
        let registry = match &self.suites_file {
            Some(path) => SuiteRegistry::from_path(path)?,
            None => SuiteRegistry::builtin(),
        };
        Ok(match &self.filter {
            Some(needle) => registry.filtered(needle),
            None => registry,
        })
    }

    pub fn process_runner(&self) -> ProcessRunner {
        ProcessRunner::new(&self.runner).with_timeout(self.timeout)
    }
}
