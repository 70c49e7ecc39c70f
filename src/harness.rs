//! The orchestrator: expands suites into ROM invocations, classifies every
//! result and assembles the report.
//!
//! A run is a complete sweep. Failing or crashing ROMs never stop it; only a
//! [`HarnessError`] (misconfigured runner, unwritable report) does.
//!
//! With one job each ROM is run and recorded before the next starts. With
//! more, the invocations execute on a bounded worker pool and the report is
//! assembled afterwards on the calling thread in registry order, so the output
//! does not depend on scheduling.

use std::path::{Component, Path};

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::Serialize;
use tracing::{debug, info};

use crate::classify::Outcome;
use crate::error::{HarnessError, Result};
use crate::report::{CaseRecord, ReportBuilder};
use crate::runner::{Invocation, RomRunner};
use crate::suites::{SuiteRegistry, TestSuite};

/// Number of leading path segments dropped when naming a test case.
const STRIPPED_SEGMENTS: usize = 2;

// =============================================================================
// CORE TYPES
// =============================================================================

/// Aggregate counts over a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub suites: usize,
    pub cases: usize,
    pub passed: usize,
    pub failures: usize,
    pub errors: usize,
}

impl Summary {
    /// True when every case passed.
    pub fn is_clean(&self) -> bool {
        self.failures == 0 && self.errors == 0
    }

    fn record(&mut self, outcome: Outcome) {
        self.cases += 1;
        match outcome {
            Outcome::Pass => self.passed += 1,
            Outcome::Failure => self.failures += 1,
            Outcome::Error => self.errors += 1,
        }
    }
}

/// Result of a finished sweep: the assembled report plus its totals.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub report: ReportBuilder,
    pub summary: Summary,
}

impl RunReport {
    /// Serializes the report to `path`.
    pub fn write(&self, path: &Path) -> Result<()> {
        self.report.serialize(path)
    }
}

/// Drives a [`RomRunner`] over every suite in a [`SuiteRegistry`].
pub struct Harness<R> {
    registry: SuiteRegistry,
    runner: R,
    jobs: usize,
}

impl<R: RomRunner> Harness<R> {
    pub fn new(registry: SuiteRegistry, runner: R) -> Self {
        Self {
            registry,
            runner,
            jobs: 1,
        }
    }

    /// Number of invocations allowed to run at once. `0` is treated as `1`.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn registry(&self) -> &SuiteRegistry {
        &self.registry
    }

    /// Runs every suite and returns the assembled report.
    pub fn run(&self) -> Result<RunReport> {
        self.run_with(|_, _| {})
    }

    /// Like [`Self::run`], calling `observer` for each case once it is
    /// classified.
    ///
    /// With one job every ROM is run, classified and observed before the next
    /// one starts. With more, the observer sees cases in registry order after
    /// the pool has finished; progress is logged as each invocation ends.
    pub fn run_with<F>(&self, observer: F) -> Result<RunReport>
    where
        F: FnMut(&TestSuite, &CaseRecord),
    {
        if self.jobs == 1 {
            return self.assemble(
                |suite, rom| {
                    info!(suite = %suite.name, rom = rom, "running");
                    self.runner.run(suite.kind, rom)
                },
                observer,
            );
        }

        let mut invocations = self.invoke_parallel()?.into_iter();
        self.assemble(
            |_, rom| {
                invocations.next().ok_or_else(|| HarnessError::WorkerPool {
                    message: format!("no result collected for {rom}"),
                })
            },
            observer,
        )
    }

    /// Walks the registry in order, obtaining each case's invocation from
    /// `invoke` and recording it.
    fn assemble<I, F>(&self, mut invoke: I, mut observer: F) -> Result<RunReport>
    where
        I: FnMut(&TestSuite, &str) -> Result<Invocation>,
        F: FnMut(&TestSuite, &CaseRecord),
    {
        let mut report = ReportBuilder::default();
        let mut summary = Summary::default();

        for suite in self.registry.suites() {
            info!(suite = %suite.name, kind = %suite.kind, cases = suite.total_cases(), "suite");
            let handle = report.begin_suite(&suite.name, suite.total_cases());
            let (mut failures, mut errors) = (0, 0);

            for rom in suite.working_set() {
                let invocation = invoke(suite, rom.as_str())?;
                let case = case_record(rom, &invocation);
                match case.outcome {
                    Outcome::Pass => {}
                    Outcome::Failure => failures += 1,
                    Outcome::Error => errors += 1,
                }
                debug!(suite = %suite.name, case = %case.test_name, outcome = %case.outcome, "case");
                summary.record(case.outcome);
                observer(suite, &case);
                report.add_case(handle, case);
            }

            report.end_suite(handle, failures, errors);
            summary.suites += 1;
        }

        Ok(RunReport { report, summary })
    }

    /// Executes every (suite, ROM) pair on a bounded pool, returning results
    /// in declaration order. The first configuration error aborts the sweep.
    fn invoke_parallel(&self) -> Result<Vec<Invocation>> {
        let work: Vec<(&TestSuite, &str)> = self
            .registry
            .suites()
            .iter()
            .flat_map(|suite| suite.working_set().iter().map(move |rom| (suite, rom.as_str())))
            .collect();

        info!(jobs = self.jobs, invocations = work.len(), "running in parallel");
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .thread_name(|i| format!("rom-harness-{i}"))
            .build()
            .map_err(|e| HarnessError::WorkerPool {
                message: e.to_string(),
            })?;
        pool.install(|| {
            work.par_iter()
                .map(|&(suite, rom)| {
                    let invocation = self.runner.run(suite.kind, rom)?;
                    info!(
                        suite = %suite.name,
                        rom = rom,
                        outcome = %Outcome::for_invocation(&invocation),
                        "finished"
                    );
                    Ok(invocation)
                })
                .collect()
        })
    }
}

fn case_record(rom: &str, invocation: &Invocation) -> CaseRecord {
    CaseRecord {
        test_name: test_name(rom),
        outcome: Outcome::for_invocation(invocation),
        stdout_text: invocation.stdout_text(),
        stderr_text: invocation.stderr_text(),
        elapsed: invocation.elapsed,
    }
}

/// Derives a case name from a ROM path by normalising it lexically and
/// dropping its first two segments, so names do not depend on where the ROM
/// archive is mounted.
///
/// `"../gb-test-roms/oam_bug/oam_bug.gb"` becomes `"oam_bug/oam_bug.gb"`.
/// Paths too short to strip are returned normalised but whole.
pub fn test_name(rom_path: &str) -> String {
    let mut parts: Vec<String> = Vec::new();
    for component in Path::new(rom_path).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last().map(String::as_str) {
                Some("..") | None => parts.push("..".to_string()),
                Some("") => {}
                Some(_) => {
                    parts.pop();
                }
            },
            // An absolute path contributes an empty leading segment.
            Component::RootDir => parts.push(String::new()),
            Component::Prefix(prefix) => parts.push(prefix.as_os_str().to_string_lossy().into_owned()),
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
        }
    }

    if parts.len() > STRIPPED_SEGMENTS {
        parts[STRIPPED_SEGMENTS..].join("/")
    } else if parts.is_empty() {
        rom_path.to_string()
    } else {
        parts.join("/")
    }
}
