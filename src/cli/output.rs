//! Handles all user-facing console output for the CLI.
//!
//! The report file is the authoritative result; everything printed here is a
//! convenience view of the same data.

use std::io::{self, Write};
use std::path::Path;

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::classify::Outcome;
use crate::harness::Summary;
use crate::report::CaseRecord;
use crate::suites::{SuiteRegistry, TestSuite};

/// Colored per-case progress lines and the final summary.
pub struct Console {
    stdout: StandardStream,
}

impl Console {
    pub fn new(use_colors: bool) -> Self {
        Self {
            stdout: StandardStream::stdout(color_choice(use_colors)),
        }
    }

    /// Prints one `PASS|FAIL|ERROR: case [suite]` line as soon as a case is
    /// recorded. Under `--jobs` above 1 these arrive once the pool finishes.
    pub fn case(&mut self, suite: &TestSuite, case: &CaseRecord) {
        let color = outcome_color(case.outcome);
        let _ = self
            .stdout
            .set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true));
        let _ = write!(self.stdout, "{}", case.outcome);
        let _ = self.stdout.reset();
        let _ = writeln!(self.stdout, ": {} [{}]", case.test_name, suite.name);
    }

    pub fn summary(&mut self, summary: &Summary, report: &Path) {
        let _ = writeln!(self.stdout);
        let _ = write!(
            self.stdout,
            "Test summary: {} suites, {} cases, ",
            summary.suites, summary.cases
        );
        self.counter("passed", summary.passed, Color::Green);
        let _ = write!(self.stdout, ", ");
        self.counter("failed", summary.failures, Color::Red);
        let _ = write!(self.stdout, ", ");
        self.counter("errors", summary.errors, Color::Magenta);
        let _ = writeln!(self.stdout);
        let _ = writeln!(self.stdout, "Report written to {}", report.display());
    }

    fn counter(&mut self, label: &str, count: usize, color: Color) {
        let _ = self.stdout.set_color(ColorSpec::new().set_fg(Some(color)));
        let _ = write!(self.stdout, "{label} {count}");
        let _ = self.stdout.reset();
    }
}

/// Prints the selected suites, as a table or as JSON.
pub fn print_suites(registry: &SuiteRegistry, json: bool) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    if json {
        serde_json::to_writer_pretty(&mut out, registry.suites())?;
        return writeln!(out);
    }
    for suite in registry.suites() {
        writeln!(
            out,
            "{:<16} {:<7} {:>3} case(s)  {}",
            suite.name,
            suite.kind.as_str(),
            suite.total_cases(),
            suite.primary_rom
        )?;
    }
    Ok(())
}

// ============================================================================
// PRIVATE HELPERS
// ============================================================================

fn color_choice(use_colors: bool) -> ColorChoice {
    if use_colors {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    }
}

fn outcome_color(outcome: Outcome) -> Color {
    match outcome {
        Outcome::Pass => Color::Green,
        Outcome::Failure => Color::Red,
        Outcome::Error => Color::Magenta,
    }
}
