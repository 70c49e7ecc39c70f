//! Error taxonomy for the harness.
//!
//! Only configuration and report-writing problems are errors here. A ROM that
//! fails its self-check, or a runner that crashes on a ROM, is an *outcome*
//! recorded in the report (see [`crate::classify::Outcome`]), never a
//! `HarnessError`.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Fatal failure modes that abort a harness run.
#[derive(Debug, Error, Diagnostic)]
pub enum HarnessError {
    #[error("runner executable not found: {}", path.display())]
    #[diagnostic(
        code(rom_harness::config::runner_missing),
        help("build the test runner first, or point --runner at it")
    )]
    RunnerMissing { path: PathBuf },

    #[error("runner is not an executable file: {}", path.display())]
    #[diagnostic(code(rom_harness::config::runner_not_executable))]
    RunnerNotExecutable { path: PathBuf },

    #[error("failed to spawn runner {} for {rom}", path.display())]
    #[diagnostic(code(rom_harness::config::runner_spawn))]
    RunnerSpawn {
        path: PathBuf,
        rom: String,
        #[source]
        source: std::io::Error,
    },

    #[error("i/o error while running {rom}")]
    #[diagnostic(code(rom_harness::runner::io))]
    RunnerIo {
        rom: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start worker pool: {message}")]
    #[diagnostic(code(rom_harness::config::worker_pool))]
    WorkerPool { message: String },

    #[error("failed to read suite catalog {}", path.display())]
    #[diagnostic(code(rom_harness::config::suite_file))]
    SuiteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse suite catalog {}: {message}", path.display())]
    #[diagnostic(
        code(rom_harness::config::suite_parse),
        help("each entry needs `name`, `kind` (memory|serial) and `rom`; `individual` is optional")
    )]
    SuiteFileParse { path: PathBuf, message: String },

    #[error("invalid suite `{name}`: {reason}")]
    #[diagnostic(code(rom_harness::config::invalid_suite))]
    InvalidSuite { name: String, reason: String },

    #[error("failed to write to the console")]
    #[diagnostic(code(rom_harness::console))]
    Console {
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode report: {message}")]
    #[diagnostic(code(rom_harness::report::encode))]
    ReportEncode { message: String },

    #[error("failed to write report to {}", path.display())]
    #[diagnostic(
        code(rom_harness::report::write),
        help("the report is the only signal CI receives; the run counts as failed")
    )]
    ReportWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T, E = HarnessError> = std::result::Result<T, E>;
