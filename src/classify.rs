//! Outcome classification for a single runner invocation.

use std::fmt;

use serde::Serialize;

use crate::runner::Invocation;

/// Marker a runner prints when the ROM's own self-check reported failure.
pub const FAILURE_MARKER: &str = "Failed";

/// How a single ROM execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Outcome {
    /// The runner exited with status 0.
    Pass,
    /// The ROM ran and its self-check reported failure.
    Failure,
    /// The runner did not produce a coherent result (crash, kill, bad signature).
    Error,
}

impl Outcome {
    /// Classifies a finished invocation.
    pub fn for_invocation(invocation: &Invocation) -> Self {
        classify(invocation.exit_code, &invocation.stdout_text())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Pass => "PASS",
            Outcome::Failure => "FAIL",
            Outcome::Error => "ERROR",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order-sensitive classification policy.
///
/// `exit_code` is `None` when the child was killed by a signal; that counts
/// as a non-zero exit.
pub fn classify(exit_code: Option<i32>, stdout: &str) -> Outcome {
    match exit_code {
        Some(0) => Outcome::Pass,
        _ if stdout.contains(FAILURE_MARKER) => Outcome::Failure,
        _ => Outcome::Error,
    }
}
