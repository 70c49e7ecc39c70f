pub use crate::error::{HarnessError, Result};

pub mod classify;
pub mod cli;
pub mod config;
pub mod error;
pub mod harness;
pub mod report;
pub mod runner;
pub mod suites;
