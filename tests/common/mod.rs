//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use rom_harness::runner::{Invocation, RomRunner};
use rom_harness::suites::{SuiteKind, SuiteRegistry, TestSuite};
use rom_harness::Result;

/// What a scripted ROM should "print" when run.
#[derive(Debug, Clone)]
pub struct Scripted {
    pub exit_code: Option<i32>,
    pub stdout: &'static str,
    pub stderr: &'static str,
}

pub const PASS: Scripted = Scripted {
    exit_code: Some(0),
    stdout: "Passed\n",
    stderr: "",
};

/// In-process runner answering from a table; unknown ROMs pass.
#[derive(Debug, Default)]
pub struct FakeRunner {
    script: HashMap<String, Scripted>,
    calls: Mutex<Vec<(SuiteKind, String)>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, rom: &str, exit_code: Option<i32>, stdout: &'static str, stderr: &'static str) -> Self {
        self.script.insert(
            rom.to_string(),
            Scripted {
                exit_code,
                stdout,
                stderr,
            },
        );
        self
    }

    pub fn calls(&self) -> Vec<(SuiteKind, String)> {
        self.calls.lock().unwrap().clone()
    }
}

impl RomRunner for FakeRunner {
    fn run(&self, kind: SuiteKind, rom_path: &str) -> Result<Invocation> {
        self.calls.lock().unwrap().push((kind, rom_path.to_string()));
        let scripted = self.script.get(rom_path).cloned().unwrap_or(PASS);
        Ok(Invocation {
            rom_path: rom_path.to_string(),
            kind,
            exit_code: scripted.exit_code,
            stdout: scripted.stdout.as_bytes().to_vec(),
            stderr: scripted.stderr.as_bytes().to_vec(),
            elapsed: Duration::from_millis(5),
            timed_out: false,
        })
    }
}

pub fn suite(name: &str, kind: SuiteKind, rom: &str, individual: &[&str]) -> TestSuite {
    TestSuite::new(
        name,
        kind,
        rom,
        individual.iter().map(|s| s.to_string()).collect(),
    )
}

pub fn registry(suites: Vec<TestSuite>) -> SuiteRegistry {
    SuiteRegistry::new(suites).unwrap()
}
