//! Runner invocation: spawning the external test runner for one ROM.
//!
//! The runner is invoked as `<runner> <kind> <rom>`. Its exit status and both
//! output streams are captured; interpreting them is left to
//! [`crate::classify`].

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{HarnessError, Result};
use crate::suites::SuiteKind;

/// How often a child is polled while a timeout is armed.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Everything captured from one runner execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub rom_path: String,
    pub kind: SuiteKind,
    /// `None` when the child was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub elapsed: Duration,
    pub timed_out: bool,
}

impl Invocation {
    /// Captured stdout, decoded lossily.
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Captured stderr, decoded lossily.
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Something that can execute a ROM and report what happened.
///
/// Implementations must be shareable across worker threads.
pub trait RomRunner: Sync {
    fn run(&self, kind: SuiteKind, rom_path: &str) -> Result<Invocation>;
}

impl<T: RomRunner + ?Sized> RomRunner for &T {
    fn run(&self, kind: SuiteKind, rom_path: &str) -> Result<Invocation> {
        (**self).run(kind, rom_path)
    }
}

/// Runs ROMs by spawning an external executable.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    executable: PathBuf,
    timeout: Option<Duration>,
}

impl ProcessRunner {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            timeout: None,
        }
    }

    /// Kills any invocation that runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Checks the executable is present and runnable before any suite starts.
    ///
    /// Bare command names are resolved through `PATH` at spawn time and are
    /// not checked here.
    pub fn preflight(&self) -> Result<()> {
        let is_bare_name = self
            .executable
            .parent()
            .map_or(true, |p| p.as_os_str().is_empty());
        if is_bare_name {
            return Ok(());
        }

        let meta = std::fs::metadata(&self.executable).map_err(|_| HarnessError::RunnerMissing {
            path: self.executable.clone(),
        })?;
        if !meta.is_file() || !is_executable(&meta) {
            return Err(HarnessError::RunnerNotExecutable {
                path: self.executable.clone(),
            });
        }
        Ok(())
    }

    fn io_error(rom_path: &str) -> impl FnOnce(io::Error) -> HarnessError + '_ {
        move |source| HarnessError::RunnerIo {
            rom: rom_path.to_string(),
            source,
        }
    }
}

impl RomRunner for ProcessRunner {
    fn run(&self, kind: SuiteKind, rom_path: &str) -> Result<Invocation> {
        debug!(runner = %self.executable.display(), %kind, rom = rom_path, "spawning runner");
        let started = Instant::now();

        let mut command = Command::new(&self.executable);
        command
            .arg(kind.as_str())
            .arg(rom_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // With a deadline armed the runner gets its own process group, so the
        // kill also reaches emulators it started without `exec`.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            if self.timeout.is_some() {
                command.process_group(0);
            }
        }

        let mut child = command
            .spawn()
            .map_err(|source| HarnessError::RunnerSpawn {
                path: self.executable.clone(),
                rom: rom_path.to_string(),
                source,
            })?;

        // Both pipes are drained on their own threads so a child that fills
        // one pipe while we block on the other cannot deadlock us.
        let stdout_reader = drain(child.stdout.take());
        let stderr_reader = drain(child.stderr.take());

        let (status, timed_out) = match self.timeout {
            None => (child.wait().map_err(Self::io_error(rom_path))?, false),
            Some(limit) => wait_with_deadline(&mut child, started, limit)
                .map_err(Self::io_error(rom_path))?,
        };

        let stdout = collect(stdout_reader).map_err(Self::io_error(rom_path))?;
        let mut stderr = collect(stderr_reader).map_err(Self::io_error(rom_path))?;
        let elapsed = started.elapsed();

        if timed_out {
            warn!(rom = rom_path, limit = ?self.timeout, "runner timed out and was killed");
            if let Some(limit) = self.timeout {
                stderr.extend_from_slice(
                    format!("\nrom-harness: runner killed after {:.1}s timeout\n", limit.as_secs_f64())
                        .as_bytes(),
                );
            }
        }

        debug!(
            rom = rom_path,
            exit_code = ?status.code(),
            elapsed_ms = elapsed.as_millis() as u64,
            "runner finished"
        );

        Ok(Invocation {
            rom_path: rom_path.to_string(),
            kind,
            exit_code: status.code(),
            stdout,
            stderr,
            elapsed,
            timed_out,
        })
    }
}

// =============================================================================
// PRIVATE HELPERS
// =============================================================================

fn drain<R: Read + Send + 'static>(stream: Option<R>) -> JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut stream) = stream {
            stream.read_to_end(&mut buf)?;
        }
        Ok(buf)
    })
}

fn collect(reader: JoinHandle<io::Result<Vec<u8>>>) -> io::Result<Vec<u8>> {
    reader
        .join()
        .map_err(|_| io::Error::new(io::ErrorKind::Other, "output reader thread panicked"))?
}

/// Waits for `child`, killing it once `limit` has elapsed since `started`.
/// Returns the exit status and whether the child was killed.
fn wait_with_deadline(
    child: &mut Child,
    started: Instant,
    limit: Duration,
) -> io::Result<(ExitStatus, bool)> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok((status, false));
        }
        let elapsed = started.elapsed();
        if elapsed >= limit {
            // The child may exit between try_wait and kill; kill then reports
            // an error we can ignore because wait still reaps it.
            let _ = kill_group(child);
            return Ok((child.wait()?, true));
        }
        thread::sleep(POLL_INTERVAL.min(limit - elapsed));
    }
}

/// Kills the child and every process in its group.
#[cfg(unix)]
fn kill_group(child: &mut Child) -> io::Result<()> {
    let pgid = child.id() as libc::pid_t;
    // SAFETY: kill(2) only signals; the negative pid names the group the
    // child leads since it was spawned with `process_group(0)`.
    if unsafe { libc::kill(-pgid, libc::SIGKILL) } == 0 {
        return Ok(());
    }
    child.kill()
}

#[cfg(not(unix))]
fn kill_group(child: &mut Child) -> io::Result<()> {
    child.kill()
}

#[cfg(unix)]
fn is_executable(meta: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_meta: &std::fs::Metadata) -> bool {
    true
}
