// End-to-end runs of the rom-harness binary.
// Requires: assert_cmd, predicates crates in [dev-dependencies]

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::{prelude::PredicateBooleanExt, str::contains};

const CATALOG: &str = r#"
- name: halt_bug
  kind: memory
  rom: ../gb-test-roms/halt_bug_pass.gb
- name: cpu_instrs
  kind: serial
  rom: ../gb-test-roms/cpu_instrs/cpu_instrs.gb
  individual:
    - ../gb-test-roms/cpu_instrs/individual/01-special_pass.gb
    - ../gb-test-roms/cpu_instrs/individual/02-interrupts_fail.gb
- name: oam_bug
  kind: memory
  rom: ../gb-test-roms/oam_bug/oam_bug_crash.gb
"#;

fn harness() -> Command {
    let mut cmd = Command::cargo_bin("rom-harness").unwrap();
    cmd.env_remove("ROM_HARNESS_RUNNER").env_remove("RUST_LOG");
    cmd
}

fn write_catalog(dir: &Path) {
    fs::write(dir.join("suites.yaml"), CATALOG).unwrap();
}

#[cfg(unix)]
fn write_runner(dir: &Path) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join("run_test_rom");
    fs::write(
        &path,
        r#"#!/bin/sh
case "$2" in
  *_pass.gb) echo "Passed"; exit 0 ;;
  *_fail.gb) echo "Test 3: Failed"; exit 1 ;;
  *) echo "segmentation fault" >&2; exit 1 ;;
esac
"#,
    )
    .unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[cfg(unix)]
#[test]
fn writes_report_and_exits_zero_despite_failures() {
    let dir = tempfile::tempdir().unwrap();
    write_catalog(dir.path());
    let runner = write_runner(dir.path());

    harness()
        .current_dir(dir.path())
        .arg("--runner")
        .arg(&runner)
        .args(["--suites", "suites.yaml"])
        .assert()
        .success()
        .stdout(contains("Test summary"));

    let xml = fs::read_to_string(dir.path().join("JUnit.xml")).unwrap();
    assert!(xml.contains(r#"<testsuites name="rom-test-results""#));
    assert!(xml.contains(r#"name="halt_bug" tests="1""#));
    assert!(xml.contains(r#"name="cpu_instrs" tests="2""#));
    assert!(xml.contains(r#"classname="cpu_instrs/individual/02-interrupts_fail.gb""#));
    assert!(xml.contains("<failure>Test 3: Failed\n</failure>"));
    assert!(xml.contains("<error>segmentation fault\n</error>"));
    // The primary ROM of a suite with individual ROMs is never run.
    assert!(!xml.contains("cpu_instrs/cpu_instrs.gb"));
}

#[cfg(unix)]
#[test]
fn fail_on_failures_sets_exit_status() {
    let dir = tempfile::tempdir().unwrap();
    write_catalog(dir.path());
    let runner = write_runner(dir.path());

    harness()
        .current_dir(dir.path())
        .arg("--runner")
        .arg(&runner)
        .args(["--suites", "suites.yaml", "--fail-on-failures", "-o", "out.xml"])
        .assert()
        .code(1);
    assert!(dir.path().join("out.xml").exists());
}

#[cfg(unix)]
#[test]
fn parallel_jobs_write_the_same_report_structure() {
    let dir = tempfile::tempdir().unwrap();
    write_catalog(dir.path());
    let runner = write_runner(dir.path());

    for (jobs, out) in [("1", "seq.xml"), ("3", "par.xml")] {
        harness()
            .current_dir(dir.path())
            .arg("--runner")
            .arg(&runner)
            .args(["--suites", "suites.yaml", "--jobs", jobs, "-o", out])
            .assert()
            .success();
    }

    let strip_times = |s: String| {
        s.lines()
            .map(|l| match l.find(" time=\"") {
                Some(i) => {
                    let rest = &l[i + 7..];
                    let end = rest.find('"').map_or(rest.len(), |e| e + 1);
                    format!("{}{}", &l[..i], &rest[end..])
                }
                None => l.to_string(),
            })
            .collect::<Vec<_>>()
    };
    let seq = strip_times(fs::read_to_string(dir.path().join("seq.xml")).unwrap());
    let par = strip_times(fs::read_to_string(dir.path().join("par.xml")).unwrap());
    assert_eq!(seq, par);
}

#[test]
fn missing_runner_aborts_before_writing_a_report() {
    let dir = tempfile::tempdir().unwrap();

    harness()
        .current_dir(dir.path())
        .args(["--runner", "./no/such/run_test_rom"])
        .assert()
        .failure()
        .stderr(contains("runner executable not found"));

    assert!(!dir.path().join("JUnit.xml").exists());
}

#[test]
fn list_prints_builtin_catalog() {
    harness()
        .arg("--list")
        .assert()
        .success()
        .stdout(contains("halt_bug").and(contains("cpu_instrs")).and(contains("mem_timing-2")));
}

#[test]
fn list_json_is_machine_readable() {
    let output = harness()
        .args(["--list", "--json", "--filter", "sound"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let suites: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let suites = suites.as_array().unwrap();
    assert_eq!(suites.len(), 1);
    assert_eq!(suites[0]["name"], "dmg_sound");
    assert_eq!(suites[0]["kind"], "memory");
    assert_eq!(suites[0]["individual_roms"].as_array().unwrap().len(), 12);
}

#[test]
fn malformed_catalog_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("bad.yaml"), "- name: x\n  kind: video\n  rom: a.gb\n").unwrap();

    harness()
        .current_dir(dir.path())
        .args(["--suites", "bad.yaml", "--list"])
        .assert()
        .failure()
        .stderr(contains("failed to parse suite catalog"));
}
