//! JUnit-style report accumulation and serialization.
//!
//! The document shape is:
//!
//! ```text
//! testsuites(name, time)
//! └── testsuite(name, tests, time, failures, errors)
//!     └── testcase(name, classname, time)
//!         ├── system-out
//!         ├── system-err
//!         └── failure | error   (only for non-passing cases)
//! ```

use std::fmt;
use std::io::Write as _;
use std::path::Path;
use std::time::Duration;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use tempfile::NamedTempFile;
use tracing::info;

use crate::classify::Outcome;
use crate::error::{HarnessError, Result};

/// Name of the root `testsuites` element.
pub const REPORT_NAME: &str = "rom-test-results";

// =============================================================================
// CORE TYPES
// =============================================================================

/// One executed ROM as it appears in the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseRecord {
    pub test_name: String,
    pub outcome: Outcome,
    pub stdout_text: String,
    pub stderr_text: String,
    pub elapsed: Duration,
}

/// Accumulated state for one suite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteResult {
    pub name: String,
    pub total_cases: usize,
    pub cases: Vec<CaseRecord>,
    pub failures: usize,
    pub errors: usize,
}

impl SuiteResult {
    pub fn elapsed(&self) -> Duration {
        self.cases.iter().map(|c| c.elapsed).sum()
    }
}

/// Opaque reference to a suite opened with [`ReportBuilder::begin_suite`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuiteHandle(usize);

/// Collects suite and case results, then writes them out as one document.
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    name: String,
    suites: Vec<SuiteResult>,
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self::new(REPORT_NAME)
    }
}

impl ReportBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            suites: Vec::new(),
        }
    }

    /// Opens a suite record. Counters stay at zero until [`Self::end_suite`].
    pub fn begin_suite(&mut self, name: impl Into<String>, total_cases: usize) -> SuiteHandle {
        self.suites.push(SuiteResult {
            name: name.into(),
            total_cases,
            cases: Vec::new(),
            failures: 0,
            errors: 0,
        });
        SuiteHandle(self.suites.len() - 1)
    }

    pub fn add_case(&mut self, suite: SuiteHandle, case: CaseRecord) {
        self.suites[suite.0].cases.push(case);
    }

    pub fn end_suite(&mut self, suite: SuiteHandle, failures: usize, errors: usize) {
        let record = &mut self.suites[suite.0];
        debug_assert!(failures + errors <= record.total_cases);
        record.failures = failures;
        record.errors = errors;
    }

    /// Suites in the order they were opened.
    pub fn suites(&self) -> &[SuiteResult] {
        &self.suites
    }

    /// Renders the whole document.
    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        self.write_document(&mut writer)?;
        String::from_utf8(writer.into_inner()).map_err(encode_error)
    }

    /// Writes the document to `path`, replacing any existing file.
    ///
    /// The content goes to a temporary file next to `path` and is renamed into
    /// place, so readers see either the old file or the complete new one.
    pub fn serialize(&self, path: &Path) -> Result<()> {
        let xml = self.to_xml()?;
        let write_error = |source: std::io::Error| HarnessError::ReportWrite {
            path: path.to_path_buf(),
            source,
        };

        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir).map_err(write_error)?;
        tmp.write_all(xml.as_bytes()).map_err(write_error)?;
        tmp.as_file().sync_all().map_err(write_error)?;
        tmp.persist(path).map_err(|e| write_error(e.error))?;

        info!(path = %path.display(), suites = self.suites.len(), "report written");
        Ok(())
    }

    // =========================================================================
    // XML WRITING
    // =========================================================================

    fn write_document(&self, w: &mut Writer<Vec<u8>>) -> Result<()> {
        emit(w, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let total: Duration = self.suites.iter().map(SuiteResult::elapsed).sum();
        let time = seconds(total);
        emit(w, Event::Start(
            BytesStart::new("testsuites")
                .with_attributes([("name", self.name.as_str()), ("time", time.as_str())]),
        ))?;
        for suite in &self.suites {
            write_suite(w, suite)?;
        }
        emit(w, Event::End(BytesEnd::new("testsuites")))
    }
}

fn write_suite(w: &mut Writer<Vec<u8>>, suite: &SuiteResult) -> Result<()> {
    let tests = suite.total_cases.to_string();
    let time = seconds(suite.elapsed());
    let failures = suite.failures.to_string();
    let errors = suite.errors.to_string();
    emit(w, Event::Start(BytesStart::new("testsuite").with_attributes([
        ("name", suite.name.as_str()),
        ("tests", tests.as_str()),
        ("time", time.as_str()),
        ("failures", failures.as_str()),
        ("errors", errors.as_str()),
    ])))?;
    for case in &suite.cases {
        write_case(w, case)?;
    }
    emit(w, Event::End(BytesEnd::new("testsuite")))
}

fn write_case(w: &mut Writer<Vec<u8>>, case: &CaseRecord) -> Result<()> {
    let time = seconds(case.elapsed);
    emit(w, Event::Start(BytesStart::new("testcase").with_attributes([
        ("name", case.test_name.as_str()),
        ("classname", case.test_name.as_str()),
        ("time", time.as_str()),
    ])))?;

    // Raw output is kept in quoted, escaped form so control characters and
    // trailing whitespace survive CI viewers.
    write_text_element(w, "system-out", &quoted(&case.stdout_text))?;
    write_text_element(w, "system-err", &quoted(&case.stderr_text))?;

    match case.outcome {
        Outcome::Pass => {}
        Outcome::Failure => write_text_element(w, "failure", &sanitize_xml_text(&case.stdout_text))?,
        Outcome::Error => write_text_element(w, "error", &sanitize_xml_text(&case.stderr_text))?,
    }

    emit(w, Event::End(BytesEnd::new("testcase")))
}

fn write_text_element(w: &mut Writer<Vec<u8>>, tag: &str, text: &str) -> Result<()> {
    emit(w, Event::Start(BytesStart::new(tag)))?;
    emit(w, Event::Text(BytesText::new(text)))?;
    emit(w, Event::End(BytesEnd::new(tag)))
}

fn emit(w: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    w.write_event(event).map_err(encode_error)
}

/// Replaces characters XML 1.0 cannot carry, such as NUL or the ESC of an
/// ANSI colour code, with U+FFFD.
pub fn sanitize_xml_text(text: &str) -> String {
    text.chars()
        .map(|c| if is_xml_char(c) { c } else { char::REPLACEMENT_CHARACTER })
        .collect()
}

fn is_xml_char(c: char) -> bool {
    matches!(c,
        '\u{9}' | '\u{A}' | '\u{D}'
        | '\u{20}'..='\u{D7FF}'
        | '\u{E000}'..='\u{FFFD}'
        | '\u{10000}'..='\u{10FFFF}')
}

fn quoted(text: &str) -> String {
    format!("{text:?}")
}

fn seconds(d: Duration) -> String {
    format!("{:.3}", d.as_secs_f64())
}

fn encode_error(e: impl fmt::Display) -> HarnessError {
    HarnessError::ReportEncode {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case(name: &str, outcome: Outcome, stdout: &str, stderr: &str) -> CaseRecord {
        CaseRecord {
            test_name: name.to_string(),
            outcome,
            stdout_text: stdout.to_string(),
            stderr_text: stderr.to_string(),
            elapsed: Duration::from_millis(250),
        }
    }

    #[test]
    fn passing_case_has_no_detail_node() {
        let mut report = ReportBuilder::default();
        let suite = report.begin_suite("halt_bug", 1);
        report.add_case(suite, case("halt_bug.gb", Outcome::Pass, "Passed\n", ""));
        report.end_suite(suite, 0, 0);

        let xml = report.to_xml().unwrap();
        assert!(xml.contains(r#"<testsuites name="rom-test-results" time="0.250">"#));
        assert!(xml.contains(
            r#"<testsuite name="halt_bug" tests="1" time="0.250" failures="0" errors="0">"#
        ));
        assert!(xml.contains(r#"<testcase name="halt_bug.gb" classname="halt_bug.gb" time="0.250">"#));
        assert!(xml.contains(r#"Passed\n"#));
        assert!(xml.contains("<system-out>"));
        assert!(xml.contains("<system-err>"));
        assert!(!xml.contains("<failure"));
        assert!(!xml.contains("<error"));
    }

    #[test]
    fn failure_node_carries_stdout() {
        let mut report = ReportBuilder::default();
        let suite = report.begin_suite("cpu_instrs", 1);
        report.add_case(suite, case("cpu_instrs/01.gb", Outcome::Failure, "Test 3: Failed", "noise"));
        report.end_suite(suite, 1, 0);

        let xml = report.to_xml().unwrap();
        assert!(xml.contains("<failure>Test 3: Failed</failure>"));
        assert!(xml.contains(r#"failures="1" errors="0""#));
    }

    #[test]
    fn error_node_carries_stderr_escaped() {
        let mut report = ReportBuilder::default();
        let suite = report.begin_suite("oam_bug", 1);
        report.add_case(suite, case("oam_bug/1.gb", Outcome::Error, "", "signature <BAD> & gone"));
        report.end_suite(suite, 0, 1);

        let xml = report.to_xml().unwrap();
        assert!(xml.contains("<error>signature &lt;BAD&gt; &amp; gone</error>"));
        assert!(!xml.contains("<failure"));
        assert!(xml.contains(r#"failures="0" errors="1""#));
    }

    #[test]
    fn control_characters_in_detail_text_stay_well_formed() {
        let mut report = ReportBuilder::default();
        let suite = report.begin_suite("cpu_instrs", 2);
        report.add_case(suite, case("cpu_instrs/01.gb", Outcome::Failure, "\x1b[31m01:Failed\x1b[0m\x00", ""));
        report.add_case(suite, case("cpu_instrs/02.gb", Outcome::Error, "", "bell\x07 vt\x0b"));
        report.end_suite(suite, 1, 1);

        let xml = report.to_xml().unwrap();
        assert!(xml.chars().all(is_xml_char));
        assert!(xml.contains("<failure>\u{fffd}[31m01:Failed\u{fffd}[0m\u{fffd}</failure>"));
        assert!(xml.contains("<error>bell\u{fffd} vt\u{fffd}</error>"));

        let mut reader = quick_xml::Reader::from_str(&xml);
        let mut failure = None;
        let mut in_failure = false;
        loop {
            match reader.read_event().unwrap() {
                Event::Start(e) if e.name().as_ref() == b"failure" => in_failure = true,
                Event::Text(t) if in_failure => failure = Some(t.unescape().unwrap().into_owned()),
                Event::End(e) if e.name().as_ref() == b"failure" => in_failure = false,
                Event::Eof => break,
                _ => {}
            }
        }
        assert_eq!(failure.as_deref(), Some("\u{fffd}[31m01:Failed\u{fffd}[0m\u{fffd}"));
    }

    #[test]
    fn sanitize_keeps_whitespace_and_non_ascii() {
        assert_eq!(sanitize_xml_text("a\tb\r\nc é 🎮"), "a\tb\r\nc é 🎮");
        assert_eq!(sanitize_xml_text("\u{0}\u{1f}\u{fffe}"), "\u{fffd}\u{fffd}\u{fffd}");
    }

    #[test]
    fn suites_keep_insertion_order() {
        let mut report = ReportBuilder::default();
        for name in ["b", "a", "c"] {
            let suite = report.begin_suite(name, 1);
            report.add_case(suite, case(name, Outcome::Pass, "", ""));
            report.end_suite(suite, 0, 0);
        }
        let xml = report.to_xml().unwrap();
        let b = xml.find(r#"testsuite name="b""#).unwrap();
        let a = xml.find(r#"testsuite name="a""#).unwrap();
        let c = xml.find(r#"testsuite name="c""#).unwrap();
        assert!(b < a && a < c);
    }

    #[test]
    fn serialize_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("JUnit.xml");
        std::fs::write(&path, "stale").unwrap();

        let mut report = ReportBuilder::default();
        let suite = report.begin_suite("halt_bug", 1);
        report.add_case(suite, case("halt_bug.gb", Outcome::Pass, "", ""));
        report.end_suite(suite, 0, 0);
        report.serialize(&path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("<?xml"));
        assert!(written.contains(r#"name="halt_bug""#));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn serialize_into_missing_directory_fails_loudly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("JUnit.xml");
        let err = ReportBuilder::default().serialize(&path).unwrap_err();
        assert!(matches!(err, HarnessError::ReportWrite { .. }));
        assert!(!path.exists());
    }
}
