//! JUnit XML report model and ingestion.
//!
//! Reports are read with `quick-xml` into a tree of [`Suite`]s. Both report
//! shapes found in CI artifacts are accepted: a `<testsuites>` root wrapping
//! any number of suites, and a bare `<testsuite>` root. Suites may nest.

use crate::error::{Result, TriageError};
use crate::file_utils::collect_xml_reports;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Outcome of a single test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TestStatus {
    #[default]
    Passed,
    Skipped,
    Failed,
    Error,
}

impl TestStatus {
    /// Lowercase name used in CSV exports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `<failure>` or `<error>` element of a test case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestError {
    /// The `message` attribute.
    pub message: String,
    /// The `type` attribute.
    pub kind: String,
    /// Element text, usually a stack trace.
    pub body: String,
}

/// A single `<testcase>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Test {
    pub name: String,
    pub classname: String,
    pub duration: Duration,
    pub status: TestStatus,
    /// Message of the failure, error or skip marker.
    pub message: String,
    pub system_out: String,
    pub system_err: String,
    /// Present when the test failed or errored.
    pub error: Option<TestError>,
}

impl Test {
    /// Creates a passing test.
    pub fn new(name: impl Into<String>, classname: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            classname: classname.into(),
            ..Self::default()
        }
    }

    /// Marks the test as failed with the given message and body.
    pub fn with_failure(mut self, message: impl Into<String>, body: impl Into<String>) -> Self {
        let message = message.into();
        self.status = TestStatus::Failed;
        self.message = message.clone();
        self.error = Some(TestError {
            message,
            kind: String::new(),
            body: body.into(),
        });
        self
    }

    /// True if the test carries a failure or error element.
    pub fn is_failing(&self) -> bool {
        self.error.is_some()
    }
}

/// A `<testsuite>` with its nested suites and test cases.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Suite {
    pub name: String,
    pub suites: Vec<Suite>,
    pub tests: Vec<Test>,
}

impl Suite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// A suite with neither child suites nor tests.
    pub fn is_empty(&self) -> bool {
        self.suites.is_empty() && self.tests.is_empty()
    }
}

/// Which text node of the current test case is being read.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Capture {
    Nothing,
    ErrorBody,
    SystemOut,
    SystemErr,
}

/// Parses one JUnit XML document into its top-level suites.
pub fn parse_report(xml: &str) -> Result<Vec<Suite>> {
    let mut reader = Reader::from_str(xml);
    let mut roots = Vec::new();
    let mut open_suites: Vec<Suite> = Vec::new();
    let mut current: Option<Test> = None;
    let mut capture = Capture::Nothing;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"testsuite" => open_suites.push(suite_from(&e)?),
                b"testcase" => current = Some(test_from(&e)?),
                b"failure" | b"error" | b"skipped" => {
                    if let Some(test) = current.as_mut() {
                        if apply_outcome(test, &e)? {
                            capture = Capture::ErrorBody;
                        }
                    }
                }
                b"system-out" if current.is_some() => capture = Capture::SystemOut,
                b"system-err" if current.is_some() => capture = Capture::SystemErr,
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"testsuite" => {
                    let suite = suite_from(&e)?;
                    attach_suite(&mut open_suites, &mut roots, suite);
                }
                b"testcase" => {
                    let test = test_from(&e)?;
                    attach_test(&mut open_suites, &mut roots, test);
                }
                b"failure" | b"error" | b"skipped" => {
                    if let Some(test) = current.as_mut() {
                        apply_outcome(test, &e)?;
                    }
                }
                _ => {}
            },
            Event::Text(e) => {
                if capture != Capture::Nothing {
                    let text = e.unescape()?;
                    append_captured(current.as_mut(), capture, &text);
                }
            }
            Event::CData(e) => {
                if capture != Capture::Nothing {
                    let bytes = e.into_inner();
                    append_captured(current.as_mut(), capture, &String::from_utf8_lossy(&bytes));
                }
            }
            Event::End(e) => match e.name().as_ref() {
                b"testsuite" => {
                    if let Some(suite) = open_suites.pop() {
                        attach_suite(&mut open_suites, &mut roots, suite);
                    }
                }
                b"testcase" => {
                    if let Some(test) = current.take() {
                        attach_test(&mut open_suites, &mut roots, test);
                    }
                    capture = Capture::Nothing;
                }
                b"failure" | b"error" | b"skipped" | b"system-out" | b"system-err" => {
                    capture = Capture::Nothing;
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if !open_suites.is_empty() || current.is_some() {
        return Err(TriageError::parse_error(
            "report ended inside an open <testsuite> or <testcase>",
        ));
    }

    Ok(roots)
}

/// Reads and parses a single report file.
pub fn parse_report_file(path: &Path) -> Result<Vec<Suite>> {
    let content = fs::read_to_string(path)
        .map_err(|e| TriageError::io_error_with_source("read report", path.to_path_buf(), e))?;
    parse_report(&content).map_err(|err| match err {
        TriageError::ParseError {
            context, source, ..
        } => TriageError::ParseError {
            file: Some(path.to_path_buf()),
            context,
            source,
        },
        other => other,
    })
}

/// Loads every report under `path`: a directory is walked recursively for
/// `*.xml` files, a file is parsed on its own.
#[tracing::instrument(level = "debug")]
pub fn ingest(path: &Path) -> Result<Vec<Suite>> {
    let files = collect_xml_reports(path).map_err(|err| TriageError::IoError {
        operation: format!("collect JUnit reports: {:#}", err),
        path: Some(path.to_path_buf()),
        source: None,
    })?;

    let mut suites = Vec::new();
    for file in &files {
        suites.extend(parse_report_file(file)?);
    }
    tracing::debug!(files = files.len(), suites = suites.len(), "ingested JUnit reports");
    Ok(suites)
}

fn attach_suite(open_suites: &mut [Suite], roots: &mut Vec<Suite>, suite: Suite) {
    match open_suites.last_mut() {
        Some(parent) => parent.suites.push(suite),
        None => roots.push(suite),
    }
}

fn attach_test(open_suites: &mut [Suite], roots: &mut Vec<Suite>, test: Test) {
    match open_suites.last_mut() {
        Some(parent) => parent.tests.push(test),
        None => roots.push(Suite {
            tests: vec![test],
            ..Suite::default()
        }),
    }
}

fn append_captured(test: Option<&mut Test>, capture: Capture, text: &str) {
    let Some(test) = test else {
        return;
    };
    match capture {
        Capture::ErrorBody => {
            if let Some(error) = test.error.as_mut() {
                error.body.push_str(text);
            }
        }
        Capture::SystemOut => test.system_out.push_str(text),
        Capture::SystemErr => test.system_err.push_str(text),
        Capture::Nothing => {}
    }
}

/// Records a failure, error or skip on `test`. Returns whether the element's
/// text belongs to the error body.
fn apply_outcome(test: &mut Test, e: &BytesStart<'_>) -> Result<bool> {
    let message = attribute(e, b"message")?.unwrap_or_default();
    let status = match e.name().as_ref() {
        b"failure" => TestStatus::Failed,
        b"error" => TestStatus::Error,
        _ => {
            test.status = TestStatus::Skipped;
            test.message = message;
            return Ok(false);
        }
    };
    test.status = status;
    test.message = message.clone();
    test.error = Some(TestError {
        message,
        kind: attribute(e, b"type")?.unwrap_or_default(),
        body: String::new(),
    });
    Ok(true)
}

fn suite_from(e: &BytesStart<'_>) -> Result<Suite> {
    Ok(Suite::new(attribute(e, b"name")?.unwrap_or_default()))
}

fn test_from(e: &BytesStart<'_>) -> Result<Test> {
    let mut test = Test::new(
        attribute(e, b"name")?.unwrap_or_default(),
        attribute(e, b"classname")?.unwrap_or_default(),
    );
    test.duration = parse_duration(attribute(e, b"time")?.as_deref());
    Ok(test)
}

fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.as_ref() == key {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// `time` is in seconds; anything unparsable counts as zero.
fn parse_duration(value: Option<&str>) -> Duration {
    value
        .and_then(|v| v.trim().parse::<f64>().ok())
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const NESTED_REPORT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<testsuites>
  <testsuite name="outer">
    <testsuite name="inner">
      <testcase name="TestInner" classname="pkg/inner" time="0.25"/>
    </testsuite>
    <testcase name="TestPass" classname="pkg/outer" time="1.5">
      <system-out>all good</system-out>
    </testcase>
    <testcase name="TestFail" classname="pkg/outer" time="2">
      <failure message="boom" type="assert">stack &amp; trace</failure>
      <system-out>out</system-out>
      <system-err><![CDATA[err <raw>]]></system-err>
    </testcase>
    <testcase name="TestSkip" classname="pkg/outer">
      <skipped message="not today"/>
    </testcase>
    <testcase name="TestError" classname="pkg/outer">
      <error message="crashed"/>
    </testcase>
  </testsuite>
</testsuites>
"#;

    #[test]
    fn test_parse_report_builds_nested_tree() {
        let suites = parse_report(NESTED_REPORT).unwrap();
        assert_eq!(suites.len(), 1);
        let outer = &suites[0];
        assert_eq!(outer.name, "outer");
        assert_eq!(outer.suites.len(), 1);
        assert_eq!(outer.suites[0].name, "inner");
        assert_eq!(outer.suites[0].tests[0].duration, Duration::from_millis(250));
        assert_eq!(outer.tests.len(), 4);
    }

    #[test]
    fn test_parse_report_reads_failure_details() {
        let suites = parse_report(NESTED_REPORT).unwrap();
        let fail = &suites[0].tests[1];
        assert_eq!(fail.name, "TestFail");
        assert_eq!(fail.status, TestStatus::Failed);
        assert_eq!(fail.message, "boom");
        assert_eq!(fail.system_out, "out");
        assert_eq!(fail.system_err, "err <raw>");
        let error = fail.error.as_ref().unwrap();
        assert_eq!(error.kind, "assert");
        assert_eq!(error.body, "stack & trace");
        assert_eq!(fail.duration, Duration::from_secs(2));
    }

    #[test]
    fn test_parse_report_status_for_each_outcome() {
        let suites = parse_report(NESTED_REPORT).unwrap();
        let tests = &suites[0].tests;
        assert_eq!(tests[0].status, TestStatus::Passed);
        assert!(!tests[0].is_failing());
        assert_eq!(tests[2].status, TestStatus::Skipped);
        assert_eq!(tests[2].message, "not today");
        assert!(!tests[2].is_failing());
        assert_eq!(tests[3].status, TestStatus::Error);
        assert!(tests[3].is_failing());
        assert_eq!(tests[3].error.as_ref().unwrap().body, "");
    }

    #[test]
    fn test_parse_report_accepts_bare_testsuite_root() {
        let xml = r#"<testsuite name="solo"><testcase name="a" classname="b"/></testsuite>"#;
        let suites = parse_report(xml).unwrap();
        assert_eq!(suites.len(), 1);
        assert_eq!(suites[0].name, "solo");
        assert_eq!(suites[0].tests[0].name, "a");
    }

    #[test]
    fn test_parse_report_bad_time_is_zero() {
        let xml = r#"<testsuite><testcase name="a" time="soon"/><testcase name="b" time="-1"/></testsuite>"#;
        let suites = parse_report(xml).unwrap();
        assert!(suites[0].tests.iter().all(|t| t.duration == Duration::ZERO));
    }

    #[test]
    fn test_parse_report_rejects_truncated_document() {
        let err = parse_report(r#"<testsuites><testsuite name="x"><testcase name="a">"#).unwrap_err();
        assert_eq!(err.name(), "ParseError");
    }

    #[test]
    fn test_ingest_walks_directory_for_xml_files() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("nested");
        fs::create_dir(&nested).unwrap();
        fs::write(dir.path().join("a.xml"), r#"<testsuite name="a"/>"#).unwrap();
        fs::write(nested.join("b.xml"), r#"<testsuite name="b"/>"#).unwrap();
        fs::write(dir.path().join("notes.txt"), "not a report").unwrap();

        let suites = ingest(dir.path()).unwrap();
        let names: Vec<_> = suites.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_ingest_single_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("report.xml");
        fs::write(&file, NESTED_REPORT).unwrap();
        assert_eq!(ingest(&file).unwrap().len(), 1);
    }

    #[test]
    fn test_ingest_missing_path_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = ingest(&dir.path().join("missing")).unwrap_err();
        assert_eq!(err.name(), "IoError");
    }

    #[test]
    fn test_parse_report_file_names_broken_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("broken.xml");
        fs::write(&file, "<testsuite><testcase></testsuite>").unwrap();
        let err = parse_report_file(&file).unwrap_err();
        assert!(matches!(err, TriageError::ParseError { file: Some(f), .. } if f == file));
    }
}
