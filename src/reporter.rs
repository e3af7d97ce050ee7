//! Result sinks.
//!
//! The executor never prints. Everything it observes goes through a [`TestReporter`], which lets the harness choose
//! between pytest-style console output, JSON Lines for tooling, or an in-memory log for hosts and tests.

use std::io::{self, Write};

use serde_json::{Value, json};

use crate::discovery::DiscoveryWarning;
use crate::error::StepError;
use crate::executor::CancellationHandle;
use crate::model::{Outcome, TestId, TestResult, TestSummary};

// ============================================================================
// Test Reporter Trait
// ============================================================================

/// Trait for reporting test execution events.
///
/// Implement this trait to customize output (JUnit XML, TAP, an IDE protocol, ...).
pub trait TestReporter {
    /// Called for each non-fatal discovery problem
    fn on_discovery_warning(&mut self, _warning: &DiscoveryWarning) {}

    /// Called when test collection is complete
    fn on_collection_complete(&mut self, _test_count: usize) {}

    /// Called before the steps of a test run
    fn on_test_start(&mut self, _test: &TestId) {}

    /// Called exactly once per started test
    fn on_test_result(&mut self, result: &TestResult);

    /// Called after the result of a test was published
    fn on_test_end(&mut self, _test: &TestId) {}

    /// Called with the output captured while a one-time hook ran
    fn on_fixture_output(&mut self, _fixture: &str, _output: &str) {}

    /// Called when a one-time teardown fails; published results are unaffected
    fn on_fixture_teardown_failed(&mut self, _fixture: &str, _error: &StepError) {}

    /// Called when all tests have completed
    fn on_run_complete(&mut self, _summary: &TestSummary) {}
}

impl<R: TestReporter + ?Sized> TestReporter for &mut R {
    fn on_discovery_warning(&mut self, warning: &DiscoveryWarning) {
        (**self).on_discovery_warning(warning);
    }

    fn on_collection_complete(&mut self, test_count: usize) {
        (**self).on_collection_complete(test_count);
    }

    fn on_test_start(&mut self, test: &TestId) {
        (**self).on_test_start(test);
    }

    fn on_test_result(&mut self, result: &TestResult) {
        (**self).on_test_result(result);
    }

    fn on_test_end(&mut self, test: &TestId) {
        (**self).on_test_end(test);
    }

    fn on_fixture_output(&mut self, fixture: &str, output: &str) {
        (**self).on_fixture_output(fixture, output);
    }

    fn on_fixture_teardown_failed(&mut self, fixture: &str, error: &StepError) {
        (**self).on_fixture_teardown_failed(fixture, error);
    }

    fn on_run_complete(&mut self, summary: &TestSummary) {
        (**self).on_run_complete(summary);
    }
}

// ============================================================================
// Console
// ============================================================================

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const BOLD_RED: &str = "\x1b[1;31m";
const BOLD_GREEN: &str = "\x1b[1;32m";
const RESET: &str = "\x1b[0m";

struct FailureReport {
    name: String,
    source: String,
    message: String,
    trace: Option<String>,
    stdout: Option<String>,
}

/// Default console reporter (pytest-style)
pub struct ConsoleReporter<W: Write = io::Stdout> {
    out: W,
    verbose: bool,
    color: bool,
    failures: Vec<FailureReport>,
}

impl ConsoleReporter {
    pub fn new(verbose: bool) -> Self {
        Self::with_writer(io::stdout(), verbose, true)
    }
}

impl<W: Write> ConsoleReporter<W> {
    pub fn with_writer(out: W, verbose: bool, color: bool) -> Self {
        Self {
            out,
            verbose,
            color,
            failures: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.color {
            format!("{color}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    // Console output is best effort: a closed pipe must not abort the run.
    fn line(&mut self, text: &str) {
        let _ = writeln!(self.out, "{text}");
    }

    fn status(&self, result: &TestResult) -> String {
        let label = match result.outcome {
            Outcome::Passed => self.paint(GREEN, "PASSED"),
            Outcome::Failed => self.paint(RED, "FAILED"),
            Outcome::Error => self.paint(RED, "ERROR"),
            Outcome::NotRun => self.paint(YELLOW, "NOT RUN"),
            Outcome::Skipped => {
                let label = self.paint(YELLOW, "SKIPPED");
                return match &result.error_message {
                    Some(reason) if !reason.is_empty() => format!("{label} ({reason})"),
                    _ => label,
                };
            }
        };
        if self.verbose {
            format!("{label} ({}ms)", result.duration.as_millis())
        } else {
            label
        }
    }
}

impl<W: Write> TestReporter for ConsoleReporter<W> {
    fn on_discovery_warning(&mut self, warning: &DiscoveryWarning) {
        let text = self.paint(YELLOW, &format!("warning: {warning}"));
        self.line(&text);
    }

    fn on_collection_complete(&mut self, test_count: usize) {
        let header = self.paint(BOLD, "=================== test session starts ===================");
        self.line(&header);
        if test_count == 0 {
            self.line("No tests collected");
        } else {
            self.line(&format!("collected {test_count} item(s)"));
        }
        self.line("");
    }

    fn on_test_result(&mut self, result: &TestResult) {
        let status = self.status(result);
        self.line(&format!("{} {status}", result.test.fully_qualified_name));

        if result.outcome.is_failure() {
            self.failures.push(FailureReport {
                name: result.test.display_name.clone(),
                source: result.test.source.clone(),
                message: result.error_message.clone().unwrap_or_default(),
                trace: result.error_trace.clone(),
                stdout: result.stdout.clone(),
            });
        }
    }

    fn on_fixture_output(&mut self, fixture: &str, output: &str) {
        if !self.verbose {
            return;
        }
        self.line(&format!("[{fixture}]"));
        for line in output.lines() {
            self.line(&format!("    {line}"));
        }
    }

    fn on_fixture_teardown_failed(&mut self, fixture: &str, error: &StepError) {
        let text = self.paint(RED, &format!("ERROR in one-time teardown of {fixture}: {error}"));
        self.line(&text);
    }

    fn on_run_complete(&mut self, summary: &TestSummary) {
        let failures = std::mem::take(&mut self.failures);
        if !failures.is_empty() {
            self.line("");
            let header = self.paint(BOLD_RED, "=================== FAILURES ===================");
            self.line(&header);
            for failure in failures {
                self.line("");
                let title = self.paint(BOLD, &format!("___________ {} ___________", failure.name));
                self.line(&title);
                self.line("");
                self.line(&format!("    {}", failure.message));
                if let Some(trace) = &failure.trace {
                    for line in trace.lines() {
                        self.line(&format!("    {line}"));
                    }
                }
                if let Some(stdout) = &failure.stdout {
                    self.line("");
                    self.line("    ----- Captured output -----");
                    for line in stdout.lines() {
                        self.line(&format!("    {line}"));
                    }
                }
                self.line("");
                self.line(&format!("    in {}", failure.source));
            }
        }

        self.line("");
        let color = if summary.is_success() { BOLD_GREEN } else { BOLD_RED };
        let text = format!(
            "=================== {} in {:.2}s ===================",
            summary.counts_line(),
            summary.duration.as_secs_f64()
        );
        let text = self.paint(color, &text);
        self.line(&text);
        let _ = self.out.flush();
    }
}

// ============================================================================
// JSON Lines
// ============================================================================

/// Writes one JSON object per event, one per line.
pub struct JsonReporter<W: Write = io::Stdout> {
    out: W,
}

impl JsonReporter {
    pub fn new() -> Self {
        Self::with_writer(io::stdout())
    }
}

impl Default for JsonReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> JsonReporter<W> {
    pub fn with_writer(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, event: Value) {
        let _ = writeln!(self.out, "{event}");
    }
}

fn test_json(test: &TestId) -> Value {
    json!({
        "name": test.fully_qualified_name,
        "display_name": test.display_name,
        "source": test.source,
    })
}

impl<W: Write> TestReporter for JsonReporter<W> {
    fn on_discovery_warning(&mut self, warning: &DiscoveryWarning) {
        self.emit(json!({ "event": "discovery_warning", "message": warning.to_string() }));
    }

    fn on_collection_complete(&mut self, test_count: usize) {
        self.emit(json!({ "event": "collection_complete", "count": test_count }));
    }

    fn on_test_start(&mut self, test: &TestId) {
        self.emit(json!({ "event": "test_start", "test": test_json(test) }));
    }

    fn on_test_result(&mut self, result: &TestResult) {
        self.emit(json!({
            "event": "test_result",
            "test": test_json(&result.test),
            "outcome": result.outcome.as_str(),
            "duration_ms": result.duration.as_secs_f64() * 1000.0,
            "message": result.error_message,
            "trace": result.error_trace,
            "stdout": result.stdout,
        }));
    }

    fn on_test_end(&mut self, test: &TestId) {
        self.emit(json!({ "event": "test_end", "test": test_json(test) }));
    }

    fn on_fixture_output(&mut self, fixture: &str, output: &str) {
        self.emit(json!({ "event": "fixture_output", "fixture": fixture, "output": output }));
    }

    fn on_fixture_teardown_failed(&mut self, fixture: &str, error: &StepError) {
        self.emit(json!({
            "event": "fixture_teardown_failed",
            "fixture": fixture,
            "message": error.message(),
            "trace": error.trace(),
        }));
    }

    fn on_run_complete(&mut self, summary: &TestSummary) {
        self.emit(json!({
            "event": "run_complete",
            "total": summary.total,
            "passed": summary.passed,
            "failed": summary.failed,
            "skipped": summary.skipped,
            "fixture_errors": summary.fixture_errors,
            "duration_ms": summary.duration.as_secs_f64() * 1000.0,
        }));
        let _ = self.out.flush();
    }
}

// ============================================================================
// Recording
// ============================================================================

/// One observed reporter call.
#[derive(Debug, Clone)]
pub enum ReportEvent {
    DiscoveryWarning(DiscoveryWarning),
    CollectionComplete(usize),
    TestStart(TestId),
    TestResult(TestResult),
    TestEnd(TestId),
    FixtureOutput { fixture: String, output: String },
    FixtureTeardownFailed { fixture: String, message: String },
    RunComplete(TestSummary),
}

/// Keeps every event in memory, in order.
#[derive(Debug, Default, Clone)]
pub struct RecordingReporter {
    events: Vec<ReportEvent>,
}

impl RecordingReporter {
    pub fn events(&self) -> &[ReportEvent] {
        &self.events
    }

    pub fn results(&self) -> Vec<&TestResult> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ReportEvent::TestResult(result) => Some(result),
                _ => None,
            })
            .collect()
    }

    /// Result for `name` (fully qualified or display name).
    pub fn result(&self, name: &str) -> Option<&TestResult> {
        self.results()
            .into_iter()
            .find(|result| result.test.fully_qualified_name == name || result.test.display_name == name)
    }

    pub fn warnings(&self) -> Vec<&DiscoveryWarning> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ReportEvent::DiscoveryWarning(warning) => Some(warning),
                _ => None,
            })
            .collect()
    }

    /// `(fixture, message)` for every failed one-time teardown.
    pub fn teardown_failures(&self) -> Vec<(&str, &str)> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ReportEvent::FixtureTeardownFailed { fixture, message } => Some((fixture.as_str(), message.as_str())),
                _ => None,
            })
            .collect()
    }
}

impl TestReporter for RecordingReporter {
    fn on_discovery_warning(&mut self, warning: &DiscoveryWarning) {
        self.events.push(ReportEvent::DiscoveryWarning(warning.clone()));
    }

    fn on_collection_complete(&mut self, test_count: usize) {
        self.events.push(ReportEvent::CollectionComplete(test_count));
    }

    fn on_test_start(&mut self, test: &TestId) {
        self.events.push(ReportEvent::TestStart(test.clone()));
    }

    fn on_test_result(&mut self, result: &TestResult) {
        self.events.push(ReportEvent::TestResult(result.clone()));
    }

    fn on_test_end(&mut self, test: &TestId) {
        self.events.push(ReportEvent::TestEnd(test.clone()));
    }

    fn on_fixture_output(&mut self, fixture: &str, output: &str) {
        self.events.push(ReportEvent::FixtureOutput {
            fixture: fixture.to_string(),
            output: output.to_string(),
        });
    }

    fn on_fixture_teardown_failed(&mut self, fixture: &str, error: &StepError) {
        self.events.push(ReportEvent::FixtureTeardownFailed {
            fixture: fixture.to_string(),
            message: error.message(),
        });
    }

    fn on_run_complete(&mut self, summary: &TestSummary) {
        self.events.push(ReportEvent::RunComplete(summary.clone()));
    }
}

// ============================================================================
// Fail fast
// ============================================================================

/// Forwards to `R` and requests cancellation after the first failed test.
pub struct FailFast<R> {
    inner: R,
    cancel: CancellationHandle,
}

impl<R: TestReporter> FailFast<R> {
    pub fn new(inner: R, cancel: CancellationHandle) -> Self {
        Self { inner, cancel }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: TestReporter> TestReporter for FailFast<R> {
    fn on_discovery_warning(&mut self, warning: &DiscoveryWarning) {
        self.inner.on_discovery_warning(warning);
    }

    fn on_collection_complete(&mut self, test_count: usize) {
        self.inner.on_collection_complete(test_count);
    }

    fn on_test_start(&mut self, test: &TestId) {
        self.inner.on_test_start(test);
    }

    fn on_test_result(&mut self, result: &TestResult) {
        self.inner.on_test_result(result);
        if result.outcome.is_failure() {
            self.cancel.cancel();
        }
    }

    fn on_test_end(&mut self, test: &TestId) {
        self.inner.on_test_end(test);
    }

    fn on_fixture_output(&mut self, fixture: &str, output: &str) {
        self.inner.on_fixture_output(fixture, output);
    }

    fn on_fixture_teardown_failed(&mut self, fixture: &str, error: &StepError) {
        self.inner.on_fixture_teardown_failed(fixture, error);
    }

    fn on_run_complete(&mut self, summary: &TestSummary) {
        self.inner.on_run_complete(summary);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn id(name: &str) -> TestId {
        TestId {
            fully_qualified_name: format!("demo::Calc.{name}"),
            display_name: name.to_string(),
            source: "demo".to_string(),
        }
    }

    fn passed(name: &str) -> TestResult {
        TestResult {
            outcome: Outcome::Passed,
            duration: Duration::from_millis(3),
            ..TestResult::new(id(name))
        }
    }

    fn console_text(reporter: ConsoleReporter<Vec<u8>>) -> String {
        String::from_utf8(reporter.into_inner()).unwrap()
    }

    #[test]
    fn test_console_pass_line() {
        let mut reporter = ConsoleReporter::with_writer(Vec::new(), false, false);
        reporter.on_test_result(&passed("adds"));
        insta::assert_snapshot!(console_text(reporter), @"demo::Calc.adds PASSED");
    }

    #[test]
    fn test_console_verbose_skip_and_summary() {
        let mut reporter = ConsoleReporter::with_writer(Vec::new(), true, false);
        reporter.on_test_result(&passed("adds"));
        reporter.on_test_result(&TestResult {
            outcome: Outcome::Skipped,
            error_message: Some("flaky".to_string()),
            ..TestResult::new(id("divides"))
        });
        reporter.on_run_complete(&TestSummary {
            total: 2,
            passed: 1,
            skipped: 1,
            ..TestSummary::default()
        });
        insta::assert_snapshot!(console_text(reporter), @r"
        demo::Calc.adds PASSED (3ms)
        demo::Calc.divides SKIPPED (flaky)

        =================== 1 passed, 1 skipped in 0.00s ===================
        ");
    }

    #[test]
    fn test_console_failures_section_includes_output() {
        let mut reporter = ConsoleReporter::with_writer(Vec::new(), false, false);
        reporter.on_test_result(&TestResult {
            stdout: Some("computing\n".to_string()),
            ..TestResult::failed(id("divides"), "Expected true but was false.", None)
        });
        reporter.on_run_complete(&TestSummary {
            total: 1,
            failed: 1,
            ..TestSummary::default()
        });
        let text = console_text(reporter);
        assert!(text.contains("FAILURES"));
        assert!(text.contains("___________ divides ___________"));
        assert!(text.contains("    Expected true but was false."));
        assert!(text.contains("    computing"));
        assert!(text.contains("1 failed in"));
    }

    #[test]
    fn test_json_lines() {
        let mut reporter = JsonReporter::with_writer(Vec::new());
        reporter.on_test_start(&id("adds"));
        reporter.on_test_result(&passed("adds"));
        let text = String::from_utf8(reporter.into_inner()).unwrap();
        let lines: Vec<Value> = text.lines().map(|line| serde_json::from_str(line).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "test_start");
        assert_eq!(lines[1]["outcome"], "passed");
        assert_eq!(lines[1]["test"]["name"], "demo::Calc.adds");
        assert!(lines[1]["stdout"].is_null());
    }

    #[test]
    fn test_fail_fast_cancels_on_failure() {
        let handle = CancellationHandle::default();
        let mut reporter = FailFast::new(RecordingReporter::default(), handle.clone());
        reporter.on_test_result(&passed("adds"));
        assert!(!handle.is_cancelled());
        reporter.on_test_result(&TestResult::failed(id("divides"), "boom", None));
        assert!(handle.is_cancelled());
        assert_eq!(reporter.into_inner().results().len(), 2);
    }

    #[test]
    fn test_recording_lookup() {
        let mut reporter = RecordingReporter::default();
        reporter.on_test_result(&passed("adds"));
        assert!(reporter.result("adds").is_some());
        assert!(reporter.result("demo::Calc.adds").is_some());
        assert!(reporter.result("missing").is_none());
    }
}
