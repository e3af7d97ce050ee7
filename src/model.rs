//! Test-case descriptors and result records.
//!
//! A [`TestCase`] is created once at discovery time and never mutated. A [`TestResult`] is created when a case
//! starts executing and published exactly once, with an outcome other than [`Outcome::NotRun`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::fixture::{FixtureType, MethodEntry};

/// Identity of a test: what hosts and reporters need without the runnable handles.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TestId {
    /// `path::Type.method`, unique within a source.
    pub fully_qualified_name: String,
    /// Explicit `#[test(name = "...")]` override, else the method name.
    pub display_name: String,
    /// The module the test was discovered in (crate name for registered fixtures).
    pub source: String,
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fully_qualified_name)
    }
}

/// A discovered, runnable test.
#[derive(Clone)]
pub struct TestCase {
    id: TestId,
    fixture: Arc<FixtureType>,
    method: MethodEntry,
}

impl TestCase {
    pub(crate) fn new(source: &str, fixture: Arc<FixtureType>, method: usize) -> Option<Self> {
        let method = fixture.methods().get(method)?.clone();
        let id = TestId {
            fully_qualified_name: format!("{}.{}", fixture.name(), method.name()),
            display_name: method.display_name().unwrap_or(method.name()).to_string(),
            source: source.to_string(),
        };
        Some(Self { id, fixture, method })
    }

    pub fn id(&self) -> &TestId {
        &self.id
    }

    pub fn fully_qualified_name(&self) -> &str {
        &self.id.fully_qualified_name
    }

    pub fn display_name(&self) -> &str {
        &self.id.display_name
    }

    pub fn source(&self) -> &str {
        &self.id.source
    }

    /// Handle to the fixture type that declares this test.
    pub fn fixture(&self) -> &Arc<FixtureType> {
        &self.fixture
    }

    /// The test method this case runs.
    pub fn method(&self) -> &MethodEntry {
        &self.method
    }

    /// Reason from `#[test(skip = "...")]`, if any.
    pub fn skip_reason(&self) -> Option<&str> {
        self.method.skip_reason()
    }
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase")
            .field("id", &self.id)
            .field("fixture", &self.fixture.name())
            .field("method", &self.method.name())
            .finish()
    }
}

/// Outcome of one executed test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Outcome {
    Passed,
    Failed,
    Skipped,
    #[default]
    NotRun,
    Error,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Passed => "passed",
            Outcome::Failed => "failed",
            Outcome::Skipped => "skipped",
            Outcome::NotRun => "not-run",
            Outcome::Error => "error",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed | Outcome::Error)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of running a single test
#[derive(Debug, Clone)]
pub struct TestResult {
    pub test: TestId,
    pub outcome: Outcome,
    pub error_message: Option<String>,
    pub error_trace: Option<String>,
    pub duration: Duration,
    /// Captured output; absent when the test wrote nothing but whitespace.
    pub stdout: Option<String>,
}

impl TestResult {
    pub fn new(test: TestId) -> Self {
        Self {
            test,
            outcome: Outcome::NotRun,
            error_message: None,
            error_trace: None,
            duration: Duration::ZERO,
            stdout: None,
        }
    }

    /// A result that never ran its steps and failed with `message`.
    pub fn failed(test: TestId, message: impl Into<String>, trace: Option<String>) -> Self {
        Self {
            outcome: Outcome::Failed,
            error_message: Some(message.into()),
            error_trace: trace,
            ..Self::new(test)
        }
    }
}

/// Summary of test run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub fixture_errors: usize,
    pub duration: Duration,
}

impl TestSummary {
    pub fn record(&mut self, result: &TestResult) {
        self.total += 1;
        match result.outcome {
            Outcome::Passed => self.passed += 1,
            Outcome::Failed | Outcome::Error => self.failed += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::NotRun => {}
        }
    }

    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a TestResult>, duration: Duration) -> Self {
        let mut summary = Self {
            duration,
            ..Self::default()
        };
        for result in results {
            summary.record(result);
        }
        summary
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.fixture_errors == 0
    }

    /// `2 passed, 1 failed, 1 skipped` (zero counts omitted).
    pub fn counts_line(&self) -> String {
        let mut parts = Vec::new();
        if self.passed > 0 {
            parts.push(format!("{} passed", self.passed));
        }
        if self.failed > 0 {
            parts.push(format!("{} failed", self.failed));
        }
        if self.skipped > 0 {
            parts.push(format!("{} skipped", self.skipped));
        }
        if self.fixture_errors > 0 {
            parts.push(format!("{} fixture error(s)", self.fixture_errors));
        }
        if parts.is_empty() {
            "no tests ran".to_string()
        } else {
            parts.join(", ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> TestId {
        TestId {
            fully_qualified_name: format!("demo::Fixture.{name}"),
            display_name: name.to_string(),
            source: "demo".to_string(),
        }
    }

    #[test]
    fn test_new_result_is_not_run() {
        let result = TestResult::new(id("a"));
        assert_eq!(result.outcome, Outcome::NotRun);
        assert!(result.stdout.is_none());
    }

    #[test]
    fn test_summary_counts() {
        let mut passed = TestResult::new(id("a"));
        passed.outcome = Outcome::Passed;
        let failed = TestResult::failed(id("b"), "boom", None);
        let mut skipped = TestResult::new(id("c"));
        skipped.outcome = Outcome::Skipped;

        let summary = TestSummary::from_results([&passed, &failed, &skipped], Duration::ZERO);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 1);
        assert!(!summary.is_success());
        insta::assert_snapshot!(summary.counts_line(), @"1 passed, 1 failed, 1 skipped");
    }

    #[test]
    fn test_empty_summary_line() {
        assert_eq!(TestSummary::default().counts_line(), "no tests ran");
        assert!(TestSummary::default().is_success());
    }
}
