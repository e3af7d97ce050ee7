//! Explicit per-step context.
//!
//! Every hook and test receives a [`TestContext`] instead of reading ambient "current test" state. Writes made through
//! it go straight to the capture buffer of the running test, so they never depend on the process-wide console slot.

use std::fmt;
use std::sync::Arc;

use crate::capture::CaptureBuffer;
use crate::console;
use crate::model::TestId;

#[derive(Clone)]
pub struct TestContext {
    fixture: String,
    test: Option<TestId>,
    sink: Option<Arc<CaptureBuffer>>,
}

impl TestContext {
    /// Context for one-time hooks of `fixture`.
    pub fn new(fixture: impl Into<String>) -> Self {
        Self {
            fixture: fixture.into(),
            test: None,
            sink: None,
        }
    }

    /// Context for the per-test steps of `test`.
    pub fn for_test(fixture: impl Into<String>, test: TestId) -> Self {
        Self {
            test: Some(test),
            ..Self::new(fixture)
        }
    }

    /// Route writes into `sink` instead of the console channels.
    pub fn with_sink(mut self, sink: Arc<CaptureBuffer>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn fixture_name(&self) -> &str {
        &self.fixture
    }

    /// The running test; `None` inside one-time hooks.
    pub fn test(&self) -> Option<&TestId> {
        self.test.as_ref()
    }

    pub fn write(&self, text: &str) {
        match &self.sink {
            Some(sink) => sink.append(text),
            None => console::write_stdout(text),
        }
    }

    pub fn write_line(&self, text: &str) {
        self.write(&format!("{text}\n"));
    }

    pub fn write_fmt(&self, args: fmt::Arguments<'_>) {
        self.write(&args.to_string());
    }
}

impl fmt::Debug for TestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestContext")
            .field("fixture", &self.fixture)
            .field("test", &self.test)
            .field("captured", &self.sink.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_go_to_sink() {
        let sink = Arc::new(CaptureBuffer::new(None));
        let ctx = TestContext::new("demo::Fixture").with_sink(sink.clone());
        ctx.write_line("A");
        ctx.write("B");
        write!(ctx, "{}", 1);
        assert_eq!(sink.text(), "A\nB1");
        assert!(ctx.test().is_none());
    }

    #[test]
    fn test_for_test_carries_id() {
        let id = TestId {
            fully_qualified_name: "demo::Fixture.works".to_string(),
            display_name: "works".to_string(),
            source: "demo".to_string(),
        };
        let ctx = TestContext::for_test("demo::Fixture", id.clone());
        assert_eq!(ctx.test(), Some(&id));
        assert_eq!(ctx.fixture_name(), "demo::Fixture");
    }
}
