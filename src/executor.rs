//! Test executor.
//!
//! Runs discovered cases fixture by fixture:
//!
//! 1. Cases are partitioned by source, then by fixture type, keeping the order of first appearance.
//! 2. Each group gets one fresh fixture instance and its one-time setup. If either fails, every case of the group is
//!    reported failed and nothing else of the group runs.
//! 3. Each case runs per-test setup, the test, and per-test teardown inside its own output capture scope. A failed
//!    setup skips the test and teardown; a failed test still runs teardown. The first failure decides the outcome.
//! 4. One-time teardown runs last. Its failure is reported separately and never changes published results.
//!
//! Cancellation is cooperative and checked before each group and before each case. Steps already started always
//! run to completion.

use std::any::Any;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use indexmap::IndexMap;
use miniunit_assert::{catch, catch_future};
use tracing::instrument::WithSubscriber;
use tracing::{Dispatch, debug, error, warn};

use crate::capture::{CaptureConfig, DEFAULT_LOG_FILTER, LiveCallback, OutputCapture};
use crate::context::TestContext;
use crate::discovery::discover_module;
use crate::error::StepError;
use crate::fixture::{FixtureInstance, FixtureType, HookRole, MethodEntry, StepResult};
use crate::model::{Outcome, TestCase, TestId, TestResult, TestSummary};
use crate::registry::ModuleLoader;
use crate::reporter::TestReporter;

/// Executor settings.
#[derive(Clone)]
pub struct ExecutorConfig {
    live_output: Option<LiveCallback>,
    log_filter: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            live_output: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl ExecutorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stream every completed output line to `callback` while tests run.
    pub fn with_live_output(mut self, callback: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.live_output = Some(Arc::new(callback));
        self
    }

    /// `EnvFilter` directive for trace events captured from steps.
    pub fn with_log_filter(mut self, directive: impl Into<String>) -> Self {
        self.log_filter = directive.into();
        self
    }

    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            live: self.live_output.clone(),
            log_filter: self.log_filter.clone(),
        }
    }
}

/// Cloneable handle that requests cancellation of a run.
#[derive(Debug, Clone, Default)]
pub struct CancellationHandle {
    flag: Arc<AtomicBool>,
}

impl CancellationHandle {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// A host request for one test: `(source, fully qualified name)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TestRequest {
    pub source: String,
    pub name: String,
}

impl TestRequest {
    pub fn new(source: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            name: name.into(),
        }
    }

    fn id(&self) -> TestId {
        TestId {
            fully_qualified_name: self.name.clone(),
            display_name: self.name.rsplit('.').next().unwrap_or(&self.name).to_string(),
            source: self.source.clone(),
        }
    }
}

/// Hooks chosen for one fixture type: the first of each role in declaration order.
struct HookSet<'f> {
    hooks: [Option<&'f MethodEntry>; 4],
}

impl<'f> HookSet<'f> {
    fn resolve(fixture: &'f FixtureType) -> Self {
        let mut hooks = [None; 4];
        for (slot, role) in hooks.iter_mut().zip(HookRole::ALL) {
            let mut candidates = fixture.hooks(role);
            *slot = candidates.next();
            let ignored: Vec<&str> = candidates.map(MethodEntry::name).collect();
            if let (Some(selected), false) = (*slot, ignored.is_empty()) {
                warn!(
                    fixture = fixture.name(),
                    %role,
                    selected = selected.name(),
                    ?ignored,
                    "several hooks declared for one role; using the first"
                );
            }
        }
        Self { hooks }
    }

    fn get(&self, role: HookRole) -> Option<&'f MethodEntry> {
        HookRole::ALL
            .iter()
            .position(|candidate| *candidate == role)
            .and_then(|index| self.hooks[index])
    }
}

/// Publishing side of one run.
struct Run<'r> {
    reporter: &'r mut dyn TestReporter,
    summary: TestSummary,
}

impl Run<'_> {
    fn publish(&mut self, result: TestResult) {
        debug_assert_ne!(result.outcome, Outcome::NotRun);
        self.summary.record(&result);
        self.reporter.on_test_result(&result);
        self.reporter.on_test_end(&result.test);
    }

    /// Report a group-level failure after results were published.
    fn fixture_failed(&mut self, fixture: &FixtureType, err: &StepError) {
        self.summary.fixture_errors += 1;
        self.reporter.on_fixture_teardown_failed(fixture.name(), err);
    }

    /// Report a case that was selected but whose steps never ran.
    fn fail_unrun(&mut self, test: TestId, message: String, trace: Option<String>) {
        self.reporter.on_test_start(&test);
        self.publish(TestResult::failed(test, message, trace));
    }
}

pub struct TestExecutor {
    config: ExecutorConfig,
    cancellation: CancellationHandle,
}

impl Default for TestExecutor {
    fn default() -> Self {
        Self::new(ExecutorConfig::default())
    }
}

impl TestExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            config,
            cancellation: CancellationHandle::default(),
        }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Request cancellation. Takes effect before the next fixture group or test.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn cancellation_handle(&self) -> CancellationHandle {
        self.cancellation.clone()
    }

    /// Run `cases`, publishing one result per started case through `reporter`.
    ///
    /// Cases not started because of cancellation are not reported at all.
    pub async fn execute(&self, cases: &[TestCase], reporter: &mut dyn TestReporter) -> TestSummary {
        let started = Instant::now();
        let mut run = Run {
            reporter,
            summary: TestSummary::default(),
        };
        self.execute_cases(cases, &mut run).await;
        run.summary.duration = started.elapsed();
        run.summary
    }

    /// Run tests requested by `(source, name)`, loading each source through `loader`.
    ///
    /// Every requested case of a source that fails to load is reported failed, as is every name that does not match
    /// a discovered test. Neither stops the other sources. Once cancelled, nothing further is reported.
    pub async fn execute_requests(
        &self,
        loader: &dyn ModuleLoader,
        requests: &[TestRequest],
        reporter: &mut dyn TestReporter,
    ) -> TestSummary {
        let started = Instant::now();
        let mut run = Run {
            reporter,
            summary: TestSummary::default(),
        };

        let mut by_source: IndexMap<&str, Vec<&TestRequest>> = IndexMap::new();
        for request in requests {
            by_source.entry(request.source.as_str()).or_default().push(request);
        }

        let mut selected = Vec::new();
        'sources: for (source, requests) in by_source {
            if self.is_cancelled() {
                break;
            }
            let module = match loader.load(source) {
                Ok(module) => module,
                Err(err) => {
                    warn!(source, error = %err, "source failed to load; failing its requested tests");
                    for request in requests {
                        if self.is_cancelled() {
                            break 'sources;
                        }
                        run.fail_unrun(request.id(), err.to_string(), None);
                    }
                    continue;
                }
            };

            let (cases, warnings) = discover_module(&module);
            for warning in &warnings {
                run.reporter.on_discovery_warning(warning);
            }
            for request in requests {
                match cases.iter().find(|case| case.fully_qualified_name() == request.name) {
                    Some(case) => selected.push(case.clone()),
                    None if self.is_cancelled() => break 'sources,
                    None => run.fail_unrun(request.id(), "test not found".to_string(), None),
                }
            }
        }

        if self.is_cancelled() {
            debug!("run cancelled before requested tests started");
        } else {
            self.execute_cases(&selected, &mut run).await;
        }
        run.summary.duration = started.elapsed();
        run.summary
    }

    async fn execute_cases(&self, cases: &[TestCase], run: &mut Run<'_>) {
        let mut groups: IndexMap<&str, IndexMap<&str, Vec<&TestCase>>> = IndexMap::new();
        for case in cases {
            groups
                .entry(case.source())
                .or_default()
                .entry(case.fixture().name())
                .or_default()
                .push(case);
        }

        for fixtures in groups.values() {
            for group in fixtures.values() {
                if self.run_group(group, run).await.is_break() {
                    debug!("run cancelled");
                    return;
                }
            }
        }
    }

    async fn run_group(&self, cases: &[&TestCase], run: &mut Run<'_>) -> ControlFlow<()> {
        if self.is_cancelled() {
            return ControlFlow::Break(());
        }
        let Some(first) = cases.first() else {
            return ControlFlow::Continue(());
        };
        let fixture: &FixtureType = first.fixture();
        let hooks = HookSet::resolve(fixture);

        debug!(fixture = fixture.name(), tests = cases.len(), "constructing fixture");
        let mut instance = match catch(|| fixture.construct()) {
            Ok(instance) => instance,
            Err(failure) => {
                let err = StepError::from(failure);
                warn!(fixture = fixture.name(), error = %err, "fixture construction failed");
                self.fail_group(cases, &err, run);
                return ControlFlow::Continue(());
            }
        };

        if let Some(setup) = hooks.get(HookRole::OneTimeSetUp) {
            if let Err(err) = self.run_fixture_hook(fixture, setup, instance.as_mut(), run).await {
                warn!(fixture = fixture.name(), error = %err, "one-time setup failed");
                self.fail_group(cases, &err, run);
                dispose(fixture, instance, run);
                return ControlFlow::Continue(());
            }
        }

        let mut flow = ControlFlow::Continue(());
        for case in cases {
            if self.is_cancelled() {
                flow = ControlFlow::Break(());
                break;
            }
            run.reporter.on_test_start(case.id());
            let result = match case.skip_reason() {
                Some(reason) => TestResult {
                    outcome: Outcome::Skipped,
                    error_message: Some(reason.to_string()),
                    ..TestResult::new(case.id().clone())
                },
                None => self.run_test(case, &hooks, instance.as_mut()).await,
            };
            run.publish(result);
        }

        if let Some(teardown) = hooks.get(HookRole::OneTimeTearDown) {
            if let Err(err) = self.run_fixture_hook(fixture, teardown, instance.as_mut(), run).await {
                error!(fixture = fixture.name(), error = %err, "one-time teardown failed");
                run.fixture_failed(fixture, &err);
            }
        }
        dispose(fixture, instance, run);
        flow
    }

    fn fail_group(&self, cases: &[&TestCase], err: &StepError, run: &mut Run<'_>) {
        for case in cases {
            run.fail_unrun(case.id().clone(), err.message(), Some(err.trace()));
        }
    }

    /// Run a one-time hook inside its own capture scope and hand its output to the reporter.
    async fn run_fixture_hook(
        &self,
        fixture: &FixtureType,
        hook: &MethodEntry,
        instance: &mut (dyn Any + Send),
        run: &mut Run<'_>,
    ) -> StepResult {
        let capture = OutputCapture::acquire(&self.config.capture_config()).await;
        let ctx = TestContext::new(fixture.name()).with_sink(capture.buffer().clone());
        let outcome = run_step(hook, instance, &ctx, capture.dispatch()).await;
        if let Some(output) = capture.finish() {
            run.reporter.on_fixture_output(fixture.name(), &output);
        }
        outcome
    }

    async fn run_test(&self, case: &TestCase, hooks: &HookSet<'_>, instance: &mut (dyn Any + Send)) -> TestResult {
        debug!(test = %case.id(), "running test");
        let mut result = TestResult::new(case.id().clone());
        let started = Instant::now();

        let capture = OutputCapture::acquire(&self.config.capture_config()).await;
        let ctx = TestContext::for_test(case.fixture().name(), case.id().clone()).with_sink(capture.buffer().clone());
        let dispatch = capture.dispatch();

        let mut outcome = match hooks.get(HookRole::SetUp) {
            Some(setup) => run_step(setup, instance, &ctx, dispatch).await,
            None => Ok(()),
        };
        if outcome.is_ok() {
            outcome = run_step(case.method(), instance, &ctx, dispatch).await;
            if let Some(teardown) = hooks.get(HookRole::TearDown) {
                let teardown_outcome = run_step(teardown, instance, &ctx, dispatch).await;
                if outcome.is_ok() {
                    outcome = teardown_outcome;
                }
            }
        }

        result.duration = started.elapsed();
        result.stdout = capture.finish();
        match outcome {
            Ok(()) => result.outcome = Outcome::Passed,
            Err(err) => {
                debug!(test = %case.id(), assertion = err.is_assertion(), "test failed");
                result.outcome = Outcome::Failed;
                result.error_message = Some(err.message());
                result.error_trace = Some(err.trace());
            }
        }
        result
    }
}

/// Destroy the fixture instance. A panicking `Drop` is reported like a failed one-time teardown.
fn dispose(fixture: &FixtureType, instance: FixtureInstance, run: &mut Run<'_>) {
    if let Err(failure) = catch(move || drop(instance)) {
        let err = StepError::from(failure);
        error!(fixture = fixture.name(), error = %err, "fixture drop failed");
        run.fixture_failed(fixture, &err);
    }
}

/// Run one step to completion with trace events routed to `dispatch`, converting panics into errors.
async fn run_step(
    entry: &MethodEntry,
    instance: &mut (dyn Any + Send),
    ctx: &TestContext,
    dispatch: &Dispatch,
) -> StepResult {
    let step = async move { entry.invoke(instance, ctx).await };
    match catch_future(step.with_subscriber(dispatch.clone())).await {
        Ok(outcome) => outcome,
        Err(failure) => Err(StepError::Panicked(failure)),
    }
}
