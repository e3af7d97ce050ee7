//! Test discovery.
//!
//! Discovery turns a source into an ordered list of [`TestCase`]s: fixtures in the order the loader returns them,
//! tests in declaration order. It never fails. A source that cannot be loaded yields no cases and a
//! [`DiscoveryWarning`] instead.

use std::fmt;

use tracing::{debug, warn};

use crate::error::LoadError;
use crate::model::TestCase;
use crate::registry::{ModuleLoader, TestModule};
use crate::reporter::TestReporter;

/// Non-fatal problems found while discovering tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryWarning {
    LoadFailed { source_name: String, error: LoadError },
    /// A `#[test]` method takes parameters and was left out.
    ParameterizedTest { test: String, arity: usize },
}

impl fmt::Display for DiscoveryWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryWarning::LoadFailed { source_name, error } => {
                write!(f, "could not load '{source_name}': {error}")
            }
            DiscoveryWarning::ParameterizedTest { test, arity } => {
                write!(f, "skipping {test}: test methods must not take parameters (found {arity})")
            }
        }
    }
}

pub struct TestDiscoverer<'l> {
    loader: &'l dyn ModuleLoader,
}

impl<'l> TestDiscoverer<'l> {
    pub fn new(loader: &'l dyn ModuleLoader) -> Self {
        Self { loader }
    }

    /// Discover every test in `source`. Warnings go to `reporter` and the log.
    pub fn discover(&self, source: &str, reporter: &mut dyn TestReporter) -> Vec<TestCase> {
        match self.loader.load(source) {
            Ok(module) => {
                let (cases, warnings) = discover_module(&module);
                for warning in &warnings {
                    warn!(source, "{warning}");
                    reporter.on_discovery_warning(warning);
                }
                cases
            }
            Err(error) => {
                let warning = DiscoveryWarning::LoadFailed {
                    source_name: source.to_string(),
                    error,
                };
                warn!(source, "{warning}");
                reporter.on_discovery_warning(&warning);
                Vec::new()
            }
        }
    }

    /// Discover every source in order, concatenating the cases.
    pub fn discover_all<S: AsRef<str>>(
        &self,
        sources: impl IntoIterator<Item = S>,
        reporter: &mut dyn TestReporter,
    ) -> Vec<TestCase> {
        let mut cases = Vec::new();
        for source in sources {
            cases.extend(self.discover(source.as_ref(), reporter));
        }
        cases
    }
}

/// Cases of an already loaded module, plus the methods that were left out.
pub fn discover_module(module: &TestModule) -> (Vec<TestCase>, Vec<DiscoveryWarning>) {
    let mut cases = Vec::new();
    let mut warnings = Vec::new();

    for fixture in module.fixtures() {
        for (index, method) in fixture.tests() {
            if !method.is_invocable() {
                warnings.push(DiscoveryWarning::ParameterizedTest {
                    test: format!("{}.{}", fixture.name(), method.name()),
                    arity: method.arity(),
                });
                continue;
            }
            if let Some(case) = TestCase::new(module.name(), fixture.clone(), index) {
                cases.push(case);
            }
        }
    }

    debug!(source = module.name(), count = cases.len(), "discovered tests");
    (cases, warnings)
}
