#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
//! MiniUnit: a fixture-based test engine
//!
//! MiniUnit discovers test methods declared on fixture types, groups them by fixture, and runs each group through a
//! fixed lifecycle (one-time setup, per-test setup and teardown, one-time teardown). Every test gets its own output
//! capture scope and exactly one published result.
//!
//! ## Declaring tests
//!
//! ```ignore
//! use miniunit::prelude::*;
//!
//! #[derive(Default)]
//! struct MathTests;
//!
//! #[fixture]
//! impl MathTests {
//!     #[test]
//!     fn adds(&self) {
//!         assert_eq(5, 2 + 3);
//!     }
//! }
//!
//! fn main() {
//!     miniunit::cli::run();
//! }
//! ```
//!
//! ## Panic Policy
//!
//! - **Library code**: `Result`/`Option` with `?`. `#![deny(clippy::unwrap_used)]` is enforced crate-wide.
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.
//! - **Code under test**: panics are the failure signal. They are caught per step and become failed results.

// Lets `#[fixture]` expansions (which name `::miniunit`) work inside this crate's own tests.
extern crate self as miniunit;

pub mod capture;
pub mod cli;
pub mod console;
pub mod context;
pub mod discovery;
pub mod error;
pub mod executor;
pub mod filter;
pub mod fixture;
pub mod model;
pub mod registry;
pub mod reporter;
pub mod version;

pub use capture::{CaptureBuffer, CaptureConfig, CaptureWriter, LiveCallback, OutputCapture};
pub use context::TestContext;
pub use discovery::{DiscoveryWarning, TestDiscoverer, discover_module};
pub use error::{LoadError, StepError, TestError};
pub use executor::{CancellationHandle, ExecutorConfig, TestExecutor, TestRequest};
pub use filter::TestFilter;
pub use fixture::{
    Fixture, FixtureBuilder, FixtureInstance, FixtureType, HookRole, IntoStepResult, MethodEntry, MethodRole, Step,
    StepFuture, StepResult,
};
pub use model::{Outcome, TestCase, TestId, TestResult, TestSummary};
pub use registry::{FixtureRegistration, InventoryLoader, ModuleLoader, StaticLoader, TestModule};
pub use reporter::{ConsoleReporter, FailFast, JsonReporter, RecordingReporter, ReportEvent, TestReporter};

pub use miniunit_assert as assert;
pub use miniunit_derive::fixture;

/// Everything a test file usually needs.
pub mod prelude {
    pub use crate::assert::{
        FailureKind, assert_eq, assert_eq_msg, assert_false, assert_false_msg, assert_ne, assert_ne_msg, assert_true,
        assert_true_msg, fail, raise, throws, throws_async, throws_async_msg, throws_msg,
    };
    pub use crate::{TestContext, fixture, test_eprintln, test_println};
}

#[doc(hidden)]
pub mod __private {
    pub use inventory;
}
