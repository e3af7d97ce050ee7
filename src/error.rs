//! Error types for discovery and execution.
//!
//! Nothing here escapes `TestExecutor::execute` or `TestDiscoverer::discover`: these values are converted into
//! failed results or warning notifications at the boundary.

use miniunit_assert::Failure;
use thiserror::Error;

/// Errors raised by a [`crate::ModuleLoader`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("no test module named '{0}' is registered")]
    NotFound(String),

    #[error("failed to load '{module}': {reason}")]
    Failed { module: String, reason: String },
}

/// Why a single hook or test step did not complete.
#[derive(Debug, Clone, Error)]
pub enum StepError {
    /// The step panicked: an assertion failure or any other panic.
    #[error("{0}")]
    Panicked(Failure),

    /// The step returned `Err`.
    #[error("{message}")]
    Returned { message: String, detail: String },

    /// The method takes arguments the runner cannot supply.
    #[error("{method} takes {arity} parameter(s) and cannot be invoked by the runner")]
    Parameterized { method: String, arity: usize },

    /// The instance handed to a step was not of the fixture's type.
    #[error("fixture instance does not match {expected}")]
    InstanceMismatch { expected: &'static str },
}

impl StepError {
    /// Text stored in `TestResult::error_message`.
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Full diagnostic text stored in `TestResult::error_trace`.
    pub fn trace(&self) -> String {
        match self {
            StepError::Panicked(failure) => failure.trace(),
            StepError::Returned { detail, .. } => format!("Error: {detail}"),
            other => other.to_string(),
        }
    }

    pub fn is_assertion(&self) -> bool {
        matches!(self, StepError::Panicked(failure) if failure.is_assertion())
    }
}

impl From<Failure> for StepError {
    fn from(failure: Failure) -> Self {
        StepError::Panicked(failure)
    }
}

/// Errors surfaced by the harness around a run.
#[derive(Debug, Error)]
pub enum TestError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("failed to start the async runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("invalid log filter '{directive}': {reason}")]
    LogFilter { directive: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use miniunit_assert::FailureKind;

    #[test]
    fn test_returned_error_trace_uses_debug_detail() {
        let err = StepError::Returned {
            message: "disk full".to_string(),
            detail: "Io { kind: StorageFull }".to_string(),
        };
        assert_eq!(err.message(), "disk full");
        assert_eq!(err.trace(), "Error: Io { kind: StorageFull }");
        assert!(!err.is_assertion());
    }

    #[test]
    fn test_panicked_error_delegates_to_failure() {
        let err = StepError::from(Failure::new(FailureKind::Assertion, "nope"));
        assert_eq!(err.message(), "nope");
        assert!(err.is_assertion());
        assert_eq!(err.trace(), "AssertionFailure: nope");
    }

    #[test]
    fn test_parameterized_message() {
        let err = StepError::Parameterized {
            method: "with_args".to_string(),
            arity: 2,
        };
        assert_eq!(err.message(), "with_args takes 2 parameter(s) and cannot be invoked by the runner");
    }
}
