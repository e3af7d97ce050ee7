//! Failure taxonomy shared by the assertion helpers and the executor.
//!
//! Every failure inside a test step travels as a panic. The payload decides how it is classified:
//!
//! - [`AssertionFailure`] payloads come from the assertion helpers and classify as [`FailureKind::Assertion`].
//! - [`RaisedError`] payloads come from [`raise`] and keep their explicit kind name.
//! - String payloads are matched against the standard library's panic messages (division by zero, overflow, ...).

use std::any::Any;
use std::fmt;
use std::panic::Location;

use crate::panic_capture::PanicReport;

/// Panic payload produced by a failed check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionFailure {
    message: String,
    location: &'static Location<'static>,
}

impl AssertionFailure {
    /// Create a failure located at the caller of the (track-caller) assertion.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: Location::caller(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }
}

impl fmt::Display for AssertionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Panic payload produced by [`raise`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaisedError {
    pub kind: &'static str,
    pub message: String,
}

impl fmt::Display for RaisedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Raise a named failure kind (implemented as a panic).
///
/// `throws(FailureKind::Raised("ValueError"), ...)` matches failures raised with the same name.
#[cold]
#[track_caller]
pub fn raise(kind: &'static str, message: impl Into<String>) -> ! {
    std::panic::panic_any(RaisedError {
        kind,
        message: message.into(),
    })
}

/// Classification of a caught panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// A check from this crate failed.
    Assertion,
    /// Integer division or remainder by zero.
    DivideByZero,
    /// Arithmetic overflow detected by overflow checks.
    Overflow,
    /// Slice, vector or string index out of range.
    IndexOutOfBounds,
    /// `unwrap()` on `None` or `Err`.
    Unwrap,
    /// Explicitly raised through [`raise`].
    Raised(&'static str),
    /// Any other panic.
    Panic,
}

impl FailureKind {
    pub fn name(&self) -> &'static str {
        match self {
            FailureKind::Assertion => "AssertionFailure",
            FailureKind::DivideByZero => "DivideByZero",
            FailureKind::Overflow => "Overflow",
            FailureKind::IndexOutOfBounds => "IndexOutOfBounds",
            FailureKind::Unwrap => "Unwrap",
            FailureKind::Raised(name) => name,
            FailureKind::Panic => "Panic",
        }
    }

    /// Map a standard-library panic message onto a kind.
    pub fn from_panic_message(message: &str) -> Self {
        if message.starts_with("attempt to divide by zero")
            || message.starts_with("attempt to calculate the remainder with a divisor of zero")
        {
            FailureKind::DivideByZero
        } else if message.starts_with("attempt to") && message.ends_with("with overflow") {
            FailureKind::Overflow
        } else if message.starts_with("index out of bounds")
            || message.contains("out of range for slice")
            || message.starts_with("byte index")
        {
            FailureKind::IndexOutOfBounds
        } else if message.starts_with("called `Option::unwrap()`") || message.starts_with("called `Result::unwrap()`") {
            FailureKind::Unwrap
        } else {
            FailureKind::Panic
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A caught panic with its classification and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    kind: FailureKind,
    message: String,
    location: Option<String>,
    backtrace: Option<String>,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            location: None,
            backtrace: None,
        }
    }

    /// Classify a panic payload, attaching the hook's report when one was recorded.
    pub fn from_panic(payload: Box<dyn Any + Send>, report: Option<PanicReport>) -> Self {
        let (kind, message, own_location) = if let Some(assertion) = payload.downcast_ref::<AssertionFailure>() {
            (
                FailureKind::Assertion,
                assertion.message().to_string(),
                Some(assertion.location().to_string()),
            )
        } else if let Some(raised) = payload.downcast_ref::<RaisedError>() {
            (FailureKind::Raised(raised.kind), raised.message.clone(), None)
        } else {
            let message = panic_message(&*payload);
            (FailureKind::from_panic_message(&message), message, None)
        };

        let (report_location, backtrace) = match report {
            Some(report) => (report.location, report.backtrace),
            None => (None, None),
        };

        Self {
            kind,
            message,
            location: own_location.or(report_location),
            backtrace,
        }
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn backtrace(&self) -> Option<&str> {
        self.backtrace.as_deref()
    }

    pub fn is_assertion(&self) -> bool {
        self.kind == FailureKind::Assertion
    }

    /// Full diagnostic text: kind, message, location and backtrace (when captured).
    pub fn trace(&self) -> String {
        let mut out = format!("{}: {}", self.kind, self.message);
        if let Some(location) = &self.location {
            out.push_str("\n  at ");
            out.push_str(location);
        }
        if let Some(backtrace) = &self.backtrace {
            out.push('\n');
            out.push_str(backtrace);
        }
        out
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for Failure {}

/// Render a panic payload as text.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(assertion) = payload.downcast_ref::<AssertionFailure>() {
        assertion.message().to_string()
    } else if let Some(raised) = payload.downcast_ref::<RaisedError>() {
        raised.to_string()
    } else {
        "panicked with a non-string payload".to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_classifies_division_by_zero() {
        assert_eq!(
            FailureKind::from_panic_message("attempt to divide by zero"),
            FailureKind::DivideByZero
        );
        assert_eq!(
            FailureKind::from_panic_message("attempt to calculate the remainder with a divisor of zero"),
            FailureKind::DivideByZero
        );
    }

    #[test]
    fn test_classifies_std_messages() {
        assert_eq!(
            FailureKind::from_panic_message("attempt to add with overflow"),
            FailureKind::Overflow
        );
        assert_eq!(
            FailureKind::from_panic_message("index out of bounds: the len is 1 but the index is 5"),
            FailureKind::IndexOutOfBounds
        );
        assert_eq!(
            FailureKind::from_panic_message("called `Option::unwrap()` on a `None` value"),
            FailureKind::Unwrap
        );
        assert_eq!(FailureKind::from_panic_message("boom"), FailureKind::Panic);
    }

    #[test]
    fn test_from_panic_payloads() {
        let failure = Failure::from_panic(Box::new(AssertionFailure::new("nope")), None);
        assert!(failure.is_assertion());
        assert_eq!(failure.message(), "nope");
        assert!(failure.location().is_some_and(|l| l.contains("failure.rs")));

        let failure = Failure::from_panic(
            Box::new(RaisedError {
                kind: "ValueError",
                message: "bad".to_string(),
            }),
            None,
        );
        assert_eq!(failure.kind(), FailureKind::Raised("ValueError"));
        assert_eq!(failure.message(), "bad");

        let failure = Failure::from_panic(Box::new(String::from("attempt to divide by zero")), None);
        assert_eq!(failure.kind(), FailureKind::DivideByZero);

        let failure = Failure::from_panic(Box::new(42_u32), None);
        assert_eq!(failure.kind(), FailureKind::Panic);
        assert_eq!(failure.message(), "panicked with a non-string payload");
    }

    #[test]
    fn test_trace_includes_kind_and_location() {
        let failure = Failure::from_panic(
            Box::new("boom"),
            Some(PanicReport {
                location: Some("src/lib.rs:1:1".to_string()),
                backtrace: None,
            }),
        );
        assert_eq!(failure.trace(), "Panic: boom\n  at src/lib.rs:1:1");
    }
}
