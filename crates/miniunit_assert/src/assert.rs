//! Assertion helpers for MiniUnit fixtures.
//!
//! Every check panics with an [`AssertionFailure`] payload so the executor can tell a failed check apart from any
//! other panic. The `_msg` variants replace the default message with a caller-supplied one.

use std::fmt::Debug;
use std::future::Future;

use crate::failure::{AssertionFailure, Failure, FailureKind};
use crate::panic_capture::{catch, catch_future};

#[cold]
#[track_caller]
fn fail_with(message: String) -> ! {
    std::panic::panic_any(AssertionFailure::new(message))
}

/// Explicitly fail a test with a message.
///
/// # Panics
///
/// Always panics with an [`AssertionFailure`] carrying `msg`.
#[track_caller]
pub fn fail(msg: impl Into<String>) -> ! {
    fail_with(msg.into())
}

/// Assert that a condition is true.
///
/// # Panics
///
/// Panics if `condition` is false.
#[track_caller]
pub fn assert_true(condition: bool) {
    if !condition {
        fail_with("Expected true but was false.".to_string());
    }
}

#[track_caller]
pub fn assert_true_msg(condition: bool, message: impl Into<String>) {
    if !condition {
        fail_with(message.into());
    }
}

/// Assert that a condition is false.
///
/// # Panics
///
/// Panics if `condition` is true.
#[track_caller]
pub fn assert_false(condition: bool) {
    if condition {
        fail_with("Expected false but was true.".to_string());
    }
}

#[track_caller]
pub fn assert_false_msg(condition: bool, message: impl Into<String>) {
    if condition {
        fail_with(message.into());
    }
}

/// Assert that two values are equal.
///
/// # Panics
///
/// Panics if `expected != actual`; the message renders both values.
#[track_caller]
pub fn assert_eq<T: PartialEq + Debug>(expected: T, actual: T) {
    if expected != actual {
        fail_with(format!(
            "assertion failed: expected == actual\n  expected: {:?}\n  actual:   {:?}",
            expected, actual
        ));
    }
}

#[track_caller]
pub fn assert_eq_msg<T: PartialEq + Debug>(expected: T, actual: T, message: impl Into<String>) {
    if expected != actual {
        fail_with(message.into());
    }
}

/// Assert that two values are not equal.
///
/// # Panics
///
/// Panics if `not_expected == actual`.
#[track_caller]
pub fn assert_ne<T: PartialEq + Debug>(not_expected: T, actual: T) {
    if not_expected == actual {
        fail_with(format!("assertion failed: values are equal\n  value: {:?}", actual));
    }
}

#[track_caller]
pub fn assert_ne_msg<T: PartialEq + Debug>(not_expected: T, actual: T, message: impl Into<String>) {
    if not_expected == actual {
        fail_with(message.into());
    }
}

/// Assert that `thunk` fails with `expected`, returning the captured failure.
///
/// # Panics
///
/// Panics with an [`AssertionFailure`] if `thunk` fails with another kind or does not fail at all.
#[track_caller]
pub fn throws<T>(expected: FailureKind, thunk: impl FnOnce() -> T) -> Failure {
    check_thrown(expected, catch(thunk).map(drop), None)
}

#[track_caller]
pub fn throws_msg<T>(expected: FailureKind, thunk: impl FnOnce() -> T, message: impl Into<String>) -> Failure {
    check_thrown(expected, catch(thunk).map(drop), Some(message.into()))
}

/// Asynchronous counterpart of [`throws`]: awaits the future produced by `thunk`.
pub async fn throws_async<Fut, F>(expected: FailureKind, thunk: F) -> Failure
where
    F: FnOnce() -> Fut,
    Fut: Future,
{
    let outcome = catch_future(async move { thunk().await }).await;
    check_thrown(expected, outcome.map(drop), None)
}

pub async fn throws_async_msg<Fut, F>(expected: FailureKind, thunk: F, message: impl Into<String>) -> Failure
where
    F: FnOnce() -> Fut,
    Fut: Future,
{
    let outcome = catch_future(async move { thunk().await }).await;
    check_thrown(expected, outcome.map(drop), Some(message.into()))
}

#[track_caller]
fn check_thrown(expected: FailureKind, outcome: Result<(), Failure>, message: Option<String>) -> Failure {
    match outcome {
        Err(failure) if failure.kind() == expected => failure,
        Err(failure) => fail_with(
            message.unwrap_or_else(|| format!("Expected {}, but {} was raised.", expected, failure.kind())),
        ),
        Ok(()) => fail_with(
            message.unwrap_or_else(|| format!("Expected {} to be raised, but nothing was raised.", expected)),
        ),
    }
}
