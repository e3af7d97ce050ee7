//! Integration tests for `miniunit_assert`.
//!
//! These lock in the signal contract the executor relies on: every failed check must surface as a
//! `FailureKind::Assertion` failure, and `throws` must return the underlying failure untouched.

use miniunit_assert::{
    Failure, FailureKind, assert_eq, assert_eq_msg, assert_false, assert_ne, assert_true, catch, fail, raise, throws,
    throws_async, throws_msg,
};
use proptest::prelude::*;

fn div(a: i32, b: i32) -> i32 {
    a / b
}

fn element(values: &[i32], index: usize) -> i32 {
    values[index]
}

fn parse_positive(input: &str) {
    if !input.starts_with('+') {
        raise("ValueError", format!("bad input: {input}"));
    }
}

fn caught(f: impl FnOnce()) -> Failure {
    catch(f).expect_err("expected the closure to fail")
}

#[test]
fn truth_checks_pass_silently() {
    assert_true(true);
    assert_false(false);
    assert_eq(5, 2 + 3);
    assert_ne("a", "b");
}

#[test]
fn failed_truth_check_is_an_assertion_failure() {
    let failure = caught(|| assert_true(false));
    assert!(failure.is_assertion());
    assert_eq!(failure.message(), "Expected true but was false.");

    let failure = caught(|| assert_false(true));
    assert_eq!(failure.message(), "Expected false but was true.");
}

#[test]
/// The default equality message must render both values.
fn equality_message_renders_both_values() {
    let failure = caught(|| assert_eq(5, 6));
    assert!(failure.is_assertion());
    assert!(failure.message().contains('5') && failure.message().contains('6'), "{}", failure.message());
}

#[test]
fn caller_supplied_message_wins() {
    let failure = caught(|| assert_eq_msg("x", "y", "strings differ"));
    assert_eq!(failure.message(), "strings differ");
}

#[test]
fn inequality_fails_on_equal_values() {
    let failure = caught(|| assert_ne(vec![1, 2], vec![1, 2]));
    assert!(failure.is_assertion());
}

#[test]
fn assertion_location_points_at_call_site() {
    let failure = caught(|| assert_true(false));
    let location = failure.location().expect("assertion failures carry a location");
    assert!(location.contains("assertions.rs"), "{location}");
}

#[test]
fn fail_always_fails() {
    let failure = caught(|| fail("explicit"));
    assert_eq!(failure.kind(), FailureKind::Assertion);
    assert_eq!(failure.message(), "explicit");
}

#[test]
fn throws_returns_divide_by_zero_failure() {
    let failure = throws(FailureKind::DivideByZero, || div(1, 0));
    assert_eq!(failure.kind(), FailureKind::DivideByZero);
    assert!(failure.message().contains("divide by zero"));
}

#[test]
fn throws_with_unrelated_kind_is_an_assertion_failure() {
    let failure = caught(|| {
        throws(FailureKind::IndexOutOfBounds, || div(1, 0));
    });
    assert!(failure.is_assertion());
    assert_eq!(failure.message(), "Expected IndexOutOfBounds, but DivideByZero was raised.");
}

#[test]
fn throws_without_failure_is_an_assertion_failure() {
    let failure = caught(|| {
        throws(FailureKind::DivideByZero, || div(4, 2));
    });
    assert!(failure.is_assertion());
    assert_eq!(failure.message(), "Expected DivideByZero to be raised, but nothing was raised.");
}

#[test]
fn throws_msg_overrides_mismatch_message() {
    let failure = caught(|| {
        throws_msg(FailureKind::Unwrap, || div(4, 2), "should have unwrapped");
    });
    assert_eq!(failure.message(), "should have unwrapped");
}

#[test]
fn throws_matches_index_and_raised_kinds() {
    let failure = throws(FailureKind::IndexOutOfBounds, || element(&[1], 5));
    assert!(failure.message().starts_with("index out of bounds"));

    let failure = throws(FailureKind::Raised("ValueError"), || parse_positive("-3"));
    assert_eq!(failure.message(), "bad input: -3");
}

#[test]
fn throws_async_has_identical_semantics() {
    let failure = futures::executor::block_on(throws_async(FailureKind::DivideByZero, || async {
        futures::future::ready(()).await;
        div(1, 0)
    }));
    assert_eq!(failure.kind(), FailureKind::DivideByZero);

    let failure = caught(|| {
        futures::executor::block_on(throws_async(FailureKind::DivideByZero, || async { div(8, 2) }));
    });
    assert!(failure.is_assertion());
}

proptest! {
    /// Property: equal values never fail `assert_eq` and always fail `assert_ne`.
    #[test]
    fn equal_values_pass_eq_and_fail_ne(value in any::<i64>()) {
        prop_assert!(catch(|| assert_eq(value, value)).is_ok());
        prop_assert!(catch(|| assert_ne(value, value)).is_err());
    }

    /// Property: distinct values always fail `assert_eq` with an assertion failure.
    #[test]
    fn distinct_values_fail_eq(a in any::<i32>(), b in any::<i32>()) {
        prop_assume!(a != b);
        let failure = catch(|| assert_eq(a, b)).unwrap_err();
        prop_assert!(failure.is_assertion());
    }
}
