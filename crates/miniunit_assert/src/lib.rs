//! Assertion engine for MiniUnit fixtures.
//!
//! This crate owns the failure taxonomy: the helpers in [`assert`] signal failed checks with an
//! [`AssertionFailure`] panic payload, and [`panic_capture`] turns any caught panic into a classified [`Failure`] so
//! the executor can tell failed checks apart from every other error.

#![deny(clippy::unwrap_used)]

pub mod assert;
pub mod failure;
pub mod panic_capture;

pub use assert::{
    assert_eq, assert_eq_msg, assert_false, assert_false_msg, assert_ne, assert_ne_msg, assert_true, assert_true_msg,
    fail, throws, throws_async, throws_async_msg, throws_msg,
};
pub use failure::{AssertionFailure, Failure, FailureKind, RaisedError, panic_message, raise};
pub use panic_capture::{PanicReport, catch, catch_future, install_hook};
