//! Panic capture
//!
//! A single process-wide panic hook is installed on first use. While a capture is in progress on a thread, the hook
//! records the panic location (and a backtrace when `RUST_BACKTRACE` enables one) into a thread-local slot instead of
//! printing the default report. Panics on threads with no capture in progress go to the previous hook unchanged.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Once;
use std::task::{Context, Poll};

use futures::FutureExt;

use crate::failure::Failure;

static PANIC_HOOK_INIT: Once = Once::new();

thread_local! {
    static QUIET_DEPTH: Cell<usize> = const { Cell::new(0) };
    static LAST_REPORT: RefCell<Option<PanicReport>> = const { RefCell::new(None) };
}

/// What the panic hook saw for the most recent captured panic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanicReport {
    pub location: Option<String>,
    pub backtrace: Option<String>,
}

/// Install the capturing panic hook (idempotent).
pub fn install_hook() {
    PANIC_HOOK_INIT.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let quiet = QUIET_DEPTH.try_with(|depth| depth.get() > 0).unwrap_or(false);
            if !quiet {
                previous(info);
                return;
            }

            let backtrace = Backtrace::capture();
            let report = PanicReport {
                location: info.location().map(|l| l.to_string()),
                backtrace: (backtrace.status() == BacktraceStatus::Captured).then(|| backtrace.to_string()),
            };
            let _ = LAST_REPORT.try_with(|slot| *slot.borrow_mut() = Some(report));
        }));
    });
}

fn take_report() -> Option<PanicReport> {
    LAST_REPORT.try_with(|slot| slot.borrow_mut().take()).ok().flatten()
}

struct QuietGuard;

impl QuietGuard {
    fn enter() -> Self {
        QUIET_DEPTH.with(|depth| depth.set(depth.get() + 1));
        QuietGuard
    }
}

impl Drop for QuietGuard {
    fn drop(&mut self) {
        let _ = QUIET_DEPTH.try_with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Run `f`, converting a panic into a classified [`Failure`].
pub fn catch<T>(f: impl FnOnce() -> T) -> Result<T, Failure> {
    install_hook();
    let _quiet = QuietGuard::enter();
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| Failure::from_panic(payload, take_report()))
}

/// Await `future`, converting a panic raised while polling it into a classified [`Failure`].
pub async fn catch_future<F: Future>(future: F) -> Result<F::Output, Failure> {
    install_hook();
    let result = Quiet {
        inner: Box::pin(AssertUnwindSafe(future).catch_unwind()),
    }
    .await;
    result.map_err(|payload| Failure::from_panic(payload, take_report()))
}

/// Marks the polling thread as capturing for the duration of each poll.
struct Quiet<F> {
    inner: Pin<Box<F>>,
}

impl<F: Future> Future for Quiet<F> {
    type Output = F::Output;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let _quiet = QuietGuard::enter();
        self.inner.as_mut().poll(cx)
    }
}
