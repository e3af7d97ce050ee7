//! Output capture.
//!
//! An [`OutputCapture`] scope redirects the process-wide console channels (see [`crate::console`]) into a per-test
//! [`CaptureBuffer`] and builds a `tracing` dispatch that formats events into the same buffer. Release happens on
//! every exit path through `Drop`, which restores the previously installed buffer.
//!
//! The console slot is global, so only one scope may be active at a time. [`OutputCapture::acquire`] waits on a
//! process-wide async lock to guarantee it, even across independent executors.

use std::io;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError, RwLock};

use tokio::sync::Mutex as AsyncMutex;
use tracing::Dispatch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;

/// Receives each completed output line while the test is still running.
pub type LiveCallback = Arc<dyn Fn(&str) + Send + Sync>;

pub const DEFAULT_LOG_FILTER: &str = "info";

static ACTIVE: RwLock<Option<Arc<CaptureBuffer>>> = RwLock::new(None);
static CAPTURE_LOCK: LazyLock<AsyncMutex<()>> = LazyLock::new(|| AsyncMutex::new(()));

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The buffer of the active capture scope, if any.
pub fn active() -> Option<Arc<CaptureBuffer>> {
    ACTIVE.read().unwrap_or_else(PoisonError::into_inner).clone()
}

fn install(buffer: Option<Arc<CaptureBuffer>>) -> Option<Arc<CaptureBuffer>> {
    let mut slot = ACTIVE.write().unwrap_or_else(PoisonError::into_inner);
    std::mem::replace(&mut *slot, buffer)
}

/// Append-only text buffer, safe to write from any thread.
pub struct CaptureBuffer {
    text: Mutex<String>,
    partial: Mutex<String>,
    live: Option<LiveCallback>,
}

impl CaptureBuffer {
    pub fn new(live: Option<LiveCallback>) -> Self {
        Self {
            text: Mutex::new(String::new()),
            partial: Mutex::new(String::new()),
            live,
        }
    }

    pub fn append(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        lock(&self.text).push_str(text);

        let Some(live) = &self.live else {
            return;
        };
        let lines = {
            let mut partial = lock(&self.partial);
            partial.push_str(text);
            let mut lines = Vec::new();
            while let Some(end) = partial.find('\n') {
                let line: String = partial.drain(..=end).collect();
                lines.push(line.trim_end_matches(['\n', '\r']).to_string());
            }
            lines
        };
        // Outside the lock: the callback may write again.
        for line in &lines {
            live(line);
        }
    }

    /// Everything appended so far.
    pub fn text(&self) -> String {
        lock(&self.text).clone()
    }

    fn flush_partial(&self) {
        let Some(live) = &self.live else {
            return;
        };
        let rest = std::mem::take(&mut *lock(&self.partial));
        if !rest.is_empty() {
            live(&rest);
        }
    }
}

/// `io::Write` handle onto a [`CaptureBuffer`]; also a `MakeWriter` for `tracing_subscriber::fmt`.
#[derive(Clone)]
pub struct CaptureWriter {
    buffer: Arc<CaptureBuffer>,
}

impl CaptureWriter {
    pub fn new(buffer: Arc<CaptureBuffer>) -> Self {
        Self { buffer }
    }
}

impl io::Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.append(&String::from_utf8_lossy(buf));
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CaptureWriter {
    type Writer = CaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Settings for one capture scope.
#[derive(Clone)]
pub struct CaptureConfig {
    pub live: Option<LiveCallback>,
    /// `EnvFilter` directive for forwarded trace events.
    pub log_filter: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            live: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

/// Parse a log filter directive, falling back to [`DEFAULT_LOG_FILTER`] when it is invalid.
fn env_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_new(directive).unwrap_or_else(|err| {
        tracing::warn!(directive, error = %err, "invalid capture log filter, using default");
        EnvFilter::new(DEFAULT_LOG_FILTER)
    })
}

/// An active capture scope.
pub struct OutputCapture {
    buffer: Arc<CaptureBuffer>,
    previous: Option<Arc<CaptureBuffer>>,
    dispatch: Dispatch,
    _exclusive: tokio::sync::MutexGuard<'static, ()>,
}

impl OutputCapture {
    /// Wait until no other scope is active, then redirect the console channels into a fresh buffer.
    pub async fn acquire(config: &CaptureConfig) -> Self {
        let exclusive = CAPTURE_LOCK.lock().await;
        let buffer = Arc::new(CaptureBuffer::new(config.live.clone()));

        let subscriber = tracing_subscriber::fmt()
            .with_writer(CaptureWriter::new(buffer.clone()))
            .with_ansi(false)
            .without_time()
            .with_target(false)
            .with_env_filter(env_filter(&config.log_filter))
            .finish();

        let previous = install(Some(buffer.clone()));
        Self {
            buffer,
            previous,
            dispatch: Dispatch::new(subscriber),
            _exclusive: exclusive,
        }
    }

    pub fn buffer(&self) -> &Arc<CaptureBuffer> {
        &self.buffer
    }

    /// Dispatch that forwards trace events into this scope's buffer.
    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    pub fn buffered_text(&self) -> String {
        self.buffer.text()
    }

    /// Release the scope and return the captured text, or `None` when nothing but whitespace was written.
    pub fn finish(self) -> Option<String> {
        let text = self.buffer.text();
        drop(self);
        (!text.trim().is_empty()).then_some(text)
    }
}

impl Drop for OutputCapture {
    fn drop(&mut self) {
        self.buffer.flush_partial();
        install(self.previous.take());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tracing::instrument::WithSubscriber;

    #[tokio::test]
    async fn test_console_writes_are_captured() {
        let capture = OutputCapture::acquire(&CaptureConfig::default()).await;
        crate::test_println!("A");
        crate::test_eprintln!("B");
        assert_eq!(capture.buffered_text(), "A\nB\n");
        assert_eq!(capture.finish().as_deref(), Some("A\nB\n"));
    }

    #[tokio::test]
    async fn test_whitespace_only_is_absent() {
        let capture = OutputCapture::acquire(&CaptureConfig::default()).await;
        capture.buffer().append("  \n");
        assert!(capture.finish().is_none());
    }

    #[tokio::test]
    async fn test_release_restores_console() {
        {
            let _capture = OutputCapture::acquire(&CaptureConfig::default()).await;
            assert!(active().is_some());
        }
        let capture = OutputCapture::acquire(&CaptureConfig::default()).await;
        assert!(capture.previous.is_none());
    }

    #[tokio::test]
    async fn test_live_callback_sees_completed_lines() {
        let seen = Arc::new(Mutex::new(Vec::<String>::new()));
        let sink = seen.clone();
        let config = CaptureConfig {
            live: Some(Arc::new(move |line: &str| sink.lock().unwrap().push(line.to_string()))),
            ..CaptureConfig::default()
        };
        let capture = OutputCapture::acquire(&config).await;
        capture.buffer().append("one\ntw");
        capture.buffer().append("o\nthree");
        assert_eq!(*seen.lock().unwrap(), ["one", "two"]);
        drop(capture);
        assert_eq!(*seen.lock().unwrap(), ["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_trace_events_are_forwarded() {
        let capture = OutputCapture::acquire(&CaptureConfig::default()).await;
        async {
            tracing::info!("computing");
            tracing::debug!("hidden by the default filter");
        }
        .with_subscriber(capture.dispatch().clone())
        .await;
        let text = capture.finish().unwrap();
        assert!(text.contains("INFO") && text.contains("computing"), "{text}");
        assert!(!text.contains("hidden"), "{text}");
    }

    #[tokio::test]
    async fn test_concurrent_writers_are_kept() {
        let capture = OutputCapture::acquire(&CaptureConfig::default()).await;
        let buffer = capture.buffer().clone();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let buffer = buffer.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        buffer.append("x\n");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(capture.buffered_text().lines().count(), 100);
    }
}
