//! Test harness CLI
//!
//! A test binary calls [`run`] from `main` and gets a pytest-style runner over every fixture registered with
//! `#[fixture]` in that binary.
//!
//! ## Arguments
//!
//! - `[SOURCES]...` - crate names or module paths to run (default: every registered source)
//! - `-k <EXPR>` - keep tests whose name contains `EXPR` (case-insensitive)
//! - `-v` - verbose: durations, live output lines, one-time hook output
//! - `-x/--exitfirst` - stop after the first failed test
//! - `--list` - print the selected tests without running them
//! - `--format console|json` - output format
//! - `--log <DIRECTIVE>` - filter for trace events captured from tests
//!
//! ## Design
//!
//! Functions return `CliResult<T>` instead of calling `process::exit`. Only the top-level `run()` function handles
//! errors and exits.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::fmt;
use std::io::{self, Write};
use std::process;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use crate::discovery::TestDiscoverer;
use crate::error::TestError;
use crate::executor::{ExecutorConfig, TestExecutor};
use crate::filter::TestFilter;
use crate::model::TestSummary;
use crate::registry::{InventoryLoader, ModuleLoader};
use crate::reporter::{ConsoleReporter, FailFast, JsonReporter, TestReporter};
use crate::version::MINIUNIT_VERSION;

// ============================================================================
// Exit status
// ============================================================================

/// Process exit status of a harness run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const FAILURE: ExitCode = ExitCode(1);
}

/// A harness failure. An empty `message` means the report already said everything.
#[derive(Debug)]
pub struct CliError {
    pub message: String,
    pub exit_code: ExitCode,
}

impl CliError {
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::FAILURE)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<TestError> for CliError {
    fn from(err: TestError) -> Self {
        CliError::failure(format!("Error: {err}"))
    }
}

pub type CliResult<T> = Result<T, CliError>;

// ============================================================================
// Clap CLI definition
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// pytest-style lines and summary
    #[default]
    Console,
    /// One JSON object per event (JSON Lines)
    Json,
}

/// Run the MiniUnit fixtures registered in this binary
#[derive(Parser, Debug)]
#[command(name = "miniunit")]
#[command(version = MINIUNIT_VERSION)]
#[command(about = "Run the MiniUnit fixtures registered in this binary", long_about = None)]
pub struct Cli {
    /// Crate names or module paths to run (default: every registered source)
    #[arg(value_name = "SOURCES")]
    pub sources: Vec<String>,

    /// Filter tests by keyword expression
    #[arg(short = 'k', value_name = "EXPR")]
    pub filter: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Stop on first failure
    #[arg(short = 'x', long = "exitfirst")]
    pub stop_on_fail: bool,

    /// List the selected tests without running them
    #[arg(long)]
    pub list: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Console)]
    pub format: OutputFormat,

    /// Filter directive for trace events captured from tests
    #[arg(long = "log", value_name = "DIRECTIVE", default_value = crate::capture::DEFAULT_LOG_FILTER)]
    pub log_filter: String,
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main harness entry point.
///
/// This is the only place where `process::exit` is called.
pub fn run() {
    init_logging();
    let cli = Cli::parse();

    match execute(cli, &InventoryLoader) {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

/// Initialize structured logging with env-based filter, defaulting to info.
///
/// Engine diagnostics go to stderr so they never mix with report output.
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .try_init();
}

/// Execute a harness invocation against `loader` and return the exit code.
pub fn execute(cli: Cli, loader: &dyn ModuleLoader) -> CliResult<ExitCode> {
    let mut reporter: Box<dyn TestReporter> = match cli.format {
        OutputFormat::Console => Box::new(ConsoleReporter::new(cli.verbose)),
        OutputFormat::Json => Box::new(JsonReporter::new()),
    };

    let summary = run_session(&cli, loader, reporter.as_mut())?;
    match summary {
        Some(summary) if !summary.is_success() => {
            // Summary already printed
            Err(CliError::new("", ExitCode::FAILURE))
        }
        _ => Ok(ExitCode::SUCCESS),
    }
}

/// Discover, filter and run; `None` when only listing.
pub fn run_session(
    cli: &Cli,
    loader: &dyn ModuleLoader,
    reporter: &mut dyn TestReporter,
) -> CliResult<Option<TestSummary>> {
    EnvFilter::try_new(&cli.log_filter).map_err(|err| TestError::LogFilter {
        directive: cli.log_filter.clone(),
        reason: err.to_string(),
    })?;

    let sources = if cli.sources.is_empty() {
        loader.sources()
    } else {
        cli.sources.clone()
    };

    let discovered = TestDiscoverer::new(loader).discover_all(&sources, reporter);
    let cases = TestFilter::new(cli.filter.as_deref()).apply(discovered);

    if cli.list {
        let mut out = io::stdout().lock();
        for case in &cases {
            writeln!(out, "{}", case.fully_qualified_name()).map_err(TestError::Io)?;
        }
        return Ok(None);
    }

    reporter.on_collection_complete(cases.len());

    let mut config = ExecutorConfig::new().with_log_filter(cli.log_filter.clone());
    if cli.verbose && cli.format == OutputFormat::Console {
        config = config.with_live_output(|line| {
            let _ = writeln!(io::stdout(), "    | {line}");
        });
    }
    let executor = TestExecutor::new(config);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(TestError::Runtime)?;

    let summary = if cli.stop_on_fail {
        let mut fail_fast = FailFast::new(&mut *reporter, executor.cancellation_handle());
        runtime.block_on(executor.execute(&cases, &mut fail_fast))
    } else {
        runtime.block_on(executor.execute(&cases, reporter))
    };

    reporter.on_run_complete(&summary);
    Ok(Some(summary))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fixture::{FixtureBuilder, StepFuture};
    use crate::registry::{StaticLoader, TestModule};
    use crate::reporter::RecordingReporter;
    use crate::{Outcome, TestContext};

    #[test]
    fn test_cli_parse_defaults() {
        let cli = Cli::try_parse_from(["miniunit"]).unwrap();
        assert!(cli.sources.is_empty());
        assert_eq!(cli.format, OutputFormat::Console);
        assert_eq!(cli.log_filter, "info");
        assert!(!cli.stop_on_fail);
    }

    #[test]
    fn test_cli_parse_flags() {
        let cli = Cli::try_parse_from([
            "miniunit", "calc", "-v", "-x", "-k", "add", "--format", "json", "--log", "debug",
        ])
        .unwrap();
        assert_eq!(cli.sources, ["calc"]);
        assert!(cli.verbose);
        assert!(cli.stop_on_fail);
        assert_eq!(cli.filter.as_deref(), Some("add"));
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.log_filter, "debug");
    }

    #[test]
    fn test_cli_rejects_unknown_format() {
        assert!(Cli::try_parse_from(["miniunit", "--format", "xml"]).is_err());
    }

    #[derive(Default)]
    struct Pair;

    fn ok<'a>(_: &'a mut Pair, _: &'a TestContext) -> StepFuture<'a> {
        Box::pin(async { Ok(()) })
    }

    fn bad<'a>(_: &'a mut Pair, _: &'a TestContext) -> StepFuture<'a> {
        Box::pin(async {
            miniunit_assert::assert_true_msg(false, "nope");
            Ok(())
        })
    }

    fn loader() -> StaticLoader {
        let fixture = FixtureBuilder::<Pair>::new("session::Pair")
            .test("fails_first", None, None, bad)
            .test("passes_later", None, None, ok)
            .build();
        StaticLoader::new().with_module(TestModule::new("session", [fixture]))
    }

    #[test]
    fn test_session_filters_and_runs() {
        let cli = Cli::try_parse_from(["miniunit", "-k", "PASSES"]).unwrap();
        let mut reporter = RecordingReporter::default();
        let summary = run_session(&cli, &loader(), &mut reporter).unwrap().unwrap();
        assert_eq!(summary.total, 1);
        assert_eq!(reporter.results()[0].outcome, Outcome::Passed);
    }

    #[test]
    fn test_session_exitfirst_stops_after_failure() {
        let cli = Cli::try_parse_from(["miniunit", "-x"]).unwrap();
        let mut reporter = RecordingReporter::default();
        let summary = run_session(&cli, &loader(), &mut reporter).unwrap().unwrap();
        assert_eq!(summary.total, 1);
        assert_eq!(summary.failed, 1);
        assert!(reporter.result("passes_later").is_none());
    }

    #[test]
    fn test_session_rejects_bad_log_filter() {
        let cli = Cli::try_parse_from(["miniunit", "--log", "miniunit=loud"]).unwrap();
        let mut reporter = RecordingReporter::default();
        let err = run_session(&cli, &loader(), &mut reporter).unwrap_err();
        assert!(err.message.contains("invalid log filter"), "{}", err.message);
        assert_eq!(err.exit_code, ExitCode::FAILURE);
    }
}
