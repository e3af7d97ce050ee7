//! MiniUnit version information.
//!
//! The value is taken from Cargo metadata (`CARGO_PKG_VERSION`) at compile time. The harness banner and the
//! `--version` flag both read it from here.

/// The MiniUnit version string (for example, `0.1.0`).
pub const MINIUNIT_VERSION: &str = env!("CARGO_PKG_VERSION");
