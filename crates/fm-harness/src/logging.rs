// crates/fm-harness/src/logging.rs
// ============================================================================
// Module: Logging
// Description: Global tracing subscriber installation.
// Purpose: Give binaries and test suites one filtered stderr log format.
// Dependencies: tracing-subscriber
// ============================================================================

//! ## Overview
//! [`init`] installs a `fmt` subscriber writing to stderr with an
//! [`EnvFilter`]. The directive comes from `FM_HARNESS_LOG`, then `RUST_LOG`,
//! then the caller's default. Installing twice is a no-op.

use tracing_subscriber::EnvFilter;

use crate::config::read_env_strict;
use crate::error::HarnessError;
use crate::error::HarnessResult;

/// Harness-specific filter variable.
pub const LOG_ENV: &str = "FM_HARNESS_LOG";
/// Conventional filter variable consulted second.
pub const RUST_LOG_ENV: &str = "RUST_LOG";
/// Default directive when nothing is configured.
pub const DEFAULT_DIRECTIVE: &str = "info";

/// Resolves the filter directive to use.
///
/// # Errors
///
/// Returns [`HarnessError::Config`] when a variable holds invalid UTF-8.
pub fn filter_directive(default: &str) -> HarnessResult<String> {
    for name in [LOG_ENV, RUST_LOG_ENV] {
        if let Some(value) = read_env_strict(name).map_err(HarnessError::Config)?
            && !value.trim().is_empty()
        {
            return Ok(value);
        }
    }
    Ok(default.to_string())
}

/// Installs the global subscriber.
///
/// Returns `false` when a subscriber was already installed.
///
/// # Errors
///
/// Returns [`HarnessError::Config`] when the directive does not parse.
pub fn init(default: &str) -> HarnessResult<bool> {
    let directive = filter_directive(default)?;
    let filter = EnvFilter::try_new(&directive)
        .map_err(|err| HarnessError::Config(format!("invalid log filter `{directive}`: {err}")))?;
    Ok(tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_ok())
}
