// crates/fm-harness/src/error.rs
// ============================================================================
// Module: Harness Errors
// Description: Error taxonomy for catalog, execution, verification, and fixtures.
// Purpose: Surface every failure to the test runner without retries or masking.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! All fallible harness operations return [`HarnessError`]. Nothing in the
//! harness retries or swallows an error; teardown failures are reported next
//! to, never instead of, an earlier body failure.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::executor::HostId;

// ============================================================================
// SECTION: Error Types
// ============================================================================

/// Harness error taxonomy.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Output excerpts are bounded; full output stays in the transcript.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Operation name is not part of the command catalog.
    #[error("unknown operation: {name}")]
    UnknownOperation {
        /// Rejected operation name.
        name: String,
    },
    /// Option is not recognized, not applicable, missing, or malformed.
    #[error("invalid option `{option}` for {operation}: {reason}")]
    InvalidOption {
        /// Canonical operation name.
        operation: String,
        /// Option key.
        option: String,
        /// Human-readable reason.
        reason: String,
    },
    /// A host returned an exit code outside the expected contract.
    #[error("{host}: `{command}` exited with {actual}, expected {expected}: {excerpt}")]
    UnexpectedExitCode {
        /// Host that violated the contract.
        host: HostId,
        /// Rendered command line.
        command: String,
        /// Expected exit code.
        expected: i32,
        /// Observed exit code.
        actual: i32,
        /// Bounded stdout/stderr excerpt.
        excerpt: String,
    },
    /// A marker was present when it should be absent, or vice versa.
    #[error("{host}: marker `{marker}` expected {}: {excerpt}", presence(.expected_present))]
    MarkerMismatch {
        /// Host that violated the contract.
        host: HostId,
        /// Marker text.
        marker: String,
        /// True when the marker was required to appear.
        expected_present: bool,
        /// Bounded stdout excerpt.
        excerpt: String,
    },
    /// Fixture setup could not establish its precondition.
    #[error("provisioning `{fixture}` failed: {reason}{}", rollback_suffix(.rollback.as_deref()))]
    ProvisioningFailed {
        /// Fixture name.
        fixture: String,
        /// Failure description.
        reason: String,
        /// Error raised while rolling back a partial creation, if any.
        rollback: Option<Box<Self>>,
    },
    /// Interactive process emitted a prompt with no canned response.
    #[error("{host}: unmatched prompt after {}s: `{prompt}`", .waited.as_secs())]
    UnmatchedPrompt {
        /// Host running the command.
        host: HostId,
        /// Trailing output that was waiting for input.
        prompt: String,
        /// Idle time spent waiting before giving up.
        waited: Duration,
    },
    /// Command exceeded its overall deadline and was killed.
    #[error("{host}: `{command}` timed out after {}s", .timeout.as_secs())]
    CommandTimeout {
        /// Host running the command.
        host: HostId,
        /// Rendered command line.
        command: String,
        /// Deadline that elapsed.
        timeout: Duration,
    },
    /// Transport-level failure (spawn, pipe, or client binary error).
    #[error("{host}: transport error: {message}")]
    Transport {
        /// Host being contacted.
        host: HostId,
        /// Failure description.
        message: String,
    },
    /// Remote file could not be copied locally.
    #[error("{host}: fetch of {remote_path} failed: {message}")]
    Fetch {
        /// Host being contacted.
        host: HostId,
        /// Remote path requested.
        remote_path: String,
        /// Failure description.
        message: String,
    },
    /// Persisted state document could not be read or parsed.
    #[error("state file {}: {message}", .path.display())]
    StateFile {
        /// Local path of the fetched document.
        path: PathBuf,
        /// Failure description.
        message: String,
    },
    /// Persisted state does not match the expectation.
    #[error("{host}: state mismatch: {message}")]
    StateMismatch {
        /// Host whose state was inspected.
        host: HostId,
        /// Failure description.
        message: String,
    },
    /// A verification or execution had no hosts to act on.
    #[error("no hosts in batch for `{command}`")]
    NoHosts {
        /// Rendered command line.
        command: String,
    },
    /// A host identifier appeared twice in one batch.
    #[error("duplicate host in batch: {host}")]
    DuplicateHost {
        /// Repeated host identifier.
        host: HostId,
    },
    /// Teardown failed after a successful body.
    #[error("teardown of `{fixture}` failed: {source}")]
    Teardown {
        /// Fixture name.
        fixture: String,
        /// Underlying teardown error.
        source: Box<Self>,
    },
    /// Body failed and teardown failed as well; both are reported.
    #[error("{body}; teardown also failed: {teardown}")]
    TeardownAfterFailure {
        /// Error raised by the scoped body.
        body: Box<Self>,
        /// Error raised by teardown.
        teardown: Box<Self>,
    },
    /// Configuration could not be loaded or validated.
    #[error("config error: {0}")]
    Config(String),
}

/// Harness result alias.
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Describes the expected marker presence.
const fn presence(expected_present: &bool) -> &'static str {
    if *expected_present { "present" } else { "absent" }
}

/// Formats the rollback tail of a provisioning error.
fn rollback_suffix(rollback: Option<&HarnessError>) -> String {
    rollback.map_or_else(String::new, |err| format!(" (rollback failed: {err})"))
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Maximum characters kept in error excerpts.
pub(crate) const EXCERPT_CHARS: usize = 512;

/// Returns the trailing `EXCERPT_CHARS` characters of `text`.
pub(crate) fn excerpt(text: &str) -> String {
    let trimmed = text.trim_end();
    let count = trimmed.chars().count();
    if count <= EXCERPT_CHARS {
        return trimmed.to_string();
    }
    let tail: String = trimmed.chars().skip(count - EXCERPT_CHARS).collect();
    format!("...{tail}")
}
