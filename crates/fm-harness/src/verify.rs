// crates/fm-harness/src/verify.rs
// ============================================================================
// Module: Verification Layer
// Description: Exit-code and marker contracts over execution batches.
// Purpose: Fail the calling test loudly when any host violates a contract.
// Dependencies: crate::executor, crate::error
// ============================================================================

//! ## Overview
//! Verifications are inherent methods on [`ExecutionBatch`] returning
//! `HarnessResult<&ExecutionBatch>`, so test bodies chain them with `?`:
//!
//! ```no_run
//! # use fm_harness::HarnessResult;
//! # fn demo(session: &fm_harness::Session) -> HarnessResult<()> {
//! session
//!     .run("packages-lock", &Default::default())?
//!     .expect_success()?
//!     .expect_marker("Packages are locked.")?;
//! # Ok(())
//! # }
//! ```
//!
//! Invariants:
//! - A batch with no hosts never satisfies a contract.
//! - Markers are matched as literal substrings of stdout.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use crate::catalog::FAILURE_MARKER;
use crate::error::HarnessError;
use crate::error::HarnessResult;
use crate::error::excerpt;
use crate::executor::ExecutionBatch;
use crate::executor::HostId;
use crate::executor::HostResult;

// ============================================================================
// SECTION: Contracts
// ============================================================================

impl ExecutionBatch {
    /// Requires exit code 0 on every host.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::UnexpectedExitCode`] for the first failing host
    /// or [`HarnessError::NoHosts`] for an empty batch.
    pub fn expect_success(&self) -> HarnessResult<&Self> {
        self.expect_exit_code(0)
    }

    /// Requires `expected` as the exit code on every host.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::UnexpectedExitCode`] for the first mismatching
    /// host or [`HarnessError::NoHosts`] for an empty batch.
    pub fn expect_exit_code(&self, expected: i32) -> HarnessResult<&Self> {
        self.each(|result| {
            if result.exit_code == expected {
                return Ok(());
            }
            Err(HarnessError::UnexpectedExitCode {
                host: result.host.clone(),
                command: self.command().to_string(),
                expected,
                actual: result.exit_code,
                excerpt: combined_excerpt(result),
            })
        })
    }

    /// Requires `marker` in stdout on every host.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::MarkerMismatch`] for the first host missing the
    /// marker or [`HarnessError::NoHosts`] for an empty batch.
    pub fn expect_marker(&self, marker: &str) -> HarnessResult<&Self> {
        self.expect_marker_presence(marker, true)
    }

    /// Requires `marker` to be absent from stdout on every host.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::MarkerMismatch`] for the first host printing the
    /// marker or [`HarnessError::NoHosts`] for an empty batch.
    pub fn expect_no_marker(&self, marker: &str) -> HarnessResult<&Self> {
        self.expect_marker_presence(marker, false)
    }

    /// Requires the failure sentinel to be absent from stdout on every host.
    ///
    /// # Errors
    ///
    /// See [`ExecutionBatch::expect_no_marker`].
    pub fn expect_no_failure(&self) -> HarnessResult<&Self> {
        self.expect_no_marker(FAILURE_MARKER)
    }

    /// Reports, per host, whether `marker` appears in stdout.
    #[must_use]
    pub fn marker_presence(&self, marker: &str) -> BTreeMap<HostId, bool> {
        self.iter().map(|result| (result.host.clone(), result.stdout.contains(marker))).collect()
    }

    /// Requires `marker` presence to equal `expected_present` on every host.
    fn expect_marker_presence(&self, marker: &str, expected_present: bool) -> HarnessResult<&Self> {
        self.each(|result| {
            if result.stdout.contains(marker) == expected_present {
                return Ok(());
            }
            Err(HarnessError::MarkerMismatch {
                host: result.host.clone(),
                marker: marker.to_string(),
                expected_present,
                excerpt: excerpt(&result.stdout),
            })
        })
    }

    /// Applies `check` to every host, failing on an empty batch.
    fn each<F>(&self, check: F) -> HarnessResult<&Self>
    where
        F: Fn(&HostResult) -> HarnessResult<()>,
    {
        if self.is_empty() {
            return Err(HarnessError::NoHosts {
                command: self.command().to_string(),
            });
        }
        for result in self {
            check(result)?;
        }
        Ok(self)
    }
}

/// Excerpt of stdout followed by stderr.
fn combined_excerpt(result: &HostResult) -> String {
    if result.stderr.trim().is_empty() {
        return excerpt(&result.stdout);
    }
    excerpt(&format!("{}\n{}", result.stdout.trim_end(), result.stderr))
}

#[cfg(test)]
#[path = "verify_tests.rs"]
mod tests;
