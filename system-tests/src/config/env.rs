// system-tests/src/config/env.rs
// ============================================================================
// Module: System Test Environment
// Description: Environment-backed settings for system tests.
// Purpose: Parse run-root and opt-in switches with strict validation.
// Dependencies: fm-harness
// ============================================================================

//! ## Overview
//! Values are read through the harness's strict UTF-8 reader. Empty or
//! unrecognized values fail closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;

use fm_harness::config::read_env_strict;

// ============================================================================
// SECTION: Environment Constants
// ============================================================================

/// Environment keys for system test settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemTestEnv {
    /// Optional run root override.
    RunRoot,
    /// Allow writing into an existing, non-empty test directory.
    AllowOverwrite,
    /// Allow tests that re-register host subscriptions.
    AllowRegistration,
}

impl SystemTestEnv {
    /// Returns the canonical environment variable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RunRoot => "FM_HARNESS_SYSTEM_TEST_RUN_ROOT",
            Self::AllowOverwrite => "FM_HARNESS_SYSTEM_TEST_ALLOW_OVERWRITE",
            Self::AllowRegistration => "FM_HARNESS_SYSTEM_TEST_ALLOW_REGISTRATION",
        }
    }
}

// ============================================================================
// SECTION: Config Types
// ============================================================================

/// Typed system test settings derived from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SystemTestConfig {
    /// Optional run root override.
    pub run_root: Option<PathBuf>,
    /// Allow reusing a non-empty test directory.
    pub allow_overwrite: bool,
    /// Allow subscription re-registration on the managed hosts.
    pub allow_registration: bool,
}

impl SystemTestConfig {
    /// Loads settings from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error when a value is not valid UTF-8, is empty, or is not
    /// a recognized boolean.
    pub fn load() -> Result<Self, String> {
        let run_root = read_env_nonempty(SystemTestEnv::RunRoot.as_str())?.map(PathBuf::from);
        let allow_overwrite = read_flag(SystemTestEnv::AllowOverwrite)?;
        let allow_registration = read_flag(SystemTestEnv::AllowRegistration)?;
        Ok(Self {
            run_root,
            allow_overwrite,
            allow_registration,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads an environment variable and rejects empty values.
///
/// # Errors
///
/// Returns an error when the variable is set but empty or whitespace.
fn read_env_nonempty(name: &str) -> Result<Option<String>, String> {
    match read_env_strict(name)? {
        Some(value) if value.trim().is_empty() => Err(format!("{name} must not be empty")),
        Some(value) => Ok(Some(value)),
        None => Ok(None),
    }
}

/// Reads a boolean switch; unset means false.
///
/// # Errors
///
/// Returns an error when the value is not `1`, `0`, `true`, or `false`.
fn read_flag(key: SystemTestEnv) -> Result<bool, String> {
    let name = key.as_str();
    let Some(value) = read_env_nonempty(name)? else {
        return Ok(false);
    };
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("true") || trimmed == "1" {
        return Ok(true);
    }
    if trimmed.eq_ignore_ascii_case("false") || trimmed == "0" {
        return Ok(false);
    }
    Err(format!("{name} must be 1, 0, true, or false"))
}
