// system-tests/tests/helpers/mod.rs
// ============================================================================
// Module: System Test Helpers
// Description: Shared helpers for the live fm-harness suites.
// Purpose: Provide the session harness, transcripts, and artifact utilities.
// Dependencies: system-tests, fm-harness
// ============================================================================

//! ## Overview
//! Shared helpers for the live suites.
//! Invariants:
//! - Every test writes a summary, including skips and failures.
//! - Hosts are only changed through fixtures that restore them.

#![allow(dead_code, reason = "Shared helpers are reused across multiple test suites.")]

pub mod artifacts;
pub mod harness;
pub mod transcript;
