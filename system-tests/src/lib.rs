// system-tests/src/lib.rs
// ============================================================================
// Module: fm-harness System Tests Library
// Description: Shared configuration for the live system-test suites.
// Purpose: Provide common settings for the system-test binaries.
// Dependencies: std
// ============================================================================

//! ## Overview
//! This crate hosts shared configuration used by the live suites in
//! `system-tests/tests`. The suites drive real managed hosts over SSH and
//! only build with the `system-tests` feature.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
