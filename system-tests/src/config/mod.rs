// system-tests/src/config/mod.rs
// ============================================================================
// Module: System Test Configuration
// Description: Run settings for the live system tests.
// Purpose: Provide typed access to artifact and safety settings.
// Dependencies: std
// ============================================================================

//! ## Overview
//! System-test settings are read from environment variables and mapped into
//! a small typed structure for reuse across test helpers. Host targets and
//! credentials come from the harness configuration, not from here.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod env;

// ============================================================================
// SECTION: Tests
// ============================================================================


// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use env::SystemTestConfig;
pub use env::SystemTestEnv;
