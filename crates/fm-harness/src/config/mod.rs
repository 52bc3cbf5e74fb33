// crates/fm-harness/src/config/mod.rs
// ============================================================================
// Module: Harness Configuration
// Description: Typed configuration from a TOML file plus environment overrides.
// Purpose: Describe target hosts, SSH options, limits, and product credentials.
// Dependencies: serde, toml
// ============================================================================

//! ## Overview
//! Configuration is read from an optional TOML file (path in
//! `FM_HARNESS_CONFIG`) and then overridden by `FM_HARNESS_*` environment
//! variables. Environment inputs are untrusted: values must be valid UTF-8
//! and non-empty when set, and invalid values fail closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod env;
mod file;

// ============================================================================
// SECTION: Tests
// ============================================================================


// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use env::HarnessEnv;
pub use env::read_env_strict;
pub use file::Credentials;
pub use file::HarnessConfig;
pub use file::LimitsConfig;
pub use file::Product;
pub use file::UpdateRepoConfig;
