// crates/fm-harness/src/lib.rs
// ============================================================================
// Module: Foreman Maintain Harness
// Description: Remote execution, verification, and fixtures for foreman-maintain.
// Purpose: Drive the maintenance CLI on managed hosts and check its contract.
// Dependencies: serde, serde_yaml, thiserror, toml, tracing, rand, time
// ============================================================================

//! ## Overview
//! This crate runs `foreman-maintain` operations on one or more managed hosts
//! and checks the results. It has four parts:
//! - [`catalog`] turns an operation name and options into a [`RemoteCommand`].
//! - [`executor`] runs that command over SSH (or locally) and answers
//!   interactive prompts, returning an [`ExecutionBatch`] keyed by host.
//! - [`verify`] checks exit codes and output markers on every host.
//! - [`fixture`] provisions remote preconditions and tears them down exactly
//!   once on every exit path; [`provisioners`] holds the concrete fixtures.
//!
//! All of it is reached through an explicit [`Session`].
//! Invariants:
//! - Nothing is executed for an unknown operation or a rejected option.
//! - Every provisioned fixture is torn down exactly once.
//! - No failure is retried or masked.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod catalog;
pub mod command;
pub mod config;
pub mod error;
pub mod executor;
pub mod fixture;
pub mod host_commands;
pub mod logging;
pub mod provisioners;
pub mod session;
pub mod state_file;
pub mod verify;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use catalog::Operation;
pub use command::PromptResponses;
pub use command::RemoteCommand;
pub use config::HarnessConfig;
pub use error::HarnessError;
pub use error::HarnessResult;
pub use executor::ExecutionBatch;
pub use executor::ExecutionLimits;
pub use executor::HostId;
pub use executor::HostResult;
pub use executor::RemoteExecutor;
pub use fixture::FixtureState;
pub use fixture::ProvisionGuard;
pub use fixture::Provisioner;
pub use session::CommandObserver;
pub use session::CommandRecord;
pub use session::NoopObserver;
pub use session::Session;
pub use state_file::SyncPlanState;
pub use state_file::SyncPlanStatus;
