// crates/fm-harness/src/fixture.rs
// ============================================================================
// Module: Scoped Provisioning Fixture
// Description: Provision, yield, and guaranteed exactly-once teardown.
// Purpose: Leave shared host state as it was found on every exit path.
// Dependencies: crate::session, tracing
// ============================================================================

//! ## Overview
//! A [`Provisioner`] creates a remote precondition and knows how to undo it.
//! Acquisition yields a [`ProvisionGuard`] that moves through
//! `Unprovisioned -> Provisioned -> TornDown`:
//! - provisioning failures are reported as [`HarnessError::ProvisioningFailed`]
//!   after [`Provisioner::rollback`] cleans up any partial creation;
//! - [`ProvisionGuard::release`] tears down explicitly and returns the error;
//! - dropping an unreleased guard (early return, `?`, or panic) tears down
//!   from `Drop` and logs any failure.
//!
//! [`Session::with_provisioned`] wraps all of this into an ensure block that
//! reports body and teardown failures together, including when the body
//! panics.
//!
//! Invariants:
//! - Teardown runs at most once per guard, and always once a guard exists.
//! - The body never runs before provisioning completes, and teardown never
//!   starts before the body returns.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::any::Any;
use std::fmt;
use std::panic;
use std::panic::AssertUnwindSafe;

use tracing::error;
use tracing::info;

use crate::error::HarnessError;
use crate::error::HarnessResult;
use crate::session::Session;

// ============================================================================
// SECTION: Provisioner Contract
// ============================================================================

/// Remote precondition with a matching teardown.
pub trait Provisioner {
    /// Handle created by provisioning and consumed by teardown.
    type Resource;

    /// Short fixture name for logs and errors.
    fn name(&self) -> &str;

    /// Establishes the precondition.
    ///
    /// # Errors
    ///
    /// Any error; the guard reports it as [`HarnessError::ProvisioningFailed`].
    fn provision(&self, session: &Session) -> HarnessResult<Self::Resource>;

    /// Restores the host after the scope ends.
    ///
    /// # Errors
    ///
    /// Any error; reported as [`HarnessError::Teardown`].
    fn teardown(&self, session: &Session, resource: &Self::Resource) -> HarnessResult<()>;

    /// Undoes a partial creation after [`Provisioner::provision`] failed.
    ///
    /// # Errors
    ///
    /// Any error; attached to the resulting `ProvisioningFailed`.
    fn rollback(&self, session: &Session) -> HarnessResult<()> {
        let _ = session;
        Ok(())
    }
}

/// Lifecycle state of a fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureState {
    /// Nothing created yet.
    Unprovisioned,
    /// Precondition established; teardown pending.
    Provisioned,
    /// Teardown has run.
    TornDown,
}

impl FixtureState {
    /// Returns the lowercase state label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unprovisioned => "unprovisioned",
            Self::Provisioned => "provisioned",
            Self::TornDown => "torn_down",
        }
    }
}

impl fmt::Display for FixtureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Guard
// ============================================================================

/// RAII handle for a provisioned resource.
///
/// # Invariants
/// - Constructed only after provisioning succeeded.
/// - `state` moves from `Provisioned` to `TornDown` exactly once.
pub struct ProvisionGuard<'s, P: Provisioner> {
    /// Session used for teardown.
    session: &'s Session,
    /// Fixture definition.
    provisioner: P,
    /// Created resource.
    resource: P::Resource,
    /// Lifecycle state.
    state: FixtureState,
}

impl<'s, P: Provisioner> ProvisionGuard<'s, P> {
    /// Provisions `provisioner` on `session`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::ProvisioningFailed`], carrying any rollback
    /// failure.
    pub fn acquire(session: &'s Session, provisioner: P) -> HarnessResult<Self> {
        info!(fixture = provisioner.name(), state = %FixtureState::Unprovisioned, "provisioning");
        match provisioner.provision(session) {
            Ok(resource) => {
                let state = FixtureState::Provisioned;
                info!(fixture = provisioner.name(), state = %state, "provisioned");
                Ok(Self {
                    session,
                    provisioner,
                    resource,
                    state,
                })
            }
            Err(err) => {
                let rollback = provisioner.rollback(session).err();
                if let Some(rollback_err) = &rollback {
                    error!(fixture = provisioner.name(), error = %rollback_err, "rollback failed");
                }
                Err(provisioning_failed(provisioner.name(), err, rollback))
            }
        }
    }

    /// Returns the provisioned resource.
    #[must_use]
    pub const fn resource(&self) -> &P::Resource {
        &self.resource
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub const fn state(&self) -> FixtureState {
        self.state
    }

    /// Tears down now and reports the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Teardown`] when the teardown step fails.
    pub fn release(mut self) -> HarnessResult<()> {
        self.teardown_once()
    }

    /// Runs teardown if it has not run yet.
    fn teardown_once(&mut self) -> HarnessResult<()> {
        if self.state != FixtureState::Provisioned {
            return Ok(());
        }
        self.state = FixtureState::TornDown;
        let name = self.provisioner.name();
        match self.provisioner.teardown(self.session, &self.resource) {
            Ok(()) => {
                info!(fixture = name, state = %FixtureState::TornDown, "torn down");
                Ok(())
            }
            Err(err) => {
                error!(fixture = name, error = %err, "teardown failed");
                Err(HarnessError::Teardown {
                    fixture: name.to_string(),
                    source: Box::new(err),
                })
            }
        }
    }
}

impl<P: Provisioner> Drop for ProvisionGuard<'_, P> {
    fn drop(&mut self) {
        if self.state != FixtureState::Provisioned {
            return;
        }
        if std::thread::panicking() {
            info!(fixture = self.provisioner.name(), "tearing down during unwind");
        }
        // Failures are logged by teardown_once; Drop cannot return them.
        let _ = self.teardown_once();
    }
}

impl<P: Provisioner> fmt::Debug for ProvisionGuard<'_, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisionGuard")
            .field("fixture", &self.provisioner.name())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// SECTION: Ensure Block
// ============================================================================

impl Session {
    /// Provisions a fixture and returns its guard.
    ///
    /// # Errors
    ///
    /// See [`ProvisionGuard::acquire`].
    pub fn provision<P>(&self, provisioner: P) -> HarnessResult<ProvisionGuard<'_, P>>
    where
        P: Provisioner,
    {
        ProvisionGuard::acquire(self, provisioner)
    }

    /// Runs `body` with a provisioned resource and always tears down.
    ///
    /// Outcomes:
    /// - body and teardown succeed: the body's value;
    /// - only teardown fails: [`HarnessError::Teardown`];
    /// - only the body fails: the body's error;
    /// - both fail: [`HarnessError::TeardownAfterFailure`];
    /// - the body panics: the panic resumes after teardown, with the teardown
    ///   error appended to the payload when teardown failed too.
    ///
    /// # Errors
    ///
    /// Returns provisioning, body, or teardown errors as listed above.
    pub fn with_provisioned<P, T, F>(&self, provisioner: P, body: F) -> HarnessResult<T>
    where
        P: Provisioner,
        F: FnOnce(&Self, &P::Resource) -> HarnessResult<T>,
    {
        let guard = self.provision(provisioner)?;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| body(self, guard.resource())));
        let teardown = guard.release();
        match (outcome, teardown) {
            (Ok(Ok(value)), Ok(())) => Ok(value),
            (Ok(Ok(_)), Err(teardown_err)) => Err(teardown_err),
            (Ok(Err(body_err)), Ok(())) => Err(body_err),
            (Ok(Err(body_err)), Err(teardown_err)) => Err(HarnessError::TeardownAfterFailure {
                body: Box::new(body_err),
                teardown: Box::new(teardown_err),
            }),
            (Err(payload), Ok(())) => panic::resume_unwind(payload),
            (Err(payload), Err(teardown_err)) => panic::resume_unwind(Box::new(format!(
                "{}; teardown also failed: {teardown_err}",
                panic_message(payload.as_ref())
            ))),
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Wraps a provisioning error, keeping an existing `ProvisioningFailed` intact.
fn provisioning_failed(
    fixture: &str,
    err: HarnessError,
    rollback: Option<HarnessError>,
) -> HarnessError {
    match err {
        HarnessError::ProvisioningFailed {
            fixture,
            reason,
            rollback: None,
        } => HarnessError::ProvisioningFailed {
            fixture,
            reason,
            rollback: rollback.map(Box::new),
        },
        already @ HarnessError::ProvisioningFailed { .. } => already,
        other => HarnessError::ProvisioningFailed {
            fixture: fixture.to_string(),
            reason: other.to_string(),
            rollback: rollback.map(Box::new),
        },
    }
}

/// Extracts a printable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "panic with non-string payload".to_string()
}

#[cfg(test)]
#[path = "fixture_tests.rs"]
mod tests;
