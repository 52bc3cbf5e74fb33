// crates/fm-harness/src/provisioners.rs
// ============================================================================
// Module: Provisioners
// Description: Concrete fixtures for the maintenance tool suites.
// Purpose: Create and restore sync plans, passwords, locks, repos, and subscriptions.
// Dependencies: crate::fixture, crate::host_commands, rand, time
// ============================================================================

//! ## Overview
//! Each type implements [`Provisioner`] and restores exactly what it
//! changed. Setup commands must exit 0; a non-zero exit aborts the fixture
//! as `ProvisioningFailed` after rollback.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use time::OffsetDateTime;
use tracing::info;

use crate::catalog;
use crate::catalog::Procedure;
use crate::command::RemoteCommand;
use crate::config::Credentials;
use crate::config::UpdateRepoConfig;
use crate::error::HarnessError;
use crate::error::HarnessResult;
use crate::executor::HostId;
use crate::fixture::Provisioner;
use crate::host_commands;
use crate::session::Session;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Letters used for generated names.
const ALPHA: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
/// Length of generated names.
const GENERATED_LEN: usize = 10;

/// Returns a random alphabetic string.
#[must_use]
pub fn random_alpha(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0 .. len).map(|_| ALPHA.choose(&mut rng).map_or('x', |byte| char::from(*byte))).collect()
}

/// Returns today's UTC date as `YYYY-MM-DD`.
#[must_use]
pub fn today() -> String {
    let date = OffsetDateTime::now_utc().date();
    format!("{:04}-{:02}-{:02}", date.year(), u8::from(date.month()), date.day())
}

/// Runs `command` and requires exit 0 on every host.
fn run_ok(session: &Session, command: &RemoteCommand) -> HarnessResult<()> {
    session.execute(command)?.expect_success()?;
    Ok(())
}

/// Runs a catalog procedure and requires exit 0 without the failure marker.
fn run_procedure(session: &Session, procedure: Procedure) -> HarnessResult<()> {
    session.execute(&catalog::procedure(procedure))?.expect_success()?.expect_no_failure()?;
    Ok(())
}

/// Runs every cleanup step, returning the first failure.
fn run_all(steps: impl IntoIterator<Item = HarnessResult<()>>) -> HarnessResult<()> {
    steps.into_iter().fold(Ok(()), |first, step| first.and(step))
}

// ============================================================================
// SECTION: Sync Plan
// ============================================================================

/// Sync plan created by [`SyncPlanFixture`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPlan {
    /// Plan name, shared by every host.
    pub name: String,
    /// Plan id on each host.
    pub ids: BTreeMap<HostId, u64>,
}

/// Weekly sync plan with a random name, dated today.
#[derive(Debug, Clone)]
pub struct SyncPlanFixture {
    /// Plan name.
    name: String,
    /// Owning organization.
    organization_id: u64,
}

impl SyncPlanFixture {
    /// Creates a fixture with a random alphabetic plan name.
    #[must_use]
    pub fn new(organization_id: u64) -> Self {
        Self::named(random_alpha(GENERATED_LEN), organization_id)
    }

    /// Creates a fixture with a fixed plan name.
    #[must_use]
    pub fn named(name: impl Into<String>, organization_id: u64) -> Self {
        Self {
            name: name.into(),
            organization_id,
        }
    }

    /// Returns the plan name.
    #[must_use]
    pub fn plan_name(&self) -> &str {
        &self.name
    }
}

impl Provisioner for SyncPlanFixture {
    type Resource = SyncPlan;

    fn name(&self) -> &str {
        "sync-plan"
    }

    fn provision(&self, session: &Session) -> HarnessResult<SyncPlan> {
        run_ok(
            session,
            &host_commands::sync_plan_create(&self.name, &today(), self.organization_id),
        )?;
        let info =
            session.execute(&host_commands::sync_plan_info(&self.name, self.organization_id))?;
        info.expect_success()?;
        let ids = info
            .iter()
            .map(|result| {
                host_commands::parse_sync_plan_id(&result.stdout)
                    .map(|id| (result.host.clone(), id))
                    .ok_or_else(|| HarnessError::ProvisioningFailed {
                        fixture: self.name().to_string(),
                        reason: format!("{}: no sync plan id in `{}`", result.host, info.command()),
                        rollback: None,
                    })
            })
            .collect::<HarnessResult<BTreeMap<_, _>>>()?;
        info!(plan = %self.name, hosts = ids.len(), "sync plan created");
        Ok(SyncPlan {
            name: self.name.clone(),
            ids,
        })
    }

    fn teardown(&self, session: &Session, plan: &SyncPlan) -> HarnessResult<()> {
        run_ok(session, &host_commands::sync_plan_delete(&plan.name, self.organization_id))
    }

    fn rollback(&self, session: &Session) -> HarnessResult<()> {
        // The plan may not exist on every host; only transport failures count.
        session.execute(&host_commands::sync_plan_delete(&self.name, self.organization_id))?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Maintenance Mode
// ============================================================================

/// Maintenance mode switched on for the scope.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaintenanceModeFixture;

impl Provisioner for MaintenanceModeFixture {
    type Resource = ();

    fn name(&self) -> &str {
        "maintenance-mode"
    }

    fn provision(&self, session: &Session) -> HarnessResult<()> {
        run_procedure(session, Procedure::MaintenanceModeEnable)
    }

    fn teardown(&self, session: &Session, _: &()) -> HarnessResult<()> {
        run_procedure(session, Procedure::MaintenanceModeDisable)
    }

    fn rollback(&self, session: &Session) -> HarnessResult<()> {
        run_procedure(session, Procedure::MaintenanceModeDisable)
    }
}

// ============================================================================
// SECTION: Admin Password
// ============================================================================

/// Admin password rotated to a temporary value for the scope.
#[derive(Debug, Clone)]
pub struct AdminPasswordFixture {
    /// Login whose password rotates.
    login: String,
    /// Password restored on teardown.
    original: String,
    /// Password in effect inside the scope.
    temporary: String,
}

impl AdminPasswordFixture {
    /// Rotates `login` from `original` to `temporary`.
    #[must_use]
    pub fn new(
        login: impl Into<String>,
        original: impl Into<String>,
        temporary: impl Into<String>,
    ) -> Self {
        Self {
            login: login.into(),
            original: original.into(),
            temporary: temporary.into(),
        }
    }

    /// Rotates the configured admin to a random password.
    #[must_use]
    pub fn from_credentials(credentials: &Credentials) -> Self {
        Self::new(
            credentials.admin_user.clone(),
            credentials.admin_password.clone(),
            format!("{}*a-4;X!~", random_alpha(GENERATED_LEN)),
        )
    }
}

impl Provisioner for AdminPasswordFixture {
    type Resource = String;

    fn name(&self) -> &str {
        "admin-password"
    }

    fn provision(&self, session: &Session) -> HarnessResult<String> {
        run_ok(
            session,
            &host_commands::user_password_update(&self.login, &self.original, &self.temporary),
        )?;
        Ok(self.temporary.clone())
    }

    fn teardown(&self, session: &Session, temporary: &String) -> HarnessResult<()> {
        let restore = host_commands::user_password_update(&self.login, temporary, &self.original);
        run_ok(session, &restore)
    }
}

// ============================================================================
// SECTION: Hammer Defaults
// ============================================================================

/// Hammer default parameter set for the scope.
#[derive(Debug, Clone)]
pub struct HammerDefaultsFixture {
    /// Parameter name.
    param: String,
    /// Parameter value.
    value: String,
}

impl HammerDefaultsFixture {
    /// Sets `param` to `value`.
    #[must_use]
    pub fn new(param: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            param: param.into(),
            value: value.into(),
        }
    }

    /// Sets the default `organization_id`.
    #[must_use]
    pub fn organization(organization_id: u64) -> Self {
        Self::new("organization_id", organization_id.to_string())
    }
}

impl Provisioner for HammerDefaultsFixture {
    type Resource = ();

    fn name(&self) -> &str {
        "hammer-defaults"
    }

    fn provision(&self, session: &Session) -> HarnessResult<()> {
        run_ok(session, &host_commands::defaults_add(&self.param, &self.value))
    }

    fn teardown(&self, session: &Session, _: &()) -> HarnessResult<()> {
        run_ok(session, &host_commands::defaults_delete(&self.param))
    }
}

// ============================================================================
// SECTION: Package Lock
// ============================================================================

/// Installer-managed package locking, re-locked after the scope.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackageLockFixture;

impl Provisioner for PackageLockFixture {
    type Resource = ();

    fn name(&self) -> &str {
        "package-lock"
    }

    fn provision(&self, session: &Session) -> HarnessResult<()> {
        run_ok(session, &host_commands::installer_lock_package_versions(true))
    }

    fn teardown(&self, session: &Session, _: &()) -> HarnessResult<()> {
        run_ok(session, &host_commands::installer_lock_package_versions(true))
    }
}

// ============================================================================
// SECTION: Update Repository
// ============================================================================

/// Custom repository plus an older package build, so an update is pending.
#[derive(Debug, Clone)]
pub struct UpdateRepoFixture {
    /// Repository and package settings.
    repo: UpdateRepoConfig,
}

impl UpdateRepoFixture {
    /// Creates the fixture from configuration.
    #[must_use]
    pub const fn new(repo: UpdateRepoConfig) -> Self {
        Self {
            repo,
        }
    }

    /// Removes the package and the repository file, attempting both.
    fn cleanup(&self, session: &Session) -> HarnessResult<()> {
        run_all([
            run_ok(session, &host_commands::yum_remove(&[self.repo.package.as_str()])),
            run_ok(
                session,
                &host_commands::remove_file(&host_commands::repo_file_path(&self.repo.repo_id)),
            ),
        ])
    }
}

impl Provisioner for UpdateRepoFixture {
    type Resource = UpdateRepoConfig;

    fn name(&self) -> &str {
        "update-repo"
    }

    fn provision(&self, session: &Session) -> HarnessResult<UpdateRepoConfig> {
        run_ok(session, &host_commands::write_repo_file(&self.repo.repo_id, &self.repo.base_url))?;
        run_ok(session, &host_commands::yum_install(&[self.repo.old_spec.as_str()]))?;
        Ok(self.repo.clone())
    }

    fn teardown(&self, session: &Session, _repo: &UpdateRepoConfig) -> HarnessResult<()> {
        self.cleanup(session)
    }

    fn rollback(&self, session: &Session) -> HarnessResult<()> {
        self.cleanup(session)
    }
}

// ============================================================================
// SECTION: CDN Subscription
// ============================================================================

/// Hosts moved onto the CDN by [`CdnSubscriptionFixture`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CdnRegistration {
    /// Hosts that were re-registered and must be restored.
    pub switched: Vec<HostId>,
    /// Hosts already on the CDN, left untouched.
    pub untouched: Vec<HostId>,
}

/// Registers hosts to the CDN for the scope, then back to dogfood.
///
/// Hosts whose identity already shows the CDN marker are left alone on
/// both ends.
#[derive(Debug, Clone)]
pub struct CdnSubscriptionFixture {
    /// Registration credentials.
    credentials: Credentials,
}

impl CdnSubscriptionFixture {
    /// Creates the fixture from credentials.
    #[must_use]
    pub const fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
        }
    }

    /// Returns a required credential or a provisioning error.
    fn require<'a>(&self, value: Option<&'a String>, key: &str) -> HarnessResult<&'a str> {
        value.map(String::as_str).ok_or_else(|| HarnessError::ProvisioningFailed {
            fixture: self.name().to_string(),
            reason: format!("credentials.{key} is not configured"),
            rollback: None,
        })
    }

    /// Returns true when every host in `session` is already on the CDN.
    fn on_cdn(&self, session: &Session) -> HarnessResult<bool> {
        let identity = session.execute(&host_commands::subscription_identity())?;
        let marker = self.credentials.cdn_identity_marker.as_str();
        Ok(identity.iter().all(|result| result.stdout.contains(marker)))
    }

    /// Restores every listed host, attempting all of them.
    fn restore(&self, session: &Session, hosts: &[HostId]) -> HarnessResult<()> {
        run_all(hosts.iter().map(|host| {
            let single = session.for_host(host)?;
            self.register_dogfood(&single)
        }))
    }

    /// Moves one host onto the CDN.
    fn register_cdn(&self, session: &Session) -> HarnessResult<()> {
        let username = self.require(self.credentials.cdn_username.as_ref(), "cdn_username")?;
        let password = self.require(self.credentials.cdn_password.as_ref(), "cdn_password")?;
        session.execute(&host_commands::subscription_unregister())?;
        session.execute(&host_commands::subscription_clean())?;
        let installed = session.execute(&host_commands::katello_ca_consumer_query())?;
        let packages: Vec<String> = installed
            .iter()
            .flat_map(|result| result.stdout_lines())
            .map(str::trim)
            .filter(|line| line.starts_with("katello-ca-consumer"))
            .map(str::to_string)
            .collect();
        if !packages.is_empty() {
            let specs: Vec<&str> = packages.iter().map(String::as_str).collect();
            run_ok(session, &host_commands::yum_remove(&specs))?;
        }
        run_ok(session, &host_commands::subscription_register_user(username, password))?;
        for pool in &self.credentials.cdn_pool_ids {
            run_ok(session, &host_commands::subscription_attach_pool(pool))?;
        }
        Ok(())
    }

    /// Restores one host to the dogfood organization.
    fn register_dogfood(&self, session: &Session) -> HarnessResult<()> {
        let org = self.require(self.credentials.dogfood_org.as_ref(), "dogfood_org")?;
        let key = self.require(
            self.credentials.dogfood_activation_key.as_ref(),
            "dogfood_activation_key",
        )?;
        session.execute(&host_commands::subscription_unregister())?;
        session.execute(&host_commands::subscription_clean())?;
        if let Some(url) = &self.credentials.katello_ca_consumer_url {
            run_ok(session, &host_commands::yum_localinstall(url))?;
        }
        run_ok(session, &host_commands::subscription_register_key(org, key))
    }
}

impl Provisioner for CdnSubscriptionFixture {
    type Resource = CdnRegistration;

    fn name(&self) -> &str {
        "cdn-subscription"
    }

    fn provision(&self, session: &Session) -> HarnessResult<CdnRegistration> {
        // Teardown needs these; fail before touching any registration.
        self.require(self.credentials.dogfood_org.as_ref(), "dogfood_org")?;
        self.require(self.credentials.dogfood_activation_key.as_ref(), "dogfood_activation_key")?;
        let mut registration = CdnRegistration::default();
        for host in session.hosts() {
            let host_session = session.for_host(host)?;
            if self.on_cdn(&host_session)? {
                info!(host = %host, "already on cdn; leaving registration alone");
                registration.untouched.push(host.clone());
                continue;
            }
            registration.switched.push(host.clone());
            if let Err(err) = self.register_cdn(&host_session) {
                let restore = self.restore(session, &registration.switched);
                return Err(HarnessError::ProvisioningFailed {
                    fixture: self.name().to_string(),
                    reason: err.to_string(),
                    rollback: restore.err().map(Box::new),
                });
            }
        }
        Ok(registration)
    }

    fn teardown(&self, session: &Session, registration: &CdnRegistration) -> HarnessResult<()> {
        self.restore(session, &registration.switched)
    }
}
