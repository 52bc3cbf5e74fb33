// system-tests/tests/suites/packages.rs
// ============================================================================
// Module: Packages Tests
// Description: Live checks of `packages` locking, install, and update.
// Purpose: Verify lock state reporting and the yum protector on real hosts.
// Dependencies: fm-harness, system-tests helpers
// ============================================================================

//! Package management tests for fm-harness system-tests.

use fm_harness::HarnessResult;
use fm_harness::Session;
use fm_harness::catalog;
use fm_harness::catalog::PackagesAction;
use fm_harness::host_commands;
use fm_harness::host_commands::INSTALLER_LOCKING_DISABLED;
use fm_harness::host_commands::INSTALLER_LOCKING_ENABLED;
use fm_harness::host_commands::PACKAGES_LOCKED;
use fm_harness::host_commands::PACKAGES_UNLOCKED;
use fm_harness::host_commands::YUM_NOTHING_TO_DO;
use fm_harness::host_commands::YUM_PROTECTOR_HINT;
use fm_harness::provisioners::PackageLockFixture;
use fm_harness::provisioners::UpdateRepoFixture;
use helpers::harness::ProductScope;
use helpers::harness::TestResult;
use helpers::harness::start;

use crate::helpers;

/// Package used to probe the yum protector.
const PROBE_PACKAGE: &str = "zsh";
/// Second package installed alongside the probe.
const EXTRA_PACKAGE: &str = "elinks";

/// Requires `packages status` and `is-locked` to report a locked host.
fn expect_locked(session: &Session) -> HarnessResult<()> {
    session
        .execute(&catalog::packages(PackagesAction::Status, false, &[]))?
        .expect_success()?
        .expect_marker(PACKAGES_LOCKED)?
        .expect_marker(INSTALLER_LOCKING_ENABLED)?
        .expect_no_failure()?;
    session
        .execute(&catalog::packages(PackagesAction::IsLocked, false, &[]))?
        .expect_success()?
        .expect_marker("Packages are locked")?;
    Ok(())
}

/// Requires `packages status` and `is-locked` to report an unlocked host.
fn expect_unlocked(session: &Session, installer_marker: &str) -> HarnessResult<()> {
    session
        .execute(&catalog::packages(PackagesAction::Status, false, &[]))?
        .expect_success()?
        .expect_marker(PACKAGES_UNLOCKED)?
        .expect_marker(installer_marker)?
        .expect_no_failure()?;
    session
        .execute(&catalog::packages(PackagesAction::IsLocked, false, &[]))?
        .expect_exit_code(1)?
        .expect_marker("Packages are not locked")?;
    Ok(())
}

/// Runs `packages install|update` and requires a non-empty, locked transaction.
fn expect_locked_transaction(
    session: &Session,
    action: PackagesAction,
    specs: &[&str],
) -> HarnessResult<()> {
    session
        .execute(&catalog::packages(action, true, specs))?
        .expect_no_failure()?
        .expect_no_marker(YUM_NOTHING_TO_DO)?
        .expect_marker(PACKAGES_LOCKED)?
        .expect_marker(INSTALLER_LOCKING_ENABLED)?;
    Ok(())
}

#[test]
fn packages_lock_and_unlock() -> TestResult {
    let Some(run) = start("packages_lock_unlock", ProductScope::AnyProduct)? else {
        return Ok(());
    };
    run.session().with_provisioned(PackageLockFixture, |session, _| {
        session
            .execute(&catalog::packages(PackagesAction::Lock, true, &[]))?
            .expect_success()?
            .expect_no_failure()?;
        expect_locked(session)?;
        session
            .execute(&catalog::packages(PackagesAction::Unlock, true, &[]))?
            .expect_success()?
            .expect_no_failure()?;
        expect_unlocked(session, INSTALLER_LOCKING_ENABLED)
    })?;
    run.pass()
}

#[test]
fn installer_lock_package_versions() -> TestResult {
    let Some(run) = start("lock_package_versions", ProductScope::AnyProduct)? else {
        return Ok(());
    };
    run.session().with_provisioned(PackageLockFixture, |session, _| {
        expect_locked(session)?;
        session.execute(&host_commands::installer_lock_package_versions(false))?.expect_success()?;
        expect_unlocked(session, INSTALLER_LOCKING_DISABLED)
    })?;
    run.pass()
}

#[test]
fn packages_install_goes_through_the_maintenance_tool() -> TestResult {
    let Some(run) = start("packages_install", ProductScope::AnyProduct)? else {
        return Ok(());
    };
    run.session().with_provisioned(PackageLockFixture, |session, _| {
        session
            .execute(&host_commands::yum_install(&[PROBE_PACKAGE]))?
            .expect_exit_code(1)?
            .expect_marker(YUM_PROTECTOR_HINT)?;
        let install = [PROBE_PACKAGE, EXTRA_PACKAGE];
        expect_locked_transaction(session, PackagesAction::Install, &install)?;
        expect_locked_transaction(session, PackagesAction::Update, &[PROBE_PACKAGE])?;

        session.execute(&host_commands::installer_lock_package_versions(false))?.expect_success()?;
        expect_unlocked(session, INSTALLER_LOCKING_DISABLED)?;
        session.execute(&host_commands::yum_remove(&[PROBE_PACKAGE]))?.expect_success()?;
        session
            .execute(&host_commands::yum_install(&[PROBE_PACKAGE]))?
            .expect_success()?
            .expect_no_marker(YUM_PROTECTOR_HINT)?;
        Ok(())
    })?;
    run.pass()
}

#[test]
fn packages_check_update_then_update() -> TestResult {
    let Some(mut run) = start("packages_update", ProductScope::AnyProduct)? else {
        return Ok(());
    };
    let Some(repo) = run.config().update_repo.clone() else {
        return run.skip("no update repository configured");
    };
    let package = repo.package.clone();
    run.session().with_provisioned(UpdateRepoFixture::new(repo), |session, repo| {
        session
            .execute(&catalog::packages(PackagesAction::CheckUpdate, false, &[]))?
            .expect_success()?
            .expect_no_failure()?
            .expect_marker(&repo.package)?;
        session
            .execute(&catalog::packages(PackagesAction::Update, true, &[repo.package.as_str()]))?
            .expect_success()?
            .expect_no_failure()?;
        session
            .execute(&host_commands::rpm_query(&repo.package))?
            .expect_success()?
            .expect_marker(&repo.updated_marker)?;
        Ok(())
    })?;
    run.note(format!("{package} updated from the custom repository"));
    run.pass()
}

#[test]
#[ignore = "needs a newer rubygem-foreman_maintain build in an enabled repository"]
fn maintenance_tool_update_skips_the_installer() -> TestResult {
    let Some(run) = start("packages_sat_installer", ProductScope::SatelliteOnly)? else {
        return Ok(());
    };
    run.session()
        .execute(&catalog::packages(PackagesAction::Update, true, &["rubygem-foreman_maintain"]))?
        .expect_success()?
        .expect_no_failure()?
        .expect_no_marker("satellite-installer")?;
    run.pass()
}
