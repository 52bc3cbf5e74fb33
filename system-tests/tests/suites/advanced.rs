// system-tests/tests/suites/advanced.rs
// ============================================================================
// Module: Advanced Procedure Tests
// Description: Live checks of `advanced procedure run` and `by-tag`.
// Purpose: Verify each procedure's contract on the configured hosts.
// Dependencies: fm-harness, system-tests helpers
// ============================================================================

//! Advanced procedure tests for fm-harness system-tests.

use fm_harness::HarnessResult;
use fm_harness::Provisioner;
use fm_harness::Session;
use fm_harness::SyncPlanStatus;
use fm_harness::catalog;
use fm_harness::catalog::Procedure;
use fm_harness::catalog::ProcedureTag;
use fm_harness::catalog::ProductVersion;
use fm_harness::catalog::TaskState;
use fm_harness::host_commands;
use fm_harness::host_commands::MAINTENANCE_CHAIN;
use fm_harness::provisioners::AdminPasswordFixture;
use fm_harness::provisioners::CdnSubscriptionFixture;
use fm_harness::provisioners::HammerDefaultsFixture;
use fm_harness::provisioners::MaintenanceModeFixture;
use fm_harness::provisioners::SyncPlanFixture;
use helpers::harness::ProductScope;
use helpers::harness::TestResult;
use helpers::harness::start;

use crate::helpers;

/// Runs a procedure and requires no failure marker.
fn run_clean(session: &Session, procedure: Procedure) -> HarnessResult<()> {
    session.execute(&catalog::procedure(procedure))?.expect_no_failure()?;
    Ok(())
}

/// Runs a procedure and requires exit 0 without the failure marker.
fn run_ok(session: &Session, procedure: Procedure) -> HarnessResult<()> {
    session.execute(&catalog::procedure(procedure))?.expect_success()?.expect_no_failure()?;
    Ok(())
}

/// Pre-migrations for the scope, post-migrations on exit.
struct MigrationWindow;

impl Provisioner for MigrationWindow {
    type Resource = ();

    fn name(&self) -> &str {
        "migration-window"
    }

    fn provision(&self, session: &Session) -> HarnessResult<()> {
        let pre = catalog::by_tag(ProcedureTag::PreMigrations, false);
        session.execute(&pre)?.expect_no_failure()?;
        Ok(())
    }

    fn teardown(&self, session: &Session, _: &()) -> HarnessResult<()> {
        let post = catalog::by_tag(ProcedureTag::PostMigrations, false);
        session.execute(&post)?.expect_no_failure()?;
        Ok(())
    }
}

#[test]
fn service_restart() -> TestResult {
    let Some(run) = start("service_restart", ProductScope::SatelliteOnly)? else {
        return Ok(());
    };
    run_clean(run.session(), Procedure::ServiceRestart)?;
    run.pass()
}

#[test]
fn hammer_setup_answers_the_password_prompt() -> TestResult {
    let Some(mut run) = start("hammer_setup", ProductScope::SatelliteOnly)? else {
        return Ok(());
    };
    let rotate = AdminPasswordFixture::from_credentials(&run.config().credentials);
    run.session().with_provisioned(rotate, |session, password| {
        session.execute(&catalog::hammer_setup(password))?.expect_success()?;
        Ok(())
    })?;
    run.note("admin password rotated for the run and restored");
    run.pass()
}

#[test]
#[ignore = "procedure updates every package on the host"]
fn packages_update_procedure() -> TestResult {
    let Some(run) = start("packages_update_procedure", ProductScope::SatelliteOnly)? else {
        return Ok(());
    };
    run_clean(run.session(), Procedure::PackagesUpdate)?;
    run.pass()
}

#[test]
fn maintenance_mode_disable_removes_rules() -> TestResult {
    let Some(run) = start("maintenance_mode_disable", ProductScope::SatelliteOnly)? else {
        return Ok(());
    };
    let session = run.session();
    let enabled = session.provision(MaintenanceModeFixture)?;
    enabled.release()?;
    session.execute(&host_commands::iptables_list())?.expect_no_marker(MAINTENANCE_CHAIN)?;
    run.pass()
}

#[test]
fn maintenance_mode_enable_adds_rules() -> TestResult {
    let Some(run) = start("maintenance_mode_enable", ProductScope::SatelliteOnly)? else {
        return Ok(());
    };
    run.session().with_provisioned(MaintenanceModeFixture, |session, _| {
        session.execute(&host_commands::iptables_list())?.expect_marker(MAINTENANCE_CHAIN)?;
        Ok(())
    })?;
    run.pass()
}

/// Deletes tasks in `state` and requires no failure marker.
fn tasks_delete(test_name: &str, state: TaskState) -> TestResult {
    let Some(mut run) = start(test_name, ProductScope::SatelliteOnly)? else {
        return Ok(());
    };
    run.session().execute(&catalog::foreman_tasks_delete(state))?.expect_no_failure()?;
    run.note(format!("state {}", state.as_str()));
    run.pass()
}

#[test]
fn foreman_tasks_delete_old() -> TestResult {
    tasks_delete("foreman_tasks_delete_old", TaskState::Old)
}

#[test]
fn foreman_tasks_delete_planning() -> TestResult {
    tasks_delete("foreman_tasks_delete_planning", TaskState::Planning)
}

#[test]
fn foreman_tasks_delete_pending() -> TestResult {
    tasks_delete("foreman_tasks_delete_pending", TaskState::Pending)
}

#[test]
fn foreman_tasks_resume() -> TestResult {
    let Some(run) = start("foreman_tasks_resume", ProductScope::SatelliteOnly)? else {
        return Ok(());
    };
    run_clean(run.session(), Procedure::ForemanTasksResume)?;
    run.pass()
}

#[test]
fn foreman_tasks_ui_investigate() -> TestResult {
    let Some(run) = start("foreman_tasks_ui_investigate", ProductScope::SatelliteOnly)? else {
        return Ok(());
    };
    let command = catalog::procedure(Procedure::ForemanTasksUiInvestigate);
    run.session().execute(&command)?.expect_success()?;
    run.pass()
}

#[test]
fn sync_plans_disable_then_enable() -> TestResult {
    let Some(mut run) = start("sync_plans_disable_enable", ProductScope::SatelliteOnly)? else {
        return Ok(());
    };
    let fixture = SyncPlanFixture::new(run.config().organization_id);
    let plan_name = fixture.plan_name().to_string();
    run.session().with_provisioned(fixture, |session, plan| {
        run_ok(session, Procedure::SyncPlansDisable)?;
        session.expect_sync_plan(&plan.ids, SyncPlanStatus::Disabled)?;
        run_ok(session, Procedure::SyncPlansEnable)?;
        session.expect_sync_plan(&plan.ids, SyncPlanStatus::Enabled)
    })?;
    run.note(format!("sync plan {plan_name} created and deleted"));
    run.pass()
}

#[test]
fn by_tag_migrations_toggle_maintenance_mode() -> TestResult {
    let Some(run) = start("by_tag_check_migrations", ProductScope::SatelliteOnly)? else {
        return Ok(());
    };
    let session = run.session();
    session.with_provisioned(MigrationWindow, |session, _| {
        session.execute(&host_commands::iptables_list())?.expect_marker(MAINTENANCE_CHAIN)?;
        Ok(())
    })?;
    session.execute(&host_commands::iptables_list())?.expect_no_marker(MAINTENANCE_CHAIN)?;
    run.pass()
}

#[test]
fn by_tag_restore_confirmation() -> TestResult {
    let Some(run) = start("by_tag_restore_confirmation", ProductScope::AnyProduct)? else {
        return Ok(());
    };
    let command = catalog::by_tag(ProcedureTag::Restore, true);
    run.session().execute(&command)?.expect_success()?.expect_no_failure()?;
    run.pass()
}

#[test]
fn sync_plans_with_hammer_defaults() -> TestResult {
    let Some(run) = start("sync_plans_with_hammer_defaults", ProductScope::SatelliteOnly)? else {
        return Ok(());
    };
    let defaults = HammerDefaultsFixture::organization(run.config().organization_id);
    run.session().with_provisioned(defaults, |session, _| {
        run_ok(session, Procedure::SyncPlansDisable)?;
        run_ok(session, Procedure::SyncPlansEnable)
    })?;
    run.pass()
}

#[test]
fn repositories_setup_enables_expected_repositories() -> TestResult {
    let Some(mut run) = start("repositories_setup", ProductScope::SatelliteOnly)? else {
        return Ok(());
    };
    if !run.settings().allow_registration {
        return run.skip("subscription re-registration is not allowed for this run");
    }
    let versions: Vec<(ProductVersion, Vec<String>)> = run
        .config()
        .repositories_by_version()?
        .into_iter()
        .map(|(version, repos)| (version, repos.to_vec()))
        .collect();
    if versions.is_empty() {
        return run.skip("no expected repositories configured");
    }
    let cdn = CdnSubscriptionFixture::new(run.config().credentials.clone());
    let registration = run.session().with_provisioned(cdn, |session, registration| {
        for (version, repos) in &versions {
            let setup = session.execute(&catalog::repositories_setup(*version))?;
            setup.expect_success()?.expect_no_failure()?;
            let listed = session.execute(&host_commands::yum_repolist())?;
            for repo in repos {
                listed.expect_marker(repo)?;
            }
        }
        Ok(registration.clone())
    })?;
    run.note(format!(
        "{} host(s) switched to the CDN and restored, {} already on the CDN",
        registration.switched.len(),
        registration.untouched.len()
    ));
    run.pass()
}
