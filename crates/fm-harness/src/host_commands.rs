// crates/fm-harness/src/host_commands.rs
// ============================================================================
// Module: Host Commands
// Description: Builders for auxiliary host tools used around the maintenance CLI.
// Purpose: Keep fixture and suite command lines in one typed place.
// Dependencies: crate::command
// ============================================================================

//! ## Overview
//! Fixtures and suites need a handful of commands besides
//! `foreman-maintain`: `hammer` for sync plans, users, and defaults,
//! `iptables` for the maintenance-mode chain, `satellite-installer` for
//! package locking, plus `yum`, `rpm`, and `subscription-manager`. Each
//! builder is pure and returns an argv [`RemoteCommand`]; the few that need
//! redirection use a shell command with every operand quoted.
//!
//! The section at the bottom collects the literal output markers suites
//! assert on.

use crate::command::RemoteCommand;
use crate::command::shell_quote;

// ============================================================================
// SECTION: Hammer
// ============================================================================

/// Hammer CLI binary.
pub const HAMMER_BIN: &str = "hammer";

/// Creates an enabled weekly sync plan.
#[must_use]
pub fn sync_plan_create(name: &str, sync_date: &str, organization_id: u64) -> RemoteCommand {
    let organization_id = organization_id.to_string();
    RemoteCommand::argv(
        HAMMER_BIN,
        [
            "sync-plan",
            "create",
            "--name",
            name,
            "--enabled",
            "true",
            "--interval",
            "weekly",
            "--sync-date",
            sync_date,
            "--organization-id",
            organization_id.as_str(),
        ],
    )
}

/// Prints a sync plan as CSV (header line, then the plan; id first).
#[must_use]
pub fn sync_plan_info(name: &str, organization_id: u64) -> RemoteCommand {
    let organization_id = organization_id.to_string();
    RemoteCommand::argv(
        HAMMER_BIN,
        [
            "--output",
            "csv",
            "sync-plan",
            "info",
            "--name",
            name,
            "--organization-id",
            organization_id.as_str(),
        ],
    )
}

/// Extracts the plan id from [`sync_plan_info`] output.
#[must_use]
pub fn parse_sync_plan_id(csv: &str) -> Option<u64> {
    csv.lines().nth(1)?.split(',').next()?.trim().parse().ok()
}

/// Deletes a sync plan by name.
#[must_use]
pub fn sync_plan_delete(name: &str, organization_id: u64) -> RemoteCommand {
    let organization_id = organization_id.to_string();
    RemoteCommand::argv(
        HAMMER_BIN,
        ["sync-plan", "delete", "--name", name, "--organization-id", organization_id.as_str()],
    )
}

/// Changes a user's password, authenticating as that user.
#[must_use]
pub fn user_password_update(login: &str, current: &str, new: &str) -> RemoteCommand {
    RemoteCommand::argv(
        HAMMER_BIN,
        ["-u", login, "-p", current, "user", "update", "--login", login, "--password", new],
    )
}

/// Adds a hammer default parameter.
#[must_use]
pub fn defaults_add(param: &str, value: &str) -> RemoteCommand {
    RemoteCommand::argv(
        HAMMER_BIN,
        ["defaults", "add", "--param-name", param, "--param-value", value],
    )
}

/// Deletes a hammer default parameter.
#[must_use]
pub fn defaults_delete(param: &str) -> RemoteCommand {
    RemoteCommand::argv(HAMMER_BIN, ["defaults", "delete", "--param-name", param])
}

// ============================================================================
// SECTION: Firewall
// ============================================================================

/// Chain name the maintenance tool adds while maintenance mode is on.
pub const MAINTENANCE_CHAIN: &str = "FOREMAN_MAINTAIN";

/// Lists firewall rules.
#[must_use]
pub fn iptables_list() -> RemoteCommand {
    RemoteCommand::argv("iptables", ["-L"])
}

// ============================================================================
// SECTION: Installer
// ============================================================================

/// Turns installer-managed package locking on or off.
#[must_use]
pub fn installer_lock_package_versions(lock: bool) -> RemoteCommand {
    let flag = if lock { "--lock-package-versions" } else { "--no-lock-package-versions" };
    RemoteCommand::argv("satellite-installer", [flag])
}

// ============================================================================
// SECTION: Packages
// ============================================================================

/// Lists enabled yum repositories.
#[must_use]
pub fn yum_repolist() -> RemoteCommand {
    RemoteCommand::argv("yum", ["repolist"])
}

/// Installs packages with plain yum.
#[must_use]
pub fn yum_install(specs: &[&str]) -> RemoteCommand {
    RemoteCommand::argv("yum", ["install", "-y"].into_iter().chain(specs.iter().copied()))
}

/// Removes packages with plain yum.
#[must_use]
pub fn yum_remove(specs: &[&str]) -> RemoteCommand {
    RemoteCommand::argv("yum", ["remove", "-y"].into_iter().chain(specs.iter().copied()))
}

/// Installs a package from a local path or URL.
#[must_use]
pub fn yum_localinstall(source: &str) -> RemoteCommand {
    RemoteCommand::argv("yum", ["-y", "localinstall", source])
}

/// Queries installed packages by name.
#[must_use]
pub fn rpm_query(name: &str) -> RemoteCommand {
    RemoteCommand::argv("rpm", ["-qa", name])
}

/// Directory holding yum repository definitions.
pub const YUM_REPOS_DIR: &str = "/etc/yum.repos.d";

/// Returns the path of a repository definition file.
#[must_use]
pub fn repo_file_path(repo_id: &str) -> String {
    format!("{YUM_REPOS_DIR}/{repo_id}.repo")
}

/// Writes an unsigned repository definition.
#[must_use]
pub fn write_repo_file(repo_id: &str, base_url: &str) -> RemoteCommand {
    let body = format!("[{repo_id}]\nname={repo_id}\nbaseurl={base_url}\nenabled=1\ngpgcheck=0\n");
    RemoteCommand::shell(format!(
        "printf '%s' {} > {}",
        shell_quote(&body),
        shell_quote(&repo_file_path(repo_id))
    ))
}

/// Removes a file, ignoring absence.
#[must_use]
pub fn remove_file(path: &str) -> RemoteCommand {
    RemoteCommand::argv("rm", ["-f", path])
}

// ============================================================================
// SECTION: Subscriptions
// ============================================================================

/// Subscription manager binary.
const SUBSCRIPTION_MANAGER: &str = "subscription-manager";

/// Prints the host's registration identity.
#[must_use]
pub fn subscription_identity() -> RemoteCommand {
    RemoteCommand::argv(SUBSCRIPTION_MANAGER, ["identity"])
}

/// Unregisters the host.
#[must_use]
pub fn subscription_unregister() -> RemoteCommand {
    RemoteCommand::argv(SUBSCRIPTION_MANAGER, ["unregister"])
}

/// Removes local registration data.
#[must_use]
pub fn subscription_clean() -> RemoteCommand {
    RemoteCommand::argv(SUBSCRIPTION_MANAGER, ["clean"])
}

/// Registers with user credentials.
#[must_use]
pub fn subscription_register_user(username: &str, password: &str) -> RemoteCommand {
    RemoteCommand::argv(
        SUBSCRIPTION_MANAGER,
        [
            "register".to_string(),
            "--force".to_string(),
            format!("--username={username}"),
            format!("--password={password}"),
        ],
    )
}

/// Registers with an organization and activation key.
#[must_use]
pub fn subscription_register_key(org: &str, activation_key: &str) -> RemoteCommand {
    RemoteCommand::argv(
        SUBSCRIPTION_MANAGER,
        [
            "register".to_string(),
            "--force".to_string(),
            format!("--org={org}"),
            format!("--activationkey={activation_key}"),
        ],
    )
}

/// Attaches a subscription pool.
#[must_use]
pub fn subscription_attach_pool(pool_id: &str) -> RemoteCommand {
    RemoteCommand::argv(SUBSCRIPTION_MANAGER, ["attach".to_string(), format!("--pool={pool_id}")])
}

/// Lists installed `katello-ca-consumer` packages.
#[must_use]
pub fn katello_ca_consumer_query() -> RemoteCommand {
    rpm_query("katello-ca-consumer*")
}

// ============================================================================
// SECTION: Output Markers
// ============================================================================

/// Printed by `packages status` and `packages lock` when locked.
pub const PACKAGES_LOCKED: &str = "Packages are locked.";
/// Printed by `packages status` and `packages unlock` when unlocked.
pub const PACKAGES_UNLOCKED: &str = "Packages are not locked.";
/// Printed when installer-managed locking is on.
pub const INSTALLER_LOCKING_ENABLED: &str =
    "Automatic locking of package versions is enabled in installer.";
/// Printed when installer-managed locking is off.
pub const INSTALLER_LOCKING_DISABLED: &str =
    "Automatic locking of package versions is disabled in installer.";
/// Printed by the yum protector plugin when plain yum is blocked.
pub const YUM_PROTECTOR_HINT: &str = "Use foreman-maintain packages install/update <package>";
/// Printed by yum when a transaction is empty.
pub const YUM_NOTHING_TO_DO: &str = "Nothing to do";
