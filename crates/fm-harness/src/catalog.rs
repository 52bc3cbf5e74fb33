// crates/fm-harness/src/catalog.rs
// ============================================================================
// Module: Command Catalog
// Description: Typed catalog of maintenance-tool operations and their options.
// Purpose: Build concrete remote commands and reject bad input before execution.
// Dependencies: crate::command, crate::error
// ============================================================================

//! ## Overview
//! The catalog translates an operation name plus an option mapping into a
//! [`RemoteCommand`] for the `foreman-maintain` CLI. Construction is pure:
//! unknown operations fail with [`HarnessError::UnknownOperation`] and bad
//! options fail with [`HarnessError::InvalidOption`] before any host is
//! contacted.
//!
//! Operation names come in three families:
//! - advanced procedures (`service-restart`, `sync-plans-disable`, ...)
//! - procedure tags (`by-tag-pre-migrations`, ...)
//! - package subcommands (`packages-lock`, `packages-is-locked`, ...)
//!
//! Any name may also be written qualified as `procedure:<id>`,
//! `by-tag:<tag>`, or `packages:<action>`. The unqualified name
//! `packages-update` resolves to the package subcommand; the advanced
//! procedure of the same id is addressed as `procedure:packages-update`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::command::RemoteCommand;
use crate::error::HarnessError;
use crate::error::HarnessResult;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maintenance tool binary on the managed host.
pub const MAINTAIN_BIN: &str = "foreman-maintain";

/// Prompt emitted by `hammer-setup` when asking for the admin password.
pub const HAMMER_PASSWORD_PROMPT: &str = "Hammer admin password: ";

/// Prompt emitted by `foreman-tasks-ui-investigate` while waiting for the operator.
pub const TASKS_RESOLVED_PROMPT: &str = "press ENTER after the tasks are resolved.";

/// Literal failure marker the tool prints even when it exits zero.
pub const FAILURE_MARKER: &str = "FAIL";

// ============================================================================
// SECTION: Operations
// ============================================================================

/// Advanced procedures run through `advanced procedure run <id>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Procedure {
    /// Restart managed services.
    ServiceRestart,
    /// Configure hammer credentials (prompts for the admin password).
    HammerSetup,
    /// Update packages through the maintenance tool.
    PackagesUpdate,
    /// Enable maintenance mode (adds firewall rules).
    MaintenanceModeEnable,
    /// Disable maintenance mode (removes firewall rules).
    MaintenanceModeDisable,
    /// Delete foreman tasks in a given state.
    ForemanTasksDelete,
    /// Resume paused foreman tasks.
    ForemanTasksResume,
    /// Interactive investigation of stuck tasks.
    ForemanTasksUiInvestigate,
    /// Re-enable sync plans previously disabled by the tool.
    SyncPlansEnable,
    /// Disable active sync plans and record them in the state file.
    SyncPlansDisable,
    /// Enable the repositories required for a product version.
    RepositoriesSetup,
}

impl Procedure {
    /// All procedures in catalog order.
    pub const ALL: [Self; 11] = [
        Self::ServiceRestart,
        Self::HammerSetup,
        Self::PackagesUpdate,
        Self::MaintenanceModeEnable,
        Self::MaintenanceModeDisable,
        Self::ForemanTasksDelete,
        Self::ForemanTasksResume,
        Self::ForemanTasksUiInvestigate,
        Self::SyncPlansEnable,
        Self::SyncPlansDisable,
        Self::RepositoriesSetup,
    ];

    /// Returns the procedure id understood by the maintenance tool.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ServiceRestart => "service-restart",
            Self::HammerSetup => "hammer-setup",
            Self::PackagesUpdate => "packages-update",
            Self::MaintenanceModeEnable => "maintenance-mode-enable",
            Self::MaintenanceModeDisable => "maintenance-mode-disable",
            Self::ForemanTasksDelete => "foreman-tasks-delete",
            Self::ForemanTasksResume => "foreman-tasks-resume",
            Self::ForemanTasksUiInvestigate => "foreman-tasks-ui-investigate",
            Self::SyncPlansEnable => "sync-plans-enable",
            Self::SyncPlansDisable => "sync-plans-disable",
            Self::RepositoriesSetup => "repositories-setup",
        }
    }

    /// Parses a procedure id.
    fn parse(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|procedure| procedure.as_str() == id)
    }
}

/// Procedure tags run through `advanced procedure by-tag <tag>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProcedureTag {
    /// Procedures run before migrations (enables maintenance mode).
    PreMigrations,
    /// Procedures run after migrations (disables maintenance mode).
    PostMigrations,
    /// Restore confirmation procedures.
    Restore,
}

impl ProcedureTag {
    /// All tags in catalog order.
    pub const ALL: [Self; 3] = [Self::PreMigrations, Self::PostMigrations, Self::Restore];

    /// Returns the tag understood by the maintenance tool.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PreMigrations => "pre-migrations",
            Self::PostMigrations => "post-migrations",
            Self::Restore => "restore",
        }
    }

    /// Parses a tag.
    fn parse(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|candidate| candidate.as_str() == tag)
    }
}

/// Subcommands of `packages`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PackagesAction {
    /// Lock product package versions.
    Lock,
    /// Unlock product package versions.
    Unlock,
    /// Report lock status.
    Status,
    /// Exit 0 when locked, 1 when unlocked.
    IsLocked,
    /// Install packages while keeping locks consistent.
    Install,
    /// Update packages while keeping locks consistent.
    Update,
    /// List available updates.
    CheckUpdate,
}

impl PackagesAction {
    /// All actions in catalog order.
    pub const ALL: [Self; 7] = [
        Self::Lock,
        Self::Unlock,
        Self::Status,
        Self::IsLocked,
        Self::Install,
        Self::Update,
        Self::CheckUpdate,
    ];

    /// Returns the subcommand understood by the maintenance tool.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lock => "lock",
            Self::Unlock => "unlock",
            Self::Status => "status",
            Self::IsLocked => "is-locked",
            Self::Install => "install",
            Self::Update => "update",
            Self::CheckUpdate => "check-update",
        }
    }

    /// Parses a subcommand.
    fn parse(action: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|candidate| candidate.as_str() == action)
    }
}

/// Logical operation in the command catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operation {
    /// `advanced procedure run <id>`.
    Procedure(Procedure),
    /// `advanced procedure by-tag <tag>`.
    ByTag(ProcedureTag),
    /// `packages <action>`.
    Packages(PackagesAction),
}

impl Operation {
    /// Returns every operation in catalog order.
    #[must_use]
    pub fn all() -> Vec<Self> {
        Procedure::ALL
            .into_iter()
            .map(Self::Procedure)
            .chain(ProcedureTag::ALL.into_iter().map(Self::ByTag))
            .chain(PackagesAction::ALL.into_iter().map(Self::Packages))
            .collect()
    }

    /// Returns the canonical operation name.
    ///
    /// Names are unqualified except where that would be ambiguous.
    #[must_use]
    pub fn name(self) -> String {
        match self {
            Self::Procedure(Procedure::PackagesUpdate) => {
                format!("procedure:{}", Procedure::PackagesUpdate.as_str())
            }
            Self::Procedure(procedure) => procedure.as_str().to_string(),
            Self::ByTag(tag) => format!("by-tag-{}", tag.as_str()),
            Self::Packages(action) => format!("packages-{}", action.as_str()),
        }
    }

    /// Parses an operation name, qualified or unqualified.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::UnknownOperation`] when the name is not in the catalog.
    pub fn parse(name: &str) -> HarnessResult<Self> {
        let unknown = || HarnessError::UnknownOperation {
            name: name.to_string(),
        };
        if let Some((family, id)) = name.split_once(':') {
            return match family {
                "procedure" => Procedure::parse(id).map(Self::Procedure),
                "by-tag" => ProcedureTag::parse(id).map(Self::ByTag),
                "packages" => PackagesAction::parse(id).map(Self::Packages),
                _ => None,
            }
            .ok_or_else(unknown);
        }
        if let Some(action) = name.strip_prefix("packages-").and_then(PackagesAction::parse) {
            return Ok(Self::Packages(action));
        }
        if let Some(tag) = name.strip_prefix("by-tag-").and_then(ProcedureTag::parse) {
            return Ok(Self::ByTag(tag));
        }
        Procedure::parse(name).map(Self::Procedure).ok_or_else(unknown)
    }

    /// Returns true when the operation accepts the option.
    #[must_use]
    pub const fn accepts(self, key: OptionKey) -> bool {
        match key {
            OptionKey::State => matches!(self, Self::Procedure(Procedure::ForemanTasksDelete)),
            OptionKey::Version => matches!(self, Self::Procedure(Procedure::RepositoriesSetup)),
            OptionKey::Password => matches!(self, Self::Procedure(Procedure::HammerSetup)),
            OptionKey::Packages => matches!(
                self,
                Self::Packages(PackagesAction::Install | PackagesAction::Update)
            ),
            OptionKey::AssumeYes => !matches!(
                self,
                Self::Packages(PackagesAction::Status | PackagesAction::IsLocked)
            ),
        }
    }

    /// Returns the option the operation cannot run without, if any.
    #[must_use]
    pub const fn required_option(self) -> Option<OptionKey> {
        match self {
            Self::Procedure(Procedure::ForemanTasksDelete) => Some(OptionKey::State),
            Self::Procedure(Procedure::RepositoriesSetup) => Some(OptionKey::Version),
            Self::Packages(PackagesAction::Install) => Some(OptionKey::Packages),
            _ => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl FromStr for Operation {
    type Err = HarnessError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::parse(name)
    }
}

// ============================================================================
// SECTION: Options
// ============================================================================

/// Recognized option keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OptionKey {
    /// Task state filter (`old`, `planning`, `pending`).
    State,
    /// Product version (`6.3`, `6.4`, ...).
    Version,
    /// Pass `--assumeyes` (`true`/`false`, `1`/`0`).
    AssumeYes,
    /// Whitespace-separated package specs.
    Packages,
    /// Admin password answered at the hammer-setup prompt.
    Password,
}

impl OptionKey {
    /// Returns the option key as written in option mappings.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::State => "state",
            Self::Version => "version",
            Self::AssumeYes => "assumeyes",
            Self::Packages => "packages",
            Self::Password => "password",
        }
    }

    /// Parses an option key.
    fn parse(key: &str) -> Option<Self> {
        [Self::State, Self::Version, Self::AssumeYes, Self::Packages, Self::Password]
            .into_iter()
            .find(|candidate| candidate.as_str() == key)
    }
}

/// Task state filter for `foreman-tasks-delete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskState {
    /// Tasks older than the retention window.
    Old,
    /// Tasks stuck in planning.
    Planning,
    /// Tasks stuck in pending.
    Pending,
}

impl TaskState {
    /// All task states.
    pub const ALL: [Self; 3] = [Self::Old, Self::Planning, Self::Pending];

    /// Returns the state as passed to `--state`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Old => "old",
            Self::Planning => "planning",
            Self::Pending => "pending",
        }
    }
}

/// Product version in `major.minor` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProductVersion {
    /// Major version.
    pub major: u16,
    /// Minor version.
    pub minor: u16,
}

impl ProductVersion {
    /// Creates a version.
    #[must_use]
    pub const fn new(major: u16, minor: u16) -> Self {
        Self {
            major,
            minor,
        }
    }

    /// Parses `major.minor`.
    fn parse(raw: &str) -> Option<Self> {
        let (major, minor) = raw.split_once('.')?;
        if major.is_empty() || minor.is_empty() {
            return None;
        }
        if !major.bytes().all(|b| b.is_ascii_digit()) || !minor.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }
        Some(Self::new(major.parse().ok()?, minor.parse().ok()?))
    }
}

impl fmt::Display for ProductVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for ProductVersion {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse(raw).ok_or_else(|| format!("`{raw}` is not a major.minor version"))
    }
}

/// Typed options for one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationOptions {
    /// Task state filter.
    pub state: Option<TaskState>,
    /// Product version.
    pub version: Option<ProductVersion>,
    /// Pass `--assumeyes`.
    pub assume_yes: bool,
    /// Package specs for install/update.
    pub packages: Vec<String>,
    /// Admin password for hammer-setup.
    pub password: Option<String>,
}

impl OperationOptions {
    /// Parses a string option mapping for `operation`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::InvalidOption`] for unknown keys, keys the
    /// operation does not accept, or malformed values.
    pub fn from_pairs<'a, I>(operation: Operation, pairs: I) -> HarnessResult<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut options = Self::default();
        for (raw_key, value) in pairs {
            let invalid = |reason: String| HarnessError::InvalidOption {
                operation: operation.name(),
                option: raw_key.to_string(),
                reason,
            };
            let key = OptionKey::parse(raw_key)
                .ok_or_else(|| invalid("unrecognized option".to_string()))?;
            if !operation.accepts(key) {
                return Err(invalid("not accepted by this operation".to_string()));
            }
            match key {
                OptionKey::State => {
                    let state = TaskState::ALL
                        .into_iter()
                        .find(|state| state.as_str() == value)
                        .ok_or_else(|| invalid("expected old, planning, or pending".to_string()))?;
                    options.state = Some(state);
                }
                OptionKey::Version => {
                    options.version = Some(value.parse::<ProductVersion>().map_err(invalid)?);
                }
                OptionKey::AssumeYes => {
                    options.assume_yes = parse_flag(value)
                        .ok_or_else(|| invalid("expected 1, 0, true, or false".to_string()))?;
                }
                OptionKey::Packages => {
                    options.packages = value.split_whitespace().map(str::to_string).collect();
                    if options.packages.is_empty() {
                        return Err(invalid("package list is empty".to_string()));
                    }
                }
                OptionKey::Password => {
                    if value.is_empty() {
                        return Err(invalid("password is empty".to_string()));
                    }
                    options.password = Some(value.to_string());
                }
            }
        }
        Ok(options)
    }

    /// Returns true when the option holds a value.
    const fn has(&self, key: OptionKey) -> bool {
        match key {
            OptionKey::State => self.state.is_some(),
            OptionKey::Version => self.version.is_some(),
            OptionKey::AssumeYes => self.assume_yes,
            OptionKey::Packages => !self.packages.is_empty(),
            OptionKey::Password => self.password.is_some(),
        }
    }
}

/// Parses a boolean flag value.
fn parse_flag(raw: &str) -> Option<bool> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("true") || trimmed == "1" {
        return Some(true);
    }
    if trimmed.eq_ignore_ascii_case("false") || trimmed == "0" {
        return Some(false);
    }
    None
}

// ============================================================================
// SECTION: Construction
// ============================================================================

/// Builds a command from an operation name and a string option mapping.
///
/// # Errors
///
/// Returns [`HarnessError::UnknownOperation`] for names outside the catalog and
/// [`HarnessError::InvalidOption`] for bad options.
pub fn build(name: &str, options: &BTreeMap<String, String>) -> HarnessResult<RemoteCommand> {
    let operation = Operation::parse(name)?;
    let typed = OperationOptions::from_pairs(
        operation,
        options.iter().map(|(key, value)| (key.as_str(), value.as_str())),
    )?;
    command(operation, &typed)
}

/// Builds a command from a typed operation and options.
///
/// # Errors
///
/// Returns [`HarnessError::InvalidOption`] when a required option is missing
/// or an option is set that the operation does not accept.
pub fn command(operation: Operation, options: &OperationOptions) -> HarnessResult<RemoteCommand> {
    for key in [
        OptionKey::State,
        OptionKey::Version,
        OptionKey::AssumeYes,
        OptionKey::Packages,
        OptionKey::Password,
    ] {
        if options.has(key) && !operation.accepts(key) {
            return Err(HarnessError::InvalidOption {
                operation: operation.name(),
                option: key.as_str().to_string(),
                reason: "not accepted by this operation".to_string(),
            });
        }
    }
    if let Some(required) = operation.required_option()
        && !options.has(required)
    {
        return Err(HarnessError::InvalidOption {
            operation: operation.name(),
            option: required.as_str().to_string(),
            reason: "required option is missing".to_string(),
        });
    }

    Ok(assemble(operation, options))
}

/// Renders a validated operation into a command.
fn assemble(operation: Operation, options: &OperationOptions) -> RemoteCommand {
    let mut args: Vec<String> = Vec::new();
    match operation {
        Operation::Procedure(procedure) => {
            args.extend(["advanced", "procedure", "run", procedure.as_str()].map(String::from));
            if let Some(state) = options.state {
                args.extend(["--state".to_string(), state.as_str().to_string()]);
            }
            if let Some(version) = options.version {
                args.extend(["--version".to_string(), version.to_string()]);
            }
        }
        Operation::ByTag(tag) => {
            args.extend(["advanced", "procedure", "by-tag", tag.as_str()].map(String::from));
        }
        Operation::Packages(action) => {
            args.extend(["packages", action.as_str()].map(String::from));
        }
    }
    if options.assume_yes {
        args.push("--assumeyes".to_string());
    }
    args.extend(options.packages.iter().cloned());

    let built = RemoteCommand::argv(MAINTAIN_BIN, args);
    match operation {
        Operation::Procedure(Procedure::HammerSetup) => match &options.password {
            Some(password) => built.with_response(HAMMER_PASSWORD_PROMPT, password.clone()),
            None => built,
        },
        Operation::Procedure(Procedure::ForemanTasksUiInvestigate) => {
            built.with_response(TASKS_RESOLVED_PROMPT, " ")
        }
        _ => built,
    }
}

// ============================================================================
// SECTION: Shorthands
// ============================================================================

/// Builds an option-free command for `operation`.
///
/// # Errors
///
/// Returns [`HarnessError::InvalidOption`] when the operation requires an option.
pub fn simple(operation: Operation) -> HarnessResult<RemoteCommand> {
    command(operation, &OperationOptions::default())
}

/// Builds `advanced procedure run <procedure>` for option-free procedures.
#[must_use]
pub fn procedure(procedure: Procedure) -> RemoteCommand {
    assemble(Operation::Procedure(procedure), &OperationOptions::default())
}

/// Builds `advanced procedure by-tag <tag>`.
#[must_use]
pub fn by_tag(tag: ProcedureTag, assume_yes: bool) -> RemoteCommand {
    let options = OperationOptions {
        assume_yes,
        ..OperationOptions::default()
    };
    assemble(Operation::ByTag(tag), &options)
}

/// Builds `advanced procedure run foreman-tasks-delete --state <state>`.
#[must_use]
pub fn foreman_tasks_delete(state: TaskState) -> RemoteCommand {
    let options = OperationOptions {
        state: Some(state),
        ..OperationOptions::default()
    };
    assemble(Operation::Procedure(Procedure::ForemanTasksDelete), &options)
}

/// Builds `advanced procedure run repositories-setup --version <version>`.
#[must_use]
pub fn repositories_setup(version: ProductVersion) -> RemoteCommand {
    let options = OperationOptions {
        version: Some(version),
        ..OperationOptions::default()
    };
    assemble(Operation::Procedure(Procedure::RepositoriesSetup), &options)
}

/// Builds `advanced procedure run hammer-setup` answering the password prompt.
#[must_use]
pub fn hammer_setup(password: &str) -> RemoteCommand {
    let options = OperationOptions {
        password: Some(password.to_string()),
        ..OperationOptions::default()
    };
    assemble(Operation::Procedure(Procedure::HammerSetup), &options)
}

/// Builds `packages <action>` with optional `--assumeyes` and package specs.
///
/// Flags the action does not take are dropped.
#[must_use]
pub fn packages(action: PackagesAction, assume_yes: bool, specs: &[&str]) -> RemoteCommand {
    let operation = Operation::Packages(action);
    let options = OperationOptions {
        assume_yes: assume_yes && operation.accepts(OptionKey::AssumeYes),
        packages: if operation.accepts(OptionKey::Packages) {
            specs.iter().map(|spec| (*spec).to_string()).collect()
        } else {
            Vec::new()
        },
        ..OperationOptions::default()
    };
    assemble(operation, &options)
}

#[cfg(test)]
#[path = "catalog_tests.rs"]
mod tests;
