// crates/fm-harness/tests/common/mod.rs
// ============================================================================
// Module: Simulated Satellite
// Description: In-memory executor emulating the managed-host commands.
// Purpose: Drive sessions, verifications, and fixtures without real hosts.
// ============================================================================

//! ## Overview
//! [`FakeSatellite`] answers the hammer, `foreman-maintain`, iptables, and
//! subscription-manager invocations the harness issues, keeping per-host
//! state so fixtures and scenarios can assert on the end result. Commands
//! whose rendering contains an injected substring exit 1 with `FAIL`.

#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Shared helpers are used by a subset of test binaries."
)]

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use fm_harness::ExecutionBatch;
use fm_harness::HarnessError;
use fm_harness::HarnessResult;
use fm_harness::HostId;
use fm_harness::HostResult;
use fm_harness::PromptResponses;
use fm_harness::RemoteCommand;
use fm_harness::RemoteExecutor;
use fm_harness::Session;
use fm_harness::catalog::HAMMER_PASSWORD_PROMPT;
use fm_harness::command::CommandLine;
use fm_harness::executor::fetch_destination;
use fm_harness::host_commands::MAINTENANCE_CHAIN;
use fm_harness::host_commands::PACKAGES_LOCKED;
use fm_harness::host_commands::PACKAGES_UNLOCKED;
use fm_harness::state_file::DATA_FILE;
use tempfile::TempDir;

/// Admin password the simulated hammer-setup accepts.
pub const ADMIN_PASSWORD: &str = "changeme";

/// Identity text reported by hosts registered to the CDN.
pub const CDN_IDENTITY: &str = "org name: Quality Assurance";

/// State of one simulated host.
#[derive(Debug, Default)]
struct HostState {
    /// Next sync plan id handed out.
    next_plan_id: u64,
    /// Sync plans by name.
    plans: BTreeMap<String, u64>,
    /// Ids recorded as disabled in the state document.
    disabled: Vec<u64>,
    /// Ids recorded as enabled in the state document.
    enabled: Vec<u64>,
    /// Package lock flag.
    packages_locked: bool,
    /// Maintenance mode flag.
    maintenance_mode: bool,
    /// Registered to the CDN rather than dogfood.
    on_cdn: bool,
}

/// Simulated Satellite hosts behind the executor contract.
pub struct FakeSatellite {
    /// Per-host state.
    hosts: Mutex<BTreeMap<HostId, HostState>>,
    /// Rendered commands, one entry per execution.
    log: Mutex<Vec<String>>,
    /// Substrings that force exit 1.
    failing: Mutex<Vec<String>>,
    /// Fetch destination root.
    fetch_dir: TempDir,
}

impl FakeSatellite {
    /// Creates hosts whose sync plan ids start at 100, 200, ... in order.
    pub fn new(hosts: &[&str]) -> Arc<Self> {
        let hosts = hosts
            .iter()
            .zip(1_u64 ..)
            .map(|(host, index)| {
                let state = HostState {
                    next_plan_id: index * 100,
                    ..HostState::default()
                };
                (HostId::new(*host), state)
            })
            .collect();
        Arc::new(Self {
            hosts: Mutex::new(hosts),
            log: Mutex::new(Vec::new()),
            failing: Mutex::new(Vec::new()),
            fetch_dir: TempDir::new().unwrap(),
        })
    }

    /// Builds a session over every simulated host.
    pub fn session(self: &Arc<Self>) -> Session {
        let hosts: Vec<HostId> = self.hosts.lock().unwrap().keys().cloned().collect();
        Session::new(self.clone(), hosts).unwrap().with_fetch_root(self.fetch_dir.path())
    }

    /// Makes every command containing `needle` exit 1.
    pub fn fail_when(&self, needle: &str) {
        self.failing.lock().unwrap().push(needle.to_string());
    }

    /// Marks `host` as registered to the CDN.
    pub fn register_to_cdn(&self, host: &str) {
        self.with_host(host, |state| state.on_cdn = true);
    }

    /// Returns every rendered command in execution order.
    pub fn commands(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// Counts executions whose rendering contains `needle`.
    pub fn count(&self, needle: &str) -> usize {
        self.commands().iter().filter(|command| command.contains(needle)).count()
    }

    /// Returns true when `host` has a sync plan called `name`.
    pub fn has_plan(&self, host: &str, name: &str) -> bool {
        self.with_host(host, |state| state.plans.contains_key(name))
    }

    /// Returns the package lock flag of `host`.
    pub fn packages_locked(&self, host: &str) -> bool {
        self.with_host(host, |state| state.packages_locked)
    }

    /// Returns the maintenance mode flag of `host`.
    pub fn maintenance_mode(&self, host: &str) -> bool {
        self.with_host(host, |state| state.maintenance_mode)
    }

    /// Returns true when `host` is registered to the CDN.
    pub fn on_cdn(&self, host: &str) -> bool {
        self.with_host(host, |state| state.on_cdn)
    }

    /// Runs `f` on the state of `host`.
    fn with_host<T>(&self, host: &str, f: impl FnOnce(&mut HostState) -> T) -> T {
        let mut hosts = self.hosts.lock().unwrap();
        f(hosts.get_mut(&HostId::new(host)).expect("unknown simulated host"))
    }

    /// Runs one command on every host.
    fn run(
        &self,
        hosts: &[HostId],
        command: &RemoteCommand,
        responses: Option<&PromptResponses>,
    ) -> HarnessResult<ExecutionBatch> {
        let rendered = command.render();
        self.log.lock().unwrap().push(rendered.clone());
        if hosts.is_empty() {
            return Err(HarnessError::NoHosts {
                command: rendered,
            });
        }
        let injected = self.failing.lock().unwrap().iter().any(|needle| rendered.contains(needle));
        let argv: Vec<&str> = match command.line() {
            CommandLine::Argv(argv) => argv.iter().map(String::as_str).collect(),
            CommandLine::Shell(_) => Vec::new(),
        };
        let mut states = self.hosts.lock().unwrap();
        let mut results = Vec::new();
        for host in hosts {
            let state = states.get_mut(host).ok_or_else(|| HarnessError::Transport {
                host: host.clone(),
                message: "no route to host".to_string(),
            })?;
            let (exit_code, stdout) = if injected {
                (1, "[FAIL] injected failure\n".to_string())
            } else {
                respond(host, state, &argv, responses)?
            };
            results.push(HostResult {
                host: host.clone(),
                exit_code,
                stdout,
                stderr: String::new(),
            });
        }
        ExecutionBatch::from_results(rendered, results)
    }
}

impl RemoteExecutor for FakeSatellite {
    fn execute(&self, hosts: &[HostId], command: &RemoteCommand) -> HarnessResult<ExecutionBatch> {
        self.run(hosts, command, None)
    }

    fn execute_interactive(
        &self,
        hosts: &[HostId],
        command: &RemoteCommand,
        responses: &PromptResponses,
    ) -> HarnessResult<ExecutionBatch> {
        self.run(hosts, command, Some(responses))
    }

    fn fetch(&self, host: &HostId, remote_path: &str, dest_root: &Path) -> HarnessResult<PathBuf> {
        let fetch_error = |message: &str| HarnessError::Fetch {
            host: host.clone(),
            remote_path: remote_path.to_string(),
            message: message.to_string(),
        };
        if remote_path != DATA_FILE {
            return Err(fetch_error("No such file or directory"));
        }
        let document = {
            let hosts = self.hosts.lock().unwrap();
            let state = hosts.get(host).ok_or_else(|| fetch_error("unknown host"))?;
            state_document(state)
        };
        let destination = fetch_destination(dest_root, host, remote_path);
        fs::create_dir_all(destination.parent().unwrap()).unwrap();
        fs::write(&destination, document).unwrap();
        Ok(destination)
    }
}

/// Renders the symbol-keyed maintenance state document.
fn state_document(state: &HostState) -> String {
    let list = |ids: &[u64]| ids.iter().map(|id| format!("    - {id}\n")).collect::<String>();
    format!(
        "---\n:default:\n  :sync_plans:\n    :disabled:\n{}    :enabled:\n{}",
        list(&state.disabled),
        list(&state.enabled)
    )
}

/// Simulates one command on one host.
fn respond(
    host: &HostId,
    state: &mut HostState,
    argv: &[&str],
    responses: Option<&PromptResponses>,
) -> HarnessResult<(i32, String)> {
    let ok = |text: &str| Ok((0, format!("{text}\n")));
    match argv {
        ["hammer", "sync-plan", "create", "--name", name, ..] => {
            state.next_plan_id += 1;
            state.plans.insert((*name).to_string(), state.next_plan_id);
            ok("Sync plan created.")
        }
        ["hammer", "--output", "csv", "sync-plan", "info", "--name", name, ..] => {
            match state.plans.get(*name) {
                Some(id) => ok(&format!("Id,Name,Interval\n{id},{name},weekly")),
                None => Ok((65, "Sync plan not found.\n".to_string())),
            }
        }
        ["hammer", "sync-plan", "delete", "--name", name, ..] => {
            match state.plans.remove(*name) {
                Some(_) => ok("Sync plan destroyed."),
                None => Ok((65, "Sync plan not found.\n".to_string())),
            }
        }
        ["foreman-maintain", "advanced", "procedure", "run", procedure, ..] => {
            run_procedure(host, state, procedure, responses)
        }
        ["foreman-maintain", "packages", action, ..] => Ok(packages(state, action)),
        ["iptables", "-L"] => {
            let mut listing = "Chain INPUT (policy ACCEPT)\n".to_string();
            if state.maintenance_mode {
                listing.push_str(&format!("{MAINTENANCE_CHAIN}  all  --  anywhere  anywhere\n"));
                listing.push_str(&format!("Chain {MAINTENANCE_CHAIN} (1 references)\n"));
            }
            Ok((0, listing))
        }
        ["subscription-manager", "identity"] => {
            let org = if state.on_cdn { CDN_IDENTITY } else { "org name: Dogfood" };
            ok(org)
        }
        ["subscription-manager", "register", "--force", credential, ..] => {
            state.on_cdn = credential.starts_with("--username=");
            ok("The system has been registered.")
        }
        _ => ok(""),
    }
}

/// Simulates `advanced procedure run <procedure>`.
fn run_procedure(
    host: &HostId,
    state: &mut HostState,
    procedure: &str,
    responses: Option<&PromptResponses>,
) -> HarnessResult<(i32, String)> {
    match procedure {
        "sync-plans-disable" => {
            let active: Vec<u64> = state.plans.values().copied().collect();
            state.enabled.retain(|id| !active.contains(id));
            state.disabled.extend(active);
            Ok((0, "Disable active sync plans: [OK]\n".to_string()))
        }
        "sync-plans-enable" => {
            state.enabled.append(&mut state.disabled);
            Ok((0, "Re-enable sync plans: [OK]\n".to_string()))
        }
        "maintenance-mode-enable" => {
            state.maintenance_mode = true;
            Ok((0, "Add maintenance_mode chain to iptables: [OK]\n".to_string()))
        }
        "maintenance-mode-disable" => {
            state.maintenance_mode = false;
            Ok((0, "Remove maintenance_mode chain from iptables: [OK]\n".to_string()))
        }
        "hammer-setup" => {
            let Some(password) = responses.and_then(|map| map.get(HAMMER_PASSWORD_PROMPT)) else {
                return Err(HarnessError::UnmatchedPrompt {
                    host: host.clone(),
                    prompt: HAMMER_PASSWORD_PROMPT.to_string(),
                    waited: Duration::from_secs(1),
                });
            };
            if password == ADMIN_PASSWORD {
                Ok((0, format!("{HAMMER_PASSWORD_PROMPT}\nSetup hammer: [OK]\n")))
            } else {
                Ok((1, format!("{HAMMER_PASSWORD_PROMPT}\nSetup hammer: [FAIL]\n")))
            }
        }
        _ => Ok((0, format!("Running {procedure}: [OK]\n"))),
    }
}

/// Simulates `packages <action>`.
fn packages(state: &mut HostState, action: &str) -> (i32, String) {
    let status = |locked: bool| if locked { PACKAGES_LOCKED } else { PACKAGES_UNLOCKED };
    match action {
        "lock" => {
            state.packages_locked = true;
            (0, format!("Lock packages: [OK]\n{PACKAGES_LOCKED}\n"))
        }
        "unlock" => {
            state.packages_locked = false;
            (0, format!("Unlock packages: [OK]\n{PACKAGES_UNLOCKED}\n"))
        }
        "status" => (0, format!("{}\n", status(state.packages_locked))),
        "is-locked" => {
            let locked = state.packages_locked;
            (i32::from(!locked), format!("{}\n", status(locked)))
        }
        _ => (0, format!("packages {action}: [OK]\n")),
    }
}
