// crates/fm-harness/src/executor/mod.rs
// ============================================================================
// Module: Remote Executor
// Description: Executor contract plus per-host result and batch types.
// Purpose: Run commands on a set of hosts and return one record per host.
// Dependencies: crate::command, crate::error, serde
// ============================================================================

//! ## Overview
//! A [`RemoteExecutor`] runs one [`RemoteCommand`] on every requested host
//! and blocks until each host has finished or hit its deadline. Results are
//! collected into an [`ExecutionBatch`] keyed by [`HostId`]. Executors may
//! fan out internally; callers always see a single synchronous call.
//!
//! Implementations shipped here:
//! - [`SshExecutor`] drives the OpenSSH client binaries.
//! - [`LocalExecutor`] runs commands through `sh -c` on this machine.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod local;
mod process;
mod ssh;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::command::PromptResponses;
use crate::command::RemoteCommand;
use crate::error::HarnessError;
use crate::error::HarnessResult;

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use local::LOCAL_HOST;
pub use local::LocalExecutor;
pub use ssh::SshExecutor;
pub use ssh::SshOptions;
pub use ssh::SshTarget;

// ============================================================================
// SECTION: Host Identity
// ============================================================================

/// Identifier of a managed host as used in batches and inventories.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostId(String);

impl HostId {
    /// Creates a host identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HostId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Results
// ============================================================================

/// Outcome of one command on one host.
///
/// # Invariants
/// - Produced once per execution and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostResult {
    /// Host that ran the command.
    pub host: HostId,
    /// Process exit code (`-1` when terminated by a signal).
    pub exit_code: i32,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl HostResult {
    /// Returns stdout split into lines.
    pub fn stdout_lines(&self) -> impl Iterator<Item = &str> {
        self.stdout.lines()
    }
}

/// Results of one command run against a set of hosts.
///
/// # Invariants
/// - Each host appears at most once.
/// - Iteration order is host order and carries no meaning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionBatch {
    /// Rendered command line shared by every result.
    command: String,
    /// Results keyed by host.
    results: BTreeMap<HostId, HostResult>,
}

impl ExecutionBatch {
    /// Creates an empty batch for a rendered command.
    #[must_use]
    pub const fn new(command: String) -> Self {
        Self {
            command,
            results: BTreeMap::new(),
        }
    }

    /// Builds a batch from results, rejecting repeated hosts.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::DuplicateHost`] when a host appears twice.
    pub fn from_results(
        command: String,
        results: impl IntoIterator<Item = HostResult>,
    ) -> HarnessResult<Self> {
        let mut batch = Self::new(command);
        for result in results {
            batch.insert(result)?;
        }
        Ok(batch)
    }

    /// Adds a host result.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::DuplicateHost`] when the host is already present.
    pub fn insert(&mut self, result: HostResult) -> HarnessResult<()> {
        if self.results.contains_key(&result.host) {
            return Err(HarnessError::DuplicateHost {
                host: result.host,
            });
        }
        self.results.insert(result.host.clone(), result);
        Ok(())
    }

    /// Returns the rendered command line.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Returns the result for a host.
    #[must_use]
    pub fn get(&self, host: &HostId) -> Option<&HostResult> {
        self.results.get(host)
    }

    /// Iterates host results.
    pub fn iter(&self) -> impl Iterator<Item = &HostResult> {
        self.results.values()
    }

    /// Returns the number of hosts in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Returns true when no host reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Returns the first result in host order.
    #[must_use]
    pub fn first(&self) -> Option<&HostResult> {
        self.results.values().next()
    }
}

impl<'a> IntoIterator for &'a ExecutionBatch {
    type Item = &'a HostResult;
    type IntoIter = std::collections::btree_map::Values<'a, HostId, HostResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.values()
    }
}

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Default overall deadline for one command.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(3600);
/// Default idle wait before a pending prompt is declared unmatched.
pub const DEFAULT_PROMPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Time bounds applied to every execution.
///
/// # Invariants
/// - Both durations are non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionLimits {
    /// Overall deadline for a command; the process is killed when it elapses.
    pub command_timeout: Duration,
    /// Idle wait for an interactive process sitting on an unanswered prompt.
    pub prompt_timeout: Duration,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            prompt_timeout: DEFAULT_PROMPT_TIMEOUT,
        }
    }
}

// ============================================================================
// SECTION: Executor Contract
// ============================================================================

/// Capability that runs commands on managed hosts.
pub trait RemoteExecutor: Send + Sync {
    /// Runs `command` on every host and blocks until all complete.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Transport`] or [`HarnessError::CommandTimeout`]
    /// when a host cannot produce a result.
    fn execute(&self, hosts: &[HostId], command: &RemoteCommand) -> HarnessResult<ExecutionBatch>;

    /// Runs `command` feeding canned responses to matching prompts.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::UnmatchedPrompt`] when a host waits on a prompt
    /// missing from `responses` for longer than the prompt timeout, plus the
    /// errors of [`RemoteExecutor::execute`].
    fn execute_interactive(
        &self,
        hosts: &[HostId],
        command: &RemoteCommand,
        responses: &PromptResponses,
    ) -> HarnessResult<ExecutionBatch>;

    /// Copies `remote_path` from `host` under `dest_root/<host>/<remote_path>`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Fetch`] when the copy fails.
    fn fetch(&self, host: &HostId, remote_path: &str, dest_root: &Path) -> HarnessResult<PathBuf>;
}

/// Returns the local destination for a fetched file.
///
/// Mirrors the remote path below a per-host directory.
#[must_use]
pub fn fetch_destination(dest_root: &Path, host: &HostId, remote_path: &str) -> PathBuf {
    dest_root.join(host.as_str()).join(remote_path.trim_start_matches('/'))
}

/// Fans a per-host job out across scoped threads and gathers a batch.
///
/// Every host runs to completion before the first error, in host order, is
/// returned.
pub(crate) fn fan_out<F>(
    hosts: &[HostId],
    command: &RemoteCommand,
    job: F,
) -> HarnessResult<ExecutionBatch>
where
    F: Fn(&HostId) -> HarnessResult<HostResult> + Sync,
{
    let rendered = command.render();
    if hosts.is_empty() {
        return Err(HarnessError::NoHosts {
            command: rendered,
        });
    }
    let outcomes: Vec<HarnessResult<HostResult>> = std::thread::scope(|scope| {
        let handles: Vec<_> = hosts
            .iter()
            .map(|host| {
                let job = &job;
                (host, scope.spawn(move || job(host)))
            })
            .collect();
        handles
            .into_iter()
            .map(|(host, handle)| {
                handle.join().unwrap_or_else(|_| {
                    Err(HarnessError::Transport {
                        host: host.clone(),
                        message: "executor thread panicked".to_string(),
                    })
                })
            })
            .collect()
    });
    let mut batch = ExecutionBatch::new(rendered);
    for outcome in outcomes {
        batch.insert(outcome?)?;
    }
    Ok(batch)
}
