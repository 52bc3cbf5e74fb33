// crates/fm-harness/src/session.rs
// ============================================================================
// Module: Session
// Description: Explicit execution context passed to every operation.
// Purpose: Replace ambient connection state with an injected, cloneable handle.
// Dependencies: crate::executor, crate::catalog, tracing
// ============================================================================

//! ## Overview
//! A [`Session`] binds a [`RemoteExecutor`] to a set of target hosts, a
//! local fetch directory, and a [`CommandObserver`]. Every catalog run,
//! fixture step, and state fetch goes through a session, so independent
//! hosts can be driven from independent sessions in parallel.
//!
//! Every completed execution is logged per host and reported to the
//! observer. Prompt responses are never logged or recorded.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::catalog;
use crate::command::PromptResponses;
use crate::command::RemoteCommand;
use crate::config::HarnessConfig;
use crate::error::HarnessError;
use crate::error::HarnessResult;
use crate::executor::ExecutionBatch;
use crate::executor::HostId;
use crate::executor::LocalExecutor;
use crate::executor::RemoteExecutor;
use crate::executor::SshExecutor;
use crate::state_file::DATA_FILE;
use crate::state_file::SyncPlanState;
use crate::state_file::SyncPlanStatus;

// ============================================================================
// SECTION: Observer
// ============================================================================

/// One host's view of one execution, as handed to observers.
#[derive(Debug, Clone, Serialize)]
pub struct CommandRecord<'a> {
    /// Host that ran the command.
    pub host: &'a HostId,
    /// Rendered command line.
    pub command: &'a str,
    /// Prompts the command expected (texts only).
    pub prompts: Vec<&'a str>,
    /// Exit code.
    pub exit_code: i32,
    /// Captured stdout.
    pub stdout: &'a str,
    /// Captured stderr.
    pub stderr: &'a str,
}

/// Receives execution records; used by reporters to write transcripts.
pub trait CommandObserver: Send + Sync {
    /// Called once per host for every completed execution.
    fn on_record(&self, record: &CommandRecord<'_>);

    /// Called when an execution produced no batch.
    fn on_error(&self, command: &str, error: &HarnessError) {
        let _ = (command, error);
    }
}

/// Observer that ignores every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl CommandObserver for NoopObserver {
    fn on_record(&self, _record: &CommandRecord<'_>) {}
}

// ============================================================================
// SECTION: Session
// ============================================================================

/// Directory under the system temp dir used when no fetch root is configured.
const DEFAULT_FETCH_DIR: &str = "fm-harness-fetch";

/// Execution context for one suite or one host group.
///
/// # Invariants
/// - `hosts` is non-empty and free of duplicates.
#[derive(Clone)]
pub struct Session {
    /// Executor shared by clones.
    executor: Arc<dyn RemoteExecutor>,
    /// Target hosts for every execution.
    hosts: Vec<HostId>,
    /// Execution observer.
    observer: Arc<dyn CommandObserver>,
    /// Local directory receiving fetched files.
    fetch_root: PathBuf,
}

impl Session {
    /// Creates a session over `hosts`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::NoHosts`] for an empty host list and
    /// [`HarnessError::DuplicateHost`] for repeated hosts.
    pub fn new(executor: Arc<dyn RemoteExecutor>, hosts: Vec<HostId>) -> HarnessResult<Self> {
        if hosts.is_empty() {
            return Err(HarnessError::NoHosts {
                command: "<session>".to_string(),
            });
        }
        for (index, host) in hosts.iter().enumerate() {
            if hosts[.. index].contains(host) {
                return Err(HarnessError::DuplicateHost {
                    host: host.clone(),
                });
            }
        }
        Ok(Self {
            executor,
            hosts,
            observer: Arc::new(NoopObserver),
            fetch_root: std::env::temp_dir().join(DEFAULT_FETCH_DIR),
        })
    }

    /// Builds an SSH or local session from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Config`] when the configuration is invalid or
    /// names no targets.
    pub fn from_config(config: &HarnessConfig) -> HarnessResult<Self> {
        config.validate()?;
        let limits = config.execution_limits()?;
        let mut session = if config.local {
            Self::new(Arc::new(LocalExecutor::new(limits)), vec![LocalExecutor::host()])?
        } else {
            let targets = config.targets()?;
            if targets.is_empty() {
                return Err(HarnessError::Config("no hosts configured".to_string()));
            }
            let executor = SshExecutor::new(targets, config.ssh.clone(), limits)?;
            let hosts = executor.hosts();
            Self::new(Arc::new(executor), hosts)?
        };
        if let Some(root) = &config.fetch_root {
            session.fetch_root.clone_from(root);
        }
        Ok(session)
    }

    /// Replaces the observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn CommandObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Replaces the fetch root.
    #[must_use]
    pub fn with_fetch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.fetch_root = root.into();
        self
    }

    /// Returns a session narrowed to one of this session's hosts.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Config`] when `host` is not part of the session.
    pub fn for_host(&self, host: &HostId) -> HarnessResult<Self> {
        if !self.hosts.contains(host) {
            return Err(HarnessError::Config(format!("host {host} is not in this session")));
        }
        Ok(Self {
            hosts: vec![host.clone()],
            ..self.clone()
        })
    }

    /// Returns the target hosts.
    #[must_use]
    pub fn hosts(&self) -> &[HostId] {
        &self.hosts
    }

    /// Returns the fetch root.
    #[must_use]
    pub fn fetch_root(&self) -> &Path {
        &self.fetch_root
    }

    // ------------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------------

    /// Runs `command` on every host, answering its own prompts if it has any.
    ///
    /// # Errors
    ///
    /// Propagates executor errors.
    pub fn execute(&self, command: &RemoteCommand) -> HarnessResult<ExecutionBatch> {
        if command.is_interactive() {
            return self.execute_interactive(command, command.responses());
        }
        let outcome = self.executor.execute(&self.hosts, command);
        self.observe(command, None, outcome)
    }

    /// Runs `command` feeding `responses` to matching prompts.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::UnmatchedPrompt`] when a host waits on an
    /// unknown prompt, plus executor errors.
    pub fn execute_interactive(
        &self,
        command: &RemoteCommand,
        responses: &PromptResponses,
    ) -> HarnessResult<ExecutionBatch> {
        let outcome = self.executor.execute_interactive(&self.hosts, command, responses);
        self.observe(command, Some(responses), outcome)
    }

    /// Builds a catalog operation by name and runs it.
    ///
    /// Nothing is executed when the name or options are rejected.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::UnknownOperation`] or
    /// [`HarnessError::InvalidOption`] before execution, plus executor errors.
    pub fn run(
        &self,
        operation: &str,
        options: &BTreeMap<String, String>,
    ) -> HarnessResult<ExecutionBatch> {
        let command = catalog::build(operation, options)?;
        self.execute(&command)
    }

    /// Logs and records an execution outcome.
    fn observe(
        &self,
        command: &RemoteCommand,
        responses: Option<&PromptResponses>,
        outcome: HarnessResult<ExecutionBatch>,
    ) -> HarnessResult<ExecutionBatch> {
        let batch = match outcome {
            Ok(batch) => batch,
            Err(err) => {
                let rendered = command.render();
                warn!(command = %rendered, error = %err, "execution failed");
                self.observer.on_error(&rendered, &err);
                return Err(err);
            }
        };
        let prompts: Vec<&str> = responses.map(|map| map.prompts().collect()).unwrap_or_default();
        for result in &batch {
            info!(
                host = %result.host,
                command = batch.command(),
                exit_code = result.exit_code,
                "completed"
            );
            debug!(host = %result.host, stdout = %result.stdout, stderr = %result.stderr, "output");
            self.observer.on_record(&CommandRecord {
                host: &result.host,
                command: batch.command(),
                prompts: prompts.clone(),
                exit_code: result.exit_code,
                stdout: &result.stdout,
                stderr: &result.stderr,
            });
        }
        Ok(batch)
    }

    // ------------------------------------------------------------------------
    // Fetch
    // ------------------------------------------------------------------------

    /// Copies `remote_path` from every host under the fetch root.
    ///
    /// # Errors
    ///
    /// Returns the first [`HarnessError::Fetch`] in host order.
    pub fn fetch(&self, remote_path: &str) -> HarnessResult<BTreeMap<HostId, PathBuf>> {
        self.hosts
            .iter()
            .map(|host| {
                let local = self.executor.fetch(host, remote_path, &self.fetch_root)?;
                info!(host = %host, remote_path, local = %local.display(), "fetched");
                Ok((host.clone(), local))
            })
            .collect()
    }

    /// Fetches and parses the maintenance state document from every host.
    ///
    /// # Errors
    ///
    /// Returns fetch or [`HarnessError::StateFile`] errors.
    pub fn sync_plan_state(&self) -> HarnessResult<BTreeMap<HostId, SyncPlanState>> {
        self.fetch(DATA_FILE)?
            .into_iter()
            .map(|(host, path)| Ok((host, SyncPlanState::load(&path)?)))
            .collect()
    }

    /// Requires each host's plan id under `status` in that host's state document.
    ///
    /// Sync plan ids are assigned per host, so `ids` maps every session host
    /// to the id it reported at creation.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::StateMismatch`] for the first host whose id is
    /// missing from `ids` or from its state document.
    pub fn expect_sync_plan(
        &self,
        ids: &BTreeMap<HostId, u64>,
        status: SyncPlanStatus,
    ) -> HarnessResult<()> {
        for (host, state) in self.sync_plan_state()? {
            let Some(plan_id) = ids.get(&host) else {
                return Err(HarnessError::StateMismatch {
                    host,
                    message: "no sync plan id recorded for host".to_string(),
                });
            };
            state.expect_contains(&host, *plan_id, status)?;
        }
        Ok(())
    }
}
