// crates/fm-harness/src/executor/local.rs
// ============================================================================
// Module: Local Executor
// Description: Executor that runs commands on this machine through `sh -c`.
// Purpose: Exercise suites directly on a Satellite or Capsule host.
// Dependencies: std::process, tracing
// ============================================================================

//! ## Overview
//! [`LocalExecutor`] treats every requested host as an alias for the local
//! machine. Each host still gets its own process so batches keep one result
//! per host. The child sees its host id in `FM_HARNESS_HOST`.

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;

use tracing::info;

use super::ExecutionBatch;
use super::ExecutionLimits;
use super::HostId;
use super::HostResult;
use super::RemoteExecutor;
use super::fan_out;
use super::fetch_destination;
use super::process;
use crate::command::PromptResponses;
use crate::command::RemoteCommand;
use crate::error::HarnessError;
use crate::error::HarnessResult;

/// Host id used when running against this machine.
pub const LOCAL_HOST: &str = "localhost";

/// Executor running commands through a local shell.
#[derive(Debug, Clone)]
pub struct LocalExecutor {
    /// Shell binary invoked with `-c`.
    shell: String,
    /// Time bounds per command.
    limits: ExecutionLimits,
}

impl LocalExecutor {
    /// Creates an executor using `/bin/sh`.
    #[must_use]
    pub fn new(limits: ExecutionLimits) -> Self {
        Self {
            shell: "/bin/sh".to_string(),
            limits,
        }
    }

    /// Overrides the shell binary.
    #[must_use]
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Returns the single local host id.
    #[must_use]
    pub fn host() -> HostId {
        HostId::new(LOCAL_HOST)
    }

    /// Runs one command locally on behalf of `host`.
    fn run_on(
        &self,
        host: &HostId,
        command: &RemoteCommand,
        responses: Option<&PromptResponses>,
    ) -> HarnessResult<HostResult> {
        let rendered = command.render();
        info!(host = %host, command = %rendered, interactive = responses.is_some(), "executing");
        let mut shell = Command::new(&self.shell);
        shell.arg("-c").arg(&rendered).env("FM_HARNESS_HOST", host.as_str());
        process::run(
            shell,
            &process::ProcessSpec {
                host,
                rendered: &rendered,
                limits: self.limits,
                responses,
            },
        )
    }
}

impl Default for LocalExecutor {
    fn default() -> Self {
        Self::new(ExecutionLimits::default())
    }
}

impl RemoteExecutor for LocalExecutor {
    fn execute(&self, hosts: &[HostId], command: &RemoteCommand) -> HarnessResult<ExecutionBatch> {
        fan_out(hosts, command, |host| self.run_on(host, command, None))
    }

    fn execute_interactive(
        &self,
        hosts: &[HostId],
        command: &RemoteCommand,
        responses: &PromptResponses,
    ) -> HarnessResult<ExecutionBatch> {
        fan_out(hosts, command, |host| self.run_on(host, command, Some(responses)))
    }

    fn fetch(&self, host: &HostId, remote_path: &str, dest_root: &Path) -> HarnessResult<PathBuf> {
        let fetch_error = |message: String| HarnessError::Fetch {
            host: host.clone(),
            remote_path: remote_path.to_string(),
            message,
        };
        let destination = fetch_destination(dest_root, host, remote_path);
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| fetch_error(format!("create {}: {err}", parent.display())))?;
        }
        fs::copy(remote_path, &destination).map_err(|err| fetch_error(err.to_string()))?;
        Ok(destination)
    }
}
