// crates/fm-harness/src/executor/ssh.rs
// ============================================================================
// Module: SSH Executor
// Description: Remote executor backed by the OpenSSH `ssh` and `scp` clients.
// Purpose: Run catalog commands on managed hosts without an agent install.
// Dependencies: std::process, serde, tracing
// ============================================================================

//! ## Overview
//! [`SshExecutor`] shells out to the system OpenSSH client, one process per
//! host, fanned out across scoped threads. Authentication is key-based only
//! (`BatchMode=yes`); interactive commands force a remote TTY (`-tt`) so
//! tools that read passwords from the terminal see their prompts.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use serde::Deserialize;
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

// ============================================================================
// SECTION: Targets
// ============================================================================

/// Connection details for one managed host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    /// Identifier used in batches.
    pub id: HostId,
    /// Hostname or IP address.
    pub address: String,
    /// Login user; falls back to [`SshOptions::user`].
    pub user: Option<String>,
    /// Port; falls back to [`SshOptions::port`].
    pub port: Option<u16>,
}

impl SshTarget {
    /// Parses `[user@]host[:port]`; IPv6 literals use `[addr]:port`.
    ///
    /// The host identifier is the address without user or port.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Config`] when the address or port is malformed.
    pub fn parse(raw: &str) -> HarnessResult<Self> {
        let trimmed = raw.trim();
        let invalid = |reason: &str| HarnessError::Config(format!("host `{trimmed}`: {reason}"));
        let (user, rest) = match trimmed.split_once('@') {
            Some((user, rest)) if !user.is_empty() => (Some(user.to_string()), rest),
            Some(_) => return Err(invalid("empty user")),
            None => (None, trimmed),
        };
        let (address, port) = if let Some(bracketed) = rest.strip_prefix('[') {
            let (address, tail) =
                bracketed.split_once(']').ok_or_else(|| invalid("unterminated `[`"))?;
            let port = match tail.strip_prefix(':') {
                Some(port) => Some(port),
                None if tail.is_empty() => None,
                None => return Err(invalid("unexpected text after `]`")),
            };
            (address, port)
        } else {
            match rest.rsplit_once(':') {
                Some((address, port)) if !address.contains(':') => (address, Some(port)),
                Some(_) => (rest, None),
                None => (rest, None),
            }
        };
        if address.is_empty() {
            return Err(invalid("empty address"));
        }
        let port = port
            .map(|port| {
                port.parse::<u16>()
                    .ok()
                    .filter(|port| *port != 0)
                    .ok_or_else(|| invalid("port must be 1-65535"))
            })
            .transpose()?;
        Ok(Self {
            id: HostId::new(address),
            address: address.to_string(),
            user,
            port,
        })
    }
}

// ============================================================================
// SECTION: Options
// ============================================================================

/// Default login user for managed hosts.
pub const DEFAULT_SSH_USER: &str = "root";
/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// OpenSSH client options shared by all targets.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SshOptions {
    /// Default login user.
    pub user: String,
    /// Private key passed with `-i`.
    pub identity_file: Option<PathBuf>,
    /// Default port.
    pub port: Option<u16>,
    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Extra `-o` options (`Key=Value`).
    pub extra_options: Vec<String>,
    /// `ssh` client binary.
    pub ssh_binary: String,
    /// `scp` client binary.
    pub scp_binary: String,
}

impl Default for SshOptions {
    fn default() -> Self {
        Self {
            user: DEFAULT_SSH_USER.to_string(),
            identity_file: None,
            port: None,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT.as_secs(),
            extra_options: Vec::new(),
            ssh_binary: "ssh".to_string(),
            scp_binary: "scp".to_string(),
        }
    }
}

impl SshOptions {
    /// Returns `-o`/`-i` arguments common to `ssh` and `scp`.
    fn common_args(&self) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout_secs),
        ];
        for option in &self.extra_options {
            args.push("-o".to_string());
            args.push(option.clone());
        }
        if let Some(identity) = &self.identity_file {
            args.push("-i".to_string());
            args.push(identity.display().to_string());
        }
        args
    }
}

// ============================================================================
// SECTION: Executor
// ============================================================================

/// Executor that runs commands through the OpenSSH client.
///
/// # Invariants
/// - Every host passed to the executor must be a registered target.
#[derive(Debug, Clone)]
pub struct SshExecutor {
    /// Registered targets keyed by host id.
    targets: BTreeMap<HostId, SshTarget>,
    /// Client options.
    options: SshOptions,
    /// Time bounds per command.
    limits: ExecutionLimits,
}

impl SshExecutor {
    /// Creates an executor for the given targets.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::DuplicateHost`] when two targets share an id.
    pub fn new(
        targets: impl IntoIterator<Item = SshTarget>,
        options: SshOptions,
        limits: ExecutionLimits,
    ) -> HarnessResult<Self> {
        let mut by_id = BTreeMap::new();
        for target in targets {
            if by_id.contains_key(&target.id) {
                return Err(HarnessError::DuplicateHost {
                    host: target.id,
                });
            }
            by_id.insert(target.id.clone(), target);
        }
        Ok(Self {
            targets: by_id,
            options,
            limits,
        })
    }

    /// Returns the registered host ids.
    #[must_use]
    pub fn hosts(&self) -> Vec<HostId> {
        self.targets.keys().cloned().collect()
    }

    /// Looks up a registered target.
    fn target(&self, host: &HostId) -> HarnessResult<&SshTarget> {
        self.targets.get(host).ok_or_else(|| HarnessError::Transport {
            host: host.clone(),
            message: "host is not a registered ssh target".to_string(),
        })
    }

    /// Returns `user@address` for a target.
    fn destination(&self, target: &SshTarget) -> String {
        let user = target.user.as_deref().unwrap_or(&self.options.user);
        format!("{user}@{}", target.address)
    }

    /// Builds the `ssh` invocation for one host.
    fn ssh_command(&self, target: &SshTarget, rendered: &str, tty: bool) -> Command {
        let mut command = Command::new(&self.options.ssh_binary);
        command.args(self.options.common_args());
        if let Some(port) = target.port.or(self.options.port) {
            command.arg("-p").arg(port.to_string());
        }
        command.arg(if tty { "-tt" } else { "-T" });
        command.arg(self.destination(target)).arg("--").arg(rendered);
        command
    }

    /// Runs one command on one host.
    fn run_on(
        &self,
        host: &HostId,
        command: &RemoteCommand,
        responses: Option<&PromptResponses>,
    ) -> HarnessResult<HostResult> {
        let target = self.target(host)?;
        let rendered = command.render();
        info!(host = %host, command = %rendered, interactive = responses.is_some(), "executing");
        let ssh = self.ssh_command(target, &rendered, responses.is_some());
        process::run(
            ssh,
            &process::ProcessSpec {
                host,
                rendered: &rendered,
                limits: self.limits,
                responses,
            },
        )
    }
}

impl RemoteExecutor for SshExecutor {
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
        let target = self.target(host)?;
        let destination = fetch_destination(dest_root, host, remote_path);
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| fetch_error(format!("create {}: {err}", parent.display())))?;
        }
        let user = target.user.as_deref().unwrap_or(&self.options.user);
        let address = if target.address.contains(':') {
            format!("[{}]", target.address)
        } else {
            target.address.clone()
        };
        let mut scp = Command::new(&self.options.scp_binary);
        scp.arg("-q").args(self.options.common_args());
        if let Some(port) = target.port.or(self.options.port) {
            scp.arg("-P").arg(port.to_string());
        }
        scp.arg(format!("{user}@{address}:{remote_path}")).arg(&destination);
        let rendered = format!("scp {remote_path}");
        info!(host = %host, remote_path, "fetching");
        let result = process::run(
            scp,
            &process::ProcessSpec {
                host,
                rendered: &rendered,
                limits: self.limits,
                responses: None,
            },
        )?;
        if result.exit_code != 0 {
            return Err(fetch_error(format!(
                "scp exited with {}: {}",
                result.exit_code,
                result.stderr.trim()
            )));
        }
        Ok(destination)
    }
}
