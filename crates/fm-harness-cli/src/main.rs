// crates/fm-harness-cli/src/main.rs
// ============================================================================
// Module: Foreman Maintain Harness CLI Entry Point
// Description: Command dispatcher for catalog inspection and ad-hoc runs.
// Purpose: Run one maintenance operation against configured hosts and check it.
// Dependencies: clap, fm-harness, serde, serde_json, thiserror, tracing.
// ============================================================================

//! ## Overview
//! The CLI exposes the harness outside of a test runner:
//! - `operations` lists the command catalog;
//! - `render` prints the command an operation would run, without running it;
//! - `run` executes an operation on every configured host and applies the
//!   exit-code and marker contracts;
//! - `sync-plans` fetches and prints each host's sync plan state.
//!
//! Configuration comes from `--config` or `FM_HARNESS_CONFIG`, then
//! `FM_HARNESS_*` overrides, then command-line flags. Results are printed as
//! JSON on stdout; contract failures go to stderr with exit code 1.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use fm_harness::ExecutionBatch;
use fm_harness::HarnessConfig;
use fm_harness::HarnessError;
use fm_harness::HostId;
use fm_harness::Operation;
use fm_harness::Session;
use fm_harness::catalog;
use fm_harness::catalog::FAILURE_MARKER;
use fm_harness::logging;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "fm-harness", version, disable_help_subcommand = true)]
struct Cli {
    /// TOML configuration file (overrides `FM_HARNESS_CONFIG`).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Log filter used when `FM_HARNESS_LOG` and `RUST_LOG` are unset.
    #[arg(long, value_name = "DIRECTIVE", global = true)]
    log: Option<String>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// List catalog operations.
    Operations,
    /// Print the command an operation would run.
    Render(RenderCommand),
    /// Run an operation on the configured hosts and check the result.
    Run(RunCommand),
    /// Fetch and print the sync plan state of every host.
    SyncPlans(TargetArgs),
}

/// Operation selection shared by `render` and `run`.
#[derive(Args, Debug)]
struct OperationArgs {
    /// Operation name, e.g. `packages-lock` or `procedure:packages-update`.
    #[arg(value_name = "OPERATION")]
    operation: String,
    /// Operation option as `key=value`; repeatable.
    #[arg(short = 'o', long = "option", value_name = "KEY=VALUE", value_parser = parse_option)]
    options: Vec<(String, String)>,
}

impl OperationArgs {
    /// Collects options into the catalog's string mapping.
    fn option_map(&self) -> BTreeMap<String, String> {
        self.options.iter().cloned().collect()
    }
}

/// Arguments for `render`.
#[derive(Args, Debug)]
struct RenderCommand {
    /// Operation to render.
    #[command(flatten)]
    operation: OperationArgs,
}

/// Host selection shared by commands that contact hosts.
#[derive(Args, Debug)]
struct TargetArgs {
    /// Target as `[user@]host[:port]`; repeatable, replaces configured hosts.
    #[arg(long = "host", value_name = "TARGET")]
    hosts: Vec<String>,
    /// Run on this machine instead of over SSH.
    #[arg(long, conflicts_with = "hosts")]
    local: bool,
}

/// Arguments for `run`.
#[derive(Args, Debug)]
struct RunCommand {
    /// Operation to run.
    #[command(flatten)]
    operation: OperationArgs,
    /// Hosts to run on.
    #[command(flatten)]
    targets: TargetArgs,
    /// Exit code every host must return.
    #[arg(long, value_name = "CODE", default_value_t = 0, allow_negative_numbers = true)]
    expect_exit: i32,
    /// Marker every host's stdout must contain; repeatable.
    #[arg(long = "expect-marker", value_name = "TEXT")]
    expect_markers: Vec<String>,
    /// Marker no host's stdout may contain; repeatable.
    #[arg(long = "reject-marker", value_name = "TEXT")]
    reject_markers: Vec<String>,
    /// Do not reject the tool's `FAIL` marker.
    #[arg(long)]
    allow_fail_marker: bool,
}

/// Output contracts checked after `run`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Contracts {
    /// Required exit code.
    exit_code: i32,
    /// Required markers.
    present: Vec<String>,
    /// Forbidden markers.
    absent: Vec<String>,
}

impl RunCommand {
    /// Returns the contracts requested on the command line.
    fn contracts(&self) -> Contracts {
        let mut absent = self.reject_markers.clone();
        if !self.allow_fail_marker && !absent.iter().any(|marker| marker == FAILURE_MARKER) {
            absent.push(FAILURE_MARKER.to_string());
        }
        Contracts {
            exit_code: self.expect_exit,
            present: self.expect_markers.clone(),
            absent,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper.
#[derive(Debug, Error)]
enum CliError {
    /// Harness failure, including contract violations.
    #[error(transparent)]
    Harness(#[from] HarnessError),
    /// Output stream failure.
    #[error("failed to write {stream}: {source}")]
    Output {
        /// Stream name.
        stream: &'static str,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Result serialization failure.
    #[error("failed to serialize output: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    logging::init(cli.log.as_deref().unwrap_or(logging::DEFAULT_DIRECTIVE))?;
    match cli.command {
        Commands::Operations => command_operations(),
        Commands::Render(command) => command_render(&command),
        Commands::Run(command) => command_run(cli.config, &command),
        Commands::SyncPlans(targets) => command_sync_plans(cli.config, &targets),
    }
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// One catalog entry as listed by `operations`.
#[derive(Debug, Serialize)]
struct OperationEntry {
    /// Canonical operation name.
    name: String,
    /// Option the operation cannot run without.
    required_option: Option<&'static str>,
}

/// Lists every catalog operation.
fn catalog_entries() -> Vec<OperationEntry> {
    Operation::all()
        .into_iter()
        .map(|operation| OperationEntry {
            name: operation.name(),
            required_option: operation.required_option().map(catalog::OptionKey::as_str),
        })
        .collect()
}

/// Prints the catalog.
fn command_operations() -> CliResult<ExitCode> {
    write_json(&catalog_entries())?;
    Ok(ExitCode::SUCCESS)
}

/// Rendered command as printed by `render`.
#[derive(Debug, Serialize)]
struct RenderedCommand {
    /// Canonical operation name.
    operation: String,
    /// Shell text sent to the host.
    command: String,
    /// Prompts the command answers (responses are not printed).
    prompts: Vec<String>,
}

/// Builds the `render` output without contacting any host.
fn render_operation(args: &OperationArgs) -> CliResult<RenderedCommand> {
    let operation = Operation::parse(&args.operation)?;
    let command = catalog::build(&args.operation, &args.option_map())?;
    Ok(RenderedCommand {
        operation: operation.name(),
        command: command.render(),
        prompts: command.responses().prompts().map(str::to_string).collect(),
    })
}

/// Prints the command an operation would run.
fn command_render(command: &RenderCommand) -> CliResult<ExitCode> {
    write_json(&render_operation(&command.operation)?)?;
    Ok(ExitCode::SUCCESS)
}

/// Runs an operation, prints the batch, then checks the contracts.
fn command_run(config: Option<PathBuf>, command: &RunCommand) -> CliResult<ExitCode> {
    let session = open_session(config, &command.targets)?;
    let options = command.operation.option_map();
    let batch = session.run(&command.operation.operation, &options)?;
    write_json(&batch)?;
    check_contracts(&batch, &command.contracts())?;
    info!(operation = %command.operation.operation, hosts = batch.len(), "contracts satisfied");
    Ok(ExitCode::SUCCESS)
}

/// Applies the run contracts to a batch.
fn check_contracts(batch: &ExecutionBatch, contracts: &Contracts) -> Result<(), HarnessError> {
    batch.expect_exit_code(contracts.exit_code)?;
    for marker in &contracts.present {
        batch.expect_marker(marker)?;
    }
    for marker in &contracts.absent {
        batch.expect_no_marker(marker)?;
    }
    Ok(())
}

/// Sync plan lists of one host as printed by `sync-plans`.
#[derive(Debug, Serialize)]
struct SyncPlanReport {
    /// Disabled plan ids.
    disabled: Vec<u64>,
    /// Enabled plan ids.
    enabled: Vec<u64>,
}

/// Fetches and prints every host's sync plan state.
fn command_sync_plans(config: Option<PathBuf>, targets: &TargetArgs) -> CliResult<ExitCode> {
    let session = open_session(config, targets)?;
    let report: BTreeMap<HostId, SyncPlanReport> = session
        .sync_plan_state()?
        .into_iter()
        .map(|(host, state)| {
            let report = SyncPlanReport {
                disabled: state.disabled,
                enabled: state.enabled,
            };
            (host, report)
        })
        .collect();
    write_json(&report)?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Loads configuration, applies target flags, and opens a session.
fn open_session(config: Option<PathBuf>, targets: &TargetArgs) -> CliResult<Session> {
    let config = load_config(config, targets)?;
    Ok(Session::from_config(&config)?)
}

/// Loads configuration and applies target flags.
fn load_config(path: Option<PathBuf>, targets: &TargetArgs) -> CliResult<HarnessConfig> {
    let mut config = match path {
        Some(path) => HarnessConfig::load_from(Some(&path))?,
        None => HarnessConfig::load()?,
    };
    if targets.local {
        config.local = true;
    } else if !targets.hosts.is_empty() {
        config.local = false;
        config.hosts.clone_from(&targets.hosts);
    }
    config.validate()?;
    Ok(config)
}

/// Parses a `key=value` option.
fn parse_option(raw: &str) -> Result<(String, String), String> {
    let (key, value) =
        raw.split_once('=').ok_or_else(|| format!("`{raw}` is not in key=value form"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("`{raw}` has an empty key"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Writes a value as pretty JSON to stdout.
fn write_json<T: Serialize>(value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)?;
    write_stdout_line(&text).map_err(|source| CliError::Output {
        stream: "stdout",
        source,
    })
}

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
