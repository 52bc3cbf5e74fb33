// crates/fm-harness/src/config/env.rs
// ============================================================================
// Module: Harness Environment
// Description: Environment-backed overrides for harness configuration.
// Purpose: Centralize env parsing with strict UTF-8 validation.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Environment values are parsed with strict UTF-8 enforcement to avoid silent
//! misconfiguration. Invalid UTF-8 fails closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::time::Duration;

use super::file::HarnessConfig;
use super::file::Product;

// ============================================================================
// SECTION: Environment Constants
// ============================================================================

/// Environment keys for harness configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarnessEnv {
    /// Optional TOML configuration file path.
    ConfigPath,
    /// Comma-separated `[user@]host[:port]` targets.
    Hosts,
    /// Default SSH login user.
    SshUser,
    /// SSH private key path.
    SshIdentity,
    /// Default SSH port.
    SshPort,
    /// Overall command timeout in seconds (positive integer).
    CommandTimeoutSeconds,
    /// Unmatched prompt timeout in seconds (positive integer).
    PromptTimeoutSeconds,
    /// SSH connect timeout in seconds (positive integer).
    ConnectTimeoutSeconds,
    /// Local directory receiving fetched files.
    FetchRoot,
    /// Target product (`satellite` or `capsule`).
    Product,
    /// Run against this machine instead of SSH (`true`/`false` or `1`/`0`).
    Local,
}

impl HarnessEnv {
    /// Every key, in declaration order.
    pub const ALL: [Self; 11] = [
        Self::ConfigPath,
        Self::Hosts,
        Self::SshUser,
        Self::SshIdentity,
        Self::SshPort,
        Self::CommandTimeoutSeconds,
        Self::PromptTimeoutSeconds,
        Self::ConnectTimeoutSeconds,
        Self::FetchRoot,
        Self::Product,
        Self::Local,
    ];

    /// Returns the canonical environment variable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConfigPath => "FM_HARNESS_CONFIG",
            Self::Hosts => "FM_HARNESS_HOSTS",
            Self::SshUser => "FM_HARNESS_SSH_USER",
            Self::SshIdentity => "FM_HARNESS_SSH_IDENTITY",
            Self::SshPort => "FM_HARNESS_SSH_PORT",
            Self::CommandTimeoutSeconds => "FM_HARNESS_COMMAND_TIMEOUT_SEC",
            Self::PromptTimeoutSeconds => "FM_HARNESS_PROMPT_TIMEOUT_SEC",
            Self::ConnectTimeoutSeconds => "FM_HARNESS_CONNECT_TIMEOUT_SEC",
            Self::FetchRoot => "FM_HARNESS_FETCH_ROOT",
            Self::Product => "FM_HARNESS_PRODUCT",
            Self::Local => "FM_HARNESS_LOCAL",
        }
    }

    /// Reads this key, rejecting invalid UTF-8 and empty values.
    fn read(self) -> Result<Option<String>, String> {
        read_env_nonempty(self.as_str())
    }
}

// ============================================================================
// SECTION: Overrides
// ============================================================================

/// Returns the configuration file path from the environment, if set.
pub(super) fn config_path() -> Result<Option<PathBuf>, String> {
    Ok(HarnessEnv::ConfigPath.read()?.map(PathBuf::from))
}

/// Applies every set `FM_HARNESS_*` variable on top of `config`.
///
/// # Errors
///
/// Returns an error when an environment value is not valid UTF-8, is empty,
/// or fails validation (for example, an invalid timeout or boolean value).
pub(super) fn apply_overrides(config: &mut HarnessConfig) -> Result<(), String> {
    if let Some(hosts) = HarnessEnv::Hosts.read()? {
        config.hosts = hosts
            .split(',')
            .map(str::trim)
            .filter(|host| !host.is_empty())
            .map(str::to_string)
            .collect();
    }
    if let Some(user) = HarnessEnv::SshUser.read()? {
        config.ssh.user = user;
    }
    if let Some(identity) = HarnessEnv::SshIdentity.read()? {
        config.ssh.identity_file = Some(PathBuf::from(identity));
    }
    if let Some(port) = HarnessEnv::SshPort.read()? {
        config.ssh.port = Some(parse_port(HarnessEnv::SshPort.as_str(), &port)?);
    }
    if let Some(raw) = HarnessEnv::CommandTimeoutSeconds.read()? {
        let timeout = parse_timeout_seconds(HarnessEnv::CommandTimeoutSeconds.as_str(), &raw)?;
        config.limits.command_timeout_secs = timeout.as_secs();
    }
    if let Some(raw) = HarnessEnv::PromptTimeoutSeconds.read()? {
        let timeout = parse_timeout_seconds(HarnessEnv::PromptTimeoutSeconds.as_str(), &raw)?;
        config.limits.prompt_timeout_secs = timeout.as_secs();
    }
    if let Some(raw) = HarnessEnv::ConnectTimeoutSeconds.read()? {
        let timeout = parse_timeout_seconds(HarnessEnv::ConnectTimeoutSeconds.as_str(), &raw)?;
        config.ssh.connect_timeout_secs = timeout.as_secs();
    }
    if let Some(root) = HarnessEnv::FetchRoot.read()? {
        config.fetch_root = Some(PathBuf::from(root));
    }
    if let Some(product) = HarnessEnv::Product.read()? {
        let name = HarnessEnv::Product.as_str();
        config.product = Product::parse(product.trim())
            .ok_or_else(|| format!("{name} must be satellite or capsule"))?;
    }
    if let Some(local) = HarnessEnv::Local.read()? {
        config.local = parse_bool(HarnessEnv::Local.as_str(), &local)?;
    }
    Ok(())
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads an environment variable and enforces UTF-8 validity.
///
/// # Errors
///
/// Returns an error when the environment variable contains invalid UTF-8.
pub fn read_env_strict(name: &str) -> Result<Option<String>, String> {
    std::env::var_os(name).map_or(Ok(None), |raw| {
        raw.into_string().map(Some).map_err(|_| format!("{name} must be valid UTF-8"))
    })
}

/// Reads an environment variable and rejects empty values.
///
/// # Errors
///
/// Returns an error when the variable is set but empty or whitespace.
fn read_env_nonempty(name: &str) -> Result<Option<String>, String> {
    match read_env_strict(name)? {
        Some(value) if value.trim().is_empty() => Err(format!("{name} must not be empty")),
        Some(value) => Ok(Some(value)),
        None => Ok(None),
    }
}

/// Parses a positive timeout value from an environment variable string.
///
/// # Errors
///
/// Returns an error when the value is non-numeric or zero.
fn parse_timeout_seconds(name: &str, raw: &str) -> Result<Duration, String> {
    let secs: u64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("{name} must be a positive integer number of seconds"))?;
    if secs == 0 {
        return Err(format!("{name} must be greater than zero"));
    }
    Ok(Duration::from_secs(secs))
}

/// Parses a TCP port in `1..=65535`.
fn parse_port(name: &str, raw: &str) -> Result<u16, String> {
    raw.trim()
        .parse::<u16>()
        .ok()
        .filter(|port| *port != 0)
        .ok_or_else(|| format!("{name} must be a port between 1 and 65535"))
}

/// Parses a boolean literal.
///
/// # Errors
///
/// Returns an error when the value is not a recognized boolean literal.
fn parse_bool(name: &str, raw: &str) -> Result<bool, String> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("true") || trimmed == "1" {
        return Ok(true);
    }
    if trimmed.eq_ignore_ascii_case("false") || trimmed == "0" {
        return Ok(false);
    }
    Err(format!("{name} must be 1, 0, true, or false"))
}
