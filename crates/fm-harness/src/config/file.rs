// crates/fm-harness/src/config/file.rs
// ============================================================================
// Module: Harness Configuration File
// Description: TOML schema, defaults, and validation for harness settings.
// Purpose: Load a complete, validated configuration before any host is touched.
// Dependencies: serde, toml
// ============================================================================

//! ## Overview
//! [`HarnessConfig`] is the single source of settings for sessions, fixtures,
//! and suites. Unknown keys are rejected. [`HarnessConfig::load`] layers the
//! environment over the file and validates the result.
//!
//! ```toml
//! hosts = ["root@satellite.example.com"]
//! product = "satellite"
//! organization_id = 1
//!
//! [ssh]
//! identity_file = "/root/.ssh/id_ed25519"
//!
//! [limits]
//! command_timeout_secs = 3600
//! prompt_timeout_secs = 30
//! ```

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use super::env;
use crate::catalog::ProductVersion;
use crate::error::HarnessError;
use crate::error::HarnessResult;
use crate::executor::DEFAULT_COMMAND_TIMEOUT;
use crate::executor::DEFAULT_PROMPT_TIMEOUT;
use crate::executor::ExecutionLimits;
use crate::executor::SshOptions;
use crate::executor::SshTarget;

// ============================================================================
// SECTION: Product
// ============================================================================

/// Product flavour installed on the managed hosts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Product {
    /// Full Satellite server.
    #[default]
    Satellite,
    /// Capsule proxy.
    Capsule,
}

impl Product {
    /// Returns the lowercase product name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Satellite => "satellite",
            Self::Capsule => "capsule",
        }
    }

    /// Parses a lowercase product name.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "satellite" => Some(Self::Satellite),
            "capsule" => Some(Self::Capsule),
            _ => None,
        }
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Sections
// ============================================================================

/// Execution time bounds in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Overall deadline per command.
    pub command_timeout_secs: u64,
    /// Idle wait on an unmatched interactive prompt.
    pub prompt_timeout_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT.as_secs(),
            prompt_timeout_secs: DEFAULT_PROMPT_TIMEOUT.as_secs(),
        }
    }
}

impl LimitsConfig {
    /// Converts to executor limits.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Config`] when a timeout is zero.
    pub fn to_limits(self) -> HarnessResult<ExecutionLimits> {
        if self.command_timeout_secs == 0 {
            return Err(HarnessError::Config("limits.command_timeout_secs must be > 0".to_string()));
        }
        if self.prompt_timeout_secs == 0 {
            return Err(HarnessError::Config("limits.prompt_timeout_secs must be > 0".to_string()));
        }
        Ok(ExecutionLimits {
            command_timeout: Duration::from_secs(self.command_timeout_secs),
            prompt_timeout: Duration::from_secs(self.prompt_timeout_secs),
        })
    }
}

/// Default CDN identity marker.
pub const DEFAULT_CDN_IDENTITY_MARKER: &str = "Quality Assurance";

/// Credentials and registration details used by fixtures.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Credentials {
    /// Product admin login.
    pub admin_user: String,
    /// Product admin password.
    pub admin_password: String,
    /// CDN account user.
    pub cdn_username: Option<String>,
    /// CDN account password.
    pub cdn_password: Option<String>,
    /// CDN subscription pools attached after registration.
    pub cdn_pool_ids: Vec<String>,
    /// Dogfood organization used to restore registration.
    pub dogfood_org: Option<String>,
    /// Dogfood activation key used to restore registration.
    pub dogfood_activation_key: Option<String>,
    /// URL of the dogfood `katello-ca-consumer` package.
    pub katello_ca_consumer_url: Option<String>,
    /// Text in `subscription-manager identity` output meaning "already on CDN".
    pub cdn_identity_marker: String,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            admin_user: "admin".to_string(),
            admin_password: "changeme".to_string(),
            cdn_username: None,
            cdn_password: None,
            cdn_pool_ids: Vec::new(),
            dogfood_org: None,
            dogfood_activation_key: None,
            katello_ca_consumer_url: None,
            cdn_identity_marker: DEFAULT_CDN_IDENTITY_MARKER.to_string(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("admin_user", &self.admin_user)
            .field("admin_password", &"<redacted>")
            .field("cdn_username", &self.cdn_username)
            .field("cdn_password", &self.cdn_password.as_ref().map(|_| "<redacted>"))
            .field("cdn_pool_ids", &self.cdn_pool_ids)
            .field("dogfood_org", &self.dogfood_org)
            .field("dogfood_activation_key", &self.dogfood_activation_key)
            .field("katello_ca_consumer_url", &self.katello_ca_consumer_url)
            .field("cdn_identity_marker", &self.cdn_identity_marker)
            .finish()
    }
}

/// Custom repository offering an older build of a package, for update tests.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateRepoConfig {
    /// Repository id; also names the `.repo` file.
    pub repo_id: String,
    /// Repository base URL.
    pub base_url: String,
    /// Package name.
    pub package: String,
    /// Older package spec installed before the test.
    pub old_spec: String,
    /// Text expected in `rpm -qa <package>` after updating.
    pub updated_marker: String,
}

// ============================================================================
// SECTION: Config
// ============================================================================

/// Default organization id for hammer commands.
pub const DEFAULT_ORGANIZATION_ID: u64 = 1;

/// Complete harness configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Targets as `[user@]host[:port]`.
    pub hosts: Vec<String>,
    /// Run commands on this machine instead of over SSH.
    pub local: bool,
    /// OpenSSH client options.
    pub ssh: SshOptions,
    /// Execution time bounds.
    pub limits: LimitsConfig,
    /// Product flavour on the hosts.
    pub product: Product,
    /// Local directory receiving fetched files.
    pub fetch_root: Option<PathBuf>,
    /// Organization used by hammer commands.
    pub organization_id: u64,
    /// Fixture credentials.
    pub credentials: Credentials,
    /// Repository ids expected after `repositories-setup`, keyed by version.
    pub repositories: BTreeMap<String, Vec<String>>,
    /// Optional custom repository for package update tests.
    pub update_repo: Option<UpdateRepoConfig>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            local: false,
            ssh: SshOptions::default(),
            limits: LimitsConfig::default(),
            product: Product::default(),
            fetch_root: None,
            organization_id: DEFAULT_ORGANIZATION_ID,
            credentials: Credentials::default(),
            repositories: BTreeMap::new(),
            update_repo: None,
        }
    }
}

impl HarnessConfig {
    /// Parses a TOML document without applying the environment.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Config`] on syntax errors or unknown keys.
    pub fn from_toml_str(text: &str) -> HarnessResult<Self> {
        toml::from_str(text).map_err(|err| HarnessError::Config(err.to_string()))
    }

    /// Reads and parses a TOML file without applying the environment.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Config`] when the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> HarnessResult<Self> {
        let text = fs::read_to_string(path)
            .map_err(|err| HarnessError::Config(format!("read {}: {err}", path.display())))?;
        Self::from_toml_str(&text)
            .map_err(|err| HarnessError::Config(format!("{}: {err}", path.display())))
    }

    /// Loads the file named by `FM_HARNESS_CONFIG` (if any), then applies
    /// environment overrides and validates.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Config`] on any read, parse, or validation failure.
    pub fn load() -> HarnessResult<Self> {
        let path = env::config_path().map_err(HarnessError::Config)?;
        Self::load_from(path.as_deref())
    }

    /// Like [`HarnessConfig::load`] with an explicit file path.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Config`] on any read, parse, or validation failure.
    pub fn load_from(path: Option<&Path>) -> HarnessResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        env::apply_overrides(&mut config).map_err(HarnessError::Config)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Config`] describing the first violation.
    pub fn validate(&self) -> HarnessResult<()> {
        self.execution_limits()?;
        self.targets()?;
        if self.ssh.connect_timeout_secs == 0 {
            return Err(HarnessError::Config("ssh.connect_timeout_secs must be > 0".to_string()));
        }
        if self.ssh.port == Some(0) {
            return Err(HarnessError::Config("ssh.port must be > 0".to_string()));
        }
        if self.organization_id == 0 {
            return Err(HarnessError::Config("organization_id must be > 0".to_string()));
        }
        if self.credentials.cdn_identity_marker.trim().is_empty() {
            return Err(HarnessError::Config(
                "credentials.cdn_identity_marker must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Parses configured hosts into SSH targets.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Config`] for malformed entries and
    /// [`HarnessError::DuplicateHost`] for repeated hosts.
    pub fn targets(&self) -> HarnessResult<Vec<SshTarget>> {
        let targets =
            self.hosts.iter().map(|raw| SshTarget::parse(raw)).collect::<HarnessResult<Vec<_>>>()?;
        for (index, target) in targets.iter().enumerate() {
            if targets[.. index].iter().any(|earlier| earlier.id == target.id) {
                return Err(HarnessError::DuplicateHost {
                    host: target.id.clone(),
                });
            }
        }
        Ok(targets)
    }

    /// Returns validated execution limits.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Config`] when a timeout is zero.
    pub fn execution_limits(&self) -> HarnessResult<ExecutionLimits> {
        self.limits.to_limits()
    }

    /// Returns true when the harness has somewhere to run commands.
    #[must_use]
    pub fn has_targets(&self) -> bool {
        self.local || !self.hosts.is_empty()
    }

    /// Returns expected repository ids for a product version.
    #[must_use]
    pub fn expected_repositories(&self, version: &str) -> &[String] {
        self.repositories.get(version).map_or(&[], Vec::as_slice)
    }

    /// Returns expected repositories per product version, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Config`] when a key is not a `major.minor`
    /// version.
    pub fn repositories_by_version(&self) -> HarnessResult<Vec<(ProductVersion, &[String])>> {
        let mut versions = self
            .repositories
            .iter()
            .map(|(raw, repos)| {
                raw.parse::<ProductVersion>()
                    .map(|version| (version, repos.as_slice()))
                    .map_err(|err| HarnessError::Config(format!("repositories: {err}")))
            })
            .collect::<HarnessResult<Vec<_>>>()?;
        versions.sort_by_key(|(version, _)| *version);
        Ok(versions)
    }
}
