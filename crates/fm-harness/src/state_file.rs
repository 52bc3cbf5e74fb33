// crates/fm-harness/src/state_file.rs
// ============================================================================
// Module: Persisted State Document
// Description: Read-only view of the maintenance tool's YAML state file.
// Purpose: Assert on sync plan state the product persists on the host.
// Dependencies: serde_yaml
// ============================================================================

//! ## Overview
//! The maintenance tool records the sync plans it disabled and re-enabled in
//! a YAML document whose keys are Ruby symbols:
//!
//! ```yaml
//! :default:
//!   :sync_plans:
//!     :disabled: [4, 7]
//!     :enabled: []
//! ```
//!
//! The document belongs to the product; this module only parses fetched
//! copies. Missing sections read as empty lists.

use std::fmt;
use std::fs;
use std::path::Path;

use serde_yaml::Value;

use crate::error::HarnessError;
use crate::error::HarnessResult;
use crate::executor::HostId;

/// Remote path of the maintenance tool's state document.
pub const DATA_FILE: &str = "/var/lib/foreman-maintain/data.yml";

/// Top-level namespace key.
const DEFAULT_KEY: &str = ":default";
/// Sync plan section key.
const SYNC_PLANS_KEY: &str = ":sync_plans";
/// Disabled plan id list key.
const DISABLED_KEY: &str = ":disabled";
/// Enabled plan id list key.
const ENABLED_KEY: &str = ":enabled";

/// Sync plan list a plan id is expected in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPlanStatus {
    /// Plan was disabled by the maintenance tool.
    Disabled,
    /// Plan was re-enabled by the maintenance tool.
    Enabled,
}

impl SyncPlanStatus {
    /// Returns the lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Enabled => "enabled",
        }
    }
}

impl fmt::Display for SyncPlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sync plan ids recorded in the state document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlanState {
    /// Ids under `:disabled`.
    pub disabled: Vec<u64>,
    /// Ids under `:enabled`.
    pub enabled: Vec<u64>,
}

impl SyncPlanState {
    /// Parses the sync plan section of a state document.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::StateFile`] when the text is not YAML or a
    /// present list holds something other than non-negative integers.
    pub fn parse(path: &Path, text: &str) -> HarnessResult<Self> {
        let state_error = |message: String| HarnessError::StateFile {
            path: path.to_path_buf(),
            message,
        };
        let root: Value =
            serde_yaml::from_str(text).map_err(|err| state_error(format!("invalid yaml: {err}")))?;
        let sync_plans = root.get(DEFAULT_KEY).and_then(|section| section.get(SYNC_PLANS_KEY));
        let ids = |key: &str| -> HarnessResult<Vec<u64>> {
            match sync_plans.and_then(|plans| plans.get(key)) {
                None | Some(Value::Null) => Ok(Vec::new()),
                Some(Value::Sequence(items)) => items
                    .iter()
                    .map(|item| {
                        item.as_u64()
                            .ok_or_else(|| state_error(format!("{key} holds a non-integer id")))
                    })
                    .collect(),
                Some(_) => Err(state_error(format!("{key} is not a list"))),
            }
        };
        Ok(Self {
            disabled: ids(DISABLED_KEY)?,
            enabled: ids(ENABLED_KEY)?,
        })
    }

    /// Reads and parses a fetched state document.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::StateFile`] when the file cannot be read or parsed.
    pub fn load(path: &Path) -> HarnessResult<Self> {
        let text = fs::read_to_string(path).map_err(|err| HarnessError::StateFile {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        Self::parse(path, &text)
    }

    /// Returns the ids recorded for a status.
    #[must_use]
    pub fn ids(&self, status: SyncPlanStatus) -> &[u64] {
        match status {
            SyncPlanStatus::Disabled => &self.disabled,
            SyncPlanStatus::Enabled => &self.enabled,
        }
    }

    /// Requires `plan_id` to be recorded under `status`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::StateMismatch`] when the id is missing.
    pub fn expect_contains(
        &self,
        host: &HostId,
        plan_id: u64,
        status: SyncPlanStatus,
    ) -> HarnessResult<()> {
        if self.ids(status).contains(&plan_id) {
            return Ok(());
        }
        Err(HarnessError::StateMismatch {
            host: host.clone(),
            message: format!(
                "sync plan {plan_id} not in {status} list [{}]",
                join_ids(self.ids(status))
            ),
        })
    }
}

/// Joins ids with commas.
fn join_ids(ids: &[u64]) -> String {
    ids.iter().map(u64::to_string).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
#[path = "state_file_tests.rs"]
mod tests;
