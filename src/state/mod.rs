//! Per-agent install state
//!
//! `.sk-state.json` in an agent's skills directory is the sole persistent
//! artifact of the sync core. It lists the managed skill names; only names
//! recorded here are ever removed or overwritten. The file is read once and
//! fully rewritten once per run, never patched. An unsupported version or a
//! malformed shape is a hard read error; there is no silent migration.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SkError};

/// State file name inside an agent's skills directory.
pub const STATE_FILE: &str = ".sk-state.json";

/// The only state format this build reads or writes.
pub const STATE_VERSION: u32 = 1;

/// Managed-skill state for one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentInstallState {
    pub version: u32,
    /// Sorted, deduplicated managed skill names.
    pub skills: Vec<String>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl AgentInstallState {
    /// Build a fresh state from the desired skill set, normalizing order.
    pub fn new(mut skills: Vec<String>) -> Self {
        skills.sort();
        skills.dedup();
        Self {
            version: STATE_VERSION,
            skills,
            updated_at: Utc::now(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.skills.iter().any(|s| s == name)
    }

    /// Path of the state file under a skills root.
    pub fn path_for(skills_root: &Path) -> PathBuf {
        skills_root.join(STATE_FILE)
    }

    /// Load the state for an agent. `Ok(None)` means no state file exists
    /// (a cold, first-run agent).
    pub fn load(skills_root: &Path) -> Result<Option<Self>> {
        let path = Self::path_for(skills_root);
        if !path.is_file() {
            return Ok(None);
        }
        let content = crate::common::fs::read_to_string(&path)?;

        let value: serde_json::Value =
            serde_json::from_str(&content).map_err(|e| SkError::StateParseFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        let version = value
            .get("version")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| SkError::StateParseFailed {
                path: path.display().to_string(),
                reason: "missing or non-numeric 'version'".to_string(),
            })?;
        if version != u64::from(STATE_VERSION) {
            return Err(SkError::StateVersionUnsupported {
                path: path.display().to_string(),
                version: u32::try_from(version).unwrap_or(u32::MAX),
            });
        }

        let state: Self =
            serde_json::from_value(value).map_err(|e| SkError::StateParseFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        Ok(Some(state))
    }

    /// Persist the state, overwriting any previous file.
    pub fn save(&self, skills_root: &Path) -> Result<()> {
        let path = Self::path_for(skills_root);
        let content =
            serde_json::to_string_pretty(self).map_err(|e| SkError::FileWriteFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        crate::common::fs::write(&path, &content)
    }
}
