//! ---
//! mcs_section: "01-core-functionality"
//! mcs_subsection: "module"
//! mcs_type: "source"
//! mcs_scope: "code"
//! mcs_description: "Reconciliation controller and host adapters."
//! mcs_version: "v0.1.0"
//! mcs_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::status::UnitStatus;

/// State carried between hook invocations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerState {
    pub status: UnitStatus,
    /// Port opened by the last successful start/restart sequence.
    pub applied_port: Option<u16>,
    pub updated_at: DateTime<Utc>,
}

/// JSON file holding the latest [`ControllerState`].
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or unreadable state is treated as a fresh unit.
    pub fn load(&self) -> Option<ControllerState> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) => {
                debug!(path = %self.path.display(), error = %err, "no persisted state");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(state) => Some(state),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "discarding corrupt state file");
                None
            }
        }
    }

    pub fn save(&self, state: &ControllerState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("unable to create state directory {}", parent.display()))?;
        }
        let json = serde_json::to_vec_pretty(state).context("failed to encode state")?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("unable to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("unable to replace {}", self.path.display()))?;
        debug!(path = %self.path.display(), status = %state.status, "state persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("nested").join("state.json"));
        assert!(store.load().is_none());

        let state = ControllerState {
            status: UnitStatus::active("Ready"),
            applied_port: Some(25565),
            updated_at: Utc::now(),
        };
        store.save(&state).unwrap();
        assert_eq!(store.load(), Some(state));
    }

    #[test]
    fn corrupt_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{not json").unwrap();
        assert!(StateStore::new(path).load().is_none());
    }
}
