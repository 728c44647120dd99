//! JSON file persistence for run state.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::domain::errors::RunStateError;
use crate::domain::models::{RunState, RUN_STATE_VERSION};
use crate::domain::ports::RunStateStore;

/// Directory under the project root that holds engine state.
pub const STATE_DIR: &str = ".wavesmith";
pub const STATE_FILE: &str = "run_state.json";

/// Stores run state at `<root>/.wavesmith/run_state.json`.
///
/// Saves write a sibling temp file and rename it over the target, so a
/// crash mid-save leaves the previous state intact.
#[derive(Debug, Clone)]
pub struct JsonRunStateStore {
    path: PathBuf,
}

impl JsonRunStateStore {
    /// Store at `.wavesmith/run_state.json` under `root`.
    pub fn for_project(root: &Path) -> Self {
        Self {
            path: root.join(STATE_DIR).join(STATE_FILE),
        }
    }

    /// State file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> RunStateError {
        RunStateError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl RunStateStore for JsonRunStateStore {
    async fn load(&self) -> Result<RunState, RunStateError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RunStateError::NotFound(self.path.clone()));
            }
            Err(e) => return Err(self.io_error(e)),
        };

        let state: RunState = serde_json::from_slice(&bytes)?;
        if state.version != RUN_STATE_VERSION {
            return Err(RunStateError::UnsupportedVersion {
                found: state.version,
                expected: RUN_STATE_VERSION,
            });
        }
        Ok(state)
    }

    async fn save(&self, state: &RunState) -> Result<(), RunStateError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        let json = serde_json::to_vec_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        debug!(path = %self.path.display(), completed = state.completed.len(), "run state saved");
        Ok(())
    }
}
