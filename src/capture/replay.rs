//! Adapters serving snapshots recorded earlier.
//!
//! A replay directory holds one `<label>.json` snapshot per capture point:
//! `baseline.json`, `run_1.json`, `run_2.json`, ... The `snapshots/`
//! directory of a persisted session has exactly this layout.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::debug;

use crate::capture::{CaptureOptions, RunTrigger, SnapshotSource};
use crate::constants::{run_label, RUN_LABEL_PREFIX};
use crate::models::Snapshot;

fn snapshot_path(dir: &Path, label: &str) -> PathBuf {
    dir.join(format!("{}.json", label))
}

/// Serves `<dir>/<label>.json` for each capture
#[derive(Debug, Clone)]
pub struct ReplaySource {
    dir: PathBuf,
}

impl ReplaySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Highest recorded run index, or 0 when no run was recorded.
    ///
    /// Runs missing below it (failed in the recorded session) fail again
    /// through [`ReplayTrigger`].
    pub fn recorded_runs(&self) -> usize {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(_) => return 0,
        };

        entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                name.strip_suffix(".json")?
                    .strip_prefix(RUN_LABEL_PREFIX)?
                    .parse::<usize>()
                    .ok()
            })
            .max()
            .unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl SnapshotSource for ReplaySource {
    async fn capture(&self, label: &str, options: &CaptureOptions) -> Result<Snapshot> {
        let path = snapshot_path(&self.dir, label);
        let content = tokio::fs::read_to_string(&path)
            .await
            .context(format!("Failed to read recorded snapshot: {}", path.display()))?;

        let snapshot: Snapshot = serde_json::from_str(&content)
            .context(format!("Failed to parse recorded snapshot: {}", path.display()))?;

        debug!("Replayed {} artifact(s) from {}", snapshot.len(), path.display());
        Ok(options.apply(&snapshot))
    }
}

/// Succeeds for runs that have a recorded post-run snapshot
#[derive(Debug, Clone)]
pub struct ReplayTrigger {
    dir: PathBuf,
}

impl ReplayTrigger {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait::async_trait]
impl RunTrigger for ReplayTrigger {
    async fn execute(&self, run_index: u32) -> Result<()> {
        let path = snapshot_path(&self.dir, &run_label(run_index));
        if !path.is_file() {
            bail!("no recorded snapshot for run {} ({})", run_index, path.display());
        }
        Ok(())
    }
}
