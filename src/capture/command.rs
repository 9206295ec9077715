//! Adapters backed by external programs.
//!
//! Both run their command through `sh -c` with the session context in the
//! environment:
//!
//! | variable | set for |
//! |----------|---------|
//! | `SANDROID_CAPTURE_LABEL` | capture: `baseline` or `run_<i>` |
//! | `SANDROID_CAPTURE_KINDS` | capture: comma separated kinds |
//! | `SANDROID_CAPTURE_HASH` / `SANDROID_SHOW_DELETED` | capture: `1` or `0` |
//! | `SANDROID_RUN_INDEX` | trigger: 1-based run index |
//! | `SANDROID_TARGET_PACKAGE` | both |
//!
//! A capture command prints either a full snapshot or a bare JSON array of
//! artifacts on stdout. A trigger command reports success by exit status.

use std::process::Output;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use log::{debug, warn};
use serde::Deserialize;
use tokio::process::Command;

use crate::capture::{CaptureOptions, RunTrigger, SnapshotSource};
use crate::constants::{
    ENV_CAPTURE_HASH, ENV_CAPTURE_KINDS, ENV_CAPTURE_LABEL, ENV_RUN_INDEX, ENV_SHOW_DELETED, ENV_TARGET_PACKAGE,
};
use crate::models::{Artifact, Snapshot};

/// Shape of a capture command's stdout
#[derive(Deserialize)]
#[serde(untagged)]
enum CaptureOutput {
    Snapshot(Snapshot),
    Artifacts(Vec<Artifact>),
}

fn shell(command: &str, target_package: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .env(ENV_TARGET_PACKAGE, target_package)
        .kill_on_drop(true);
    cmd
}

fn check_status(what: &str, output: &Output) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        bail!("{} exited with {}", what, output.status);
    }
    bail!("{} exited with {}: {}", what, output.status, stderr);
}

/// Capture by running an external program
#[derive(Debug, Clone)]
pub struct CommandCapture {
    command: String,
    target_package: String,
}

impl CommandCapture {
    pub fn new(command: impl Into<String>, target_package: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            target_package: target_package.into(),
        }
    }
}

#[async_trait::async_trait]
impl SnapshotSource for CommandCapture {
    async fn capture(&self, label: &str, options: &CaptureOptions) -> Result<Snapshot> {
        debug!("Capturing '{}' with: {}", label, self.command);

        let output = shell(&self.command, &self.target_package)
            .env(ENV_CAPTURE_LABEL, label)
            .env(ENV_CAPTURE_KINDS, options.kinds_arg())
            .env(ENV_CAPTURE_HASH, if options.hash_files { "1" } else { "0" })
            .env(ENV_SHOW_DELETED, if options.show_deleted { "1" } else { "0" })
            .output()
            .await
            .context(format!("Failed to execute capture command: {}", self.command))?;

        check_status("capture command", &output)?;

        let parsed: CaptureOutput = serde_json::from_slice(&output.stdout)
            .context(format!("Capture command produced invalid JSON for '{}'", label))?;

        let snapshot = match parsed {
            CaptureOutput::Snapshot(snapshot) => {
                if snapshot.label != label {
                    warn!(
                        "Capture command labelled snapshot '{}' but '{}' was requested",
                        snapshot.label, label
                    );
                }
                Snapshot::new(label, snapshot.captured_at, snapshot.artifacts().to_vec())
            }
            CaptureOutput::Artifacts(artifacts) => Snapshot::new(label, Utc::now(), artifacts),
        };

        debug!("Captured {} artifact(s) for '{}'", snapshot.len(), label);
        Ok(options.apply(&snapshot))
    }
}

/// Trigger a run by executing an external program
#[derive(Debug, Clone)]
pub struct CommandTrigger {
    command: String,
    target_package: String,
}

impl CommandTrigger {
    pub fn new(command: impl Into<String>, target_package: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            target_package: target_package.into(),
        }
    }
}

#[async_trait::async_trait]
impl RunTrigger for CommandTrigger {
    async fn execute(&self, run_index: u32) -> Result<()> {
        debug!("Triggering run {} with: {}", run_index, self.command);

        let output = shell(&self.command, &self.target_package)
            .env(ENV_RUN_INDEX, run_index.to_string())
            .output()
            .await
            .context(format!("Failed to execute trigger command: {}", self.command))?;

        check_status("trigger command", &output)
    }
}
