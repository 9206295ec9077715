//! Scripted device for integration tests.
//!
//! Plays back a fixed baseline and per-run artifact lists, and lets tests
//! make individual runs fail, stall or cancel the session.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use rust_sandroid::capture::{CaptureOptions, RunTrigger, SnapshotSource};
use rust_sandroid::coordinator::SessionSettings;
use rust_sandroid::models::{Artifact, FilePayload, RowPayload, Snapshot, SocketPayload};

pub const TARGET: &str = "de.fkie.ground_truth";

/// Capture time of the baseline
pub fn baseline_time() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

/// Capture time of run `run_index`, ten minutes apart
pub fn run_time(run_index: u32) -> DateTime<Utc> {
    baseline_time() + chrono::Duration::minutes(10 * i64::from(run_index))
}

pub fn file(path: &str, content: &[u8]) -> Artifact {
    Artifact::file(
        path,
        FilePayload {
            size: content.len() as u64,
            content: Some(content.to_vec()),
            ..Default::default()
        },
        baseline_time(),
    )
}

pub fn socket(local_address: &str, remote_address: &str) -> Artifact {
    Artifact::socket(
        SocketPayload {
            protocol: "tcp".to_string(),
            local_address: local_address.to_string(),
            remote_address: Some(remote_address.to_string()),
            ..Default::default()
        },
        baseline_time(),
    )
}

/// Ground truth row whose `VALUE` column holds `value`
pub fn ground_truth_row(value: serde_json::Value) -> Artifact {
    let mut columns = BTreeMap::new();
    columns.insert("ID".to_string(), json!(0));
    columns.insert("VALUE".to_string(), value);
    Artifact::database_row(
        "0",
        RowPayload {
            database: "GroundTruth.db".to_string(),
            table: "ground_truth".to_string(),
            columns,
        },
        baseline_time(),
    )
}

/// Serves a fixed baseline and per-run artifact lists
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    pub baseline: Vec<Artifact>,
    pub runs: BTreeMap<u32, Vec<Artifact>>,
}

impl ScriptedSource {
    pub fn new(baseline: Vec<Artifact>) -> Self {
        Self {
            baseline,
            runs: BTreeMap::new(),
        }
    }

    pub fn with_run(mut self, run_index: u32, artifacts: Vec<Artifact>) -> Self {
        self.runs.insert(run_index, artifacts);
        self
    }
}

#[async_trait::async_trait]
impl SnapshotSource for ScriptedSource {
    async fn capture(&self, label: &str, _options: &CaptureOptions) -> Result<Snapshot> {
        if label == "baseline" {
            return Ok(Snapshot::new(label, baseline_time(), self.baseline.clone()));
        }

        let run_index: u32 = label
            .strip_prefix("run_")
            .and_then(|i| i.parse().ok())
            .ok_or_else(|| anyhow!("unexpected capture label '{}'", label))?;
        let artifacts = self
            .runs
            .get(&run_index)
            .cloned()
            .ok_or_else(|| anyhow!("no scripted state for run {}", run_index))?;

        Ok(Snapshot::new(label, run_time(run_index), artifacts))
    }
}

/// Trigger with scripted failures, delays, stalls and cancellation
#[derive(Debug, Clone, Default)]
pub struct ScriptedTrigger {
    pub failing: BTreeSet<u32>,
    /// Runs that take a while but finish within the timeout
    pub slow: BTreeMap<u32, Duration>,
    pub stalling: BTreeSet<u32>,
    pub cancel_after: Option<(u32, CancellationToken)>,
}

#[async_trait::async_trait]
impl RunTrigger for ScriptedTrigger {
    async fn execute(&self, run_index: u32) -> Result<()> {
        if self.failing.contains(&run_index) {
            bail!("application crashed during run {}", run_index);
        }
        if let Some(delay) = self.slow.get(&run_index) {
            tokio::time::sleep(*delay).await;
        }
        if self.stalling.contains(&run_index) {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        if let Some((after, token)) = &self.cancel_after {
            if *after == run_index {
                token.cancel();
            }
        }
        Ok(())
    }
}

pub fn settings(run_count: usize) -> SessionSettings {
    SessionSettings {
        target: TARGET.to_string(),
        run_count,
        run_timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

/// Three-run ground truth session:
///
/// - `/data/x.txt` created in every run
/// - a socket to a fixed host open after runs 2 and 3
/// - a random temp file after run 1 only
/// - the ground truth row stamped with the capture time in every run
pub fn ground_truth_source() -> ScriptedSource {
    let stable = file("/system/build.prop", b"ro.build=1");
    let row = |run_index: u32| ground_truth_row(json!(run_time(run_index).timestamp().to_string()));
    let created = file("/data/data/de.fkie.ground_truth/files/x.txt", b"ground truth");
    let peer = socket("10.0.2.15:41234", "141.12.1.1:443");

    ScriptedSource::new(vec![stable.clone(), ground_truth_row(json!("1600000000"))])
        .with_run(
            1,
            vec![stable.clone(), row(1), created.clone(), file("/data/local/tmp/tmp_8f3a", b"junk")],
        )
        .with_run(2, vec![stable.clone(), row(2), created.clone(), peer.clone()])
        .with_run(3, vec![stable, row(3), created, peer])
}
