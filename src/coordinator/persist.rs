//! On-disk layout of a session.
//!
//! ```text
//! <session_dir>/
//!   session.json          session manifest (SessionInfo)
//!   snapshots/<label>.json baseline and post-run snapshots
//!   runs/run_<i>.json     raw diff records of successful run i
//!   report.json           final report
//! ```
//!
//! The manifest and run files are written before classification, so a
//! session can be classified again with other noise filter settings without
//! touching the emulator.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::constants::{
    run_label, REPORT_FILE_NAME, RUNS_DIR_NAME, SESSION_FILE_NAME, SNAPSHOTS_DIR_NAME,
};
use crate::differ::DiffRecord;
use crate::error::{AnalysisError, Result};
use crate::models::Snapshot;
use crate::noise::{NoiseFilter, NoiseFilterOptions};
use crate::report::{write_report, Report, ResultAggregator, SessionInfo};
use crate::utils::json::{load_from_json, save_to_json};

fn run_file(dir: &Path, run_index: u32) -> PathBuf {
    dir.join(RUNS_DIR_NAME).join(format!("{}.json", run_label(run_index)))
}

/// A session read back from disk
#[derive(Debug, Clone)]
pub struct PersistedSession {
    pub info: SessionInfo,
    pub run_diffs: BTreeMap<u32, Vec<DiffRecord>>,
}

impl PersistedSession {
    /// Diff records of all runs, in run order
    pub fn diffs(&self) -> Vec<DiffRecord> {
        self.run_diffs.values().flatten().cloned().collect()
    }
}

/// Write the manifest and the raw diffs of every successful run
pub fn persist_session(
    dir: &Path,
    info: &SessionInfo,
    run_diffs: &BTreeMap<u32, Vec<DiffRecord>>,
) -> Result<()> {
    for (run_index, records) in run_diffs {
        save_to_json(records, run_file(dir, *run_index))?;
    }
    save_to_json(info, dir.join(SESSION_FILE_NAME))?;

    info!(
        "Persisted session {} ({} run file(s)) to {}",
        info.session_id,
        run_diffs.len(),
        dir.display()
    );
    Ok(())
}

/// Write one captured snapshot under `snapshots/`
pub fn persist_snapshot(dir: &Path, snapshot: &Snapshot) -> Result<()> {
    let path = dir
        .join(SNAPSHOTS_DIR_NAME)
        .join(format!("{}.json", snapshot.label));
    save_to_json(snapshot, path)
}

/// Read a persisted session back
pub fn load_session(dir: &Path) -> Result<PersistedSession> {
    let info: SessionInfo = load_from_json(dir.join(SESSION_FILE_NAME))?;

    let mut run_diffs = BTreeMap::new();
    for run_index in &info.successful_runs {
        let records: Vec<DiffRecord> = load_from_json(run_file(dir, *run_index))?;
        if let Some(stray) = records.iter().find(|r| r.run_index != *run_index) {
            return Err(AnalysisError::persistence(
                run_file(dir, *run_index).display().to_string(),
                format!("contains a record of run {}", stray.run_index),
            ));
        }
        run_diffs.insert(*run_index, records);
    }

    debug!(
        "Loaded session {} with {} successful run(s)",
        info.session_id,
        run_diffs.len()
    );
    Ok(PersistedSession { info, run_diffs })
}

/// Classify a persisted session again and write a fresh `report.json`
pub fn reclassify_session(
    dir: &Path,
    options: NoiseFilterOptions,
    include_noise_listing: bool,
) -> Result<Report> {
    let session = load_session(dir)?;
    let successful: BTreeSet<u32> = session.info.successful_runs.iter().copied().collect();

    let verdicts = if successful.is_empty() {
        warn!("Session {} has no successful runs", session.info.session_id);
        Vec::new()
    } else {
        NoiseFilter::new(options).classify_successful(&session.diffs(), &successful)?
    };

    let report = ResultAggregator::new(include_noise_listing).aggregate(&verdicts, &session.info);
    write_report(&report, &dir.join(REPORT_FILE_NAME))?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise::Confidence;
    use crate::test_utils::generators::*;
    use tempfile::TempDir;

    fn sample_runs() -> BTreeMap<u32, Vec<DiffRecord>> {
        let mut runs = BTreeMap::new();
        runs.insert(1, vec![test_added_file("/data/x.txt", 1), test_added_file("/data/tmp1", 1)]);
        runs.insert(3, vec![test_added_file("/data/x.txt", 3)]);
        runs
    }

    fn sample_info() -> SessionInfo {
        let mut info = test_session_info(3);
        info.successful_runs = vec![1, 3];
        info.failed_runs = vec![crate::report::FailedRun {
            run_index: 2,
            reason: "run 2 timed out after 300s".to_string(),
        }];
        info
    }

    #[test]
    fn test_persist_and_load() {
        let temp_dir = TempDir::new().unwrap();
        persist_session(temp_dir.path(), &sample_info(), &sample_runs()).unwrap();

        assert!(temp_dir.path().join("session.json").exists());
        assert!(temp_dir.path().join("runs/run_1.json").exists());
        assert!(!temp_dir.path().join("runs/run_2.json").exists());

        let loaded = load_session(temp_dir.path()).unwrap();
        assert_eq!(loaded.info, sample_info());
        assert_eq!(loaded.run_diffs, sample_runs());
        assert_eq!(loaded.diffs().len(), 3);
    }

    #[test]
    fn test_missing_run_file() {
        let temp_dir = TempDir::new().unwrap();
        persist_session(temp_dir.path(), &sample_info(), &sample_runs()).unwrap();
        std::fs::remove_file(temp_dir.path().join("runs/run_3.json")).unwrap();

        let err = load_session(temp_dir.path()).unwrap_err();
        assert!(matches!(err, AnalysisError::Persistence { .. }));
    }

    #[test]
    fn test_reclassify_with_other_filter() {
        let temp_dir = TempDir::new().unwrap();
        persist_session(temp_dir.path(), &sample_info(), &sample_runs()).unwrap();

        let strict = reclassify_session(temp_dir.path(), NoiseFilterOptions::default(), false).unwrap();
        assert_eq!(strict.entry_count(), 1);
        assert_eq!(strict.metadata.dropped_noise_count, 1);
        assert_eq!(strict.metadata.session.failed_run_indices(), vec![2]);

        let lenient = reclassify_session(
            temp_dir.path(),
            NoiseFilterOptions {
                avoid_strong_noise_filter: true,
                ..Default::default()
            },
            false,
        )
        .unwrap();
        assert_eq!(lenient.entry_count(), 2);
        assert_eq!(
            lenient.find(crate::models::ArtifactKind::File, "/data/tmp1").map(|e| e.confidence),
            Some(Confidence::Suspected)
        );
        assert!(temp_dir.path().join("report.json").exists());
    }

    #[test]
    fn test_persist_snapshot_layout() {
        let temp_dir = TempDir::new().unwrap();
        let snapshot = test_snapshot("baseline", vec![test_file("/data/a", b"a")]);
        persist_snapshot(temp_dir.path(), &snapshot).unwrap();

        let back: Snapshot = load_from_json(temp_dir.path().join("snapshots/baseline.json")).unwrap();
        assert_eq!(back, snapshot);
    }
}
