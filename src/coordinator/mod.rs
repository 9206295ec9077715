//! Session orchestration.
//!
//! A [`RunCoordinator`] drives one analysis session:
//!
//! 1. capture a baseline snapshot (fatal on failure)
//! 2. for each run `i` in `1..=N`: trigger the application, capture a
//!    post-run snapshot and diff it against the baseline
//! 3. classify all diffs across the successful runs and aggregate a report
//!
//! The baseline stays fixed for the whole session, so every run's diff is
//! cumulative. A run that fails or exceeds its timeout is recorded and
//! skipped; the session goes on with the next run. Cancellation is observed
//! between runs only: a run in progress always finishes (or times out), and
//! the session still produces a report over the runs that completed.

pub mod models;
pub mod persist;

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use log::{debug, error, info, warn};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::capture::{RunTrigger, SnapshotSource};
use crate::constants::{run_label, BASELINE_LABEL, REPORT_FILE_NAME};
use crate::differ::{DiffRecord, Differ};
use crate::error::{AnalysisError, Result};
use crate::models::{ArtifactKind, Snapshot};
use crate::noise::NoiseFilter;
use crate::report::{write_report, FailedRun, KindError, ResultAggregator, SessionInfo};

pub use models::{SessionOutcome, SessionSettings, SessionState};
pub use persist::{load_session, persist_session, reclassify_session, PersistedSession};

pub struct RunCoordinator {
    source: Box<dyn SnapshotSource>,
    trigger: Box<dyn RunTrigger>,
    settings: SessionSettings,
    differ: Differ,
    state: SessionState,
    history: Vec<SessionState>,
}

impl RunCoordinator {
    /// Create a coordinator; fails with `InsufficientRuns` when fewer than
    /// one run is configured.
    pub fn new(
        source: Box<dyn SnapshotSource>,
        trigger: Box<dyn RunTrigger>,
        settings: SessionSettings,
    ) -> Result<Self> {
        if settings.run_count < 1 {
            return Err(AnalysisError::InsufficientRuns(settings.run_count));
        }

        Ok(Self {
            source,
            trigger,
            differ: Differ::new(settings.diff.clone()),
            settings,
            state: SessionState::Idle,
            history: vec![SessionState::Idle],
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn history(&self) -> &[SessionState] {
        &self.history
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    fn transition(&mut self, next: SessionState) {
        debug!("Session state: {} -> {}", self.state, next);
        self.state = next;
        self.history.push(next);
    }

    fn fail(&mut self, err: AnalysisError) -> AnalysisError {
        error!("Session failed: {}", err);
        self.transition(SessionState::Failed);
        err
    }

    /// Run the whole session once.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<SessionOutcome> {
        if self.state != SessionState::Idle {
            return Err(AnalysisError::InvariantViolation(format!(
                "session can only start from idle, not {}",
                self.state
            )));
        }

        let session_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(
            "Starting session {} for {} ({} run(s))",
            session_id, self.settings.target, self.settings.run_count
        );

        self.transition(SessionState::Baselining);
        let baseline = match self.capture_baseline().await {
            Ok(baseline) => baseline,
            Err(e) => return Err(self.fail(e)),
        };
        info!("Baseline captured: {} artifact(s)", baseline.len());
        if let Err(e) = self.persist_snapshot(&baseline) {
            return Err(self.fail(e));
        }

        let kinds: Vec<ArtifactKind> = self.settings.capture.kinds.iter().copied().collect();
        let mut successful: BTreeSet<u32> = BTreeSet::new();
        let mut failed_runs: Vec<FailedRun> = Vec::new();
        let mut kind_errors: Vec<KindError> = Vec::new();
        let mut run_diffs: BTreeMap<u32, Vec<DiffRecord>> = BTreeMap::new();
        let mut cancelled = false;

        for run_index in 1..=self.settings.run_count as u32 {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            self.transition(SessionState::Running(run_index));
            let observed = match self.execute_run(run_index).await {
                Ok(observed) => observed,
                Err(e) if e.is_run_local() => {
                    warn!("{}", e);
                    failed_runs.push(FailedRun {
                        run_index,
                        reason: e.to_string(),
                    });
                    continue;
                }
                Err(e) => return Err(self.fail(e)),
            };
            if let Err(e) = self.persist_snapshot(&observed) {
                return Err(self.fail(e));
            }

            self.transition(SessionState::Diffing(run_index));
            let mut records = Vec::new();
            for kind_diff in self.differ.diff_snapshots(&baseline, &observed, &kinds, run_index) {
                match kind_diff.result {
                    Ok(diffs) => records.extend(diffs),
                    Err(AnalysisError::SnapshotMismatch { kind, detail }) => {
                        warn!("Run {}: skipping {} diff: {}", run_index, kind, detail);
                        kind_errors.push(KindError {
                            run_index,
                            kind,
                            detail,
                        });
                    }
                    Err(e) => return Err(self.fail(e)),
                }
            }

            info!("Run {} completed: {} change(s)", run_index, records.len());
            successful.insert(run_index);
            run_diffs.insert(run_index, records);
        }

        if cancelled {
            warn!(
                "Session cancelled after {} completed run(s)",
                successful.len() + failed_runs.len()
            );
        }

        self.transition(SessionState::Aggregating);

        let info = SessionInfo {
            session_id,
            target: self.settings.target.clone(),
            run_count: self.settings.run_count,
            successful_runs: successful.iter().copied().collect(),
            failed_runs,
            kind_errors,
            cancelled,
            started_at,
            finished_at: Utc::now(),
        };

        if let Some(dir) = &self.settings.session_dir {
            if let Err(e) = persist_session(dir, &info, &run_diffs) {
                return Err(self.fail(e));
            }
        }

        let verdicts = if successful.is_empty() {
            warn!("No successful runs; the report will be empty");
            Vec::new()
        } else {
            let all_diffs: Vec<DiffRecord> = run_diffs.values().flatten().cloned().collect();
            match NoiseFilter::new(self.settings.noise.clone()).classify_successful(&all_diffs, &successful) {
                Ok(verdicts) => verdicts,
                Err(e) => return Err(self.fail(e)),
            }
        };

        let report = ResultAggregator::new(self.settings.include_noise_listing).aggregate(&verdicts, &info);

        if let Some(dir) = &self.settings.session_dir {
            if let Err(e) = write_report(&report, &dir.join(REPORT_FILE_NAME)) {
                return Err(self.fail(e));
            }
        }

        self.transition(SessionState::Done);
        info!(
            "Session {} done: {} reported change(s), {} noise dropped",
            session_id,
            report.entry_count(),
            report.metadata.dropped_noise_count
        );

        Ok(SessionOutcome {
            report,
            verdicts,
            run_diffs,
            history: self.history.clone(),
        })
    }

    async fn capture_baseline(&self) -> Result<Snapshot> {
        let timeout = self.settings.run_timeout;
        let capture = self.source.capture(BASELINE_LABEL, &self.settings.capture);

        match tokio::time::timeout(timeout, capture).await {
            Ok(Ok(snapshot)) => Ok(self.settings.capture.apply(&snapshot)),
            Ok(Err(e)) => Err(AnalysisError::BaselineCapture(format!("{:#}", e))),
            Err(_) => Err(AnalysisError::BaselineCapture(format!(
                "timed out after {}s",
                timeout.as_secs()
            ))),
        }
    }

    /// Trigger run `run_index` and capture its post-run snapshot, within the
    /// per-run timeout
    async fn execute_run(&self, run_index: u32) -> Result<Snapshot> {
        let label = run_label(run_index);
        let run = async {
            self.trigger
                .execute(run_index)
                .await
                .map_err(|e| AnalysisError::RunExecution {
                    run_index,
                    reason: format!("trigger: {:#}", e),
                })?;

            self.source
                .capture(&label, &self.settings.capture)
                .await
                .map_err(|e| AnalysisError::RunExecution {
                    run_index,
                    reason: format!("capture: {:#}", e),
                })
        };

        match tokio::time::timeout(self.settings.run_timeout, run).await {
            Ok(snapshot) => snapshot.map(|s| self.settings.capture.apply(&s)),
            Err(_) => Err(AnalysisError::RunTimeout {
                run_index,
                timeout_secs: self.settings.run_timeout.as_secs(),
            }),
        }
    }

    fn persist_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        match &self.settings.session_dir {
            Some(dir) => persist::persist_snapshot(dir, snapshot),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{MockRunTrigger, MockSnapshotSource};
    use crate::noise::Confidence;
    use crate::test_utils::generators::*;

    fn settings(run_count: usize) -> SessionSettings {
        SessionSettings {
            target: "de.fkie.ground_truth".to_string(),
            run_count,
            ..Default::default()
        }
    }

    /// Source returning an empty baseline and `/data/x.txt` after each run
    fn source_with_created_file() -> MockSnapshotSource {
        let mut source = MockSnapshotSource::new();
        source.expect_capture().returning(|label, _| {
            if label == "baseline" {
                Ok(test_snapshot(label, vec![]))
            } else {
                Ok(test_snapshot(label, vec![test_file("/data/x.txt", b"ground truth")]))
            }
        });
        source
    }

    #[tokio::test]
    async fn test_session_state_history() {
        let mut trigger = MockRunTrigger::new();
        trigger.expect_execute().times(2).returning(|_| Ok(()));

        let mut coordinator =
            RunCoordinator::new(Box::new(source_with_created_file()), Box::new(trigger), settings(2)).unwrap();
        let outcome = coordinator.run(&CancellationToken::new()).await.unwrap();

        assert_eq!(
            outcome.history,
            vec![
                SessionState::Idle,
                SessionState::Baselining,
                SessionState::Running(1),
                SessionState::Diffing(1),
                SessionState::Running(2),
                SessionState::Diffing(2),
                SessionState::Aggregating,
                SessionState::Done,
            ]
        );
        assert_eq!(coordinator.state(), SessionState::Done);

        let entry = outcome.report.find(ArtifactKind::File, "/data/x.txt").unwrap();
        assert_eq!(entry.confidence, Confidence::Confirmed);
        assert_eq!(entry.supporting_runs, vec![1, 2]);
        assert_eq!(outcome.run_diffs.len(), 2);
    }

    #[tokio::test]
    async fn test_baseline_failure_is_fatal() {
        let mut source = MockSnapshotSource::new();
        source
            .expect_capture()
            .returning(|_, _| Err(anyhow::anyhow!("emulator not reachable")));
        let mut trigger = MockRunTrigger::new();
        trigger.expect_execute().times(0);

        let mut coordinator = RunCoordinator::new(Box::new(source), Box::new(trigger), settings(2)).unwrap();
        let err = coordinator.run(&CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, AnalysisError::BaselineCapture(ref reason) if reason.contains("emulator")));
        assert_eq!(coordinator.state(), SessionState::Failed);
    }

    #[tokio::test]
    async fn test_trigger_failure_marks_run_failed() {
        let mut trigger = MockRunTrigger::new();
        trigger.expect_execute().returning(|run_index| {
            if run_index == 1 {
                Err(anyhow::anyhow!("app crashed"))
            } else {
                Ok(())
            }
        });

        let mut coordinator =
            RunCoordinator::new(Box::new(source_with_created_file()), Box::new(trigger), settings(3)).unwrap();
        let outcome = coordinator.run(&CancellationToken::new()).await.unwrap();
        let session = &outcome.report.metadata.session;

        assert_eq!(session.successful_runs, vec![2, 3]);
        assert_eq!(session.failed_run_indices(), vec![1]);
        assert!(session.failed_runs[0].reason.contains("app crashed"));

        // voting is against runs 2 and 3 only
        let entry = outcome.report.find(ArtifactKind::File, "/data/x.txt").unwrap();
        assert_eq!(entry.confidence, Confidence::Confirmed);
    }

    #[tokio::test]
    async fn test_snapshot_mismatch_is_local_to_kind() {
        let mut source = MockSnapshotSource::new();
        source.expect_capture().returning(|label, _| {
            let mut artifacts = vec![test_file("/data/x.txt", b"x")];
            if label != "baseline" {
                let duplicate = test_row("GroundTruth.db", "ground_truth", "0", "a");
                artifacts.push(duplicate.clone());
                artifacts.push(duplicate);
                artifacts.push(test_file("/data/new", b"n"));
            }
            Ok(test_snapshot(label, artifacts))
        });
        let mut trigger = MockRunTrigger::new();
        trigger.expect_execute().returning(|_| Ok(()));

        let mut coordinator = RunCoordinator::new(Box::new(source), Box::new(trigger), settings(1)).unwrap();
        let outcome = coordinator.run(&CancellationToken::new()).await.unwrap();
        let session = &outcome.report.metadata.session;

        assert_eq!(session.kind_errors.len(), 1);
        assert_eq!(session.kind_errors[0].kind, ArtifactKind::DatabaseRow);
        assert_eq!(session.successful_runs, vec![1]);
        assert!(outcome.report.find(ArtifactKind::File, "/data/new").is_some());
    }

    #[tokio::test]
    async fn test_cancelled_before_first_run() {
        let mut trigger = MockRunTrigger::new();
        trigger.expect_execute().times(0);

        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut coordinator =
            RunCoordinator::new(Box::new(source_with_created_file()), Box::new(trigger), settings(3)).unwrap();
        let outcome = coordinator.run(&cancel).await.unwrap();

        assert!(outcome.report.metadata.session.cancelled);
        assert!(outcome.report.metadata.session.successful_runs.is_empty());
        assert!(outcome.report.artifacts.is_empty());
        assert_eq!(coordinator.state(), SessionState::Done);
    }

    #[test]
    fn test_zero_runs_rejected() {
        let err = RunCoordinator::new(
            Box::new(MockSnapshotSource::new()),
            Box::new(MockRunTrigger::new()),
            settings(0),
        )
        .err()
        .unwrap();
        assert!(matches!(err, AnalysisError::InsufficientRuns(0)));
    }

    #[tokio::test]
    async fn test_session_runs_only_once() {
        let mut trigger = MockRunTrigger::new();
        trigger.expect_execute().returning(|_| Ok(()));

        let mut coordinator =
            RunCoordinator::new(Box::new(source_with_created_file()), Box::new(trigger), settings(1)).unwrap();
        coordinator.run(&CancellationToken::new()).await.unwrap();

        let err = coordinator.run(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, AnalysisError::InvariantViolation(_)));
    }
}
