//! Error taxonomy of the analysis pipeline.
//!
//! | Variant | Scope |
//! |---------|-------|
//! | `BaselineCapture` | fatal, the session aborts |
//! | `RunExecution` / `RunTimeout` | one run, recorded as failed |
//! | `SnapshotMismatch` | one kind of one run |
//! | `InsufficientRuns` | fatal, the session never starts |
//! | `Persistence` | reading or writing intermediate state |
//! | `InvariantViolation` | programming defect, never retried |

use thiserror::Error;

use crate::models::ArtifactKind;

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The pre-run baseline could not be captured
    #[error("baseline capture failed: {0}")]
    BaselineCapture(String),

    /// The trigger or post-run capture of a single run failed
    #[error("run {run_index} failed: {reason}")]
    RunExecution { run_index: u32, reason: String },

    /// A single run exceeded its time budget
    #[error("run {run_index} timed out after {timeout_secs}s")]
    RunTimeout { run_index: u32, timeout_secs: u64 },

    /// The snapshots' partitions for one kind are inconsistent
    #[error("snapshot mismatch for {kind}: {detail}")]
    SnapshotMismatch { kind: ArtifactKind, detail: String },

    /// Fewer than one (successful) run to analyze
    #[error("insufficient runs: {0} (at least 1 required)")]
    InsufficientRuns(usize),

    #[error("failed to persist {what}: {cause}")]
    Persistence { what: String, cause: String },

    #[error("internal invariant violated: {0}")]
    InvariantViolation(String),
}

impl AnalysisError {
    /// Whether the error only invalidates a single run
    pub fn is_run_local(&self) -> bool {
        matches!(
            self,
            AnalysisError::RunExecution { .. } | AnalysisError::RunTimeout { .. }
        )
    }

    pub(crate) fn persistence(what: impl Into<String>, cause: impl ToString) -> Self {
        AnalysisError::Persistence {
            what: what.into(),
            cause: cause.to_string(),
        }
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, AnalysisError>;
