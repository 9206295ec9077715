use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::differ::ChangeType;
use crate::models::{ArtifactKind, Payload};
use crate::noise::Confidence;

/// A run whose trigger or post-run capture did not complete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedRun {
    pub run_index: u32,
    pub reason: String,
}

/// A kind whose diff could not be computed in one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindError {
    pub run_index: u32,
    pub kind: ArtifactKind,
    pub detail: String,
}

/// Facts about an analysis session, independent of classification.
///
/// This is also the manifest persisted next to the raw per-run diffs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: Uuid,
    /// Package name of the application under test
    pub target: String,
    /// Configured number of runs
    pub run_count: usize,
    pub successful_runs: Vec<u32>,
    pub failed_runs: Vec<FailedRun>,
    #[serde(default)]
    pub kind_errors: Vec<KindError>,
    /// Session stopped early; only completed runs are covered
    #[serde(default)]
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SessionInfo {
    /// Indices of failed runs, ascending
    pub fn failed_run_indices(&self) -> Vec<u32> {
        let mut indices: Vec<u32> = self.failed_runs.iter().map(|f| f.run_index).collect();
        indices.sort_unstable();
        indices
    }
}

/// Report metadata: session facts plus aggregation counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    #[serde(flatten)]
    pub session: SessionInfo,
    /// Noise verdicts left out of the report body
    pub dropped_noise_count: usize,
    pub analyzer_version: String,
}

/// One surviving artifact change in the report body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub identity_key: String,
    pub change_type: ChangeType,
    pub confidence: Confidence,
    pub before: Option<Payload>,
    pub after: Option<Payload>,
    pub supporting_runs: Vec<u32>,
    #[serde(default)]
    pub clock_driven: bool,
    /// Capture time of the first and last run that observed the change
    pub first_observed_at: DateTime<Utc>,
    pub last_observed_at: DateTime<Utc>,
}

/// Final, immutable result of an analysis session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub metadata: SessionMetadata,
    /// Confirmed and Suspected changes, grouped by kind
    pub artifacts: BTreeMap<ArtifactKind, Vec<ReportEntry>>,
    /// Identity keys of dropped noise, when requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noise: Option<BTreeMap<ArtifactKind, Vec<String>>>,
}

impl Report {
    /// Number of entries in the report body
    pub fn entry_count(&self) -> usize {
        self.artifacts.values().map(Vec::len).sum()
    }

    /// Number of entries with the given confidence
    pub fn count_with(&self, confidence: Confidence) -> usize {
        self.artifacts
            .values()
            .flatten()
            .filter(|e| e.confidence == confidence)
            .count()
    }

    /// Look up an entry by kind and identity key
    pub fn find(&self, kind: ArtifactKind, identity_key: &str) -> Option<&ReportEntry> {
        self.artifacts
            .get(&kind)?
            .iter()
            .find(|e| e.identity_key == identity_key)
    }
}
