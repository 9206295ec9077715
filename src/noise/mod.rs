//! Cross-run noise filter.
//!
//! Diff records of all runs are grouped by `(kind, identity_key,
//! change_type)` and each group votes on how reproducible it was:
//!
//! | supporting runs | confidence |
//! |-----------------|------------|
//! | every successful run | `Confirmed` |
//! | more than one, not all | `Suspected` |
//! | exactly one | `Noise` (`Suspected` with `avoid_strong_noise_filter`) |
//!
//! Groups made up entirely of clock-driven writes are then downgraded one
//! level. Voting is always against the runs that actually completed, so a
//! failed run never counts against an artifact.

mod clock;
pub mod models;

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::differ::{ChangeType, DiffRecord};
use crate::error::{AnalysisError, Result};
use crate::models::ArtifactKind;

pub use models::{Confidence, NoiseFilterOptions, Verdict};

#[derive(Debug, Clone, Default)]
pub struct NoiseFilter {
    options: NoiseFilterOptions,
}

impl NoiseFilter {
    pub fn new(options: NoiseFilterOptions) -> Self {
        Self { options }
    }

    /// Classify diffs of runs `1..=run_count`
    pub fn classify(&self, diffs: &[DiffRecord], run_count: usize) -> Result<Vec<Verdict>> {
        if run_count < 1 {
            return Err(AnalysisError::InsufficientRuns(run_count));
        }
        let runs: BTreeSet<u32> = (1..=run_count as u32).collect();
        self.classify_successful(diffs, &runs)
    }

    /// Classify diffs against an explicit set of successful runs.
    ///
    /// Verdicts are ordered by kind, identity key and change type.
    pub fn classify_successful(&self, diffs: &[DiffRecord], successful_runs: &BTreeSet<u32>) -> Result<Vec<Verdict>> {
        if successful_runs.is_empty() {
            return Err(AnalysisError::InsufficientRuns(0));
        }

        let mut groups: BTreeMap<(ArtifactKind, &str, ChangeType), Vec<&DiffRecord>> = BTreeMap::new();
        for record in diffs {
            if !successful_runs.contains(&record.run_index) {
                return Err(AnalysisError::InvariantViolation(format!(
                    "diff record for '{}' belongs to run {}, which is not a successful run",
                    record.identity_key, record.run_index
                )));
            }
            groups
                .entry((record.kind, record.identity_key.as_str(), record.change_type))
                .or_default()
                .push(record);
        }

        let verdicts: Vec<Verdict> = groups
            .into_iter()
            .map(|((kind, identity_key, change_type), records)| {
                self.vote(kind, identity_key, change_type, &records, successful_runs)
            })
            .collect();

        debug!(
            "Classified {} diff record(s) into {} verdict(s) over {} run(s)",
            diffs.len(),
            verdicts.len(),
            successful_runs.len()
        );

        Ok(verdicts)
    }

    fn vote(
        &self,
        kind: ArtifactKind,
        identity_key: &str,
        change_type: ChangeType,
        records: &[&DiffRecord],
        successful_runs: &BTreeSet<u32>,
    ) -> Verdict {
        let supporting_runs: BTreeSet<u32> = records.iter().map(|r| r.run_index).collect();

        let mut confidence = if supporting_runs.len() == successful_runs.len() {
            Confidence::Confirmed
        } else if supporting_runs.len() == 1 {
            if self.options.avoid_strong_noise_filter {
                Confidence::Suspected
            } else {
                Confidence::Noise
            }
        } else {
            Confidence::Suspected
        };

        let clock_driven = records
            .iter()
            .all(|r| clock::is_clock_driven(r, self.options.clock_tolerance_secs));
        if clock_driven {
            confidence = confidence.downgrade();
        }

        // groups are never empty; the latest run carries the freshest payloads
        let latest = records.iter().max_by_key(|r| r.run_index);
        let first_observed_at = records.iter().map(|r| r.observed_at).min();
        let last_observed_at = records.iter().map(|r| r.observed_at).max();

        Verdict {
            kind,
            identity_key: identity_key.to_string(),
            change_type,
            confidence,
            supporting_runs,
            before: latest.and_then(|r| r.before.clone()),
            after: latest.and_then(|r| r.after.clone()),
            clock_driven,
            first_observed_at: first_observed_at.unwrap_or_default(),
            last_observed_at: last_observed_at.unwrap_or_default(),
        }
    }
}
