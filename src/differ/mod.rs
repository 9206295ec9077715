//! Snapshot differ.
//!
//! Computes the set difference between two snapshots for one artifact kind
//! at a time:
//!
//! - keys only in the observed snapshot are **Added**
//! - keys only in the baseline are **Removed**
//! - keys in both with differing payloads are **Modified**
//!
//! Identical payloads produce no record. Time fields never count towards
//! content equality, but a change confined to time fields is still reported
//! (flagged `timestamp_only`); deciding whether it matters is the noise
//! filter's job.
//!
//! Kinds are independent of each other, so [`Differ::diff_snapshots`]
//! computes them in parallel.

mod compare;
pub mod models;

use std::collections::BTreeMap;

use log::debug;
use rayon::prelude::*;

use crate::error::{AnalysisError, Result};
use crate::models::{Artifact, ArtifactKind, Snapshot};

pub use models::{ChangeType, DiffOptions, DiffRecord};

/// Outcome of diffing one kind
#[derive(Debug)]
pub struct KindDiff {
    pub kind: ArtifactKind,
    pub result: Result<Vec<DiffRecord>>,
}

/// Stateless snapshot differ
#[derive(Debug, Clone, Default)]
pub struct Differ {
    options: DiffOptions,
}

impl Differ {
    pub fn new(options: DiffOptions) -> Self {
        Self { options }
    }

    /// Diff one kind of two snapshots.
    ///
    /// Records carry `run_index` 0; use [`Differ::diff_run`] to tag them.
    pub fn diff(&self, baseline: &Snapshot, observed: &Snapshot, kind: ArtifactKind) -> Result<Vec<DiffRecord>> {
        self.diff_run(baseline, observed, kind, 0)
    }

    /// Diff one kind of two snapshots, tagging every record with `run_index`.
    ///
    /// Records are ordered by identity key, then change type.
    pub fn diff_run(
        &self,
        baseline: &Snapshot,
        observed: &Snapshot,
        kind: ArtifactKind,
        run_index: u32,
    ) -> Result<Vec<DiffRecord>> {
        let before = index_partition(baseline, kind)?;
        let after = index_partition(observed, kind)?;

        let mut records = Vec::new();

        for (key, old) in &before {
            match after.get(key) {
                None => records.push(DiffRecord {
                    kind,
                    identity_key: key.to_string(),
                    change_type: ChangeType::Removed,
                    before: Some(old.payload.clone()),
                    after: None,
                    run_index,
                    observed_at: observed.captured_at,
                    changed_fields: Vec::new(),
                    timestamp_only: false,
                }),
                Some(new) => {
                    let delta = compare::compare_payloads(&old.payload, &new.payload, &self.options)
                        .map_err(|e| {
                            AnalysisError::InvariantViolation(format!(
                                "payload of '{}' is not comparable: {}",
                                key, e
                            ))
                        })?;

                    if delta.is_empty() {
                        continue;
                    }

                    let timestamp_only = delta.is_timestamp_only();
                    records.push(DiffRecord {
                        kind,
                        identity_key: key.to_string(),
                        change_type: ChangeType::Modified,
                        before: Some(old.payload.clone()),
                        after: Some(new.payload.clone()),
                        run_index,
                        observed_at: observed.captured_at,
                        changed_fields: delta.into_changed_fields(),
                        timestamp_only,
                    });
                }
            }
        }

        for (key, new) in &after {
            if before.contains_key(key) {
                continue;
            }
            records.push(DiffRecord {
                kind,
                identity_key: key.to_string(),
                change_type: ChangeType::Added,
                before: None,
                after: Some(new.payload.clone()),
                run_index,
                observed_at: observed.captured_at,
                changed_fields: Vec::new(),
                timestamp_only: false,
            });
        }

        records.sort_by(|a, b| {
            a.identity_key
                .cmp(&b.identity_key)
                .then(a.change_type.cmp(&b.change_type))
        });

        debug!(
            "{} diff of '{}' -> '{}': {} record(s)",
            kind,
            baseline.label,
            observed.label,
            records.len()
        );

        Ok(records)
    }

    /// Diff every requested kind, in parallel across kinds.
    ///
    /// A failing kind does not affect the others. Results are returned in the
    /// order of `kinds`.
    pub fn diff_snapshots(
        &self,
        baseline: &Snapshot,
        observed: &Snapshot,
        kinds: &[ArtifactKind],
        run_index: u32,
    ) -> Vec<KindDiff> {
        kinds
            .par_iter()
            .map(|&kind| KindDiff {
                kind,
                result: self.diff_run(baseline, observed, kind, run_index),
            })
            .collect()
    }
}

/// Index one kind partition by identity key, validating the partition
fn index_partition(snapshot: &Snapshot, kind: ArtifactKind) -> Result<BTreeMap<&str, &Artifact>> {
    let mut index = BTreeMap::new();

    for artifact in snapshot.partition(kind) {
        let payload_kind = artifact.payload.kind();
        if payload_kind != kind {
            return Err(AnalysisError::SnapshotMismatch {
                kind,
                detail: format!(
                    "artifact '{}' in snapshot '{}' is tagged {} but carries a {} payload",
                    artifact.identity_key, snapshot.label, kind, payload_kind
                ),
            });
        }

        if index.insert(artifact.identity_key.as_str(), artifact).is_some() {
            return Err(AnalysisError::SnapshotMismatch {
                kind,
                detail: format!(
                    "duplicate identity key '{}' in snapshot '{}'",
                    artifact.identity_key, snapshot.label
                ),
            });
        }
    }

    Ok(index)
}
