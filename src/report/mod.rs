//! Result aggregation and report serialization.
//!
//! The aggregator turns the noise filter's verdicts into the session
//! [`Report`]: verdicts are deduplicated, ordered by kind, identity key and
//! change type, and noise is dropped from the body while being counted in
//! the metadata. Aggregation is a pure function of its inputs, so the same
//! verdicts always serialize to the same bytes.

pub mod models;

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use log::{info, warn};

use crate::differ::ChangeType;
use crate::error::Result;
use crate::models::ArtifactKind;
use crate::noise::{Confidence, Verdict};
use crate::utils::json::save_to_json;

pub use models::{FailedRun, KindError, Report, ReportEntry, SessionInfo, SessionMetadata};

#[derive(Debug, Clone, Default)]
pub struct ResultAggregator {
    include_noise_listing: bool,
}

impl ResultAggregator {
    pub fn new(include_noise_listing: bool) -> Self {
        Self { include_noise_listing }
    }

    /// Build the report for `session` from `verdicts`.
    ///
    /// Independent of the order of `verdicts`; duplicates of the same
    /// (kind, identity key, change type) are merged.
    pub fn aggregate(&self, verdicts: &[Verdict], session: &SessionInfo) -> Report {
        let mut merged: BTreeMap<(ArtifactKind, &str, ChangeType), Verdict> = BTreeMap::new();

        for verdict in verdicts {
            let key = (verdict.kind, verdict.identity_key.as_str(), verdict.change_type);
            match merged.get_mut(&key) {
                Some(existing) => merge_into(existing, verdict),
                None => {
                    merged.insert(key, verdict.clone());
                }
            }
        }

        let mut artifacts: BTreeMap<ArtifactKind, Vec<ReportEntry>> = BTreeMap::new();
        let mut noise: BTreeMap<ArtifactKind, Vec<String>> = BTreeMap::new();
        let mut dropped_noise_count = 0;

        for ((kind, identity_key, _), verdict) in merged {
            if verdict.confidence == Confidence::Noise {
                dropped_noise_count += 1;
                let keys = noise.entry(kind).or_default();
                if keys.last().map(String::as_str) != Some(identity_key) {
                    keys.push(identity_key.to_string());
                }
                continue;
            }

            artifacts.entry(kind).or_default().push(ReportEntry {
                identity_key: verdict.identity_key,
                change_type: verdict.change_type,
                confidence: verdict.confidence,
                before: verdict.before,
                after: verdict.after,
                supporting_runs: verdict.supporting_runs.into_iter().collect(),
                clock_driven: verdict.clock_driven,
                first_observed_at: verdict.first_observed_at,
                last_observed_at: verdict.last_observed_at,
            });
        }

        Report {
            metadata: SessionMetadata {
                session: session.clone(),
                dropped_noise_count,
                analyzer_version: env!("CARGO_PKG_VERSION").to_string(),
            },
            artifacts,
            noise: self.include_noise_listing.then_some(noise),
        }
    }
}

/// Merge a duplicate verdict into `existing`
fn merge_into(existing: &mut Verdict, other: &Verdict) {
    let supporting_runs: BTreeSet<u32> = existing
        .supporting_runs
        .union(&other.supporting_runs)
        .copied()
        .collect();
    let clock_driven = existing.clock_driven && other.clock_driven;

    if rank(other) > rank(existing) {
        existing.confidence = other.confidence;
        existing.before = other.before.clone();
        existing.after = other.after.clone();
    }

    existing.supporting_runs = supporting_runs;
    existing.clock_driven = clock_driven;
    existing.first_observed_at = existing.first_observed_at.min(other.first_observed_at);
    existing.last_observed_at = existing.last_observed_at.max(other.last_observed_at);
}

/// Total preference order between duplicate verdicts
fn rank(verdict: &Verdict) -> (Confidence, Option<u32>, String, String) {
    (
        verdict.confidence,
        verdict.supporting_runs.last().copied(),
        serde_json::to_string(&verdict.after).unwrap_or_default(),
        serde_json::to_string(&verdict.before).unwrap_or_default(),
    )
}

/// Serialize a report as pretty JSON
pub fn report_to_json(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report)
        .map_err(|e| crate::error::AnalysisError::persistence("report", e))
}

/// Write a report as pretty JSON to `path`
pub fn write_report(report: &Report, path: &Path) -> Result<()> {
    save_to_json(report, path)?;
    info!("Report written to {}", path.display());
    Ok(())
}

/// Log a short human-readable summary of the report
pub fn log_report_summary(report: &Report) {
    let session = &report.metadata.session;

    info!("Analysis of {} ({} run(s) configured)", session.target, session.run_count);
    info!(
        "  Successful runs: {:?}, failed runs: {:?}",
        session.successful_runs,
        session.failed_run_indices()
    );
    info!(
        "  Confirmed: {}, suspected: {}, dropped noise: {}",
        report.count_with(Confidence::Confirmed),
        report.count_with(Confidence::Suspected),
        report.metadata.dropped_noise_count
    );

    for (kind, entries) in &report.artifacts {
        info!("  {}: {} change(s)", kind, entries.len());
    }

    for failure in &session.failed_runs {
        warn!("  Run {} failed: {}", failure.run_index, failure.reason);
    }
    for error in &session.kind_errors {
        warn!("  Run {} {} diff skipped: {}", error.run_index, error.kind, error.detail);
    }
    if session.cancelled {
        warn!("  Session was cancelled; the report covers completed runs only");
    }
}
