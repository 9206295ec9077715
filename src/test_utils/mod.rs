//! Test utilities for rust-sandroid
//!
//! This module provides artifact, snapshot and record generators for use
//! across all test modules.

#![cfg(test)]

/// Test data generators for common types
pub mod generators {
    use std::collections::{BTreeMap, BTreeSet};

    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::{json, Value};
    use uuid::Uuid;

    use crate::differ::{ChangeType, DiffRecord};
    use crate::models::{Artifact, ArtifactKind, FilePayload, Payload, RowPayload, Snapshot, SocketPayload};
    use crate::noise::{Confidence, Verdict};
    use crate::report::SessionInfo;

    pub const TEST_TARGET: &str = "de.fkie.ground_truth";
    pub const TEST_DATABASE: &str = "GroundTruth.db";
    pub const TEST_TABLE: &str = "ground_truth";

    /// Fixed capture time (2023-11-14T22:13:20Z)
    pub fn test_time() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    /// Snapshot captured at [`test_time`]
    pub fn test_snapshot(label: &str, artifacts: Vec<Artifact>) -> Snapshot {
        test_snapshot_at(label, test_time(), artifacts)
    }

    pub fn test_snapshot_at(label: &str, captured_at: DateTime<Utc>, artifacts: Vec<Artifact>) -> Snapshot {
        Snapshot::new(label, captured_at, artifacts)
    }

    pub fn test_file_payload(content: &[u8]) -> FilePayload {
        FilePayload {
            size: content.len() as u64,
            content: Some(content.to_vec()),
            ..Default::default()
        }
    }

    /// File artifact holding `content`
    pub fn test_file(path: &str, content: &[u8]) -> Artifact {
        Artifact::file(path, test_file_payload(content), test_time())
    }

    /// Row with an `ID` and a `VALUE` column
    pub fn test_row(database: &str, table: &str, primary_key: &str, value: &str) -> Artifact {
        let mut columns = BTreeMap::new();
        columns.insert("ID".to_string(), json!(primary_key));
        columns.insert("VALUE".to_string(), json!(value));
        Artifact::database_row(
            primary_key,
            RowPayload {
                database: database.to_string(),
                table: table.to_string(),
                columns,
            },
            test_time(),
        )
    }

    pub fn test_socket(local_address: &str, remote_address: &str) -> Artifact {
        Artifact::socket(
            SocketPayload {
                protocol: "tcp".to_string(),
                local_address: local_address.to_string(),
                remote_address: Some(remote_address.to_string()),
                state: Some("ESTABLISHED".to_string()),
                uid: Some(10_123),
            },
            test_time(),
        )
    }

    /// Added record of a file in run `run_index`
    pub fn test_added_file(path: &str, run_index: u32) -> DiffRecord {
        DiffRecord {
            kind: ArtifactKind::File,
            identity_key: path.to_string(),
            change_type: ChangeType::Added,
            before: None,
            after: Some(Payload::File(test_file_payload(path.as_bytes()))),
            run_index,
            observed_at: test_time(),
            changed_fields: Vec::new(),
            timestamp_only: false,
        }
    }

    fn ground_truth_row(primary_key: &str, value: Value) -> Payload {
        let mut columns = BTreeMap::new();
        columns.insert("ID".to_string(), json!(primary_key));
        columns.insert("VALUE".to_string(), value);
        Payload::DatabaseRow(RowPayload {
            database: TEST_DATABASE.to_string(),
            table: TEST_TABLE.to_string(),
            columns,
        })
    }

    /// Modified record of a ground truth row whose `VALUE` column changed
    pub fn test_modified_row(
        primary_key: &str,
        before: Value,
        after: Value,
        run_index: u32,
        observed_at: DateTime<Utc>,
    ) -> DiffRecord {
        DiffRecord {
            kind: ArtifactKind::DatabaseRow,
            identity_key: format!("{}:{}:{}", TEST_DATABASE, TEST_TABLE, primary_key),
            change_type: ChangeType::Modified,
            before: Some(ground_truth_row(primary_key, before)),
            after: Some(ground_truth_row(primary_key, after)),
            run_index,
            observed_at,
            changed_fields: vec!["columns.VALUE".to_string()],
            timestamp_only: false,
        }
    }

    /// Added verdict supported by `runs`
    pub fn test_verdict(kind: ArtifactKind, identity_key: &str, confidence: Confidence, runs: &[u32]) -> Verdict {
        Verdict {
            kind,
            identity_key: identity_key.to_string(),
            change_type: ChangeType::Added,
            confidence,
            supporting_runs: runs.iter().copied().collect::<BTreeSet<u32>>(),
            before: None,
            after: None,
            clock_driven: false,
            first_observed_at: test_time(),
            last_observed_at: test_time(),
        }
    }

    /// Session in which every one of `run_count` runs succeeded
    pub fn test_session_info(run_count: usize) -> SessionInfo {
        SessionInfo {
            session_id: Uuid::nil(),
            target: TEST_TARGET.to_string(),
            run_count,
            successful_runs: (1..=run_count as u32).collect(),
            failed_runs: Vec::new(),
            kind_errors: Vec::new(),
            cancelled: false,
            started_at: test_time(),
            finished_at: test_time(),
        }
    }
}
