//! Seams to the device: snapshot capture and run triggering.
//!
//! The analysis pipeline never talks to an emulator directly. It asks a
//! [`SnapshotSource`] for "device state now" and a [`RunTrigger`] to run the
//! application once. Two generic adapter families are provided:
//!
//! - [`command`]: external programs (a capture script printing a snapshot as
//!   JSON, a trigger script reporting success by exit status)
//! - [`replay`]: snapshots recorded earlier and stored in a directory

pub mod command;
pub mod replay;

use std::collections::BTreeSet;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::models::{ArtifactKind, Payload, Snapshot};

pub use command::{CommandCapture, CommandTrigger};
pub use replay::{ReplaySource, ReplayTrigger};

/// What a capture should include
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureOptions {
    /// Artifact kinds to capture
    pub kinds: BTreeSet<ArtifactKind>,
    /// Keep files flagged as deleted
    pub show_deleted: bool,
    /// Ask the capture for content hashes of files
    pub hash_files: bool,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            kinds: ArtifactKind::ALL.iter().copied().collect(),
            show_deleted: false,
            hash_files: false,
        }
    }
}

impl CaptureOptions {
    pub fn includes(&self, kind: ArtifactKind) -> bool {
        self.kinds.contains(&kind)
    }

    /// Comma separated kind names, as passed to capture commands
    pub fn kinds_arg(&self) -> String {
        self.kinds
            .iter()
            .map(ArtifactKind::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Restrict `snapshot` to what these options ask for.
    ///
    /// Sources are free to return more than requested; this keeps baseline and
    /// post-run snapshots comparable regardless.
    pub fn apply(&self, snapshot: &Snapshot) -> Snapshot {
        snapshot.filtered(|artifact| {
            if !self.includes(artifact.kind) {
                return false;
            }
            match &artifact.payload {
                Payload::File(file) => self.show_deleted || !file.deleted,
                _ => true,
            }
        })
    }
}

/// Produces a snapshot of device state at the moment of the call
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn capture(&self, label: &str, options: &CaptureOptions) -> Result<Snapshot>;
}

/// Runs the application under test once
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RunTrigger: Send + Sync {
    async fn execute(&self, run_index: u32) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::generators::*;

    #[test]
    fn test_apply_restricts_kinds() {
        let snapshot = test_snapshot(
            "baseline",
            vec![
                test_file("/data/a", b"a"),
                test_row("GroundTruth.db", "ground_truth", "0", "x"),
                test_socket("10.0.2.15:40000", "141.12.1.1:443"),
            ],
        );

        let options = CaptureOptions {
            kinds: BTreeSet::from([ArtifactKind::File, ArtifactKind::Socket]),
            ..Default::default()
        };
        let applied = options.apply(&snapshot);
        assert_eq!(applied.len(), 2);
        assert!(applied.partition(ArtifactKind::DatabaseRow).next().is_none());
        assert_eq!(applied.label, "baseline");
    }

    #[test]
    fn test_deleted_files_hidden_by_default() {
        let mut deleted = test_file("/data/gone", b"x");
        if let Payload::File(file) = &mut deleted.payload {
            file.deleted = true;
        }
        let snapshot = test_snapshot("run_1", vec![deleted, test_file("/data/kept", b"y")]);

        let hidden = CaptureOptions::default().apply(&snapshot);
        assert_eq!(hidden.len(), 1);

        let shown = CaptureOptions {
            show_deleted: true,
            ..Default::default()
        }
        .apply(&snapshot);
        assert_eq!(shown.len(), 2);
    }

    #[test]
    fn test_kinds_arg() {
        let options = CaptureOptions {
            kinds: BTreeSet::from([ArtifactKind::Socket, ArtifactKind::File]),
            ..Default::default()
        };
        assert_eq!(options.kinds_arg(), "File,Socket");
    }
}
