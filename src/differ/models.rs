use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_TIME_FIELDS;
use crate::models::{ArtifactKind, Payload};

/// How an artifact changed between two snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChangeType {
    Added,
    Removed,
    Modified,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeType::Added => write!(f, "Added"),
            ChangeType::Removed => write!(f, "Removed"),
            ChangeType::Modified => write!(f, "Modified"),
        }
    }
}

/// One detected change of one artifact in one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffRecord {
    pub kind: ArtifactKind,
    pub identity_key: String,
    pub change_type: ChangeType,
    pub before: Option<Payload>,
    pub after: Option<Payload>,
    pub run_index: u32,
    /// Capture time of the observed (post-run) snapshot
    pub observed_at: DateTime<Utc>,
    /// Differing fields of a Modified record, content fields first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changed_fields: Vec<String>,
    /// Modified record whose only differences are time fields
    #[serde(default)]
    pub timestamp_only: bool,
}

/// Options controlling payload comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffOptions {
    /// Compare file payloads by content hash instead of raw bytes
    pub hash_files: bool,
    /// Column and attribute names treated as time fields (lowercase)
    pub time_fields: BTreeSet<String>,
}

impl DiffOptions {
    pub fn new(hash_files: bool, time_fields: impl IntoIterator<Item = String>) -> Self {
        Self {
            hash_files,
            time_fields: time_fields.into_iter().map(|f| f.to_lowercase()).collect(),
        }
    }
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self::new(false, DEFAULT_TIME_FIELDS.iter().map(|f| f.to_string()))
    }
}
