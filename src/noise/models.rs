use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_CLOCK_TOLERANCE_SECS;
use crate::differ::ChangeType;
use crate::models::{ArtifactKind, Payload};

/// Confidence that an artifact change was caused by the application.
///
/// Ordered from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Confidence {
    Noise,
    Suspected,
    Confirmed,
}

impl Confidence {
    /// One level weaker; `Noise` stays `Noise`
    pub fn downgrade(self) -> Self {
        match self {
            Confidence::Confirmed => Confidence::Suspected,
            Confidence::Suspected | Confidence::Noise => Confidence::Noise,
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::Noise => write!(f, "Noise"),
            Confidence::Suspected => write!(f, "Suspected"),
            Confidence::Confirmed => write!(f, "Confirmed"),
        }
    }
}

/// Final classification of one (artifact, change type) pair after voting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub kind: ArtifactKind,
    pub identity_key: String,
    pub change_type: ChangeType,
    pub confidence: Confidence,
    pub supporting_runs: BTreeSet<u32>,
    /// Payloads from the highest-numbered supporting run
    pub before: Option<Payload>,
    pub after: Option<Payload>,
    /// Every supporting record was a clock-driven write
    #[serde(default)]
    pub clock_driven: bool,
    /// Earliest capture time among the supporting records
    pub first_observed_at: DateTime<Utc>,
    pub last_observed_at: DateTime<Utc>,
}

/// Noise filter settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseFilterOptions {
    /// Keep single-run artifacts as Suspected instead of Noise
    pub avoid_strong_noise_filter: bool,
    /// Distance from the capture time still considered "the capture time"
    pub clock_tolerance_secs: u64,
}

impl Default for NoiseFilterOptions {
    fn default() -> Self {
        Self {
            avoid_strong_noise_filter: false,
            clock_tolerance_secs: DEFAULT_CLOCK_TOLERANCE_SECS,
        }
    }
}
