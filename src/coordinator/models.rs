use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::capture::CaptureOptions;
use crate::constants::{DEFAULT_RUN_COUNT, DEFAULT_RUN_TIMEOUT_SECS};
use crate::differ::{DiffOptions, DiffRecord};
use crate::noise::{NoiseFilterOptions, Verdict};
use crate::report::Report;

/// Where a session currently is.
///
/// `Idle → Baselining → Running(1) → Diffing(1) → … → Aggregating → Done`,
/// or `Failed` from any state on a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Baselining,
    Running(u32),
    Diffing(u32),
    Aggregating,
    Done,
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Baselining => write!(f, "baselining"),
            SessionState::Running(i) => write!(f, "running({})", i),
            SessionState::Diffing(i) => write!(f, "diffing({})", i),
            SessionState::Aggregating => write!(f, "aggregating"),
            SessionState::Done => write!(f, "done"),
            SessionState::Failed => write!(f, "failed"),
        }
    }
}

/// Everything a session needs to know before it starts
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Package name of the application under test
    pub target: String,
    pub run_count: usize,
    /// Budget for trigger plus post-run capture of one run
    pub run_timeout: Duration,
    pub capture: CaptureOptions,
    pub diff: DiffOptions,
    pub noise: NoiseFilterOptions,
    pub include_noise_listing: bool,
    /// Persist snapshots, per-run diffs and the report here
    pub session_dir: Option<PathBuf>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            target: String::new(),
            run_count: DEFAULT_RUN_COUNT,
            run_timeout: Duration::from_secs(DEFAULT_RUN_TIMEOUT_SECS),
            capture: CaptureOptions::default(),
            diff: DiffOptions::default(),
            noise: NoiseFilterOptions::default(),
            include_noise_listing: false,
            session_dir: None,
        }
    }
}

/// Result of a completed session
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub report: Report,
    pub verdicts: Vec<Verdict>,
    /// Raw diff records of every successful run
    pub run_diffs: BTreeMap<u32, Vec<DiffRecord>>,
    /// States the session went through, in order
    pub history: Vec<SessionState>,
}
