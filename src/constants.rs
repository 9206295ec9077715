//! Global constants for the sandroid analyzer.
//!
//! Defaults for the configuration live here so the config layer, the CLI
//! and the tests agree on them.

// Session defaults
/// Number of instrumented runs per session
pub const DEFAULT_RUN_COUNT: usize = 2;

/// Per-run timeout covering trigger and post-run capture (5 minutes)
pub const DEFAULT_RUN_TIMEOUT_SECS: u64 = 300;

/// Tolerance when matching a value against the capture time
pub const DEFAULT_CLOCK_TOLERANCE_SECS: u64 = 120;

/// Column and attribute names treated as timestamps (case-insensitive)
pub const DEFAULT_TIME_FIELDS: &[&str] = &[
    "timestamp",
    "time",
    "date",
    "created_at",
    "updated_at",
    "last_modified",
    "modified_at",
    "last_access",
    "last_used",
    "expires",
];

// Snapshot labels
pub const BASELINE_LABEL: &str = "baseline";
pub const RUN_LABEL_PREFIX: &str = "run_";

/// Label of the post-run snapshot for `run_index`
pub fn run_label(run_index: u32) -> String {
    format!("{}{}", RUN_LABEL_PREFIX, run_index)
}

// Session directory layout
pub const RUNS_DIR_NAME: &str = "runs";
pub const SNAPSHOTS_DIR_NAME: &str = "snapshots";
pub const SESSION_FILE_NAME: &str = "session.json";
pub const REPORT_FILE_NAME: &str = "report.json";

// Default file names
pub const DEFAULT_CONFIG_NAME: &str = "sandroid.yaml";
pub const DEFAULT_OUTPUT_DIR: &str = "./sandroid_results";

// Environment
pub const ENV_CAPTURE_LABEL: &str = "SANDROID_CAPTURE_LABEL";
pub const ENV_CAPTURE_KINDS: &str = "SANDROID_CAPTURE_KINDS";
pub const ENV_CAPTURE_HASH: &str = "SANDROID_CAPTURE_HASH";
pub const ENV_SHOW_DELETED: &str = "SANDROID_SHOW_DELETED";
pub const ENV_RUN_INDEX: &str = "SANDROID_RUN_INDEX";
pub const ENV_TARGET_PACKAGE: &str = "SANDROID_TARGET_PACKAGE";

// Config overrides
pub const ENV_RUN_COUNT: &str = "SANDROID_RUN_COUNT";
pub const ENV_RUN_TIMEOUT_SECS: &str = "SANDROID_RUN_TIMEOUT_SECS";
pub const ENV_OUTPUT_DIR: &str = "SANDROID_OUTPUT_DIR";
