//! # rust-sandroid
//!
//! Differential forensic analysis of Android applications.
//!
//! ## Overview
//!
//! The application under test is run several times inside a controlled
//! emulator. Device state is captured once before the first run (the
//! baseline) and once after every run. Each post-run snapshot is diffed
//! against the baseline, and the per-run diffs are cross-correlated: changes
//! that every run reproduces are attributed to the application, changes seen
//! once are treated as background noise.
//!
//! ```text
//! RunCoordinator ─▶ SnapshotSource ─▶ Differ (per run) ─▶ NoiseFilter ─▶ ResultAggregator
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use rust_sandroid::capture::{ReplaySource, ReplayTrigger};
//! use rust_sandroid::coordinator::{RunCoordinator, SessionSettings};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let settings = SessionSettings {
//!     target: "de.fkie.ground_truth".to_string(),
//!     run_count: 3,
//!     ..Default::default()
//! };
//!
//! let mut coordinator = RunCoordinator::new(
//!     Box::new(ReplaySource::new("recorded")),
//!     Box::new(ReplayTrigger::new("recorded")),
//!     settings,
//! )?;
//!
//! let outcome = coordinator.run(&CancellationToken::new()).await?;
//! println!("{} reproducible change(s)", outcome.report.entry_count());
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`models`]: artifacts, payloads and snapshots
//! - [`differ`]: per-kind snapshot diffing
//! - [`noise`]: cross-run voting and clock-driven write detection
//! - [`report`]: aggregation and serialization of the final report
//! - [`coordinator`]: session state machine and persistence
//! - [`capture`]: snapshot source and run trigger seams with adapters
//! - [`config`]: YAML configuration and environment overrides
//! - [`cli`]: command-line interface definitions
//! - [`error`]: the pipeline error taxonomy
//! - [`utils`]: hashing and JSON helpers
//! - [`constants`]: application-wide defaults

/// Command-line interface definitions and argument parsing
pub mod cli;

/// Core data models: artifacts, payloads and snapshots
pub mod models;

/// Pipeline error taxonomy
pub mod error;

/// Snapshot differ
pub mod differ;

/// Cross-run noise filter
pub mod noise;

/// Result aggregation and report serialization
pub mod report;

/// Session orchestration and persistence
pub mod coordinator;

/// Snapshot capture and run trigger seams
pub mod capture;

/// Configuration management
pub mod config;

/// Utility functions for hashing and JSON persistence
pub mod utils;

/// Application constants and default values
pub mod constants;

/// Test utilities and helpers
#[cfg(test)]
pub mod test_utils;
