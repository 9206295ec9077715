use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::AnalysisConfig;

/// Command-line arguments for the sandroid analyzer.
///
/// Global options come first; every action is a subcommand.
#[derive(Parser, Debug)]
#[clap(
    name = "sandroid",
    about = "Differential forensic analysis of Android applications across repeated runs"
)]
pub struct Args {
    /// Verbose logging
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Path to configuration YAML file
    #[clap(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Subcommands
    #[clap(subcommand)]
    pub command: Commands,
}

/// Available subcommands for the analyzer.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run an analysis session using external capture and trigger commands
    Analyze(AnalyzeOpts),

    /// Run an analysis session over snapshots recorded in a directory
    Replay {
        /// Directory with baseline.json, run_1.json, ...
        dir: PathBuf,

        #[clap(flatten)]
        overrides: SessionOverrides,
    },

    /// Diff two snapshot files and print the records
    Diff {
        /// Baseline snapshot (JSON)
        baseline: PathBuf,

        /// Observed snapshot (JSON)
        observed: PathBuf,

        /// Compare files by content hash
        #[clap(long)]
        hash: bool,

        /// Restrict the diff to one artifact kind (e.g. file, database_row)
        #[clap(short, long)]
        kind: Option<String>,
    },

    /// Classify a persisted session again with other noise filter settings
    Reclassify {
        /// Session directory containing session.json and runs/
        session_dir: PathBuf,

        /// Keep artifacts seen in a single run as Suspected
        #[clap(long)]
        avoid_strong_noise_filter: bool,

        /// List the identity keys of dropped noise in the report
        #[clap(long)]
        list_noise: bool,
    },

    /// Create a default configuration file
    InitConfig {
        /// Path to output configuration file
        #[clap(default_value = "sandroid.yaml")]
        path: PathBuf,
    },
}

/// Options for the analyze subcommand.
#[derive(ClapArgs, Debug)]
pub struct AnalyzeOpts {
    /// Shell command printing a snapshot as JSON (overrides the config)
    #[clap(long)]
    pub capture_command: Option<String>,

    /// Shell command performing one run of the application (overrides the config)
    #[clap(long)]
    pub trigger_command: Option<String>,

    #[clap(flatten)]
    pub overrides: SessionOverrides,
}

/// Per-invocation overrides of the session configuration
#[derive(ClapArgs, Debug, Default, Clone, PartialEq)]
pub struct SessionOverrides {
    /// Number of runs
    #[clap(short = 'n', long)]
    pub runs: Option<usize>,

    /// Package name of the application under test
    #[clap(short, long)]
    pub target: Option<String>,

    /// Keep artifacts seen in a single run as Suspected instead of dropping them
    #[clap(long)]
    pub avoid_strong_noise_filter: bool,

    /// Compare files by content hash
    #[clap(long)]
    pub hash: bool,

    /// Output directory for session results
    #[clap(short, long)]
    pub output: Option<String>,
}

impl SessionOverrides {
    /// Apply the overrides on top of a loaded configuration
    pub fn apply(&self, config: &mut AnalysisConfig) {
        if let Some(runs) = self.runs {
            config.run_count = runs;
        }
        if let Some(target) = &self.target {
            config.target_package = target.clone();
        }
        if self.avoid_strong_noise_filter {
            config.noise_filter.avoid_strong_noise_filter = true;
        }
        if self.hash {
            config.capture.hash_files = true;
        }
        if let Some(output) = &self.output {
            config.output_dir = output.clone();
        }
    }
}
