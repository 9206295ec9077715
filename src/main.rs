use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use log::{info, warn, LevelFilter};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

use rust_sandroid::capture::{
    CommandCapture, CommandTrigger, ReplaySource, ReplayTrigger, RunTrigger, SnapshotSource,
};
use rust_sandroid::cli::{Args, Commands, SessionOverrides};
use rust_sandroid::config::{load_or_create_config, AnalysisConfig};
use rust_sandroid::constants::REPORT_FILE_NAME;
use rust_sandroid::coordinator::{reclassify_session, RunCoordinator};
use rust_sandroid::differ::{DiffOptions, DiffRecord, Differ};
use rust_sandroid::models::{ArtifactKind, Snapshot};
use rust_sandroid::noise::NoiseFilterOptions;
use rust_sandroid::report::{log_report_summary, write_report};
use rust_sandroid::utils::json::load_from_json;

fn main() -> Result<()> {
    // Parse arguments
    let args = Args::parse();

    // Initialize logging
    initialize_logging(args.verbose)?;

    match &args.command {
        Commands::Analyze(opts) => {
            let mut config = load_and_process_config(&args, &opts.overrides)?;
            if let Some(command) = &opts.capture_command {
                config.capture_command = Some(command.clone());
            }
            if let Some(command) = &opts.trigger_command {
                config.trigger_command = Some(command.clone());
            }

            let capture_command = config
                .capture_command
                .clone()
                .ok_or_else(|| anyhow!("No capture command configured (capture_command or --capture-command)"))?;
            let trigger_command = config
                .trigger_command
                .clone()
                .ok_or_else(|| anyhow!("No trigger command configured (trigger_command or --trigger-command)"))?;

            let source = CommandCapture::new(capture_command, config.target_package.clone());
            let trigger = CommandTrigger::new(trigger_command, config.target_package.clone());
            run_session(&config, Box::new(source), Box::new(trigger))
        }
        Commands::Replay { dir, overrides } => {
            let mut config = load_and_process_config(&args, overrides)?;
            let source = ReplaySource::new(dir);
            if overrides.runs.is_none() {
                let recorded = source.recorded_runs();
                if recorded > 0 {
                    info!("Replaying runs 1..={} recorded in {}", recorded, dir.display());
                    config.run_count = recorded;
                }
            }
            run_session(&config, Box::new(source), Box::new(ReplayTrigger::new(dir)))
        }
        Commands::Diff { baseline, observed, hash, kind } => {
            let config = load_and_process_config(&args, &SessionOverrides::default())?;
            diff_snapshot_files(&config, baseline, observed, *hash, kind.as_deref())
        }
        Commands::Reclassify { session_dir, avoid_strong_noise_filter, list_noise } => {
            let config = load_and_process_config(&args, &SessionOverrides::default())?;
            let mut options: NoiseFilterOptions = config.noise_options();
            options.avoid_strong_noise_filter |= *avoid_strong_noise_filter;

            let report = reclassify_session(session_dir, options, *list_noise || config.include_noise_listing)?;
            log_report_summary(&report);
            Ok(())
        }
        Commands::InitConfig { path } => {
            info!("Creating default configuration file at {}", path.display());
            AnalysisConfig::default().save_to_yaml_file(path)?;
            info!("Configuration created successfully");
            Ok(())
        }
    }
}

/// Initialize logging with the specified verbosity level
fn initialize_logging(verbose: bool) -> Result<()> {
    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    TermLogger::init(
        log_level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .context("Failed to initialize logger")?;
    Ok(())
}

/// Load configuration, then apply environment and command-line overrides
fn load_and_process_config(args: &Args, overrides: &SessionOverrides) -> Result<AnalysisConfig> {
    let mut config = load_or_create_config(args.config.as_deref())?;
    config.apply_env_overrides()?;
    overrides.apply(&mut config);
    Ok(config)
}

/// Create `<output_dir>/<target>-<timestamp>`
fn setup_session_directory(config: &AnalysisConfig) -> Result<PathBuf> {
    let timestamp = chrono::Utc::now().format("%Y%m%d-%H%M%S").to_string();
    let name = if config.target_package.is_empty() {
        format!("session-{}", timestamp)
    } else {
        format!("{}-{}", config.target_package, timestamp)
    };

    let session_dir = config.output_path().join(name);
    fs::create_dir_all(&session_dir).context("Failed to create output directory")?;

    info!("Session directory created at {}", session_dir.display());
    Ok(session_dir)
}

/// Run one session to completion, stopping early on Ctrl-C
fn run_session(
    config: &AnalysisConfig,
    source: Box<dyn SnapshotSource>,
    trigger: Box<dyn RunTrigger>,
) -> Result<()> {
    config.validate()?;
    if config.target_package.is_empty() {
        warn!("No target package configured");
    }

    let session_dir = setup_session_directory(config)?;
    let settings = config.session_settings(Some(session_dir.clone()));
    let persisted = settings.session_dir.is_some();
    let mut coordinator = RunCoordinator::new(source, trigger, settings)?;

    let runtime = Runtime::new().context("Failed to create Tokio runtime")?;
    let cancel = CancellationToken::new();

    let outcome = runtime.block_on(async {
        let interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, stopping after the current run");
                interrupt.cancel();
            }
        });
        coordinator.run(&cancel).await
    })?;

    if !persisted {
        write_report(&outcome.report, &session_dir.join(REPORT_FILE_NAME))?;
    }

    log_report_summary(&outcome.report);
    info!("Results written to {}", session_dir.display());
    Ok(())
}

/// Diff two snapshot files and print the records as JSON
fn diff_snapshot_files(
    config: &AnalysisConfig,
    baseline: &Path,
    observed: &Path,
    hash: bool,
    kind: Option<&str>,
) -> Result<()> {
    let baseline: Snapshot = load_from_json(baseline)?;
    let observed: Snapshot = load_from_json(observed)?;

    let kinds: Vec<ArtifactKind> = match kind {
        Some(name) => vec![ArtifactKind::from_name(name).ok_or_else(|| anyhow!("Unknown artifact kind: {}", name))?],
        None => baseline.kinds().union(&observed.kinds()).copied().collect(),
    };

    let options = DiffOptions::new(
        hash || config.capture.hash_files,
        config.noise_filter.time_fields.iter().cloned(),
    );
    let differ = Differ::new(options);

    let mut records: Vec<DiffRecord> = Vec::new();
    for kind_diff in differ.diff_snapshots(&baseline, &observed, &kinds, 1) {
        match kind_diff.result {
            Ok(diffs) => records.extend(diffs),
            Err(e) => warn!("Skipping {}: {}", kind_diff.kind, e),
        }
    }

    info!("{} change(s) between '{}' and '{}'", records.len(), baseline.label, observed.label);
    println!(
        "{}",
        serde_json::to_string_pretty(&records).context("Failed to serialize diff records")?
    );
    Ok(())
}
