use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::capture::CaptureOptions;
use crate::config::env_vars::{apply_overrides, expand_env_vars};
use crate::constants::{
    DEFAULT_CLOCK_TOLERANCE_SECS, DEFAULT_CONFIG_NAME, DEFAULT_OUTPUT_DIR, DEFAULT_RUN_COUNT,
    DEFAULT_RUN_TIMEOUT_SECS, DEFAULT_TIME_FIELDS,
};
use crate::coordinator::SessionSettings;
use crate::differ::DiffOptions;
use crate::error::AnalysisError;
use crate::models::ArtifactKind;
use crate::noise::NoiseFilterOptions;

fn default_run_count() -> usize {
    DEFAULT_RUN_COUNT
}

fn default_run_timeout_secs() -> u64 {
    DEFAULT_RUN_TIMEOUT_SECS
}

fn default_clock_tolerance_secs() -> u64 {
    DEFAULT_CLOCK_TOLERANCE_SECS
}

fn default_time_fields() -> Vec<String> {
    DEFAULT_TIME_FIELDS.iter().map(|f| f.to_string()).collect()
}

fn default_output_dir() -> String {
    DEFAULT_OUTPUT_DIR.to_string()
}

fn default_true() -> bool {
    true
}

/// Which optional artifact sources to capture.
///
/// Files, database rows and XML entries are always captured.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CaptureConfig {
    #[serde(default = "default_true")]
    pub include_processes: bool,
    #[serde(default = "default_true")]
    pub include_sockets: bool,
    #[serde(default = "default_true")]
    pub include_network: bool,
    #[serde(default)]
    pub show_deleted: bool,
    #[serde(default = "default_true")]
    pub include_apks: bool,
    #[serde(default)]
    pub hash_files: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            include_processes: true,
            include_sockets: true,
            include_network: true,
            show_deleted: false,
            include_apks: true,
            hash_files: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct NoiseConfig {
    #[serde(default)]
    pub avoid_strong_noise_filter: bool,
    #[serde(default = "default_clock_tolerance_secs")]
    pub clock_tolerance_secs: u64,
    /// Database columns and XML attributes holding timestamps
    #[serde(default = "default_time_fields")]
    pub time_fields: Vec<String>,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            avoid_strong_noise_filter: false,
            clock_tolerance_secs: DEFAULT_CLOCK_TOLERANCE_SECS,
            time_fields: default_time_fields(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AnalysisConfig {
    pub version: String,
    #[serde(default)]
    pub description: String,
    /// Package name of the application under test
    #[serde(default)]
    pub target_package: String,
    #[serde(default = "default_run_count")]
    pub run_count: usize,
    #[serde(default = "default_run_timeout_secs")]
    pub run_timeout_secs: u64,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub noise_filter: NoiseConfig,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// Write snapshots and raw per-run diffs next to the report
    #[serde(default = "default_true")]
    pub persist_intermediate: bool,
    #[serde(default)]
    pub include_noise_listing: bool,
    /// Shell command printing a snapshot as JSON
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture_command: Option<String>,
    /// Shell command performing one run of the application
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_command: Option<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            description: "Differential analysis session".to_string(),
            target_package: String::new(),
            run_count: DEFAULT_RUN_COUNT,
            run_timeout_secs: DEFAULT_RUN_TIMEOUT_SECS,
            capture: CaptureConfig::default(),
            noise_filter: NoiseConfig::default(),
            output_dir: DEFAULT_OUTPUT_DIR.to_string(),
            persist_intermediate: true,
            include_noise_listing: false,
            capture_command: None,
            trigger_command: None,
        }
    }
}

impl AnalysisConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        let config: AnalysisConfig =
            serde_yaml::from_str(&content).context("Failed to parse YAML config")?;

        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save_to_yaml_file(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml).context(format!("Failed to write config to {}", path.display()))?;

        info!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// Apply `SANDROID_*` overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        apply_overrides(self, |name| std::env::var(name).ok())
    }

    /// Reject settings a session cannot start with
    pub fn validate(&self) -> std::result::Result<(), AnalysisError> {
        if self.run_count < 1 {
            return Err(AnalysisError::InsufficientRuns(self.run_count));
        }
        Ok(())
    }

    /// Output directory with environment variables expanded
    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(expand_env_vars(&self.output_dir))
    }

    pub fn capture_options(&self) -> CaptureOptions {
        let mut kinds: BTreeSet<ArtifactKind> = [
            ArtifactKind::File,
            ArtifactKind::DatabaseRow,
            ArtifactKind::XmlEntry,
        ]
        .into_iter()
        .collect();

        let optional = [
            (self.capture.include_processes, ArtifactKind::Process),
            (self.capture.include_sockets, ArtifactKind::Socket),
            (self.capture.include_network, ArtifactKind::NetworkFlow),
            (self.capture.include_apks, ArtifactKind::ApkEntry),
        ];
        kinds.extend(optional.iter().filter(|(on, _)| *on).map(|(_, kind)| *kind));

        CaptureOptions {
            kinds,
            show_deleted: self.capture.show_deleted,
            hash_files: self.capture.hash_files,
        }
    }

    pub fn diff_options(&self) -> DiffOptions {
        DiffOptions::new(self.capture.hash_files, self.noise_filter.time_fields.iter().cloned())
    }

    pub fn noise_options(&self) -> NoiseFilterOptions {
        NoiseFilterOptions {
            avoid_strong_noise_filter: self.noise_filter.avoid_strong_noise_filter,
            clock_tolerance_secs: self.noise_filter.clock_tolerance_secs,
        }
    }

    /// Settings for one session; `session_dir` is only used when
    /// intermediate state is persisted
    pub fn session_settings(&self, session_dir: Option<PathBuf>) -> SessionSettings {
        SessionSettings {
            target: self.target_package.clone(),
            run_count: self.run_count,
            run_timeout: Duration::from_secs(self.run_timeout_secs),
            capture: self.capture_options(),
            diff: self.diff_options(),
            noise: self.noise_options(),
            include_noise_listing: self.include_noise_listing,
            session_dir: session_dir.filter(|_| self.persist_intermediate),
        }
    }
}

/// Load a configuration file or create a default one.
///
/// With a path, an existing file is loaded and a missing one is created with
/// defaults. Without a path, `sandroid.yaml` in the working directory is
/// used when present, otherwise the defaults.
pub fn load_or_create_config(config_path: Option<&Path>) -> Result<AnalysisConfig> {
    match config_path {
        Some(path) if path.exists() => AnalysisConfig::from_yaml_file(path),
        Some(path) => {
            info!("Creating default config at {}", path.display());
            let config = AnalysisConfig::default();
            config.save_to_yaml_file(path)?;
            Ok(config)
        }
        None => {
            let local = Path::new(DEFAULT_CONFIG_NAME);
            if local.exists() {
                info!("Using config from {}", local.display());
                AnalysisConfig::from_yaml_file(local)
            } else {
                debug!("No config file found, using defaults");
                Ok(AnalysisConfig::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_minimal_yaml_uses_defaults() {
        let yaml = r#"
version: "1.0"
target_package: de.fkie.ground_truth
run_count: 3
"#;
        let config: AnalysisConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.target_package, "de.fkie.ground_truth");
        assert_eq!(config.run_count, 3);
        assert_eq!(config.run_timeout_secs, 300);
        assert!(config.persist_intermediate);
        assert!(config.capture.include_sockets);
        assert!(!config.capture.show_deleted);
        assert_eq!(config.noise_filter.clock_tolerance_secs, 120);
        assert!(config.noise_filter.time_fields.contains(&"updated_at".to_string()));
    }

    #[test]
    fn test_save_and_load_yaml_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sandroid.yaml");

        let config = AnalysisConfig {
            target_package: "com.example.app".to_string(),
            trigger_command: Some("./run.sh".to_string()),
            ..Default::default()
        };
        config.save_to_yaml_file(&path).unwrap();

        let loaded = AnalysisConfig::from_yaml_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_yaml_error() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "run_count: [unclosed").unwrap();

        let err = AnalysisConfig::from_yaml_file(temp_file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse YAML"));
    }

    #[test]
    fn test_load_or_create_config_new_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("new.yaml");

        let config = load_or_create_config(Some(&path)).unwrap();
        assert!(path.exists());
        assert_eq!(config, AnalysisConfig::default());
    }

    #[test]
    fn test_validate_run_count() {
        let config = AnalysisConfig {
            run_count: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(AnalysisError::InsufficientRuns(0))));
        assert!(AnalysisConfig::default().validate().is_ok());
    }

    #[test]
    fn test_capture_options_follow_flags() {
        let mut config = AnalysisConfig::default();
        config.capture.include_network = false;
        config.capture.include_apks = false;
        config.capture.show_deleted = true;

        let options = config.capture_options();
        assert!(options.includes(ArtifactKind::File));
        assert!(options.includes(ArtifactKind::Socket));
        assert!(!options.includes(ArtifactKind::NetworkFlow));
        assert!(!options.includes(ArtifactKind::ApkEntry));
        assert!(options.show_deleted);
    }

    #[test]
    fn test_session_settings() {
        let mut config = AnalysisConfig {
            target_package: "de.fkie.ground_truth".to_string(),
            run_count: 3,
            run_timeout_secs: 60,
            ..Default::default()
        };
        config.noise_filter.time_fields = vec!["LastSeen".to_string()];

        let settings = config.session_settings(Some(PathBuf::from("/tmp/session")));
        assert_eq!(settings.run_count, 3);
        assert_eq!(settings.run_timeout, Duration::from_secs(60));
        assert!(settings.diff.time_fields.contains("lastseen"));
        assert_eq!(settings.session_dir, Some(PathBuf::from("/tmp/session")));

        config.persist_intermediate = false;
        assert!(config.session_settings(Some(PathBuf::from("/tmp/session"))).session_dir.is_none());
    }
}
