use std::fs;
use std::path::Path;

use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{AnalysisError, Result};

/// Serialize `data` as pretty JSON into `path`, creating parent directories.
pub fn save_to_json<T: Serialize>(data: &T, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            AnalysisError::persistence(format!("directory {}", parent.display()), e)
        })?;
    }

    let json = serde_json::to_string_pretty(data)
        .map_err(|e| AnalysisError::persistence(path.display().to_string(), e))?;

    fs::write(path, json).map_err(|e| AnalysisError::persistence(path.display().to_string(), e))?;

    debug!("Saved data to {}", path.display());
    Ok(())
}

/// Read and deserialize JSON from `path`.
pub fn load_from_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();

    let content = fs::read_to_string(path)
        .map_err(|e| AnalysisError::persistence(path.display().to_string(), e))?;
    let data = serde_json::from_str(&content)
        .map_err(|e| AnalysisError::persistence(path.display().to_string(), e))?;

    debug!("Loaded data from {}", path.display());
    Ok(data)
}
