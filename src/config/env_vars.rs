use anyhow::{Context, Result};
use log::info;

use crate::config::analysis_config::AnalysisConfig;
use crate::constants::{ENV_OUTPUT_DIR, ENV_RUN_COUNT, ENV_RUN_TIMEOUT_SECS, ENV_TARGET_PACKAGE};

/// Override config fields from `SANDROID_*` variables provided by `lookup`
pub fn apply_overrides<F>(config: &mut AnalysisConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(ENV_RUN_COUNT) {
        config.run_count = value
            .trim()
            .parse()
            .context(format!("Invalid {}: {}", ENV_RUN_COUNT, value))?;
        info!("Run count overridden from environment: {}", config.run_count);
    }

    if let Some(value) = lookup(ENV_RUN_TIMEOUT_SECS) {
        config.run_timeout_secs = value
            .trim()
            .parse()
            .context(format!("Invalid {}: {}", ENV_RUN_TIMEOUT_SECS, value))?;
        info!("Run timeout overridden from environment: {}s", config.run_timeout_secs);
    }

    if let Some(value) = lookup(ENV_OUTPUT_DIR) {
        info!("Output directory overridden from environment: {}", value);
        config.output_dir = value;
    }

    if let Some(value) = lookup(ENV_TARGET_PACKAGE) {
        info!("Target package overridden from environment: {}", value);
        config.target_package = value;
    }

    Ok(())
}

/// Expand `$VAR` and `${VAR}` from the process environment
pub fn expand_env_vars(path: &str) -> String {
    expand_with(path, |name| std::env::var(name).ok())
}

/// Expand `$VAR` and `${VAR}` using `lookup`.
///
/// Unknown variables expand to nothing; a lone `$` is kept.
fn expand_with<F>(path: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut result = String::with_capacity(path.len());
    let mut chars = path.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let mut name = String::new();
        if chars.peek() == Some(&'{') {
            chars.next();
            let mut closed = false;
            for inner in chars.by_ref() {
                if inner == '}' {
                    closed = true;
                    break;
                }
                name.push(inner);
            }
            if !closed {
                result.push_str("${");
                result.push_str(&name);
                continue;
            }
        } else {
            while let Some(&next) = chars.peek() {
                if next.is_ascii_alphanumeric() || next == '_' {
                    name.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            if name.is_empty() {
                result.push('$');
                continue;
            }
        }

        if let Some(value) = lookup(&name) {
            result.push_str(&value);
        }
    }

    result
}
