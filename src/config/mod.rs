pub use ts_core::config::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Default config locations, searched in order.
pub const DEFAULT_PATHS: &[&str] = &[
    "./tubeshift.toml",
    "~/.config/tubeshift/config.toml",
    "/etc/tubeshift/config.toml",
];

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    for path_str in DEFAULT_PATHS {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("using config file {}", path.display());
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Reject configurations the queue cannot run with, and log the rest of
/// the warnings.
fn validate_config(config: &Config) -> Result<()> {
    let conversion = &config.conversion;

    if conversion.playable.containers.is_empty() {
        anyhow::bail!("conversion.playable.containers must list at least one container");
    }

    if conversion.probe_size == 0 {
        anyhow::bail!("conversion.probe_size cannot be 0");
    }

    if config.queue.job_timeout_secs == 0 {
        anyhow::bail!("queue.job_timeout_secs cannot be 0");
    }

    if config.fetch.format_sort.trim().is_empty() {
        anyhow::bail!("fetch.format_sort cannot be empty");
    }

    for warning in config.validate() {
        tracing::warn!("{}", warning);
    }

    Ok(())
}
