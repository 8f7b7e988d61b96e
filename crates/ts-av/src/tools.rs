//! External tool detection and management.
//!
//! The [`ToolRegistry`] discovers and caches the locations of the external
//! CLI tools tubeshift drives (ffmpeg, ffprobe, yt-dlp) and provides lookup
//! methods for the rest of the crate.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default tool timeout: 5 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

pub const FFMPEG: &str = "ffmpeg";
pub const FFPROBE: &str = "ffprobe";
pub const YTDLP: &str = "yt-dlp";

/// Known tool names that the registry manages.
const KNOWN_TOOLS: &[&str] = &[FFMPEG, FFPROBE, YTDLP];

/// Configuration for a single external tool.
#[derive(Debug, Clone)]
pub struct ToolConfig {
    /// Human-readable tool name (e.g. "ffmpeg").
    pub name: String,
    /// Resolved path to the executable.
    pub path: PathBuf,
    /// Maximum execution time for one-shot invocations.
    pub timeout: Duration,
}

/// Availability information for a tool, returned by [`ToolRegistry::check_all`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    /// Tool name.
    pub name: String,
    /// Whether the tool was found.
    pub available: bool,
    /// Version string (first line of `--version` output), if available.
    pub version: Option<String>,
    /// Resolved path to the executable.
    pub path: Option<PathBuf>,
}

/// Registry holding discovered tool configurations.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolConfig>,
}

impl ToolRegistry {
    /// Discover tools by searching `PATH` (or using overrides from config).
    ///
    /// For each known tool, if the [`ts_core::config::ToolsConfig`] supplies
    /// a custom path **and** that path exists, it is used directly.
    /// Otherwise [`which::which`] is used to locate the tool in `PATH`.
    /// Tools that are not found are omitted from the registry.
    pub fn discover(tools_config: &ts_core::config::ToolsConfig) -> Self {
        let mut registry = Self::default();

        for &name in KNOWN_TOOLS {
            let custom_path = match name {
                FFMPEG => tools_config.ffmpeg_path.as_deref(),
                FFPROBE => tools_config.ffprobe_path.as_deref(),
                YTDLP => tools_config.ytdlp_path.as_deref(),
                _ => None,
            };

            let resolved = match custom_path {
                Some(p) if p.exists() => Some(p.to_path_buf()),
                Some(p) => {
                    tracing::warn!(
                        "configured {name} path {} does not exist; searching PATH",
                        p.display()
                    );
                    which::which(name).ok()
                }
                None => which::which(name).ok(),
            };

            match resolved {
                Some(path) => {
                    tracing::debug!("found {name} at {}", path.display());
                    registry.insert(name, path);
                }
                None => tracing::debug!("{name} not found"),
            }
        }

        registry
    }

    /// Register (or replace) a tool at an explicit path.
    pub fn insert(&mut self, name: &str, path: PathBuf) {
        self.tools.insert(
            name.to_string(),
            ToolConfig {
                name: name.to_string(),
                path,
                timeout: DEFAULT_TIMEOUT,
            },
        );
    }

    /// Return a reference to the [`ToolConfig`] for the given tool, or an
    /// [`ts_core::Error::Tool`] if the tool was not found during discovery.
    pub fn require(&self, name: &str) -> ts_core::Result<&ToolConfig> {
        self.tools.get(name).ok_or_else(|| {
            ts_core::Error::tool(name, format!("{name} not found; is it installed and in PATH?"))
        })
    }

    /// Check all known tools and return availability information.
    pub fn check_all(&self) -> Vec<ToolInfo> {
        KNOWN_TOOLS
            .iter()
            .map(|&name| match self.tools.get(name) {
                Some(cfg) => ToolInfo {
                    name: name.to_string(),
                    available: true,
                    version: detect_version(name, &cfg.path),
                    path: Some(cfg.path.clone()),
                },
                None => ToolInfo {
                    name: name.to_string(),
                    available: false,
                    version: None,
                    path: None,
                },
            })
            .collect()
    }
}

/// Run `<tool> --version` (or `-version` for ffmpeg/ffprobe) and return the
/// first line of stdout.
fn detect_version(name: &str, path: &Path) -> Option<String> {
    let version_arg = match name {
        FFMPEG | FFPROBE => "-version",
        _ => "--version",
    };

    let output = std::process::Command::new(path)
        .arg(version_arg)
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ts_core::config::ToolsConfig;

    #[test]
    fn discover_with_default_config() {
        let cfg = ToolsConfig::default();
        let registry = ToolRegistry::discover(&cfg);
        // We cannot guarantee any tool is installed in CI,
        // but the call itself must not panic.
        let _ = registry.check_all();
    }

    #[test]
    fn require_missing_tool_returns_error() {
        let registry = ToolRegistry::default();
        let err = registry.require(FFMPEG).unwrap_err();
        assert!(err.to_string().contains("ffmpeg not found"));
    }

    #[test]
    fn check_all_returns_known_tools() {
        let registry = ToolRegistry::default();
        let infos = registry.check_all();
        let names: Vec<&str> = infos.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["ffmpeg", "ffprobe", "yt-dlp"]);
        assert!(infos.iter().all(|i| !i.available));
    }

    #[test]
    fn explicit_insert_is_required_path() {
        let mut registry = ToolRegistry::default();
        registry.insert(FFPROBE, PathBuf::from("/opt/ffmpeg/bin/ffprobe"));
        let cfg = registry.require(FFPROBE).unwrap();
        assert_eq!(cfg.path, PathBuf::from("/opt/ffmpeg/bin/ffprobe"));
        assert_eq!(cfg.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn custom_path_that_exists_wins() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("my-ffmpeg");
        std::fs::write(&fake, b"#!/bin/sh\n").unwrap();

        let cfg = ToolsConfig {
            ffmpeg_path: Some(fake.clone()),
            ..Default::default()
        };
        let registry = ToolRegistry::discover(&cfg);
        assert_eq!(registry.require(FFMPEG).unwrap().path, fake);
    }
}
