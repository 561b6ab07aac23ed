// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Run configuration.
//!
//! Values come from three layers, later ones winning:
//!
//! 1. built-in defaults
//! 2. `~/.segcat/config.json` (or the file given with `--config`)
//! 3. command line flags
//!
//! Every field in the file is optional, e.g.
//!
//! ```json
//! { "base_mode": "directory", "timeout_secs": 30, "log_level": "info" }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::ConcatError;
use crate::fetch::http::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::logging::LogLevel;
use crate::uri::BaseMode;

/// Partially specified configuration, as read from a file or the CLI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Manifest address
    pub url: Option<String>,
    /// Output file path
    pub output: Option<PathBuf>,
    pub base_mode: Option<BaseMode>,
    pub log_level: Option<LogLevel>,
    /// Per-fetch timeout in seconds
    pub timeout_secs: Option<u64>,
    /// Fail the run when a gzip manifest cannot be inflated
    pub strict_decode: Option<bool>,
    /// Do not fetch blank manifest lines
    pub skip_empty_entries: Option<bool>,
}

/// Directory holding the default config file.
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".segcat"))
}

impl Config {
    /// Read a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Read `~/.segcat/config.json` if it exists, defaults otherwise.
    pub fn load_default() -> Result<Self> {
        match config_dir().map(|d| d.join("config.json")) {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Layer `overrides` on top of `self`; set fields in `overrides` win.
    pub fn merge(self, overrides: Config) -> Config {
        Config {
            url: overrides.url.or(self.url),
            output: overrides.output.or(self.output),
            base_mode: overrides.base_mode.or(self.base_mode),
            log_level: overrides.log_level.or(self.log_level),
            timeout_secs: overrides.timeout_secs.or(self.timeout_secs),
            strict_decode: overrides.strict_decode.or(self.strict_decode),
            skip_empty_entries: overrides.skip_empty_entries.or(self.skip_empty_entries),
        }
    }

    /// Validate and fill in defaults.
    pub fn into_run_config(self) -> Result<RunConfig, ConcatError> {
        let url = self
            .url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| ConcatError::Config("no url".to_string()))?;
        let output = self
            .output
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| ConcatError::Config("no output file name".to_string()))?;

        let timeout_secs = self.timeout_secs.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(ConcatError::Config("timeout must be at least 1 second".to_string()));
        }

        Ok(RunConfig {
            url,
            output,
            base_mode: self.base_mode.unwrap_or_default(),
            log_level: self.log_level.unwrap_or_default(),
            fetch_timeout: Duration::from_secs(timeout_secs),
            strict_decode: self.strict_decode.unwrap_or(true),
            skip_empty_entries: self.skip_empty_entries.unwrap_or(true),
        })
    }
}

/// Fully resolved configuration for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub url: String,
    pub output: PathBuf,
    pub base_mode: BaseMode,
    pub log_level: LogLevel,
    pub fetch_timeout: Duration,
    pub strict_decode: bool,
    pub skip_empty_entries: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn minimal() -> Config {
        Config {
            url: Some("http://h/a/manifest.m3u".into()),
            output: Some(PathBuf::from("out.ts")),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let run = minimal().into_run_config().unwrap();
        assert_eq!(run.base_mode, BaseMode::Auto);
        assert_eq!(run.log_level, LogLevel::Debug);
        assert_eq!(run.fetch_timeout, Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS));
        assert!(run.strict_decode);
        assert!(run.skip_empty_entries);
    }

    #[test]
    fn test_missing_url_and_output() {
        let err = Config::default().into_run_config().unwrap_err();
        assert!(matches!(err, ConcatError::Config(ref m) if m == "no url"));

        let config = Config { url: Some("http://h/m".into()), ..Default::default() };
        let err = config.into_run_config().unwrap_err();
        assert!(matches!(err, ConcatError::Config(ref m) if m == "no output file name"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = Config { timeout_secs: Some(0), ..minimal() };
        assert!(config.into_run_config().is_err());
    }

    #[test]
    fn test_cli_overrides_file() {
        let file = Config {
            base_mode: Some(BaseMode::Directory),
            timeout_secs: Some(30),
            ..minimal()
        };
        let cli = Config {
            base_mode: Some(BaseMode::Authority),
            ..Default::default()
        };
        let merged = file.merge(cli);
        assert_eq!(merged.base_mode, Some(BaseMode::Authority));
        assert_eq!(merged.timeout_secs, Some(30));
        assert_eq!(merged.url.as_deref(), Some("http://h/a/manifest.m3u"));
    }

    #[test]
    fn test_load_partial_file() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "base_mode": "directory", "log_level": "warn" }"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.base_mode, Some(BaseMode::Directory));
        assert_eq!(config.log_level, Some(LogLevel::Warn));
        assert_eq!(config.url, None);
    }

    #[test]
    fn test_load_invalid_file() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(Config::load(&path).is_err());
    }
}
