//! User configuration, read from `<config dir>/mpv-mp/config.json`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::LevelFilter;
use serde::Deserialize;
use thiserror::Error;

const CONFIG_DIR: &str = "mpv-mp";
const CONFIG_FILE: &str = "config.json";

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("couldn't read config {path:?}: {source}")]
  Read { path: PathBuf, source: io::Error },
  #[error("invalid config {path:?}: {source}")]
  Parse {
    path: PathBuf,
    source: serde_json::Error,
  },
  #[error("invalid config: {0}")]
  Invalid(String),
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
  /// Custom MPV executable path (None = auto-detect).
  #[serde(default)]
  pub mpv_path: Option<String>,

  /// Baseline log level; `-v` flags raise it.
  #[serde(default = "default_log_level")]
  pub log_level: String,
}

fn default_log_level() -> String {
  "warn".to_string()
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      mpv_path: None,
      log_level: default_log_level(),
    }
  }
}

impl AppConfig {
  /// Default config file location, if the platform has a config dir.
  pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
  }

  /// Load from `path`; a missing file yields the defaults.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let data = match fs::read_to_string(path) {
      Ok(data) => data,
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        log::debug!("No config at {:?}, using defaults", path);
        return Ok(Self::default());
      }
      Err(source) => {
        return Err(ConfigError::Read {
          path: path.to_path_buf(),
          source,
        })
      }
    };

    let config: Self = serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })?;
    config.validate()?;
    Ok(config)
  }

  /// Load from the default location, or defaults when there is none.
  pub fn load_default() -> Result<Self, ConfigError> {
    match Self::default_path() {
      Some(path) => Self::load(&path),
      None => Ok(Self::default()),
    }
  }

  /// Validate configuration values.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.mpv_path.as_deref().is_some_and(|p| p.trim().is_empty()) {
      return Err(ConfigError::Invalid("MPV path cannot be empty".to_string()));
    }
    self.level_filter()?;
    Ok(())
  }

  /// Configured MPV executable, if any.
  pub fn mpv_path(&self) -> Option<PathBuf> {
    self.mpv_path.as_ref().map(PathBuf::from)
  }

  pub fn level_filter(&self) -> Result<LevelFilter, ConfigError> {
    self
      .log_level
      .parse()
      .map_err(|_| ConfigError::Invalid(format!("unknown log level {:?}", self.log_level)))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_missing_file_gives_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig::load(&dir.path().join("config.json")).unwrap();
    assert_eq!(config, AppConfig::default());
    assert_eq!(config.level_filter().unwrap(), LevelFilter::Warn);
  }

  #[test]
  fn test_load_partial_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, r#"{"mpvPath":"/opt/mpv/bin/mpv"}"#).unwrap();

    let config = AppConfig::load(&path).unwrap();
    assert_eq!(config.mpv_path(), Some(PathBuf::from("/opt/mpv/bin/mpv")));
    assert_eq!(config.log_level, "warn");
  }

  #[test]
  fn test_invalid_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, "{").unwrap();
    assert!(matches!(AppConfig::load(&path), Err(ConfigError::Parse { .. })));
  }

  #[test]
  fn test_validate() {
    let mut config = AppConfig::default();
    assert!(config.validate().is_ok());

    config.log_level = "loud".to_string();
    assert!(config.validate().is_err());

    config.log_level = "debug".to_string();
    config.mpv_path = Some("  ".to_string());
    assert!(config.validate().is_err());
  }
}
