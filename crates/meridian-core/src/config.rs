//! Process-wide system configuration.
//!
//! Separate from the job configuration document: this file describes the
//! installation (logging, where the coordination service keeps its state)
//! and is shared by every job started from it.
//!
//! Lookup order:
//! 1. An explicit `--system-conf` path (must exist)
//! 2. `$MERIDIAN_HOME/conf/meridian.toml` (used if present)
//! 3. Defaults

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable pointing at the installation directory.
pub const HOME_ENV: &str = "MERIDIAN_HOME";

/// Environment variable overriding the log level.
pub const LOG_ENV: &str = "MERIDIAN_LOG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub log: LogSettings,
    pub coordinator: CoordinatorSettings,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Human,
    Json,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Filter directive, e.g. `info` or `meridian_core=debug`.
    pub level: Option<String>,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorSettings {
    /// Directory for the coordination state file; in-memory when unset.
    pub state_dir: Option<PathBuf>,
}

/// Errors that can occur while loading the system configuration.
#[derive(Debug, Error)]
pub enum SystemConfigError {
    /// Configuration file not found.
    #[error("configuration file not found: {0}")]
    NotFound(String),

    /// Failed to read configuration file.
    #[error("failed to read configuration file: {0}")]
    ReadError(String),

    /// Failed to parse configuration file.
    #[error("failed to parse configuration file: {0}")]
    ParseError(String),
}

pub type SystemConfigResult<T> = std::result::Result<T, SystemConfigError>;

impl SystemConfig {
    /// Load configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> SystemConfigResult<Self> {
        if !path.exists() {
            return Err(SystemConfigError::NotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| SystemConfigError::ReadError(located(path, e)))?;

        toml::from_str(&content)
            .map_err(|e| SystemConfigError::ParseError(located(path, e)))
    }

    /// Default location under `$MERIDIAN_HOME`, if the variable is set.
    pub fn default_path() -> Option<PathBuf> {
        let home = std::env::var_os(HOME_ENV)?;
        Some(PathBuf::from(home).join("conf").join("meridian.toml"))
    }

    /// Resolves the configuration following the lookup order above.
    pub fn discover(explicit: Option<&Path>) -> SystemConfigResult<Self> {
        if let Some(path) = explicit {
            return Self::load_from_file(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from_file(&path),
            _ => Ok(Self::default()),
        }
    }
}

fn located(path: &Path, e: impl std::fmt::Display) -> String {
    format!("{}: {}", path.display(), e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("meridian.toml");
        let toml = "[log]\nlevel = \"debug\"\nformat = \"json\"\n\n\
                    [coordinator]\nstate_dir = \"/var/lib/meridian\"\n";
        std::fs::write(&path, toml).unwrap();

        let config = SystemConfig::load_from_file(&path).unwrap();
        assert_eq!(config.log.level.as_deref(), Some("debug"));
        assert_eq!(config.log.format, LogFormat::Json);
        let state_dir = config.coordinator.state_dir.as_deref();
        assert_eq!(state_dir, Some(Path::new("/var/lib/meridian")));
    }

    #[test]
    fn test_explicit_missing_path_is_an_error() {
        let temp = TempDir::new().unwrap();
        let result = SystemConfig::discover(Some(&temp.path().join("absent.toml")));
        assert!(matches!(result, Err(SystemConfigError::NotFound(_))));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("meridian.toml");
        std::fs::write(&path, "[log]\nlevel = \"warn\"\n").unwrap();

        let config = SystemConfig::discover(Some(&path)).unwrap();
        assert_eq!(config.log.format, LogFormat::Human);
        assert_eq!(config.coordinator, CoordinatorSettings::default());
    }

    #[test]
    fn test_parse_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("meridian.toml");
        std::fs::write(&path, "[log\n").unwrap();
        assert!(matches!(
            SystemConfig::load_from_file(&path),
            Err(SystemConfigError::ParseError(_))
        ));
    }
}
