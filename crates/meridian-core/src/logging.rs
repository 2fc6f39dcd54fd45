//! Diagnostics setup.

use crate::config::{LOG_ENV, LogFormat, LogSettings};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

const DEFAULT_LEVEL: &str = "info";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter '{directive}': {reason}")]
    InvalidFilter { directive: String, reason: String },
}

/// Picks the filter directive: explicit override, then `MERIDIAN_LOG`, then
/// the configured level, then `info`.
pub fn resolve_level(settings: &LogSettings, override_level: Option<&str>) -> String {
    override_level
        .map(str::to_string)
        .or_else(env_level)
        .or_else(|| settings.level.clone())
        .unwrap_or_else(|| DEFAULT_LEVEL.to_string())
}

fn env_level() -> Option<String> {
    std::env::var(LOG_ENV)
        .ok()
        .filter(|level| !level.trim().is_empty())
}

/// Installs the global `tracing` subscriber, writing to stderr.
///
/// Only the first successful call installs a subscriber; later calls keep the
/// existing one and return `Ok`.
pub fn init(settings: &LogSettings, override_level: Option<&str>) -> Result<(), LoggingError> {
    let directive = resolve_level(settings, override_level);
    let filter = EnvFilter::try_new(&directive).map_err(|e| LoggingError::InvalidFilter {
        directive: directive.clone(),
        reason: e.to_string(),
    })?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    let installed = match settings.format {
        LogFormat::Human => builder.try_init().is_ok(),
        LogFormat::Json => builder.json().try_init().is_ok(),
    };

    if installed {
        tracing::debug!(filter = %directive, format = ?settings.format, "Logging initialized");
    }
    Ok(())
}
