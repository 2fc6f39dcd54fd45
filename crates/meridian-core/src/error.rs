//! Error types for bootstrap and job admission.

use crate::config::SystemConfigError;
use crate::coordination::CoordinationError;
use crate::logging::LoggingError;
use crate::registry::RegistryError;
use meridian_training::{RunStartError, TrainingError};
use std::path::PathBuf;
use thiserror::Error;

/// Result type for bootstrap operations.
pub type BootstrapResult<T> = std::result::Result<T, BootstrapError>;

/// Result type for admission operations.
pub type AdmissionResult<T> = std::result::Result<T, AdmissionError>;

/// Failures while starting the process. Every variant aborts startup.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Process arguments could not be parsed.
    #[error("invalid arguments: {0}")]
    Arguments(String),

    #[error(transparent)]
    SystemConfig(#[from] SystemConfigError),

    #[error(transparent)]
    Logging(#[from] LoggingError),

    /// The job configuration document could not be loaded.
    #[error("failed to load job configuration from {}: {source}", path.display())]
    JobConfig {
        path: PathBuf,
        #[source]
        source: TrainingError,
    },

    /// Two built-ins share an identifier; the built-in set is inconsistent.
    #[error("built-in {family} '{identifier}' is registered twice")]
    BuiltinCollision {
        family: &'static str,
        identifier: String,
        #[source]
        source: RegistryError,
    },
}

/// Reasons a submission is rejected.
#[derive(Debug, Error)]
pub enum AdmissionError {
    /// The job configuration failed validation or references unknown identifiers.
    #[error("invalid job configuration: {0}")]
    ConfigurationInvalid(String),

    /// Resume was requested but there is nothing to resume from.
    #[error("cannot resume job '{job}': {reason}")]
    ResumeDataUnavailable { job: String, reason: String },

    #[error("coordination service error: {0}")]
    Coordination(#[from] CoordinationError),

    #[error(transparent)]
    RunStart(#[from] RunStartError),

    /// The job workspace could not be inspected or prepared.
    #[error("workspace {} is unusable: {source}", path.display())]
    Workspace {
        path: PathBuf,
        #[source]
        source: TrainingError,
    },
}
