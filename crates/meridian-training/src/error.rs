use crate::job::{JobId, JobState};
use thiserror::Error;

pub type TrainingResult<T> = std::result::Result<T, TrainingError>;

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("invalid job configuration: {0}")]
    InvalidConfig(String),

    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    #[error("trainer error: {0}")]
    Trainer(String),

    #[error("illegal job state transition: {from:?} -> {to:?}")]
    IllegalTransition { from: JobState, to: JobState },

    #[error(transparent)]
    Component(#[from] meridian_abstraction::ComponentError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failure reported by the worker/trainer subsystem when a run cannot start.
#[derive(Debug, Error)]
#[error("run failed to start: {reason}")]
pub struct RunStartError {
    /// Job the run was started for; absent if the descriptor was never bound.
    pub job_id: Option<JobId>,
    pub reason: String,
    #[source]
    pub source: Option<TrainingError>,
}

impl RunStartError {
    pub fn new(job_id: Option<JobId>, reason: impl Into<String>) -> Self {
        Self {
            job_id,
            reason: reason.into(),
            source: None,
        }
    }

    pub fn with_source(
        job_id: Option<JobId>,
        reason: impl Into<String>,
        source: TrainingError,
    ) -> Self {
        Self {
            job_id,
            reason: reason.into(),
            source: Some(source),
        }
    }
}
