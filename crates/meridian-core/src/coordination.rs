//! Client side of the cluster coordination service.
//!
//! The coordination service hands out job ids and remembers which jobs exist
//! so a resumed job gets its old id back. [`LocalCoordinator`] is the
//! single-host implementation: a JSON state file under the configured state
//! directory, or plain memory when no directory is configured.

use crate::config::CoordinatorSettings;
use chrono::{DateTime, Utc};
use meridian_training::JobId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, info};

const STATE_FILE: &str = "jobs.json";

pub type CoordinationResult<T> = std::result::Result<T, CoordinationError>;

#[derive(Debug, Error)]
pub enum CoordinationError {
    /// Nothing is known about the job being resumed.
    #[error("no record of job '{name}'")]
    NoRecord {
        name: String,
        requested: Option<JobId>,
    },

    /// The requested id belongs to a job with another name.
    #[error("job id {job_id} belongs to '{registered}', not '{requested}'")]
    NameMismatch {
        job_id: JobId,
        registered: String,
        requested: String,
    },

    #[error("no job ids left to allocate")]
    IdsExhausted,

    #[error("coordination state lock poisoned: {0}")]
    LockPoisoned(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// What admission asks the coordination service for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobIdRequest {
    /// Id passed on the command line, if any.
    pub requested: Option<JobId>,
    pub name: String,
    pub resume: bool,
}

/// Answer to a [`JobIdRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobIdGrant {
    pub job_id: JobId,
    /// The record was created by this request and can be released again.
    pub created: bool,
}

impl JobIdGrant {
    pub fn created(job_id: JobId) -> Self {
        Self {
            job_id,
            created: true,
        }
    }

    pub fn existing(job_id: JobId) -> Self {
        Self {
            job_id,
            created: false,
        }
    }
}

pub trait Coordinator: Send + Sync {
    /// Confirms the requested id or assigns one.
    ///
    /// Resume requests never create records, so repeating one returns the same id.
    ///
    /// # Errors
    /// Returns `CoordinationError::NoRecord` when resuming a job the service
    /// does not know.
    fn assign_or_confirm_job_id(&self, request: &JobIdRequest) -> CoordinationResult<JobIdGrant>;

    /// Forgets a job whose run never started.
    fn release(&self, job_id: JobId) -> CoordinationResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Assigned,
    Resumed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub status: JobStatus,
}

impl JobRecord {
    fn assigned(name: &str) -> Self {
        Self {
            name: name.to_string(),
            created_at: Utc::now(),
            status: JobStatus::Assigned,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CoordinatorState {
    next_id: u64,
    jobs: BTreeMap<JobId, JobRecord>,
}

impl Default for CoordinatorState {
    fn default() -> Self {
        Self {
            next_id: 1,
            jobs: BTreeMap::new(),
        }
    }
}

#[derive(Debug)]
pub struct LocalCoordinator {
    path: Option<PathBuf>,
    state: Mutex<CoordinatorState>,
}

impl LocalCoordinator {
    /// Coordinator that keeps its state in memory only.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(CoordinatorState::default()),
        }
    }

    /// Opens (or creates) the state file under `dir`.
    pub fn open(dir: &Path) -> CoordinationResult<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(STATE_FILE);
        let state = if path.exists() {
            serde_json::from_slice(&std::fs::read(&path)?)?
        } else {
            CoordinatorState::default()
        };
        debug!(path = %path.display(), "Opened coordination state");
        Ok(Self {
            path: Some(path),
            state: Mutex::new(state),
        })
    }

    pub fn from_settings(settings: &CoordinatorSettings) -> CoordinationResult<Self> {
        match &settings.state_dir {
            Some(dir) => Self::open(dir),
            None => Ok(Self::in_memory()),
        }
    }

    /// Snapshot of the known jobs.
    pub fn jobs(&self) -> CoordinationResult<BTreeMap<JobId, JobRecord>> {
        Ok(self.lock()?.jobs.clone())
    }

    fn lock(&self) -> CoordinationResult<std::sync::MutexGuard<'_, CoordinatorState>> {
        self.state
            .lock()
            .map_err(|e| CoordinationError::LockPoisoned(e.to_string()))
    }

    fn mark_resumed(&self, state: &mut CoordinatorState, id: JobId) -> CoordinationResult<()> {
        match state.jobs.get_mut(&id) {
            Some(record) if record.status != JobStatus::Resumed => {
                record.status = JobStatus::Resumed;
                self.persist(state)
            }
            _ => Ok(()),
        }
    }

    fn persist(&self, state: &CoordinatorState) -> CoordinationResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(state)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl Coordinator for LocalCoordinator {
    fn assign_or_confirm_job_id(&self, request: &JobIdRequest) -> CoordinationResult<JobIdGrant> {
        let mut state = self.lock()?;
        let no_record = || CoordinationError::NoRecord {
            name: request.name.clone(),
            requested: request.requested,
        };

        match (request.requested, request.resume) {
            (Some(id), resume) if state.jobs.contains_key(&id) => {
                let registered = &state.jobs[&id].name;
                if *registered != request.name {
                    return Err(CoordinationError::NameMismatch {
                        job_id: id,
                        registered: registered.clone(),
                        requested: request.name.clone(),
                    });
                }
                if resume {
                    self.mark_resumed(&mut state, id)?;
                }
                debug!(job_id = %id, "Confirmed job id");
                Ok(JobIdGrant::existing(id))
            }
            (Some(_), true) => Err(no_record()),
            (Some(id), false) => {
                state.jobs.insert(id, JobRecord::assigned(&request.name));
                state.next_id = state.next_id.max(id.0.saturating_add(1));
                self.persist(&state)?;
                info!(job_id = %id, job = %request.name, "Registered requested job id");
                Ok(JobIdGrant::created(id))
            }
            (None, true) => {
                let id = state
                    .jobs
                    .iter()
                    .rev()
                    .find(|(_, record)| record.name == request.name)
                    .map(|(id, _)| *id)
                    .ok_or_else(no_record)?;
                self.mark_resumed(&mut state, id)?;
                debug!(job_id = %id, job = %request.name, "Found job to resume");
                Ok(JobIdGrant::existing(id))
            }
            (None, false) => {
                let id = JobId(state.next_id);
                if state.jobs.contains_key(&id) {
                    return Err(CoordinationError::IdsExhausted);
                }
                state.next_id = state.next_id.saturating_add(1);
                state.jobs.insert(id, JobRecord::assigned(&request.name));
                self.persist(&state)?;
                info!(job_id = %id, job = %request.name, "Assigned job id");
                Ok(JobIdGrant::created(id))
            }
        }
    }

    fn release(&self, job_id: JobId) -> CoordinationResult<()> {
        let mut state = self.lock()?;
        if state.jobs.remove(&job_id).is_some() {
            self.persist(&state)?;
            info!(job_id = %job_id, "Released job id");
        }
        Ok(())
    }
}
