//! Job admission: the handshake between a bootstrapped process and the cluster.
//!
//! [`JobAdmission::submit`] takes a job from `Unsubmitted` to `Running`:
//!
//! 1. Validate the configuration and resolve every component identifier it
//!    names through the registries
//! 2. When resuming, locate the latest checkpoint in the job workspace
//! 3. Obtain or confirm the job id from the coordination service
//! 4. Prepare the workspace and start the run
//!
//! Any failure moves the job to `Rejected`. A coordination record created by
//! the submission is released again if its run cannot start.

use crate::context::AppContext;
use crate::coordination::{CoordinationError, Coordinator, JobIdGrant, JobIdRequest};
use crate::error::{AdmissionError, AdmissionResult};
use meridian_abstraction::{
    ConceptFamily, Layer, LrGenerator, Param, ParamGenerator, TypeKey, Updater, Worker,
};
use meridian_training::{
    JobConfig, JobDescriptor, JobId, JobState, ResumePoint, RunHandle, RunLauncher,
    WorkspaceLayout, find_resume_point,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A job that made it past admission.
#[derive(Debug)]
pub struct AdmittedJob {
    descriptor: JobDescriptor,
    state: JobState,
    resume_point: Option<ResumePoint>,
    handle: RunHandle,
}

impl AdmittedJob {
    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn job_id(&self) -> JobId {
        self.handle.job_id()
    }

    pub fn job_conf(&self) -> &JobConfig {
        self.descriptor.job_conf()
    }

    pub fn descriptor(&self) -> &JobDescriptor {
        &self.descriptor
    }

    /// Checkpoint the run continues from, when resuming.
    pub fn resume_point(&self) -> Option<&ResumePoint> {
        self.resume_point.as_ref()
    }

    pub fn handle(&self) -> &RunHandle {
        &self.handle
    }

    pub fn into_handle(self) -> RunHandle {
        self.handle
    }
}

pub struct JobAdmission {
    context: AppContext,
    coordinator: Arc<dyn Coordinator>,
    launcher: Arc<dyn RunLauncher>,
}

impl JobAdmission {
    pub fn new(
        context: AppContext,
        coordinator: Arc<dyn Coordinator>,
        launcher: Arc<dyn RunLauncher>,
    ) -> Self {
        Self {
            context,
            coordinator,
            launcher,
        }
    }

    /// Admits `descriptor` and starts its run without waiting for it.
    ///
    /// `resume` is handed to the launcher unchanged.
    ///
    /// # Errors
    /// - `ConfigurationInvalid` if validation or identifier resolution fails
    /// - `ResumeDataUnavailable` if `resume` is set and there is no checkpoint
    ///   or no coordination record
    /// - `Coordination` for other coordination service failures
    /// - `Workspace` if the workspace cannot be read or prepared
    /// - `RunStart` if the launcher refuses the run
    pub fn submit(&self, resume: bool, descriptor: JobDescriptor) -> AdmissionResult<AdmittedJob> {
        let mut state = JobState::Unsubmitted;
        let name = descriptor.job_conf().name.clone();

        match self.admit(resume, descriptor, &mut state) {
            Ok(job) => Ok(job),
            Err(e) => {
                warn!(
                    job = %name,
                    from = ?state,
                    to = ?JobState::Rejected,
                    error = %e,
                    "Job rejected"
                );
                Err(e)
            }
        }
    }

    fn admit(
        &self,
        resume: bool,
        descriptor: JobDescriptor,
        state: &mut JobState,
    ) -> AdmissionResult<AdmittedJob> {
        let config = descriptor.job_conf();
        config
            .validate()
            .map_err(|e| AdmissionError::ConfigurationInvalid(e.to_string()))?;
        self.resolve_identifiers(config)?;

        let workspace = config
            .workspace()
            .map_err(|e| AdmissionError::ConfigurationInvalid(e.to_string()))?;
        let layout = WorkspaceLayout::new(workspace.to_path_buf());

        let resume_point = if resume {
            let point = find_resume_point(&layout)
                .map_err(|source| AdmissionError::Workspace {
                    path: layout.root().to_path_buf(),
                    source,
                })?
                .ok_or_else(|| AdmissionError::ResumeDataUnavailable {
                    job: config.name.clone(),
                    reason: format!("no checkpoint under {}", layout.checkpoint_dir().display()),
                })?;
            info!(
                job = %config.name,
                step = point.step,
                files = point.files.len(),
                "Resuming from checkpoint"
            );
            Some(point)
        } else {
            None
        };

        let request = JobIdRequest {
            requested: descriptor.job_id(),
            name: config.name.clone(),
            resume,
        };
        let grant = self
            .coordinator
            .assign_or_confirm_job_id(&request)
            .map_err(|e| match e {
                CoordinationError::NoRecord { name, .. } => AdmissionError::ResumeDataUnavailable {
                    job: name,
                    reason: "the coordination service has no record of this job".to_string(),
                },
                other => AdmissionError::Coordination(other),
            })?;
        let job_id = grant.job_id;

        let descriptor = match descriptor.bind(job_id, resume) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                self.release_on_failure(grant);
                return Err(AdmissionError::ConfigurationInvalid(e.to_string()));
            }
        };
        advance(state, JobState::Admitted, job_id);

        if let Err(source) = layout.ensure_dirs() {
            self.release_on_failure(grant);
            return Err(AdmissionError::Workspace {
                path: layout.root().to_path_buf(),
                source,
            });
        }

        let handle = match self
            .launcher
            .start_run(&descriptor, resume, resume_point.as_ref())
        {
            Ok(handle) => handle,
            Err(e) => {
                self.release_on_failure(grant);
                return Err(e.into());
            }
        };
        advance(state, JobState::Running, job_id);

        Ok(AdmittedJob {
            descriptor,
            state: *state,
            resume_point,
            handle,
        })
    }

    /// Confirms every identifier the configuration names is registered.
    fn resolve_identifiers(&self, config: &JobConfig) -> AdmissionResult<()> {
        let refs = config.component_refs();
        let mut unknown = Vec::new();
        self.collect_unknown::<dyn Layer>(&refs.layers, &mut unknown);
        self.collect_unknown::<dyn Param>(&refs.params, &mut unknown);
        self.collect_unknown::<dyn ParamGenerator>(&refs.param_generators, &mut unknown);
        self.collect_unknown::<dyn LrGenerator>(refs.lr_generator.as_slice(), &mut unknown);
        self.collect_unknown::<dyn Updater>(refs.updater.as_slice(), &mut unknown);
        self.collect_unknown::<dyn Worker>(refs.worker.as_slice(), &mut unknown);

        if unknown.is_empty() {
            debug!(job = %config.name, "All component identifiers resolved");
            Ok(())
        } else {
            Err(AdmissionError::ConfigurationInvalid(format!(
                "unknown identifiers: {}",
                unknown.join(", ")
            )))
        }
    }

    fn collect_unknown<T: ?Sized + ConceptFamily>(
        &self,
        ids: &[&TypeKey],
        unknown: &mut Vec<String>,
    ) {
        let registry = self.context.registry::<T>();
        for id in ids {
            let entry = format!("{} '{}'", T::NAME, id);
            if !registry.has(id.as_str()) && !unknown.contains(&entry) {
                unknown.push(entry);
            }
        }
    }

    /// Gives back a record this submission created.
    fn release_on_failure(&self, grant: JobIdGrant) {
        if !grant.created {
            return;
        }
        if let Err(e) = self.coordinator.release(grant.job_id) {
            warn!(job_id = %grant.job_id, error = %e, "Failed to release job id");
        }
    }
}

fn advance(state: &mut JobState, next: JobState, job_id: JobId) {
    debug_assert!(state.can_transition_to(next), "{state:?} -> {next:?}");
    info!(job_id = %job_id, from = ?*state, to = ?next, "Job state changed");
    *state = next;
}

impl std::fmt::Debug for JobAdmission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobAdmission")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}
