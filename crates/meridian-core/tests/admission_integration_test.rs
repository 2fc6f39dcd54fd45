//! Job admission against fake coordination and launch services.

use meridian_abstraction::{
    Layer, LayerConf, LayerKind, LrConf, LrGenerator, LrKind, Param, ParamConf, ParamGenConf,
    ParamGenKind, ParamGenerator, Updater, UpdaterConf, UpdaterKind, Worker, WorkerConf,
    WorkerKind,
};
use meridian_core::builtins::{
    BuiltinLayer, BuiltinLrGen, BuiltinParamGen, BuiltinUpdater, BuiltinWorker, DenseParam,
};
use meridian_core::{
    AdmissionError, AppContext, CoordinationResult, Coordinator, JobAdmission, JobIdGrant,
    JobIdRequest, LocalCoordinator,
};
use meridian_training::{
    CheckpointRecord, ClusterConfig, JobConfig, JobDescriptor, JobId, JobState, ResumePoint,
    RunHandle, RunLauncher, RunStartError, WorkspaceLayout, write_checkpoint,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

type StartCall = (JobConfig, Option<JobId>, bool, Option<ResumePoint>);

/// Records every run it is asked to start.
#[derive(Default)]
struct FakeLauncher {
    calls: Mutex<Vec<StartCall>>,
    fail: bool,
}

impl FakeLauncher {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl RunLauncher for FakeLauncher {
    fn start_run(
        &self,
        job: &JobDescriptor,
        resume: bool,
        resume_point: Option<&ResumePoint>,
    ) -> Result<RunHandle, RunStartError> {
        self.calls.lock().unwrap().push((
            job.job_conf().clone(),
            job.job_id(),
            resume,
            resume_point.cloned(),
        ));
        let job_id = job
            .job_id()
            .ok_or_else(|| RunStartError::new(None, "unbound"))?;
        if self.fail {
            return Err(RunStartError::new(Some(job_id), "no workers available"));
        }
        let (_reporter, handle) = RunHandle::channel(job_id);
        Ok(handle)
    }
}

/// Counts calls before delegating to an in-memory coordinator.
struct CountingCoordinator {
    inner: LocalCoordinator,
    assigned: AtomicUsize,
    released: AtomicUsize,
}

impl CountingCoordinator {
    fn new() -> Self {
        Self {
            inner: LocalCoordinator::in_memory(),
            assigned: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
        }
    }
}

impl Coordinator for CountingCoordinator {
    fn assign_or_confirm_job_id(&self, request: &JobIdRequest) -> CoordinationResult<JobIdGrant> {
        self.assigned.fetch_add(1, Ordering::SeqCst);
        self.inner.assign_or_confirm_job_id(request)
    }

    fn release(&self, job_id: JobId) -> CoordinationResult<()> {
        self.released.fetch_add(1, Ordering::SeqCst);
        self.inner.release(job_id)
    }
}

fn custom_context() -> AppContext {
    let ctx = AppContext::default();
    ctx.register_layer("conv", || {
        Box::new(BuiltinLayer::new(LayerKind::Convolution)) as Box<dyn Layer>
    })
    .unwrap();
    ctx.register_param("dense-param", || {
        Box::new(DenseParam::new()) as Box<dyn Param>
    })
    .unwrap();
    ctx.register_param_generator("gaussian-init", || {
        Box::new(BuiltinParamGen::new(ParamGenKind::Gaussian)) as Box<dyn ParamGenerator>
    })
    .unwrap();
    ctx.register_lr_generator("step-lr", || {
        Box::new(BuiltinLrGen::new(LrKind::Step)) as Box<dyn LrGenerator>
    })
    .unwrap();
    ctx.register_updater("sgd-updater", || {
        Box::new(BuiltinUpdater::new(UpdaterKind::Sgd)) as Box<dyn Updater>
    })
    .unwrap();
    ctx.register_worker("data-worker", || {
        Box::new(BuiltinWorker::new(WorkerKind::Bp)) as Box<dyn Worker>
    })
    .unwrap();
    ctx
}

fn custom_job(workspace: &Path) -> JobConfig {
    let mut conf = JobConfig::new("e2e", ClusterConfig::new(workspace));
    let mut init = ParamGenConf::new("gaussian-init");
    init.seed = Some(7);
    let mut param = ParamConf::new("conv-w", vec![8, 3, 3, 3]).with_init(init);
    param.kind = "dense-param".into();
    conf.neuralnet
        .layers
        .push(LayerConf::new("conv1", "conv").with_param(param));
    conf.updater = UpdaterConf {
        learning_rate: LrConf::new("step-lr", 0.1),
        ..UpdaterConf::new("sgd-updater")
    };
    conf.train_one_batch = WorkerConf::new("data-worker");
    conf
}

fn checkpoint(job_id: JobId, step: u64, worker: u32) -> CheckpointRecord {
    CheckpointRecord {
        job_id,
        step,
        worker,
        created_at: chrono::Utc::now(),
        params: vec![],
    }
}

#[test]
fn test_end_to_end_admission_with_custom_identifiers() {
    let temp = TempDir::new().unwrap();
    let launcher = Arc::new(FakeLauncher::default());
    let admission = JobAdmission::new(
        custom_context(),
        Arc::new(LocalCoordinator::in_memory()),
        Arc::clone(&launcher) as _,
    );
    let config = custom_job(temp.path());

    let job = admission
        .submit(false, JobDescriptor::new(None, config.clone()))
        .unwrap();

    assert_eq!(job.state(), JobState::Running);
    assert_eq!(job.job_id(), JobId(1));
    assert_eq!(job.job_conf(), &config);
    assert!(job.resume_point().is_none());

    let calls = launcher.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    let (started_conf, started_id, resume, point) = &calls[0];
    assert_eq!(started_conf, &config);
    assert_eq!(*started_id, Some(JobId(1)));
    assert!(!resume);
    assert!(point.is_none());
}

#[test]
fn test_resume_without_checkpoint_does_not_start_run() {
    let temp = TempDir::new().unwrap();
    let launcher = Arc::new(FakeLauncher::default());
    let coordinator = Arc::new(CountingCoordinator::new());
    let admission = JobAdmission::new(
        custom_context(),
        Arc::clone(&coordinator) as _,
        Arc::clone(&launcher) as _,
    );

    let descriptor = JobDescriptor::new(Some(JobId(9)), custom_job(temp.path()));
    let err = admission.submit(true, descriptor).unwrap_err();

    assert!(matches!(err, AdmissionError::ResumeDataUnavailable { .. }));
    assert_eq!(launcher.call_count(), 0);
    assert_eq!(coordinator.assigned.load(Ordering::SeqCst), 0);
}

#[test]
fn test_resume_without_coordination_record() {
    let temp = TempDir::new().unwrap();
    let layout = WorkspaceLayout::new(temp.path().to_path_buf());
    write_checkpoint(&layout, &checkpoint(JobId(3), 10, 0)).unwrap();
    let launcher = Arc::new(FakeLauncher::default());
    let admission = JobAdmission::new(
        custom_context(),
        Arc::new(LocalCoordinator::in_memory()),
        Arc::clone(&launcher) as _,
    );

    let err = admission
        .submit(true, JobDescriptor::new(None, custom_job(temp.path())))
        .unwrap_err();

    assert!(matches!(err, AdmissionError::ResumeDataUnavailable { .. }));
    assert_eq!(launcher.call_count(), 0);
}

#[test]
fn test_resume_passes_latest_checkpoint() {
    let temp = TempDir::new().unwrap();
    let layout = WorkspaceLayout::new(temp.path().to_path_buf());
    for (step, worker) in [(5, 0), (10, 1), (10, 0)] {
        write_checkpoint(&layout, &checkpoint(JobId(1), step, worker)).unwrap();
    }
    let coordinator = Arc::new(LocalCoordinator::in_memory());
    let launcher = Arc::new(FakeLauncher::default());
    let admission = JobAdmission::new(
        custom_context(),
        Arc::clone(&coordinator) as _,
        Arc::clone(&launcher) as _,
    );

    let first = admission
        .submit(false, JobDescriptor::new(None, custom_job(temp.path())))
        .unwrap();
    let resumed = admission
        .submit(true, JobDescriptor::new(None, custom_job(temp.path())))
        .unwrap();

    assert_eq!(resumed.job_id(), first.job_id());
    let point = resumed.resume_point().unwrap();
    assert_eq!(point.step, 10);
    assert_eq!(
        point.files,
        vec![layout.checkpoint_path(10, 0), layout.checkpoint_path(10, 1)]
    );

    let calls = launcher.calls.lock().unwrap();
    assert!(calls[1].2);
    assert_eq!(calls[1].3.as_ref(), Some(point));
}

#[test]
fn test_unknown_identifier_is_rejected_before_coordination() {
    let temp = TempDir::new().unwrap();
    let coordinator = Arc::new(CountingCoordinator::new());
    let launcher = Arc::new(FakeLauncher::default());
    let admission = JobAdmission::new(
        custom_context(),
        Arc::clone(&coordinator) as _,
        Arc::clone(&launcher) as _,
    );

    let mut config = custom_job(temp.path());
    config.train_one_batch = WorkerConf::new("gibbs");
    config
        .neuralnet
        .layers
        .push(LayerConf::new("pool1", "max-pool"));

    let err = admission
        .submit(false, JobDescriptor::new(None, config))
        .unwrap_err();

    match err {
        AdmissionError::ConfigurationInvalid(message) => {
            assert!(message.contains("layer 'max-pool'"), "{message}");
            assert!(message.contains("worker 'gibbs'"), "{message}");
        }
        other => panic!("expected ConfigurationInvalid, got {other}"),
    }
    assert_eq!(coordinator.assigned.load(Ordering::SeqCst), 0);
    assert_eq!(launcher.call_count(), 0);
}

#[test]
fn test_structurally_invalid_config() {
    let launcher = Arc::new(FakeLauncher::default());
    let admission = JobAdmission::new(
        custom_context(),
        Arc::new(LocalCoordinator::in_memory()),
        Arc::clone(&launcher) as _,
    );

    let mut config = custom_job(Path::new("/tmp/unused"));
    config.cluster = None;

    let err = admission
        .submit(false, JobDescriptor::new(None, config))
        .unwrap_err();
    assert!(matches!(err, AdmissionError::ConfigurationInvalid(_)));
    assert_eq!(launcher.call_count(), 0);
}

#[test]
fn test_failed_start_releases_new_job_id() {
    let temp = TempDir::new().unwrap();
    let coordinator = Arc::new(CountingCoordinator::new());
    let admission = JobAdmission::new(
        custom_context(),
        Arc::clone(&coordinator) as _,
        Arc::new(FakeLauncher::failing()),
    );

    let err = admission
        .submit(false, JobDescriptor::new(None, custom_job(temp.path())))
        .unwrap_err();

    assert!(matches!(err, AdmissionError::RunStart(_)));
    assert_eq!(coordinator.released.load(Ordering::SeqCst), 1);
    assert!(coordinator.inner.jobs().unwrap().is_empty());
}

#[test]
fn test_failed_start_releases_unseen_requested_job_id() {
    let temp = TempDir::new().unwrap();
    let coordinator = Arc::new(CountingCoordinator::new());
    let admission = JobAdmission::new(
        custom_context(),
        Arc::clone(&coordinator) as _,
        Arc::new(FakeLauncher::failing()),
    );

    let descriptor = JobDescriptor::new(Some(JobId(42)), custom_job(temp.path()));
    let err = admission.submit(false, descriptor).unwrap_err();

    assert!(matches!(err, AdmissionError::RunStart(_)));
    assert_eq!(coordinator.released.load(Ordering::SeqCst), 1);
    assert!(!coordinator.inner.jobs().unwrap().contains_key(&JobId(42)));
}

#[test]
fn test_failed_start_keeps_known_requested_job_id() {
    let temp = TempDir::new().unwrap();
    let coordinator = Arc::new(CountingCoordinator::new());
    let known = JobIdRequest {
        requested: Some(JobId(42)),
        name: "e2e".to_string(),
        resume: false,
    };
    coordinator.inner.assign_or_confirm_job_id(&known).unwrap();
    let admission = JobAdmission::new(
        custom_context(),
        Arc::clone(&coordinator) as _,
        Arc::new(FakeLauncher::failing()),
    );

    let descriptor = JobDescriptor::new(Some(JobId(42)), custom_job(temp.path()));
    let err = admission.submit(false, descriptor).unwrap_err();

    assert!(matches!(err, AdmissionError::RunStart(_)));
    assert_eq!(coordinator.released.load(Ordering::SeqCst), 0);
    assert!(coordinator.inner.jobs().unwrap().contains_key(&JobId(42)));
}
