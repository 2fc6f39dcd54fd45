//! In-process trainer and launcher.
//!
//! [`LocalTrainer`] builds every component of a job from the registries and
//! runs its step schedule on the current host. [`LocalLauncher`] starts such
//! runs on a `tokio` runtime and hands back a [`RunHandle`] immediately.

use crate::context::AppContext;
use async_trait::async_trait;
use chrono::Utc;
use meridian_abstraction::{Layer, LrGenerator, Param, StepContext, Updater, Worker};
use meridian_training::{
    CheckpointRecord, JobConfig, JobDescriptor, JobId, ParamSnapshot, ProgressEvent, ProgressSink,
    ResumePoint, RunHandle, RunLauncher, RunStartError, RunSummary, StatusReporter, Trainer,
    TrainerStatus, TrainingError, TrainingResult, WorkspaceLayout, read_checkpoint,
    write_checkpoint,
};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, error, info};

/// Worker index used for checkpoints written by a local run.
const LOCAL_WORKER: u32 = 0;

/// Components of one job, created from the registries.
struct LocalNet {
    layers: Vec<Box<dyn Layer>>,
    params: Vec<Box<dyn Param>>,
    updater: Box<dyn Updater>,
    lr: Box<dyn LrGenerator>,
    worker: Box<dyn Worker>,
}

#[derive(Debug, Clone)]
pub struct LocalTrainer {
    context: AppContext,
}

impl LocalTrainer {
    pub fn new(context: AppContext) -> Self {
        Self { context }
    }

    fn build(&self, conf: &JobConfig) -> TrainingResult<LocalNet> {
        let ctx = &self.context;
        let resolve = |e: crate::registry::RegistryError| TrainingError::Trainer(e.to_string());

        let mut layers = Vec::with_capacity(conf.neuralnet.layers.len());
        let mut params = Vec::new();
        for layer_conf in &conf.neuralnet.layers {
            let mut layer = ctx
                .create_layer(layer_conf.kind.as_str())
                .map_err(resolve)?;
            layer.setup(layer_conf)?;

            for param_conf in layer.param_confs() {
                let mut param = ctx
                    .create_param(param_conf.kind.as_str())
                    .map_err(resolve)?;
                param.setup(param_conf)?;
                let mut generator = ctx
                    .create_param_generator(param_conf.init.kind.as_str())
                    .map_err(resolve)?;
                generator.setup(&param_conf.init)?;
                generator.fill(param.as_mut())?;
                params.push(param);
            }
            layers.push(layer);
        }

        let mut updater = ctx
            .create_updater(conf.updater.kind.as_str())
            .map_err(resolve)?;
        updater.setup(&conf.updater)?;
        let mut lr = ctx
            .create_lr_generator(conf.updater.learning_rate.kind.as_str())
            .map_err(resolve)?;
        lr.setup(&conf.updater.learning_rate)?;
        let mut worker = ctx
            .create_worker(conf.train_one_batch.alg.as_str())
            .map_err(resolve)?;
        worker.setup(&conf.train_one_batch)?;

        debug!(
            layers = layers.len(),
            params = params.len(),
            alg = worker.alg(),
            "Built net"
        );
        Ok(LocalNet {
            layers,
            params,
            updater,
            lr,
            worker,
        })
    }

    /// Loads param values from the checkpoint files of `point`.
    ///
    /// Files are applied in worker order, so later workers win for params
    /// present in several files. Every param must be covered.
    fn restore(params: &mut [Box<dyn Param>], point: &ResumePoint) -> TrainingResult<()> {
        let mut restored = vec![false; params.len()];
        for path in &point.files {
            let record = read_checkpoint(path)?;
            for snapshot in &record.params {
                if let Some(idx) = params.iter().position(|p| p.name() == snapshot.name) {
                    snapshot.restore(params[idx].as_mut())?;
                    restored[idx] = true;
                }
            }
        }
        if let Some(idx) = restored.iter().position(|done| !done) {
            return Err(TrainingError::Checkpoint(format!(
                "param '{}' is missing from the checkpoint at step {}",
                params[idx].name(),
                point.step
            )));
        }
        Ok(())
    }

    fn checkpoint_due(conf: &JobConfig, step: u64) -> bool {
        conf.checkpoint_frequency > 0
            && step >= conf.checkpoint_after
            && (step - conf.checkpoint_after) % conf.checkpoint_frequency == 0
    }
}

#[async_trait]
impl Trainer for LocalTrainer {
    fn id(&self) -> &'static str {
        "local"
    }

    async fn run(
        &self,
        job: &JobDescriptor,
        resume: Option<&ResumePoint>,
        progress: &dyn ProgressSink,
    ) -> TrainingResult<RunSummary> {
        let job_id = job
            .job_id()
            .ok_or_else(|| TrainingError::Trainer("job has no id".to_string()))?;
        let conf = job.job_conf();
        let layout = WorkspaceLayout::new(conf.workspace()?.to_path_buf());

        let mut net = self.build(conf)?;
        if let Some(point) = resume {
            Self::restore(&mut net.params, point)?;
        }

        let first_step = resume.map_or(0, |p| p.step + 1);
        let last_step = conf.train_steps.max(first_step).saturating_sub(1);
        progress.on_event(ProgressEvent::Started {
            job_id,
            first_step,
            total: conf.train_steps,
        });

        let mut checkpoints = Vec::new();
        for step in first_step..conf.train_steps {
            let lr = net.lr.rate(step);
            let report = net.worker.train_one_batch(StepContext {
                step,
                lr,
                params: &mut net.params,
                updater: net.updater.as_mut(),
            })?;

            if conf.display_frequency > 0 && step % conf.display_frequency == 0 {
                debug!(job_id = %job_id, step, passes = report.passes, "Step complete");
                progress.on_event(ProgressEvent::Step {
                    job_id,
                    step,
                    total: conf.train_steps,
                    lr,
                });
            }

            if Self::checkpoint_due(conf, step) {
                let record = CheckpointRecord {
                    job_id,
                    step,
                    worker: LOCAL_WORKER,
                    created_at: Utc::now(),
                    params: net
                        .params
                        .iter()
                        .map(|p| ParamSnapshot::capture(p.as_ref()))
                        .collect(),
                };
                let path = write_checkpoint(&layout, &record)?;
                progress.on_event(ProgressEvent::Checkpoint {
                    job_id,
                    step,
                    path: path.clone(),
                });
                checkpoints.push(path);
            }

            tokio::task::yield_now().await;
        }

        progress.on_event(ProgressEvent::Finished { job_id, last_step });
        info!(
            job_id = %job_id,
            layers = net.layers.len(),
            checkpoints = checkpoints.len(),
            "Local run complete"
        );
        Ok(RunSummary {
            job_id,
            first_step,
            last_step,
            checkpoints,
        })
    }
}

/// Mirrors step events into the run status before forwarding them.
struct ReportingSink {
    inner: Arc<dyn ProgressSink>,
    reporter: Arc<StatusReporter>,
}

impl ProgressSink for ReportingSink {
    fn on_event(&self, event: ProgressEvent) {
        match &event {
            ProgressEvent::Started { first_step, .. } => {
                self.reporter
                    .report(TrainerStatus::Running { step: *first_step });
            }
            ProgressEvent::Step { step, .. } | ProgressEvent::Checkpoint { step, .. } => {
                self.reporter.report(TrainerStatus::Running { step: *step });
            }
            _ => {}
        }
        self.inner.on_event(event);
    }
}

pub struct LocalLauncher {
    runtime: Handle,
    trainer: Arc<dyn Trainer>,
    progress: Arc<dyn ProgressSink>,
}

impl LocalLauncher {
    pub fn new(
        runtime: Handle,
        trainer: Arc<dyn Trainer>,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            runtime,
            trainer,
            progress,
        }
    }
}

impl RunLauncher for LocalLauncher {
    fn start_run(
        &self,
        job: &JobDescriptor,
        resume: bool,
        resume_point: Option<&ResumePoint>,
    ) -> Result<RunHandle, RunStartError> {
        let job_id: JobId = job
            .job_id()
            .ok_or_else(|| RunStartError::new(None, "job descriptor has no job id"))?;
        if resume && resume_point.is_none() {
            return Err(RunStartError::new(
                Some(job_id),
                "resume requested without a checkpoint",
            ));
        }

        let (reporter, handle) = RunHandle::channel(job_id);
        let reporter = Arc::new(reporter);
        let sink = ReportingSink {
            inner: Arc::clone(&self.progress),
            reporter: Arc::clone(&reporter),
        };
        let job = job.clone();
        let resume_point = resume_point.cloned();
        let trainer = Arc::clone(&self.trainer);

        info!(job_id = %job_id, trainer = trainer.id(), resume, "Starting run");
        self.runtime.spawn(async move {
            // A panicking trainer must still leave a terminal status behind.
            let run = tokio::spawn(async move {
                trainer.run(&job, resume_point.as_ref(), &sink).await
            });
            let status = match run.await {
                Ok(Ok(summary)) => TrainerStatus::Finished {
                    last_step: summary.last_step,
                },
                Ok(Err(e)) => {
                    error!(job_id = %job_id, error = %e, "Run failed");
                    TrainerStatus::Failed(e.to_string())
                }
                Err(e) => {
                    error!(job_id = %job_id, error = %e, "Run aborted");
                    TrainerStatus::Failed(format!("run aborted: {e}"))
                }
            };
            reporter.report(status);
        });

        Ok(handle)
    }
}

impl std::fmt::Debug for LocalLauncher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalLauncher")
            .field("trainer", &self.trainer.id())
            .finish_non_exhaustive()
    }
}
