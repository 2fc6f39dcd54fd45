use crate::checkpoint::ResumePoint;
use crate::error::{RunStartError, TrainingResult};
use crate::job::{JobDescriptor, JobId};
use crate::progress::ProgressSink;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrainerStatus {
    Preparing,
    Running { step: u64 },
    Finished { last_step: u64 },
    Failed(String),
}

impl TrainerStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished { .. } | Self::Failed(_))
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub job_id: JobId,
    pub first_step: u64,
    pub last_step: u64,
    pub checkpoints: Vec<PathBuf>,
}

#[async_trait]
pub trait Trainer: Send + Sync {
    fn id(&self) -> &'static str;

    /// Runs the job to completion.
    ///
    /// With a resume point, training continues after `resume.step` from the
    /// checkpointed param values.
    async fn run(
        &self,
        job: &JobDescriptor,
        resume: Option<&ResumePoint>,
        progress: &dyn ProgressSink,
    ) -> TrainingResult<RunSummary>;
}

/// Starts distributed runs without waiting for them to finish.
pub trait RunLauncher: Send + Sync {
    /// # Errors
    /// Returns `RunStartError` if the run could not be started. Failures
    /// after the start are reported through the returned handle.
    fn start_run(
        &self,
        job: &JobDescriptor,
        resume: bool,
        resume_point: Option<&ResumePoint>,
    ) -> Result<RunHandle, RunStartError>;
}

/// Publishing side of a [`RunHandle`], held by whoever executes the run.
#[derive(Debug)]
pub struct StatusReporter {
    tx: watch::Sender<TrainerStatus>,
}

impl StatusReporter {
    pub fn report(&self, status: TrainerStatus) {
        // No receivers left means nobody is watching the run any more.
        let _ = self.tx.send(status);
    }
}

/// Observes a started run.
#[derive(Debug, Clone)]
pub struct RunHandle {
    job_id: JobId,
    rx: watch::Receiver<TrainerStatus>,
}

impl RunHandle {
    /// Creates a handle in the `Preparing` state along with its reporter.
    pub fn channel(job_id: JobId) -> (StatusReporter, Self) {
        let (tx, rx) = watch::channel(TrainerStatus::Preparing);
        (StatusReporter { tx }, Self { job_id, rx })
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn status(&self) -> TrainerStatus {
        self.rx.borrow().clone()
    }

    /// Waits until the run finishes or fails.
    ///
    /// If the reporter is dropped early the last reported status is returned.
    pub async fn wait(mut self) -> TrainerStatus {
        loop {
            let current = self.rx.borrow_and_update().clone();
            if current.is_terminal() {
                return current;
            }
            if self.rx.changed().await.is_err() {
                return self.rx.borrow().clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_handle_wait_returns_terminal_status() {
        let (reporter, handle) = RunHandle::channel(JobId(3));
        assert_eq!(handle.status(), TrainerStatus::Preparing);

        let task = tokio::spawn(async move {
            reporter.report(TrainerStatus::Running { step: 1 });
            reporter.report(TrainerStatus::Finished { last_step: 4 });
        });

        assert_eq!(
            handle.clone().wait().await,
            TrainerStatus::Finished { last_step: 4 }
        );
        task.await.unwrap();
        assert_eq!(handle.job_id(), JobId(3));
    }

    #[tokio::test]
    async fn test_run_handle_wait_when_reporter_dropped() {
        let (reporter, handle) = RunHandle::channel(JobId(1));
        reporter.report(TrainerStatus::Running { step: 2 });
        drop(reporter);
        assert_eq!(handle.wait().await, TrainerStatus::Running { step: 2 });
    }
}
