use crate::job::JobId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Started {
        job_id: JobId,
        first_step: u64,
        total: u64,
    },
    Message {
        job_id: JobId,
        message: String,
    },
    Step {
        job_id: JobId,
        step: u64,
        total: u64,
        lr: f32,
    },
    Checkpoint {
        job_id: JobId,
        step: u64,
        path: PathBuf,
    },
    Finished {
        job_id: JobId,
        last_step: u64,
    },
}

pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: ProgressEvent);
}

/// Forwards progress events to the `tracing` subscriber.
#[derive(Debug, Default)]
pub struct TracingProgressSink;

impl ProgressSink for TracingProgressSink {
    fn on_event(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Started {
                job_id,
                first_step,
                total,
            } => {
                tracing::info!(job_id = %job_id, first_step, total, "run started");
            }
            ProgressEvent::Message { job_id, message } => {
                tracing::info!(job_id = %job_id, "{message}");
            }
            ProgressEvent::Step {
                job_id,
                step,
                total,
                lr,
            } => {
                tracing::info!(job_id = %job_id, step, total, lr, "step");
            }
            ProgressEvent::Checkpoint { job_id, step, path } => {
                tracing::info!(
                    job_id = %job_id,
                    step,
                    path = %path.display(),
                    "checkpoint written"
                );
            }
            ProgressEvent::Finished { job_id, last_step } => {
                tracing::info!(job_id = %job_id, last_step, "run finished");
            }
        }
    }
}
