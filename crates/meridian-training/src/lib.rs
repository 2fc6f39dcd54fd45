//! Meridian Training
//!
//! Job-level primitives shared by admission and the training runtime:
//! - The job configuration document and cluster topology (`JobConfig`, `ClusterConfig`)
//! - Job identity and lifecycle (`JobId`, `JobDescriptor`, `JobState`)
//! - Workspace layout, checkpoint files and resume points
//! - The seams to the worker/trainer subsystem (`Trainer`, `RunLauncher`)

pub mod checkpoint;
pub mod error;
pub mod job;
pub mod layout;
pub mod progress;
pub mod trainer;

pub use checkpoint::{
    CheckpointRecord, ParamSnapshot, ResumePoint, find_resume_point, read_checkpoint,
    write_checkpoint,
};
pub use error::{RunStartError, TrainingError, TrainingResult};
pub use job::{ClusterConfig, ComponentRefs, JobConfig, JobDescriptor, JobId, JobState, NetConfig};
pub use layout::WorkspaceLayout;
pub use progress::{ProgressEvent, ProgressSink, TracingProgressSink};
pub use trainer::{RunHandle, RunLauncher, RunSummary, StatusReporter, Trainer, TrainerStatus};
