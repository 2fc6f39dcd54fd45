use crate::error::TrainingResult;
use std::path::{Path, PathBuf};

/// Filesystem layout of a job workspace.
///
/// Checkpoints are written as `<workspace>/checkpoint/step<N>-worker<M>.json`.
#[derive(Debug, Clone)]
pub struct WorkspaceLayout {
    root: PathBuf,
}

impl WorkspaceLayout {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn checkpoint_dir(&self) -> PathBuf {
        self.root.join("checkpoint")
    }

    #[must_use]
    pub fn checkpoint_path(&self, step: u64, worker: u32) -> PathBuf {
        let name = checkpoint_file_name(step, worker);
        self.checkpoint_dir().join(name)
    }

    pub fn ensure_dirs(&self) -> TrainingResult<()> {
        std::fs::create_dir_all(self.checkpoint_dir())?;
        Ok(())
    }
}

#[must_use]
pub fn checkpoint_file_name(step: u64, worker: u32) -> String {
    format!("step{step}-worker{worker}.json")
}

/// Parses `step<N>-worker<M>.json` into `(N, M)`.
#[must_use]
pub fn parse_checkpoint_file_name(name: &str) -> Option<(u64, u32)> {
    let stem = name.strip_suffix(".json")?;
    let (step, worker) = stem.strip_prefix("step")?.split_once("-worker")?;
    Some((step.parse().ok()?, worker.parse().ok()?))
}
