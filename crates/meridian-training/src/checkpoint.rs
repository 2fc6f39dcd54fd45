use crate::error::{TrainingError, TrainingResult};
use crate::job::JobId;
use crate::layout::{WorkspaceLayout, parse_checkpoint_file_name};
use chrono::{DateTime, Utc};
use meridian_abstraction::Param;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Values of one param at checkpoint time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSnapshot {
    pub name: String,
    pub shape: Vec<usize>,
    pub version: u64,
    pub data: Vec<f32>,
}

impl ParamSnapshot {
    pub fn capture(param: &dyn Param) -> Self {
        Self {
            name: param.name().to_string(),
            shape: param.shape().to_vec(),
            version: param.version(),
            data: param.data().to_vec(),
        }
    }

    /// Copies the snapshot back into `param`.
    pub fn restore(&self, param: &mut dyn Param) -> TrainingResult<()> {
        if param.size() != self.data.len() {
            return Err(TrainingError::Checkpoint(format!(
                "param '{}' holds {} values but the checkpoint has {}",
                self.name,
                param.size(),
                self.data.len()
            )));
        }
        param.data_mut().copy_from_slice(&self.data);
        param.set_version(self.version);
        Ok(())
    }
}

/// Contents of one `step<N>-worker<M>.json` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub job_id: JobId,
    pub step: u64,
    pub worker: u32,
    pub created_at: DateTime<Utc>,
    pub params: Vec<ParamSnapshot>,
}

/// Latest complete checkpoint of a workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumePoint {
    /// Step at which the checkpoint was taken; training continues after it.
    pub step: u64,
    /// One file per worker that wrote at `step`, ordered by worker index.
    pub files: Vec<PathBuf>,
}

pub fn write_checkpoint(
    layout: &WorkspaceLayout,
    record: &CheckpointRecord,
) -> TrainingResult<PathBuf> {
    layout.ensure_dirs()?;
    let path = layout.checkpoint_path(record.step, record.worker);
    let bytes = serde_json::to_vec_pretty(record)?;
    std::fs::write(&path, bytes)?;
    Ok(path)
}

pub fn read_checkpoint(path: &Path) -> TrainingResult<CheckpointRecord> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice::<CheckpointRecord>(&bytes)?)
}

/// Finds the highest checkpointed step in the workspace.
///
/// Returns `Ok(None)` if the checkpoint directory is missing or holds no
/// checkpoint files.
pub fn find_resume_point(layout: &WorkspaceLayout) -> TrainingResult<Option<ResumePoint>> {
    let dir = match std::fs::read_dir(layout.checkpoint_dir()) {
        Ok(d) => d,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut found: Vec<(u64, u32, PathBuf)> = Vec::new();
    for entry in dir {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some((step, worker)) = parse_checkpoint_file_name(name) {
            found.push((step, worker, path));
        }
    }

    let Some(latest) = found.iter().map(|(step, _, _)| *step).max() else {
        return Ok(None);
    };
    found.retain(|(step, _, _)| *step == latest);
    found.sort_by_key(|(_, worker, _)| *worker);

    let files = found.into_iter().map(|(_, _, path)| path).collect();
    Ok(Some(ResumePoint {
        step: latest,
        files,
    }))
}
