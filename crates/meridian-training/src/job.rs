use crate::error::{TrainingError, TrainingResult};
use meridian_abstraction::{LayerConf, TypeKey, UpdaterConf, WorkerConf};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Identifier for a training job, assigned by the coordination service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for JobId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// Worker/server topology of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    #[serde(default = "one")]
    pub nworker_groups: u32,
    #[serde(default = "one")]
    pub nserver_groups: u32,
    #[serde(default = "one")]
    pub nworkers_per_group: u32,
    #[serde(default = "one")]
    pub nservers_per_group: u32,
    /// Run servers and workers in separate processes.
    #[serde(default)]
    pub server_worker_separate: bool,
    /// Directory holding checkpoints and other per-job output.
    #[serde(default)]
    pub workspace: PathBuf,
}

impl ClusterConfig {
    #[must_use]
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            nworker_groups: 1,
            nserver_groups: 1,
            nworkers_per_group: 1,
            nservers_per_group: 1,
            server_worker_separate: false,
            workspace: workspace.into(),
        }
    }

    /// Total number of worker threads across all groups.
    pub fn total_workers(&self) -> u32 {
        self.nworker_groups * self.nworkers_per_group
    }

    pub fn validate(&self) -> TrainingResult<()> {
        if self.workspace.as_os_str().is_empty() {
            return Err(invalid("cluster.workspace is required"));
        }
        if self.nworker_groups == 0 || self.nworkers_per_group == 0 {
            return Err(TrainingError::InvalidConfig(
                "cluster needs at least one worker group with one worker".to_string(),
            ));
        }
        match (self.nserver_groups, self.nservers_per_group) {
            (0, _) => {}
            (_, 0) => {
                return Err(TrainingError::InvalidConfig(
                    "cluster.nservers_per_group must be >= 1 when server groups exist".to_string(),
                ));
            }
            (servers, _) => {
                if self.nworker_groups % servers != 0 {
                    return Err(TrainingError::InvalidConfig(format!(
                        "cluster.nworker_groups ({}) must be a multiple of nserver_groups ({})",
                        self.nworker_groups, servers
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetConfig {
    #[serde(default)]
    pub layers: Vec<LayerConf>,
}

/// The job configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    pub name: String,
    #[serde(default = "default_train_steps")]
    pub train_steps: u64,
    /// First step at which checkpoints may be written.
    #[serde(default)]
    pub checkpoint_after: u64,
    /// Steps between checkpoints; 0 disables checkpointing.
    #[serde(default)]
    pub checkpoint_frequency: u64,
    /// Steps between progress messages; 0 disables them.
    #[serde(default)]
    pub display_frequency: u64,
    #[serde(default)]
    pub cluster: Option<ClusterConfig>,
    #[serde(default)]
    pub neuralnet: NetConfig,
    #[serde(default)]
    pub updater: UpdaterConf,
    #[serde(default)]
    pub train_one_batch: WorkerConf,
}

/// Identifiers a job configuration expects to find in the registries.
#[derive(Debug, Default)]
pub struct ComponentRefs<'a> {
    pub layers: Vec<&'a TypeKey>,
    pub params: Vec<&'a TypeKey>,
    pub param_generators: Vec<&'a TypeKey>,
    pub lr_generator: Option<&'a TypeKey>,
    pub updater: Option<&'a TypeKey>,
    pub worker: Option<&'a TypeKey>,
}

impl JobConfig {
    #[must_use]
    pub fn new(name: impl Into<String>, cluster: ClusterConfig) -> Self {
        Self {
            name: name.into(),
            train_steps: default_train_steps(),
            checkpoint_after: 0,
            checkpoint_frequency: 0,
            display_frequency: 0,
            cluster: Some(cluster),
            neuralnet: NetConfig::default(),
            updater: UpdaterConf::default(),
            train_one_batch: WorkerConf::default(),
        }
    }

    pub fn from_toml_str(content: &str) -> TrainingResult<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> TrainingResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Cluster block, which `validate` guarantees is present.
    pub fn cluster(&self) -> TrainingResult<&ClusterConfig> {
        self.cluster
            .as_ref()
            .ok_or_else(|| invalid("cluster configuration is missing"))
    }

    pub fn workspace(&self) -> TrainingResult<&Path> {
        Ok(self.cluster()?.workspace.as_path())
    }

    /// Structural validation; identifier resolution is left to the registries.
    pub fn validate(&self) -> TrainingResult<()> {
        if self.name.trim().is_empty() {
            return Err(invalid("name is required"));
        }
        if self.train_steps == 0 {
            return Err(invalid("train_steps must be >= 1"));
        }
        self.cluster()?.validate()?;

        if self.neuralnet.layers.is_empty() {
            return Err(invalid("neuralnet has no layers"));
        }

        let mut layer_names = HashSet::new();
        let mut param_names = HashSet::new();
        for layer in &self.neuralnet.layers {
            if layer.name.trim().is_empty() {
                return Err(invalid("every layer needs a name"));
            }
            for src in &layer.srclayers {
                if !layer_names.contains(src.as_str()) {
                    return Err(TrainingError::InvalidConfig(format!(
                        "layer '{}' reads from '{}', which is not declared before it",
                        layer.name, src
                    )));
                }
            }
            if !layer_names.insert(layer.name.as_str()) {
                return Err(invalid(format!("duplicate layer name '{}'", layer.name)));
            }
            for param in &layer.params {
                if !param_names.insert(param.name.as_str()) {
                    return Err(TrainingError::InvalidConfig(format!(
                        "duplicate param name '{}'",
                        param.name
                    )));
                }
                if param.shape.is_empty() || param.shape.contains(&0) {
                    return Err(TrainingError::InvalidConfig(format!(
                        "param '{}' has an empty shape {:?}",
                        param.name, param.shape
                    )));
                }
            }
        }
        Ok(())
    }

    /// Collects every component identifier the job refers to.
    pub fn component_refs(&self) -> ComponentRefs<'_> {
        let mut refs = ComponentRefs {
            lr_generator: Some(&self.updater.learning_rate.kind),
            updater: Some(&self.updater.kind),
            worker: Some(&self.train_one_batch.alg),
            ..ComponentRefs::default()
        };
        for layer in &self.neuralnet.layers {
            refs.layers.push(&layer.kind);
            for param in &layer.params {
                refs.params.push(&param.kind);
                refs.param_generators.push(&param.init.kind);
            }
        }
        refs
    }
}

/// Lifecycle of a submitted job as seen by admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Unsubmitted,
    Admitted,
    Running,
    Rejected,
}

impl JobState {
    #[must_use]
    pub fn can_transition_to(self, next: JobState) -> bool {
        matches!(
            (self, next),
            (Self::Unsubmitted, Self::Admitted | Self::Rejected)
                | (Self::Admitted, Self::Running | Self::Rejected)
        )
    }

    pub fn transition(self, next: JobState) -> TrainingResult<JobState> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TrainingError::IllegalTransition {
                from: self,
                to: next,
            })
        }
    }
}

/// Job identifier, configuration and resume flag as handed to admission.
///
/// The configuration is shared read-only once the descriptor is built.
#[derive(Debug, Clone)]
pub struct JobDescriptor {
    job_id: Option<JobId>,
    config: Arc<JobConfig>,
    resume: bool,
}

impl JobDescriptor {
    #[must_use]
    pub fn new(job_id: Option<JobId>, config: JobConfig) -> Self {
        Self {
            job_id,
            config: Arc::new(config),
            resume: false,
        }
    }

    /// Job id, if one was passed in or has been assigned.
    pub fn job_id(&self) -> Option<JobId> {
        self.job_id
    }

    pub fn job_conf(&self) -> &JobConfig {
        &self.config
    }

    pub fn shared_conf(&self) -> Arc<JobConfig> {
        Arc::clone(&self.config)
    }

    pub fn resume(&self) -> bool {
        self.resume
    }

    /// Binds the coordination-service id and the resume flag.
    ///
    /// # Errors
    /// Fails if the descriptor already carries a different job id.
    pub fn bind(mut self, job_id: JobId, resume: bool) -> TrainingResult<Self> {
        match self.job_id {
            Some(existing) if existing != job_id => Err(TrainingError::InvalidConfig(format!(
                "job id {existing} cannot be rebound to {job_id}"
            ))),
            _ => {
                self.job_id = Some(job_id);
                self.resume = resume;
                Ok(self)
            }
        }
    }
}

const fn one() -> u32 {
    1
}

const fn default_train_steps() -> u64 {
    100
}

fn invalid(reason: impl Into<String>) -> TrainingError {
    TrainingError::InvalidConfig(reason.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_abstraction::ParamConf;

    fn sample_config() -> JobConfig {
        let mut config = JobConfig::new("mnist-mlp", ClusterConfig::new("/tmp/ws"));
        let data = LayerConf::new("data", "store-input");
        config.neuralnet.layers.push(data);
        let mut fc = LayerConf::new("fc1", "inner-product")
            .with_param(ParamConf::new("w1", vec![784, 10]))
            .with_param(ParamConf::new("b1", vec![10]));
        fc.srclayers.push("data".to_string());
        config.neuralnet.layers.push(fc);
        config
    }

    #[test]
    fn test_job_config_validate_accepts_sample() {
        sample_config().validate().unwrap();
    }

    #[test]
    fn test_job_config_validate_requires_cluster() {
        let mut config = sample_config();
        config.cluster = None;
        assert!(matches!(
            config.validate(),
            Err(TrainingError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_job_config_rejects_unknown_srclayer() {
        let mut config = sample_config();
        config.neuralnet.layers[1].srclayers = vec!["missing".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cluster_group_ratio() {
        let mut cluster = ClusterConfig::new("/tmp/ws");
        cluster.nworker_groups = 3;
        cluster.nserver_groups = 2;
        assert!(cluster.validate().is_err());

        cluster.nserver_groups = 0;
        cluster.nservers_per_group = 0;
        cluster.validate().unwrap();
    }

    #[test]
    fn test_component_refs_cover_all_families() {
        let config = sample_config();
        let refs = config.component_refs();
        assert_eq!(refs.layers.len(), 2);
        assert_eq!(refs.params.len(), 2);
        assert_eq!(refs.param_generators.len(), 2);
        assert_eq!(refs.updater.map(TypeKey::as_str), Some("sgd"));
        assert_eq!(refs.lr_generator.map(TypeKey::as_str), Some("fixed"));
        assert_eq!(refs.worker.map(TypeKey::as_str), Some("bp"));
    }

    #[test]
    fn test_job_state_transitions() {
        assert!(JobState::Unsubmitted.can_transition_to(JobState::Admitted));
        assert!(JobState::Admitted.can_transition_to(JobState::Running));
        assert!(JobState::Unsubmitted.can_transition_to(JobState::Rejected));
        assert!(!JobState::Rejected.can_transition_to(JobState::Unsubmitted));
        assert!(!JobState::Running.can_transition_to(JobState::Unsubmitted));
        assert!(JobState::Running.transition(JobState::Admitted).is_err());
    }

    #[test]
    fn test_descriptor_job_id_is_immutable_once_bound() {
        let descriptor = JobDescriptor::new(Some(JobId(7)), sample_config());
        let bound = descriptor.clone().bind(JobId(7), true).unwrap();
        assert_eq!(bound.job_id(), Some(JobId(7)));
        assert!(bound.resume());
        assert!(descriptor.bind(JobId(8), false).is_err());
    }

    #[test]
    fn test_job_config_from_toml() {
        let config = JobConfig::from_toml_str(
            r#"
            name = "cifar"
            train_steps = 20
            checkpoint_frequency = 5

            [cluster]
            workspace = "/tmp/cifar"
            nworker_groups = 2

            [[neuralnet.layers]]
            name = "conv1"
            type = "convolution"
            kernel = 5

            [updater]
            type = "sgd"
            momentum = 0.9
            [updater.learning_rate]
            type = "step"
            base_lr = 0.001
            gamma = 0.1
            change_freq = 60

            [train_one_batch]
            alg = "bp"
            "#,
        )
        .unwrap();

        assert_eq!(config.train_steps, 20);
        assert_eq!(config.cluster().unwrap().nworker_groups, 2);
        assert_eq!(config.cluster().unwrap().nservers_per_group, 1);
        assert_eq!(config.updater.learning_rate.kind.as_str(), "step");
        config.validate().unwrap();
    }
}
