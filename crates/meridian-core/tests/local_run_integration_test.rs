//! Bootstrap, admit and run a job on the local launcher.

use meridian_core::{
    BootArgs, Bootstrapper, JobAdmission, LocalCoordinator, LocalLauncher, LocalTrainer,
};
use meridian_training::{
    JobState, TracingProgressSink, TrainerStatus, WorkspaceLayout, find_resume_point,
};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn job_toml(workspace: &Path) -> String {
    format!(
        r#"
name = "mlp"
train_steps = 8
checkpoint_after = 3
checkpoint_frequency = 4
display_frequency = 2

[cluster]
workspace = "{}"

[[neuralnet.layers]]
name = "data"
type = "store-input"

[[neuralnet.layers]]
name = "fc1"
type = "inner-product"
srclayers = ["data"]
num_output = 16

[[neuralnet.layers.params]]
name = "fc1-w"
shape = [16, 8]

[neuralnet.layers.params.init]
type = "uniform-sqrt-fan-in"
seed = 11

[[neuralnet.layers.params]]
name = "fc1-b"
shape = [16]

[neuralnet.layers.params.init]
type = "constant"
value = 0.0

[[neuralnet.layers]]
name = "loss"
type = "softmax-loss"
srclayers = ["fc1"]

[updater]
type = "sgd"
momentum = 0.9
weight_decay = 0.0005

[updater.learning_rate]
type = "step"
base_lr = 0.1
gamma = 0.5
change_freq = 4

[train_one_batch]
alg = "bp"
"#,
        workspace.display()
    )
}

fn boot_args(temp: &TempDir) -> BootArgs {
    let workspace = temp.path().join("workspace");
    let conf = temp.path().join("job.toml");
    std::fs::write(&conf, job_toml(&workspace)).unwrap();
    let system = temp.path().join("meridian.toml");
    std::fs::write(&system, "[log]\nlevel = \"info\"\n").unwrap();
    BootArgs {
        job: None,
        conf,
        system_conf: Some(system),
        log_level: None,
    }
}

#[tokio::test]
async fn test_run_then_resume() {
    let temp = TempDir::new().unwrap();
    let args = boot_args(&temp);
    let state_dir = temp.path().join("coordinator");

    let boot = Bootstrapper::standard().init_with(&args).unwrap();
    let launcher = LocalLauncher::new(
        tokio::runtime::Handle::current(),
        Arc::new(LocalTrainer::new(boot.context.clone())),
        Arc::new(TracingProgressSink),
    );
    let admission = JobAdmission::new(
        boot.context.clone(),
        Arc::new(LocalCoordinator::open(&state_dir).unwrap()),
        Arc::new(launcher),
    );

    let job = admission.submit(false, boot.descriptor).unwrap();
    assert_eq!(job.state(), JobState::Running);
    let job_id = job.job_id();
    assert_eq!(
        job.into_handle().wait().await,
        TrainerStatus::Finished { last_step: 7 }
    );

    let layout = WorkspaceLayout::new(temp.path().join("workspace"));
    assert_eq!(find_resume_point(&layout).unwrap().unwrap().step, 7);

    // a fresh process resumes the same job from its checkpoint
    let boot = Bootstrapper::standard().init_with(&args).unwrap();
    let admission = JobAdmission::new(
        boot.context.clone(),
        Arc::new(LocalCoordinator::open(&state_dir).unwrap()),
        Arc::new(LocalLauncher::new(
            tokio::runtime::Handle::current(),
            Arc::new(LocalTrainer::new(boot.context.clone())),
            Arc::new(TracingProgressSink),
        )),
    );
    let resumed = admission.submit(true, boot.descriptor).unwrap();
    assert_eq!(resumed.job_id(), job_id);
    assert_eq!(resumed.resume_point().map(|p| p.step), Some(7));
    assert_eq!(
        resumed.into_handle().wait().await,
        TrainerStatus::Finished { last_step: 7 }
    );
}
