//! Submit command implementation.

use crate::commands::types::SubmitCommand;
use anyhow::{Context, Result, bail};
use colored::Colorize;
use meridian_core::{Bootstrapper, JobAdmission, LocalCoordinator, LocalLauncher, LocalTrainer};
use meridian_training::{TracingProgressSink, TrainerStatus};
use serde_json::json;
use std::sync::Arc;

pub async fn execute(command: SubmitCommand) -> Result<()> {
    let boot = Bootstrapper::standard()
        .init_with(&command.boot)
        .context("Bootstrap failed")?;

    let coordinator = LocalCoordinator::from_settings(&boot.context.system().coordinator)
        .context("Failed to open coordination state")?;
    let launcher = LocalLauncher::new(
        tokio::runtime::Handle::current(),
        Arc::new(LocalTrainer::new(boot.context.clone())),
        Arc::new(TracingProgressSink),
    );
    let admission = JobAdmission::new(
        boot.context.clone(),
        Arc::new(coordinator),
        Arc::new(launcher),
    );

    let job = admission
        .submit(command.resume, boot.descriptor)
        .context("Job submission rejected")?;
    let job_id = job.job_id();
    let name = job.job_conf().name.clone();
    let resumed_from = job.resume_point().map(|p| p.step);

    if !command.json {
        println!("{} job {} ({})", "Submitted".green().bold(), job_id, name);
        if let Some(step) = resumed_from {
            println!("  {}", format!("resuming after step {step}").dimmed());
        }
    }

    let status = job.into_handle().wait().await;

    if command.json {
        let (state, last_step, error) = match &status {
            TrainerStatus::Finished { last_step } => ("finished", Some(*last_step), None),
            TrainerStatus::Failed(reason) => ("failed", None, Some(reason.clone())),
            TrainerStatus::Running { step } => ("running", Some(*step), None),
            TrainerStatus::Preparing => ("preparing", None, None),
        };
        let out = json!({
            "job_id": job_id.0,
            "name": name,
            "resumed_from": resumed_from,
            "status": state,
            "last_step": last_step,
            "error": error,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    }

    match status {
        TrainerStatus::Finished { last_step } => {
            if !command.json {
                println!("{} at step {}", "Finished".green().bold(), last_step);
            }
            Ok(())
        }
        TrainerStatus::Failed(reason) => bail!("Run for job {job_id} failed: {reason}"),
        other => bail!("Run for job {job_id} stopped without finishing ({other:?})"),
    }
}
