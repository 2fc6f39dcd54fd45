//! Meridian CLI - bootstrap and submit training jobs
//!
//! Provides the `meridian` command: `submit` bootstraps a job from its
//! configuration document, admits it through the coordination service and
//! runs it on the local launcher; `types` lists the registered component
//! identifiers.

mod commands;

use clap::{Parser, Subcommand};
use commands::types::{SubmitCommand, TypesCommand};

#[derive(Parser, Debug)]
#[command(
    name = "meridian",
    author,
    version,
    about = "Meridian - distributed training job bootstrap"
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Bootstrap a job and submit it to the cluster
    ///
    /// Loads the job configuration, installs the built-in components,
    /// obtains a job id from the coordination service and starts the run.
    /// Waits for the run to finish.
    Submit(SubmitCommand),

    /// List registered component identifiers
    Types(TypesCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Submit(command) => commands::submit::execute(command).await,
        Command::Types(command) => commands::list_types::execute(&command),
    }
}
