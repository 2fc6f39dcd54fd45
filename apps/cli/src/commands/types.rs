//! Command type definitions shared between main.rs and the command modules.

use clap::Args;
use meridian_core::BootArgs;

#[derive(Args, Debug, Clone)]
pub struct SubmitCommand {
    #[command(flatten)]
    pub boot: BootArgs,

    /// Resume from the latest checkpoint in the job workspace
    #[arg(long)]
    pub resume: bool,

    /// Output the final status as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct TypesCommand {
    /// Concept family (layer, param, param-generator, lr-generator, updater, worker)
    pub family: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
