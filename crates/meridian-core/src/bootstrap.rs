//! Process start-up.
//!
//! [`Bootstrapper::init`] runs once per process, in this order:
//! 1. Load the system configuration and initialize logging
//! 2. Parse the job id and job configuration path from the arguments
//! 3. Load the job configuration into a [`JobDescriptor`]
//! 4. Install the built-in implementations of all six families
//!
//! Each step fails independently. Running `init` again builds a fresh
//! [`AppContext`]; installing the built-ins twice into the same table is a
//! [`BootstrapError::BuiltinCollision`].

use crate::builtins::BuiltinSet;
use crate::config::SystemConfig;
use crate::context::AppContext;
use crate::error::{BootstrapError, BootstrapResult};
use crate::logging;
use crate::registry::RegistryTable;
use clap::{Args, Parser};
use meridian_training::{JobConfig, JobDescriptor, JobId};
use std::ffi::OsString;
use std::path::PathBuf;
use tracing::{error, info};

// Also flattened into `meridian submit`.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct BootArgs {
    /// Job id from the coordination service; a new id is requested when omitted
    #[arg(short, long = "job", value_name = "ID")]
    pub job: Option<JobId>,

    /// Path to the job configuration document
    #[arg(short, long = "conf", value_name = "PATH")]
    pub conf: PathBuf,

    /// Path to the system configuration file
    #[arg(long = "system-conf", value_name = "PATH")]
    pub system_conf: Option<PathBuf>,

    /// Log filter, overrides MERIDIAN_LOG and the system configuration
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,
}

#[derive(Parser, Debug)]
#[command(name = "meridian", about = "Bootstrap a Meridian training job")]
struct BootCommand {
    #[command(flatten)]
    args: BootArgs,
}

impl BootArgs {
    /// Parses process arguments, including the program name.
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        BootCommand::try_parse_from(args).map(|command| command.args)
    }
}

/// Output of a successful bootstrap.
#[derive(Debug)]
pub struct Bootstrapped {
    pub context: AppContext,
    pub descriptor: JobDescriptor,
}

#[derive(Debug)]
pub struct Bootstrapper {
    builtins: BuiltinSet,
}

impl Bootstrapper {
    pub fn new(builtins: BuiltinSet) -> Self {
        Self { builtins }
    }

    /// Bootstrapper installing every built-in shipped with Meridian.
    pub fn standard() -> Self {
        Self::new(BuiltinSet::standard())
    }

    /// Parses `args` (including the program name) and bootstraps.
    ///
    /// # Errors
    /// Returns `BootstrapError::Arguments` for unparseable arguments and
    /// otherwise whatever [`Bootstrapper::init_with`] returns.
    pub fn init<I, T>(&self, args: I) -> BootstrapResult<Bootstrapped>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let args = BootArgs::try_parse_from(args)
            .map_err(|e| BootstrapError::Arguments(e.to_string()))?;
        self.init_with(&args)
    }

    /// Bootstraps from already-parsed arguments.
    pub fn init_with(&self, args: &BootArgs) -> BootstrapResult<Bootstrapped> {
        let system = SystemConfig::discover(args.system_conf.as_deref())?;
        logging::init(&system.log, args.log_level.as_deref())?;
        info!(conf = %args.conf.display(), job_id = ?args.job, "Bootstrapping");

        let config = JobConfig::load(&args.conf).map_err(|source| BootstrapError::JobConfig {
            path: args.conf.clone(),
            source,
        })?;
        let descriptor = JobDescriptor::new(args.job, config);

        let context = AppContext::new(system);
        let installed = self.register_builtins(context.registries())?;
        info!(job = %descriptor.job_conf().name, builtins = installed, "Bootstrap complete");

        Ok(Bootstrapped {
            context,
            descriptor,
        })
    }

    /// Installs the built-in set into `table`.
    ///
    /// # Errors
    /// Any collision is fatal: it means the built-in set is inconsistent or
    /// the table was already bootstrapped.
    pub fn register_builtins(&self, table: &RegistryTable) -> BootstrapResult<usize> {
        self.builtins.install(table).map_err(|(family, id, source)| {
            error!(family, identifier = %id, "Built-in registration collided; aborting startup");
            BootstrapError::BuiltinCollision {
                family,
                identifier: id.to_string(),
                source,
            }
        })
    }
}

impl Default for Bootstrapper {
    fn default() -> Self {
        Self::standard()
    }
}
