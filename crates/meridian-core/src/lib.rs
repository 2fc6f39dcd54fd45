//! Meridian Core
//!
//! Bootstrap and extensibility layer of the Meridian training system:
//! - Per-family component registries ([`registry`])
//! - Built-in implementations of the six concept families ([`builtins`])
//! - Process start-up and the application context ([`bootstrap`], [`context`])
//! - Job admission against the coordination service ([`admission`], [`coordination`])
//! - An in-process trainer and launcher ([`launcher`])

pub mod admission;
pub mod bootstrap;
pub mod builtins;
pub mod config;
pub mod context;
pub mod coordination;
pub mod error;
pub mod launcher;
pub mod logging;
pub mod registry;

pub use admission::{AdmittedJob, JobAdmission};
pub use bootstrap::{BootArgs, Bootstrapped, Bootstrapper};
pub use builtins::BuiltinSet;
pub use config::{CoordinatorSettings, LogFormat, LogSettings, SystemConfig, SystemConfigError};
pub use context::AppContext;
pub use coordination::{
    CoordinationError, CoordinationResult, Coordinator, JobIdGrant, JobIdRequest, JobRecord,
    JobStatus, LocalCoordinator,
};
pub use error::{AdmissionError, AdmissionResult, BootstrapError, BootstrapResult};
pub use launcher::{LocalLauncher, LocalTrainer};
pub use registry::{Factory, RegistryError, RegistryResult, RegistryTable, TypeRegistry};
