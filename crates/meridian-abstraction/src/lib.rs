//! Component abstraction layer for Meridian.
//!
//! This crate defines the six pluggable concept families of a training job
//! (layers, params, param generators, learning-rate generators, updaters and
//! workers), the identifiers used to select their implementations, and the
//! configuration records handed to them.

pub mod conf;
pub mod kinds;

pub use conf::{LayerConf, LrConf, ParamConf, ParamGenConf, UpdaterConf, WorkerConf};
pub use kinds::{
    LayerKind, LrKind, ParamGenKind, ParamKind, TypeKey, UnknownKind, UpdaterKind, WorkerKind,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Represents an error raised by a component while it is set up or used.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ComponentError {
    /// The configuration handed to `setup` is unusable.
    #[error("invalid {component} configuration: {reason}")]
    InvalidConf {
        /// Component name or identifier.
        component: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A gradient or buffer does not match the parameter it targets.
    #[error("shape mismatch for param '{param}': expected {expected} values, got {actual}")]
    ShapeMismatch {
        /// Param name.
        param: String,
        /// Number of values the param holds.
        expected: usize,
        /// Number of values supplied.
        actual: usize,
    },

    /// Other unexpected errors.
    #[error("component error: {0}")]
    Other(String),
}

impl ComponentError {
    pub fn invalid_conf(component: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConf {
            component: component.into(),
            reason: reason.into(),
        }
    }
}

/// Result alias used by component methods.
pub type ComponentResult<T> = std::result::Result<T, ComponentError>;

/// Names a concept family so registries can report which family an
/// identifier belongs to.
///
/// Implemented for the trait object type of each family, e.g. `dyn Layer`.
pub trait ConceptFamily: 'static {
    /// Short family name used in logs and errors.
    const NAME: &'static str;
}

/// A computation layer of the neural net.
///
/// Layer math lives in the external runtime; implementations here carry the
/// configuration and declare the params they own.
pub trait Layer: Send + Sync {
    /// Configures the layer from its block of the job configuration.
    ///
    /// # Errors
    /// Returns `ComponentError::InvalidConf` if required knobs are missing.
    fn setup(&mut self, conf: &LayerConf) -> ComponentResult<()>;

    /// Identifier of the implementation (e.g. `"convolution"`).
    fn kind(&self) -> &str;

    /// Layer instance name from the configuration.
    fn name(&self) -> &str;

    /// Params owned by this layer.
    fn param_confs(&self) -> &[ParamConf];
}

/// A parameter container, e.g. a weight matrix or bias vector.
pub trait Param: Send + Sync {
    /// Allocates storage according to the configured shape.
    fn setup(&mut self, conf: &ParamConf) -> ComponentResult<()>;

    fn name(&self) -> &str;

    fn shape(&self) -> &[usize];

    fn data(&self) -> &[f32];

    fn data_mut(&mut self) -> &mut [f32];

    /// Multiplier applied to the learning rate for this param.
    fn lr_scale(&self) -> f32;

    /// Multiplier applied to the weight decay for this param.
    fn wd_scale(&self) -> f32;

    /// Number of updates applied so far.
    fn version(&self) -> u64;

    fn set_version(&mut self, version: u64);

    /// Total number of values.
    fn size(&self) -> usize {
        self.data().len()
    }
}

/// Fills a param with initial values.
pub trait ParamGenerator: Send + Sync {
    fn setup(&mut self, conf: &ParamGenConf) -> ComponentResult<()>;

    /// Overwrites every value of `param`.
    fn fill(&mut self, param: &mut dyn Param) -> ComponentResult<()>;
}

/// Computes the learning rate for a training step.
pub trait LrGenerator: Send + Sync {
    fn setup(&mut self, conf: &LrConf) -> ComponentResult<()>;

    /// Rate for `step`. Before `setup` this is the unconfigured base rate.
    fn rate(&self, step: u64) -> f32;
}

/// Applies a gradient to a param.
///
/// One updater serves every param of a job, so implementations keep their
/// history keyed by param name.
pub trait Updater: Send + Sync {
    fn setup(&mut self, conf: &UpdaterConf) -> ComponentResult<()>;

    /// # Errors
    /// Returns `ComponentError::ShapeMismatch` if `grad` and `param` differ in length.
    fn update(
        &mut self,
        step: u64,
        lr: f32,
        param: &mut dyn Param,
        grad: &[f32],
    ) -> ComponentResult<()>;
}

/// Everything a worker touches while training one mini-batch.
pub struct StepContext<'a> {
    pub step: u64,
    /// Base learning rate for this step, before per-param scaling.
    pub lr: f32,
    pub params: &'a mut [Box<dyn Param>],
    pub updater: &'a mut dyn Updater,
}

/// What a worker did during one step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    /// Passes made over the net (forward, backward, sampling rounds).
    pub passes: u32,
    /// Params handed to the updater.
    pub updated_params: usize,
}

/// Drives the train-one-batch algorithm.
pub trait Worker: Send + Sync {
    fn setup(&mut self, conf: &WorkerConf) -> ComponentResult<()>;

    /// Identifier of the algorithm (e.g. `"bp"`).
    fn alg(&self) -> &str;

    fn train_one_batch(&mut self, ctx: StepContext<'_>) -> ComponentResult<StepReport>;
}

impl ConceptFamily for dyn Layer {
    const NAME: &'static str = "layer";
}

impl ConceptFamily for dyn Param {
    const NAME: &'static str = "param";
}

impl ConceptFamily for dyn ParamGenerator {
    const NAME: &'static str = "param-generator";
}

impl ConceptFamily for dyn LrGenerator {
    const NAME: &'static str = "lr-generator";
}

impl ConceptFamily for dyn Updater {
    const NAME: &'static str = "updater";
}

impl ConceptFamily for dyn Worker {
    const NAME: &'static str = "worker";
}
