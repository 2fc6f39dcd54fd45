//! Configuration records consumed by component `setup` methods.
//!
//! These are the per-component blocks of the job configuration document.
//! Each carries the identifier of the implementation that should handle it.

use crate::TypeKey;
use crate::kinds::{LrKind, ParamGenKind, ParamKind, UpdaterKind, WorkerKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One layer of the neural net.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerConf {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TypeKey,
    /// Names of the layers feeding this one.
    #[serde(default)]
    pub srclayers: Vec<String>,
    #[serde(default)]
    pub params: Vec<ParamConf>,
    /// Layer-specific knobs (kernel size, stride, output width, ...).
    #[serde(flatten)]
    pub options: BTreeMap<String, serde_json::Value>,
}

impl LayerConf {
    pub fn new(name: impl Into<String>, kind: impl Into<TypeKey>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            srclayers: Vec::new(),
            params: Vec::new(),
            options: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_param(mut self, param: ParamConf) -> Self {
        self.params.push(param);
        self
    }

    /// Reads an unsigned integer option.
    pub fn option_u64(&self, key: &str) -> Option<u64> {
        self.options.get(key).and_then(serde_json::Value::as_u64)
    }

    /// Reads a floating point option.
    pub fn option_f64(&self, key: &str) -> Option<f64> {
        self.options.get(key).and_then(serde_json::Value::as_f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamConf {
    pub name: String,
    #[serde(rename = "type", default = "default_param_kind")]
    pub kind: TypeKey,
    pub shape: Vec<usize>,
    #[serde(default = "one")]
    pub lr_scale: f32,
    #[serde(default = "one")]
    pub wd_scale: f32,
    #[serde(default)]
    pub init: ParamGenConf,
}

impl ParamConf {
    pub fn new(name: impl Into<String>, shape: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            kind: default_param_kind(),
            shape,
            lr_scale: 1.0,
            wd_scale: 1.0,
            init: ParamGenConf::default(),
        }
    }

    #[must_use]
    pub fn with_init(mut self, init: ParamGenConf) -> Self {
        self.init = init;
        self
    }
}

/// Initializer settings. Unused knobs are ignored by each generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamGenConf {
    #[serde(rename = "type")]
    pub kind: TypeKey,
    /// Scale applied to every generated value; the fill value for `constant`.
    pub value: f32,
    pub low: f32,
    pub high: f32,
    pub mean: f32,
    pub std: f32,
    pub seed: Option<u64>,
}

impl ParamGenConf {
    pub fn new(kind: impl Into<TypeKey>) -> Self {
        Self {
            kind: kind.into(),
            ..Self::default()
        }
    }
}

impl Default for ParamGenConf {
    fn default() -> Self {
        Self {
            kind: ParamGenKind::Constant.into(),
            value: 1.0,
            low: -1.0,
            high: 1.0,
            mean: 0.0,
            std: 1.0,
            seed: None,
        }
    }
}

/// Learning-rate schedule settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LrConf {
    #[serde(rename = "type")]
    pub kind: TypeKey,
    pub base_lr: f32,
    pub final_lr: f32,
    pub gamma: f32,
    pub pow: f32,
    pub change_freq: u64,
    pub final_step: u64,
    /// Step boundaries for `fixed-step`, paired with `step_lr`.
    pub step: Vec<u64>,
    pub step_lr: Vec<f32>,
}

impl LrConf {
    pub fn new(kind: impl Into<TypeKey>, base_lr: f32) -> Self {
        Self {
            kind: kind.into(),
            base_lr,
            ..Self::default()
        }
    }
}

impl Default for LrConf {
    fn default() -> Self {
        Self {
            kind: LrKind::Fixed.into(),
            base_lr: 0.01,
            final_lr: 0.0,
            gamma: 1.0,
            pow: 0.0,
            change_freq: 0,
            final_step: 0,
            step: Vec::new(),
            step_lr: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdaterConf {
    #[serde(rename = "type")]
    pub kind: TypeKey,
    pub momentum: f32,
    pub weight_decay: f32,
    /// Numerical guard added to denominators.
    pub delta: f32,
    /// Decay rate for `rmsprop`.
    pub rho: f32,
    pub learning_rate: LrConf,
}

impl UpdaterConf {
    pub fn new(kind: impl Into<TypeKey>) -> Self {
        Self {
            kind: kind.into(),
            ..Self::default()
        }
    }
}

impl Default for UpdaterConf {
    fn default() -> Self {
        Self {
            kind: UpdaterKind::Sgd.into(),
            momentum: 0.0,
            weight_decay: 0.0,
            delta: 1e-8,
            rho: 0.9,
            learning_rate: LrConf::default(),
        }
    }
}

/// Selects the algorithm used to train one mini-batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConf {
    pub alg: TypeKey,
    /// Gibbs sampling rounds per batch for contrastive divergence.
    pub cd_k: u32,
}

impl WorkerConf {
    pub fn new(alg: impl Into<TypeKey>) -> Self {
        Self {
            alg: alg.into(),
            ..Self::default()
        }
    }
}

impl Default for WorkerConf {
    fn default() -> Self {
        Self {
            alg: WorkerKind::Bp.into(),
            cd_k: 1,
        }
    }
}

fn default_param_kind() -> TypeKey {
    ParamKind::Dense.into()
}

const fn one() -> f32 {
    1.0
}
