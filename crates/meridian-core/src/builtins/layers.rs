//! Built-in layers.
//!
//! Layer math runs in the external runtime. These implementations validate
//! their configuration block and expose the params it declares.

use meridian_abstraction::{
    ComponentError, ComponentResult, Layer, LayerConf, LayerKind, ParamConf,
};

/// Configuration holder shared by every built-in layer kind.
#[derive(Debug, Clone)]
pub struct BuiltinLayer {
    kind: LayerKind,
    name: String,
    params: Vec<ParamConf>,
}

impl BuiltinLayer {
    pub fn new(kind: LayerKind) -> Self {
        Self {
            kind,
            name: String::new(),
            params: Vec::new(),
        }
    }

    fn require_u64(&self, conf: &LayerConf, key: &str) -> ComponentResult<u64> {
        match conf.option_u64(key) {
            Some(v) if v > 0 => Ok(v),
            _ => Err(ComponentError::invalid_conf(
                &conf.name,
                format!("{} layer needs a positive '{}'", self.kind, key),
            )),
        }
    }
}

impl Layer for BuiltinLayer {
    fn setup(&mut self, conf: &LayerConf) -> ComponentResult<()> {
        match self.kind {
            LayerKind::Convolution => {
                self.require_u64(conf, "kernel")?;
                self.require_u64(conf, "num_filters")?;
            }
            LayerKind::Pooling | LayerKind::Lrn => {
                self.require_u64(conf, "kernel")?;
            }
            LayerKind::InnerProduct | LayerKind::RbmVisible | LayerKind::RbmHidden => {
                self.require_u64(conf, "num_output")?;
            }
            LayerKind::Dropout => {
                let ratio = conf.option_f64("dropout_ratio").unwrap_or(0.5);
                if !(0.0..1.0).contains(&ratio) {
                    return Err(ComponentError::invalid_conf(
                        &conf.name,
                        format!("dropout_ratio must be in [0, 1), got {ratio}"),
                    ));
                }
            }
            LayerKind::Slice | LayerKind::Split => {
                self.require_u64(conf, "num_partitions")?;
            }
            LayerKind::Relu
            | LayerKind::Sigmoid
            | LayerKind::Tanh
            | LayerKind::SoftmaxLoss
            | LayerKind::EuclideanLoss
            | LayerKind::Concate
            | LayerKind::StoreInput
            | LayerKind::Label => {}
        }

        self.name.clone_from(&conf.name);
        self.params.clone_from(&conf.params);
        Ok(())
    }

    fn kind(&self) -> &str {
        self.kind.as_str()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn param_confs(&self) -> &[ParamConf] {
        &self.params
    }
}
