//! Built-in weight updaters.
//!
//! The effective learning rate of a param is `lr * lr_scale`; its weight
//! decay is `weight_decay * wd_scale`.

use meridian_abstraction::{
    ComponentError, ComponentResult, Param, Updater, UpdaterConf, UpdaterKind,
};
use std::collections::HashMap;

pub struct BuiltinUpdater {
    kind: UpdaterKind,
    conf: UpdaterConf,
    /// Per-param history (velocity or accumulated squares).
    history: HashMap<String, Vec<f32>>,
}

impl BuiltinUpdater {
    pub fn new(kind: UpdaterKind) -> Self {
        Self {
            kind,
            conf: UpdaterConf::new(kind),
            history: HashMap::new(),
        }
    }

    fn invalid(&self, reason: &str) -> ComponentError {
        ComponentError::invalid_conf(self.kind.as_str(), reason)
    }
}

impl Updater for BuiltinUpdater {
    fn setup(&mut self, conf: &UpdaterConf) -> ComponentResult<()> {
        if !(0.0..1.0).contains(&conf.momentum) {
            return Err(self.invalid("momentum must be in [0, 1)"));
        }
        if conf.weight_decay < 0.0 {
            return Err(self.invalid("weight_decay must be >= 0"));
        }
        if self.kind == UpdaterKind::RmsProp && !(0.0..1.0).contains(&conf.rho) {
            return Err(self.invalid("rho must be in [0, 1)"));
        }
        self.conf = conf.clone();
        self.history.clear();
        Ok(())
    }

    fn update(
        &mut self,
        _step: u64,
        lr: f32,
        param: &mut dyn Param,
        grad: &[f32],
    ) -> ComponentResult<()> {
        let size = param.size();
        if grad.len() != size {
            return Err(ComponentError::ShapeMismatch {
                param: param.name().to_string(),
                expected: size,
                actual: grad.len(),
            });
        }

        let lr = lr * param.lr_scale();
        let wd = self.conf.weight_decay * param.wd_scale();
        let momentum = self.conf.momentum;
        let (delta, rho) = (self.conf.delta, self.conf.rho);
        let history = self
            .history
            .entry(param.name().to_string())
            .or_insert_with(|| vec![0.0; size]);
        let data = param.data_mut();

        for ((w, g), h) in data.iter_mut().zip(grad).zip(history.iter_mut()) {
            let g = g + wd * *w;
            match self.kind {
                UpdaterKind::Sgd => {
                    if momentum > 0.0 {
                        *h = momentum * *h + lr * g;
                        *w -= *h;
                    } else {
                        *w -= lr * g;
                    }
                }
                UpdaterKind::AdaGrad => {
                    *h += g * g;
                    *w -= lr * g / (h.sqrt() + delta);
                }
                UpdaterKind::Nesterov => {
                    let prev = *h;
                    *h = momentum * *h + lr * g;
                    *w -= (1.0 + momentum) * *h - momentum * prev;
                }
                UpdaterKind::RmsProp => {
                    *h = rho * *h + (1.0 - rho) * g * g;
                    *w -= lr * g / (h.sqrt() + delta);
                }
            }
        }

        param.set_version(param.version() + 1);
        Ok(())
    }
}
