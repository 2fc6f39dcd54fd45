//! Built-in learning-rate schedules.

use meridian_abstraction::{ComponentError, ComponentResult, LrConf, LrGenerator, LrKind};

pub struct BuiltinLrGen {
    kind: LrKind,
    conf: LrConf,
}

impl BuiltinLrGen {
    pub fn new(kind: LrKind) -> Self {
        Self {
            kind,
            conf: LrConf::new(kind, 0.0),
        }
    }

    fn invalid(&self, reason: impl Into<String>) -> ComponentError {
        ComponentError::invalid_conf(self.kind.as_str(), reason)
    }
}

impl LrGenerator for BuiltinLrGen {
    fn setup(&mut self, conf: &LrConf) -> ComponentResult<()> {
        if !conf.base_lr.is_finite() || conf.base_lr < 0.0 {
            return Err(self.invalid("base_lr must be a non-negative number"));
        }
        match self.kind {
            LrKind::Fixed | LrKind::Inverse => {}
            LrKind::Linear if conf.final_step == 0 => {
                return Err(self.invalid("final_step must be >= 1"));
            }
            LrKind::Exponential | LrKind::Step if conf.change_freq == 0 => {
                return Err(self.invalid("change_freq must be >= 1"));
            }
            LrKind::InverseT if conf.final_lr <= 0.0 => {
                return Err(self.invalid("final_lr must be > 0"));
            }
            LrKind::FixedStep => {
                if conf.step.len() != conf.step_lr.len() {
                    return Err(self.invalid(format!(
                        "step ({}) and step_lr ({}) must have the same length",
                        conf.step.len(),
                        conf.step_lr.len()
                    )));
                }
                if conf.step.windows(2).any(|w| w[0] >= w[1]) {
                    return Err(self.invalid("step boundaries must be strictly increasing"));
                }
            }
            LrKind::Linear | LrKind::Exponential | LrKind::Step | LrKind::InverseT => {}
        }
        self.conf = conf.clone();
        Ok(())
    }

    fn rate(&self, step: u64) -> f32 {
        let c = &self.conf;
        let s = step as f32;
        match self.kind {
            LrKind::Fixed => c.base_lr,
            LrKind::Linear => {
                let r = (s / c.final_step as f32).min(1.0);
                c.base_lr * (1.0 - r) + c.final_lr * r
            }
            LrKind::Exponential => c.base_lr / 2f32.powf(s / c.change_freq as f32),
            LrKind::InverseT => c.base_lr / (1.0 + s / c.final_lr),
            LrKind::Inverse => c.base_lr * (1.0 + c.gamma * s).powf(-c.pow),
            // change_freq is only zero before setup.
            LrKind::Step => c.base_lr * c.gamma.powi((step / c.change_freq.max(1)) as i32),
            LrKind::FixedStep => c
                .step
                .iter()
                .zip(&c.step_lr)
                .take_while(|(boundary, _)| step >= **boundary)
                .last()
                .map_or(c.base_lr, |(_, lr)| *lr),
        }
    }
}
