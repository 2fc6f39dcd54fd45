//! Built-in param initializers.
//!
//! Fan-in is the product of every dimension but the first; fan-out is the
//! first dimension. One-dimensional params use their length for both.

use meridian_abstraction::{ComponentError, ComponentResult, Param, ParamGenConf, ParamGenKind};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub struct BuiltinParamGen {
    kind: ParamGenKind,
    conf: ParamGenConf,
    rng: StdRng,
}

impl BuiltinParamGen {
    pub fn new(kind: ParamGenKind) -> Self {
        Self {
            kind,
            conf: ParamGenConf::new(kind),
            rng: StdRng::from_entropy(),
        }
    }

    fn uniform(&mut self) -> f32 {
        self.rng.gen_range(self.conf.low..self.conf.high)
    }

    /// Box-Muller transform.
    fn gaussian(&mut self) -> f32 {
        let u1: f32 = self.rng.gen_range(f32::EPSILON..1.0);
        let u2: f32 = self.rng.r#gen();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f32::consts::PI * u2).cos();
        self.conf.mean + self.conf.std * z
    }

    fn check(&self, conf: &ParamGenConf) -> ComponentResult<()> {
        let invalid = |reason: String| ComponentError::invalid_conf(self.kind.as_str(), reason);

        for (field, v) in [
            ("value", conf.value),
            ("low", conf.low),
            ("high", conf.high),
            ("mean", conf.mean),
            ("std", conf.std),
        ] {
            if !v.is_finite() {
                return Err(invalid(format!("{field} must be finite, got {v}")));
            }
        }

        let uses_range = matches!(
            self.kind,
            ParamGenKind::Uniform
                | ParamGenKind::UniformSqrtFanIn
                | ParamGenKind::UniformSqrtFanInOut
        );
        // The sampler needs a non-empty range whose width is representable.
        if uses_range && !(conf.low < conf.high && (conf.high - conf.low).is_finite()) {
            return Err(invalid(format!(
                "low ({}) must be below high ({})",
                conf.low, conf.high
            )));
        }
        if conf.std < 0.0 {
            return Err(invalid("std must be >= 0".to_string()));
        }
        Ok(())
    }
}

fn fan_in_out(shape: &[usize]) -> (f32, f32) {
    match shape {
        [] => (1.0, 1.0),
        [n] => (*n as f32, *n as f32),
        [first, rest @ ..] => (rest.iter().product::<usize>() as f32, *first as f32),
    }
}

impl meridian_abstraction::ParamGenerator for BuiltinParamGen {
    fn setup(&mut self, conf: &ParamGenConf) -> ComponentResult<()> {
        self.check(conf)?;

        self.conf = conf.clone();
        self.rng = match conf.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(())
    }

    fn fill(&mut self, param: &mut dyn Param) -> ComponentResult<()> {
        let (fan_in, fan_out) = fan_in_out(param.shape());
        let value = self.conf.value;
        let size = param.size();

        let values: Vec<f32> = match self.kind {
            ParamGenKind::Constant => vec![value; size],
            ParamGenKind::Uniform => (0..size).map(|_| self.uniform() * value).collect(),
            ParamGenKind::Gaussian => (0..size).map(|_| self.gaussian() * value).collect(),
            ParamGenKind::GaussianSqrtFanIn => {
                let scale = value / fan_in.sqrt();
                (0..size).map(|_| self.gaussian() * scale).collect()
            }
            ParamGenKind::UniformSqrtFanIn => {
                let scale = value / (fan_in / 3.0).sqrt();
                (0..size).map(|_| self.uniform() * scale).collect()
            }
            ParamGenKind::UniformSqrtFanInOut => {
                let scale = value / (fan_in + fan_out).sqrt();
                (0..size).map(|_| self.uniform() * scale).collect()
            }
        };

        param.data_mut().copy_from_slice(&values);
        Ok(())
    }
}
