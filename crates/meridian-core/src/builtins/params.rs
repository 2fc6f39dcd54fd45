use meridian_abstraction::{ComponentError, ComponentResult, Param, ParamConf};

/// Dense `f32` parameter stored in row-major order.
#[derive(Debug, Clone, Default)]
pub struct DenseParam {
    name: String,
    shape: Vec<usize>,
    data: Vec<f32>,
    lr_scale: f32,
    wd_scale: f32,
    version: u64,
}

impl DenseParam {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Param for DenseParam {
    fn setup(&mut self, conf: &ParamConf) -> ComponentResult<()> {
        let size: usize = conf.shape.iter().product();
        if conf.shape.is_empty() || size == 0 {
            return Err(ComponentError::invalid_conf(
                &conf.name,
                "param shape must be non-empty",
            ));
        }
        self.name.clone_from(&conf.name);
        self.shape.clone_from(&conf.shape);
        self.data = vec![0.0; size];
        self.lr_scale = conf.lr_scale;
        self.wd_scale = conf.wd_scale;
        self.version = 0;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn data(&self) -> &[f32] {
        &self.data
    }

    fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    fn lr_scale(&self) -> f32 {
        self.lr_scale
    }

    fn wd_scale(&self) -> f32 {
        self.wd_scale
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_allocates_zeroed_storage() {
        let mut param = DenseParam::new();
        param.setup(&ParamConf::new("w", vec![3, 4])).unwrap();
        assert_eq!(param.size(), 12);
        assert!(param.data().iter().all(|v| *v == 0.0));
        assert_eq!(param.shape(), &[3, 4]);
    }

    #[test]
    fn test_setup_rejects_zero_dimension() {
        let mut param = DenseParam::new();
        assert!(param.setup(&ParamConf::new("w", vec![3, 0])).is_err());
    }
}
