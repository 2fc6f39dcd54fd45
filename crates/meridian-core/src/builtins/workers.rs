//! Built-in train-one-batch schedules.
//!
//! Gradients come from the external runtime. Locally the workers run their
//! pass schedule and hand a zero gradient to the updater, so params move only
//! under weight decay and momentum.

use meridian_abstraction::{
    ComponentError, ComponentResult, StepContext, StepReport, Worker, WorkerConf, WorkerKind,
};

pub struct BuiltinWorker {
    kind: WorkerKind,
    cd_k: u32,
}

impl BuiltinWorker {
    pub fn new(kind: WorkerKind) -> Self {
        Self { kind, cd_k: 1 }
    }

    fn passes_per_batch(&self) -> u32 {
        match self.kind {
            // forward + backward
            WorkerKind::Bp => 2,
            // positive phase, k gibbs rounds, negative phase
            WorkerKind::Cd => self.cd_k + 2,
        }
    }
}

impl Worker for BuiltinWorker {
    fn setup(&mut self, conf: &WorkerConf) -> ComponentResult<()> {
        if self.kind == WorkerKind::Cd && conf.cd_k == 0 {
            return Err(ComponentError::invalid_conf(
                self.kind.as_str(),
                "cd_k must be >= 1",
            ));
        }
        self.cd_k = conf.cd_k;
        Ok(())
    }

    fn alg(&self) -> &str {
        self.kind.as_str()
    }

    fn train_one_batch(&mut self, ctx: StepContext<'_>) -> ComponentResult<StepReport> {
        let StepContext {
            step,
            lr,
            params,
            updater,
        } = ctx;

        for param in params.iter_mut() {
            let grad = vec![0.0; param.size()];
            updater.update(step, lr, param.as_mut(), &grad)?;
        }

        Ok(StepReport {
            passes: self.passes_per_batch(),
            updated_params: params.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::params::DenseParam;
    use crate::builtins::updaters::BuiltinUpdater;
    use meridian_abstraction::{Param, ParamConf, Updater, UpdaterConf, UpdaterKind};

    fn params() -> Vec<Box<dyn Param>> {
        ["w", "b"]
            .into_iter()
            .map(|name| {
                let mut p = DenseParam::new();
                p.setup(&ParamConf::new(name, vec![2])).unwrap();
                p.data_mut().fill(1.0);
                Box::new(p) as Box<dyn Param>
            })
            .collect()
    }

    #[test]
    fn test_bp_updates_every_param() {
        let mut worker = BuiltinWorker::new(WorkerKind::Bp);
        worker.setup(&WorkerConf::new(WorkerKind::Bp)).unwrap();
        let mut updater = BuiltinUpdater::new(UpdaterKind::Sgd);
        let conf = UpdaterConf {
            weight_decay: 1.0,
            ..UpdaterConf::new(UpdaterKind::Sgd)
        };
        updater.setup(&conf).unwrap();
        let mut params = params();

        let ctx = StepContext {
            step: 0,
            lr: 0.5,
            params: &mut params,
            updater: &mut updater,
        };
        let report = worker.train_one_batch(ctx).unwrap();

        assert_eq!(
            report,
            StepReport {
                passes: 2,
                updated_params: 2,
            }
        );
        assert!(
            params
                .iter()
                .all(|p| p.version() == 1 && (p.data()[0] - 0.5).abs() < 1e-6)
        );
    }

    #[test]
    fn test_cd_passes_follow_k() {
        let mut worker = BuiltinWorker::new(WorkerKind::Cd);
        let conf = WorkerConf {
            cd_k: 3,
            ..WorkerConf::new(WorkerKind::Cd)
        };
        worker.setup(&conf).unwrap();
        let mut updater = BuiltinUpdater::new(UpdaterKind::Sgd);
        let mut params = params();

        let ctx = StepContext {
            step: 4,
            lr: 0.1,
            params: &mut params,
            updater: &mut updater,
        };
        let report = worker.train_one_batch(ctx).unwrap();
        assert_eq!(report.passes, 5);
        assert_eq!(worker.alg(), "cd");
    }

    #[test]
    fn test_cd_rejects_zero_k() {
        let mut worker = BuiltinWorker::new(WorkerKind::Cd);
        let conf = WorkerConf {
            cd_k: 0,
            ..WorkerConf::new(WorkerKind::Cd)
        };
        assert!(worker.setup(&conf).is_err());
    }
}
