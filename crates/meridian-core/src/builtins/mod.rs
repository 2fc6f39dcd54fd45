//! Implementations shipped with Meridian and the set used to install them.

pub mod layers;
pub mod lr;
pub mod param_gen;
pub mod params;
pub mod updaters;
pub mod workers;

use crate::registry::{Factory, RegistryError, RegistryTable};
use meridian_abstraction::{
    ConceptFamily, Layer, LayerKind, LrGenerator, LrKind, Param, ParamGenKind, ParamGenerator,
    ParamKind, TypeKey, Updater, UpdaterKind, Worker, WorkerKind,
};
use std::fmt;
use std::sync::Arc;

pub use layers::BuiltinLayer;
pub use lr::BuiltinLrGen;
pub use param_gen::BuiltinParamGen;
pub use params::DenseParam;
pub use updaters::BuiltinUpdater;
pub use workers::BuiltinWorker;

type Installer = Box<dyn Fn(&RegistryTable) -> Result<(), RegistryError> + Send + Sync>;

struct BuiltinEntry {
    family: &'static str,
    id: TypeKey,
    install: Installer,
}

/// Ordered list of built-in registrations across all six families.
///
/// Installing the set registers each entry in turn and stops at the first
/// failure, so a clash within the set is reported against the entry that
/// caused it.
#[derive(Default)]
pub struct BuiltinSet {
    entries: Vec<BuiltinEntry>,
}

impl BuiltinSet {
    /// A set with no entries.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every implementation shipped with Meridian.
    pub fn standard() -> Self {
        let mut set = Self::empty();
        for &kind in LayerKind::ALL {
            set = set.with_layer(kind, move || {
                Box::new(BuiltinLayer::new(kind)) as Box<dyn Layer>
            });
        }
        for &kind in ParamKind::ALL {
            set = set.with_param(kind, || Box::new(DenseParam::new()) as Box<dyn Param>);
        }
        for &kind in ParamGenKind::ALL {
            set = set.with_param_generator(kind, move || {
                Box::new(BuiltinParamGen::new(kind)) as Box<dyn ParamGenerator>
            });
        }
        for &kind in LrKind::ALL {
            set = set.with_lr_generator(kind, move || {
                Box::new(BuiltinLrGen::new(kind)) as Box<dyn LrGenerator>
            });
        }
        for &kind in UpdaterKind::ALL {
            set = set.with_updater(kind, move || {
                Box::new(BuiltinUpdater::new(kind)) as Box<dyn Updater>
            });
        }
        for &kind in WorkerKind::ALL {
            set = set.with_worker(kind, move || {
                Box::new(BuiltinWorker::new(kind)) as Box<dyn Worker>
            });
        }
        set
    }

    /// Appends an entry for family `T`.
    #[must_use]
    pub fn with<T, F>(mut self, id: impl Into<TypeKey>, factory: F) -> Self
    where
        T: ?Sized + ConceptFamily,
        F: Fn() -> Box<T> + Send + Sync + 'static,
    {
        let id = id.into();
        let key = id.clone();
        let factory: Factory<T> = Arc::new(factory);
        self.entries.push(BuiltinEntry {
            family: T::NAME,
            id,
            install: Box::new(move |table: &RegistryTable| {
                table.instance::<T>().register_factory(key.clone(), Arc::clone(&factory))
            }),
        });
        self
    }

    #[must_use]
    pub fn with_layer<F>(self, id: impl Into<TypeKey>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Layer> + Send + Sync + 'static,
    {
        self.with::<dyn Layer, F>(id, factory)
    }

    #[must_use]
    pub fn with_param<F>(self, id: impl Into<TypeKey>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Param> + Send + Sync + 'static,
    {
        self.with::<dyn Param, F>(id, factory)
    }

    #[must_use]
    pub fn with_param_generator<F>(self, id: impl Into<TypeKey>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn ParamGenerator> + Send + Sync + 'static,
    {
        self.with::<dyn ParamGenerator, F>(id, factory)
    }

    #[must_use]
    pub fn with_lr_generator<F>(self, id: impl Into<TypeKey>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn LrGenerator> + Send + Sync + 'static,
    {
        self.with::<dyn LrGenerator, F>(id, factory)
    }

    #[must_use]
    pub fn with_updater<F>(self, id: impl Into<TypeKey>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Updater> + Send + Sync + 'static,
    {
        self.with::<dyn Updater, F>(id, factory)
    }

    #[must_use]
    pub fn with_worker<F>(self, id: impl Into<TypeKey>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Worker> + Send + Sync + 'static,
    {
        self.with::<dyn Worker, F>(id, factory)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registers every entry into `table`.
    ///
    /// # Errors
    /// Returns the first registry error together with the family and
    /// identifier of the entry that raised it.
    pub fn install(
        &self,
        table: &RegistryTable,
    ) -> Result<usize, (&'static str, TypeKey, RegistryError)> {
        for entry in &self.entries {
            (entry.install)(table).map_err(|e| (entry.family, entry.id.clone(), e))?;
        }
        Ok(self.entries.len())
    }
}

impl fmt::Debug for BuiltinSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltinSet")
            .field("entries", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_set_installs_every_family() {
        let table = RegistryTable::new();
        let installed = BuiltinSet::standard().install(&table).unwrap();

        assert_eq!(
            installed,
            LayerKind::ALL.len()
                + ParamKind::ALL.len()
                + ParamGenKind::ALL.len()
                + LrKind::ALL.len()
                + UpdaterKind::ALL.len()
                + WorkerKind::ALL.len()
        );
        assert_eq!(table.family_count(), 6);
        assert!(table.instance::<dyn Layer>().has("convolution"));
        assert!(table.instance::<dyn Updater>().has("adagrad"));
        let worker = table.instance::<dyn Worker>().create("cd").unwrap();
        assert_eq!(worker.alg(), "cd");
    }

    #[test]
    fn test_install_reports_clashing_entry() {
        let table = RegistryTable::new();
        let bp = || Box::new(BuiltinWorker::new(WorkerKind::Bp)) as Box<dyn Worker>;
        let cd = || Box::new(BuiltinWorker::new(WorkerKind::Cd)) as Box<dyn Worker>;
        let set = BuiltinSet::empty()
            .with_worker("bp", bp)
            .with_worker("bp", cd);

        let (family, id, err) = set.install(&table).unwrap_err();
        assert_eq!(family, "worker");
        assert_eq!(id.as_str(), "bp");
        assert!(matches!(err, RegistryError::DuplicateIdentifier { .. }));
        let worker = table.instance::<dyn Worker>().create("bp").unwrap();
        assert_eq!(worker.alg(), "bp");
    }
}
