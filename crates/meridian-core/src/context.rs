//! Application context shared by everything that registers or resolves components.

use crate::config::SystemConfig;
use crate::registry::{RegistryResult, RegistryTable, TypeRegistry};
use meridian_abstraction::{
    ConceptFamily, Layer, LrGenerator, Param, ParamGenerator, TypeKey, Updater, Worker,
};
use std::sync::Arc;

/// Owns the registry table and system configuration for the lifetime of the process.
///
/// Cloning is cheap; clones share the same registries.
#[derive(Debug, Clone)]
pub struct AppContext {
    registries: Arc<RegistryTable>,
    system: Arc<SystemConfig>,
}

impl AppContext {
    pub fn new(system: SystemConfig) -> Self {
        Self {
            registries: Arc::new(RegistryTable::new()),
            system: Arc::new(system),
        }
    }

    pub fn registries(&self) -> &RegistryTable {
        &self.registries
    }

    pub fn system(&self) -> &SystemConfig {
        &self.system
    }

    /// Registry of family `T`.
    pub fn registry<T: ?Sized + ConceptFamily>(&self) -> Arc<TypeRegistry<T>> {
        self.registries.instance::<T>()
    }

    /// Creates a fresh component of family `T`.
    ///
    /// # Errors
    /// Returns `RegistryError::UnknownIdentifier` if `id` is not registered.
    pub fn create<T: ?Sized + ConceptFamily>(&self, id: &str) -> RegistryResult<Box<T>> {
        self.registries.instance::<T>().create(id)
    }

    pub fn register_layer<F>(&self, id: impl Into<TypeKey>, factory: F) -> RegistryResult<()>
    where
        F: Fn() -> Box<dyn Layer> + Send + Sync + 'static,
    {
        self.registry::<dyn Layer>().register(id, factory)
    }

    pub fn register_param<F>(&self, id: impl Into<TypeKey>, factory: F) -> RegistryResult<()>
    where
        F: Fn() -> Box<dyn Param> + Send + Sync + 'static,
    {
        self.registry::<dyn Param>().register(id, factory)
    }

    pub fn register_param_generator<F>(
        &self,
        id: impl Into<TypeKey>,
        factory: F,
    ) -> RegistryResult<()>
    where
        F: Fn() -> Box<dyn ParamGenerator> + Send + Sync + 'static,
    {
        self.registry::<dyn ParamGenerator>().register(id, factory)
    }

    pub fn register_lr_generator<F>(&self, id: impl Into<TypeKey>, factory: F) -> RegistryResult<()>
    where
        F: Fn() -> Box<dyn LrGenerator> + Send + Sync + 'static,
    {
        self.registry::<dyn LrGenerator>().register(id, factory)
    }

    pub fn register_updater<F>(&self, id: impl Into<TypeKey>, factory: F) -> RegistryResult<()>
    where
        F: Fn() -> Box<dyn Updater> + Send + Sync + 'static,
    {
        self.registry::<dyn Updater>().register(id, factory)
    }

    pub fn register_worker<F>(&self, id: impl Into<TypeKey>, factory: F) -> RegistryResult<()>
    where
        F: Fn() -> Box<dyn Worker> + Send + Sync + 'static,
    {
        self.registry::<dyn Worker>().register(id, factory)
    }

    pub fn create_layer(&self, id: &str) -> RegistryResult<Box<dyn Layer>> {
        self.create::<dyn Layer>(id)
    }

    pub fn create_param(&self, id: &str) -> RegistryResult<Box<dyn Param>> {
        self.create::<dyn Param>(id)
    }

    pub fn create_param_generator(&self, id: &str) -> RegistryResult<Box<dyn ParamGenerator>> {
        self.create::<dyn ParamGenerator>(id)
    }

    pub fn create_lr_generator(&self, id: &str) -> RegistryResult<Box<dyn LrGenerator>> {
        self.create::<dyn LrGenerator>(id)
    }

    pub fn create_updater(&self, id: &str) -> RegistryResult<Box<dyn Updater>> {
        self.create::<dyn Updater>(id)
    }

    pub fn create_worker(&self, id: &str) -> RegistryResult<Box<dyn Worker>> {
        self.create::<dyn Worker>(id)
    }
}

impl Default for AppContext {
    fn default() -> Self {
        Self::new(SystemConfig::default())
    }
}
