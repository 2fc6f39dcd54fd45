//! Per-family directory of component factories.

use super::error::{RegistryError, RegistryResult};
use meridian_abstraction::{ConceptFamily, TypeKey};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Zero-argument constructor producing a fresh, caller-owned instance.
pub type Factory<T> = Arc<dyn Fn() -> Box<T> + Send + Sync>;

/// Maps type identifiers of one concept family to their factories.
///
/// The registry never caches instances: every [`create`](Self::create) call
/// runs the factory and hands ownership of the result to the caller. Reads
/// (`create`, `has`) share a read lock; `register` takes the write lock so a
/// reader never observes a half-inserted entry.
pub struct TypeRegistry<T: ?Sized + ConceptFamily> {
    factories: RwLock<HashMap<TypeKey, Factory<T>>>,
}

impl<T: ?Sized + ConceptFamily> TypeRegistry<T> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
        }
    }

    /// Family name used in logs and errors.
    pub fn family(&self) -> &'static str {
        T::NAME
    }

    /// Registers a factory under `id`.
    ///
    /// # Errors
    /// Returns `DuplicateIdentifier` if `id` is taken; the existing factory
    /// stays in place. Returns `EmptyIdentifier` for blank identifiers.
    pub fn register<F>(&self, id: impl Into<TypeKey>, factory: F) -> RegistryResult<()>
    where
        F: Fn() -> Box<T> + Send + Sync + 'static,
    {
        self.register_factory(id.into(), Arc::new(factory))
    }

    /// Registers an already shared factory.
    pub fn register_factory(&self, id: TypeKey, factory: Factory<T>) -> RegistryResult<()> {
        if id.is_blank() {
            return Err(RegistryError::EmptyIdentifier { family: T::NAME });
        }

        let mut factories = self.factories.write().map_err(Self::poisoned)?;

        if factories.contains_key(&id) {
            warn!(family = T::NAME, identifier = %id, "Rejected duplicate registration");
            return Err(RegistryError::DuplicateIdentifier {
                family: T::NAME,
                identifier: id.to_string(),
            });
        }

        debug!(family = T::NAME, identifier = %id, "Registered factory");
        factories.insert(id, factory);
        Ok(())
    }

    /// Constructs a new instance of the implementation registered as `id`.
    ///
    /// The factory runs outside the lock.
    ///
    /// # Errors
    /// Returns `UnknownIdentifier` if nothing is registered under `id`.
    pub fn create(&self, id: &str) -> RegistryResult<Box<T>> {
        let factory = {
            let factories = self.factories.read().map_err(Self::poisoned)?;

            factories.get(id).cloned().ok_or_else(|| RegistryError::UnknownIdentifier {
                family: T::NAME,
                identifier: id.to_string(),
            })?
        };

        Ok(factory())
    }

    /// Checks if an identifier is registered.
    pub fn has(&self, id: &str) -> bool {
        match self.factories.read() {
            Ok(factories) => factories.contains_key(id),
            Err(_) => false,
        }
    }

    /// Registered identifiers, sorted.
    pub fn identifiers(&self) -> Vec<TypeKey> {
        let mut ids: Vec<TypeKey> = match self.factories.read() {
            Ok(factories) => factories.keys().cloned().collect(),
            Err(_) => Vec::new(),
        };
        ids.sort();
        ids
    }

    /// Gets the number of registered factories.
    pub fn count(&self) -> usize {
        self.factories.read().map(|f| f.len()).unwrap_or(0)
    }

    fn poisoned(e: impl fmt::Display) -> RegistryError {
        RegistryError::LockPoisoned(format!("{}: {}", T::NAME, e))
    }
}

impl<T: ?Sized + ConceptFamily> Default for TypeRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized + ConceptFamily> fmt::Debug for TypeRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("family", &T::NAME)
            .field("count", &self.count())
            .finish_non_exhaustive()
    }
}
