//! One registry per concept family, created on first demand.

use super::type_registry::TypeRegistry;
use meridian_abstraction::ConceptFamily;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

type Slot = Arc<dyn Any + Send + Sync>;

/// Table holding exactly one [`TypeRegistry`] per concept family.
///
/// The table is owned by the application context and shared by reference
/// with everything that registers or resolves components. Lookups of an
/// existing registry only take the read lock; the write lock is held just
/// long enough to insert a registry the first time a family is requested.
pub struct RegistryTable {
    slots: RwLock<HashMap<TypeId, Slot>>,
}

impl RegistryTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the registry for family `T`, creating it on first call.
    ///
    /// Every call for the same `T` returns the same registry, including when
    /// the first calls race from several threads.
    pub fn instance<T: ?Sized + ConceptFamily>(&self) -> Arc<TypeRegistry<T>> {
        let key = TypeId::of::<TypeRegistry<T>>();

        // Slots are only ever inserted, so a poisoned lock still guards a consistent map.
        {
            let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(slot) = slots.get(&key) {
                return downcast::<T>(slot);
            }
        }

        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        let slot = slots.entry(key).or_insert_with(|| {
            debug!(family = T::NAME, "Creating type registry");
            Arc::new(TypeRegistry::<T>::new()) as Slot
        });
        downcast::<T>(slot)
    }

    /// Checks whether the registry for `T` has been created yet.
    pub fn contains<T: ?Sized + ConceptFamily>(&self) -> bool {
        let key = TypeId::of::<TypeRegistry<T>>();
        self.slots.read().map(|slots| slots.contains_key(&key)).unwrap_or(false)
    }

    /// Number of families with a registry.
    pub fn family_count(&self) -> usize {
        self.slots.read().map(|slots| slots.len()).unwrap_or(0)
    }
}

fn downcast<T: ?Sized + ConceptFamily>(slot: &Slot) -> Arc<TypeRegistry<T>> {
    match Arc::clone(slot).downcast::<TypeRegistry<T>>() {
        Ok(registry) => registry,
        Err(_) => unreachable!("registry slot for {} holds a foreign type", T::NAME),
    }
}

impl Default for RegistryTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RegistryTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryTable")
            .field("families", &self.family_count())
            .finish()
    }
}
