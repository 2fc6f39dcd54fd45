//! Component registries.
//!
//! A [`TypeRegistry`] maps the type identifiers of one concept family to
//! factories; the [`RegistryTable`] keeps exactly one registry per family.
//!
//! # Example
//!
//! ```rust
//! use meridian_abstraction::{LrConf, LrGenerator, ComponentResult};
//! use meridian_core::registry::RegistryTable;
//!
//! struct Constant(f32);
//!
//! impl LrGenerator for Constant {
//!     fn setup(&mut self, conf: &LrConf) -> ComponentResult<()> {
//!         self.0 = conf.base_lr;
//!         Ok(())
//!     }
//!
//!     fn rate(&self, _step: u64) -> f32 {
//!         self.0
//!     }
//! }
//!
//! let table = RegistryTable::new();
//! let lr = table.instance::<dyn LrGenerator>();
//! lr.register("constant", || Box::new(Constant(0.0)) as Box<dyn LrGenerator>).unwrap();
//!
//! let mut generator = lr.create("constant").unwrap();
//! generator.setup(&LrConf::new("constant", 0.5)).unwrap();
//! assert_eq!(generator.rate(10), 0.5);
//! ```

mod error;
mod table;
mod type_registry;

pub use error::{RegistryError, RegistryResult};
pub use table::RegistryTable;
pub use type_registry::{Factory, TypeRegistry};
