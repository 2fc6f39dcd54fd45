//! Concurrent access to the registry table.

use meridian_abstraction::{LrConf, LrGenerator, LrKind, Updater, UpdaterKind};
use meridian_core::builtins::{BuiltinLrGen, BuiltinUpdater};
use meridian_core::{AppContext, RegistryError, RegistryTable};
use std::sync::{Arc, Barrier};
use std::thread;

fn fixed_lr() -> Box<dyn LrGenerator> {
    Box::new(BuiltinLrGen::new(LrKind::Fixed))
}

fn updater(kind: UpdaterKind) -> impl Fn() -> Box<dyn Updater> + Send + Sync + 'static {
    move || Box::new(BuiltinUpdater::new(kind)) as Box<dyn Updater>
}

#[test]
fn test_instance_is_shared_across_threads() {
    let table = Arc::new(RegistryTable::new());
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let table = Arc::clone(&table);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let registry = table.instance::<dyn LrGenerator>();
                registry.register(format!("lr-{i}"), fixed_lr).unwrap();
                registry
            })
        })
        .collect();

    let registries: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(registries.iter().all(|r| Arc::ptr_eq(r, &registries[0])));
    assert_eq!(table.instance::<dyn LrGenerator>().count(), 8);
    assert_eq!(table.family_count(), 1);
}

#[test]
fn test_late_registration_while_creating() {
    let ctx = AppContext::default();
    ctx.register_updater("sgd", updater(UpdaterKind::Sgd))
        .unwrap();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let ctx = ctx.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    assert!(ctx.create_updater("sgd").is_ok());
                    match ctx.create_updater("adagrad") {
                        Ok(_) | Err(RegistryError::UnknownIdentifier { .. }) => {}
                        Err(e) => panic!("unexpected error: {e}"),
                    }
                }
            })
        })
        .collect();

    ctx.register_updater("adagrad", updater(UpdaterKind::AdaGrad))
        .unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert!(ctx.create_updater("adagrad").is_ok());
}

#[test]
fn test_created_instances_are_independent() {
    let ctx = AppContext::default();
    ctx.register_lr_generator("fixed", fixed_lr).unwrap();

    let mut first = ctx.create_lr_generator("fixed").unwrap();
    let second = ctx.create_lr_generator("fixed").unwrap();
    first.setup(&LrConf::new(LrKind::Fixed, 0.5)).unwrap();

    assert!((first.rate(0) - 0.5).abs() < f32::EPSILON);
    assert!(second.rate(0).abs() < f32::EPSILON);
}
