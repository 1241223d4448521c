use super::*;
use crate::{
    foundation::core::Priority,
    representation::repr::Representation,
};

#[derive(Debug, Clone)]
struct Cell;

struct Alpha;
struct Beta;

impl DataFamily for Alpha {
    type Shape = ();
    const NAME: &'static str = "alpha";

    fn create_default(_: &()) -> ReprResult<Box<dyn Representation<Self>>> {
        Ok(Box::new(Cell))
    }
}

impl DataFamily for Beta {
    type Shape = ();
    const NAME: &'static str = "beta";

    fn create_default(_: &()) -> ReprResult<Box<dyn Representation<Self>>> {
        Ok(Box::new(Cell))
    }
}

impl<F: DataFamily<Shape = ()>> Representation<F> for Cell {
    fn clone_repr(&self) -> Box<dyn Representation<F>> {
        Box::new(Cell)
    }

    fn priority(&self) -> Priority {
        Priority::RAM
    }

    fn update(&mut self, _editable: bool, _shape: &()) -> ReprResult<()> {
        Ok(())
    }
}

#[test]
fn registered_factory_is_returned_by_identity() {
    let registry = ConverterMetaFactory::new();
    let factory = Arc::new(ConverterFactory::<Alpha>::new());
    registry.register_object(Arc::clone(&factory)).unwrap();

    let found = registry.converter_factory::<Alpha>().unwrap();
    assert!(Arc::ptr_eq(&found, &factory));
    assert!(registry.converter_factory::<Beta>().is_none());
}

#[test]
fn second_factory_for_a_family_is_rejected() {
    let registry = ConverterMetaFactory::new();
    let first = Arc::new(ConverterFactory::<Alpha>::new());
    registry.register_object(Arc::clone(&first)).unwrap();

    let err = registry
        .register_object(Arc::new(ConverterFactory::<Alpha>::new()))
        .unwrap_err();
    assert!(matches!(err, ReprError::DuplicateRegistration(_)));
    assert!(Arc::ptr_eq(
        &registry.converter_factory::<Alpha>().unwrap(),
        &first
    ));
}

#[test]
fn unregister_returns_the_factory() {
    let registry = ConverterMetaFactory::new();
    registry
        .register_object(Arc::new(ConverterFactory::<Alpha>::new()))
        .unwrap();
    assert!(registry.unregister_object::<Alpha>().is_some());
    assert!(registry.converter_factory::<Alpha>().is_none());
    assert!(registry.unregister_object::<Alpha>().is_none());
}

#[test]
fn factory_or_insert_creates_once() {
    let registry = ConverterMetaFactory::new();
    let (first, created) = registry.factory_or_insert::<Beta>();
    assert!(created);
    let (second, created) = registry.factory_or_insert::<Beta>();
    assert!(!created);
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn families_are_listed_by_name() {
    let registry = ConverterMetaFactory::new();
    let _ = registry.factory_or_insert::<Beta>();
    let _ = registry.factory_or_insert::<Alpha>();
    assert_eq!(registry.families(), vec!["alpha", "beta"]);
    assert!(format!("{registry:?}").contains("alpha"));
}

#[test]
fn scopes_nest_and_restore() {
    let outer = Arc::new(ConverterMetaFactory::new());
    let inner = Arc::new(ConverterMetaFactory::new());
    {
        let _outer = ConverterMetaFactory::scoped(Arc::clone(&outer));
        assert!(Arc::ptr_eq(&ConverterMetaFactory::current(), &outer));
        {
            let _inner = ConverterMetaFactory::scoped(Arc::clone(&inner));
            assert!(Arc::ptr_eq(&ConverterMetaFactory::current(), &inner));
        }
        assert!(Arc::ptr_eq(&ConverterMetaFactory::current(), &outer));
    }
    assert!(Arc::ptr_eq(
        &ConverterMetaFactory::current(),
        &ConverterMetaFactory::process()
    ));
}

#[test]
fn scopes_do_not_leak_across_threads() {
    let scoped = Arc::new(ConverterMetaFactory::new());
    let _guard = ConverterMetaFactory::scoped(Arc::clone(&scoped));

    let seen = std::thread::spawn(ConverterMetaFactory::current)
        .join()
        .unwrap();
    assert!(!Arc::ptr_eq(&seen, &scoped));
    assert!(Arc::ptr_eq(&seen, &ConverterMetaFactory::process()));
}

#[test]
fn dropping_an_outer_scope_first_keeps_the_inner_one_current() {
    let outer = Arc::new(ConverterMetaFactory::new());
    let inner = Arc::new(ConverterMetaFactory::new());

    let outer_guard = ConverterMetaFactory::scoped(Arc::clone(&outer));
    let inner_guard = ConverterMetaFactory::scoped(Arc::clone(&inner));
    drop(outer_guard);
    assert!(Arc::ptr_eq(&ConverterMetaFactory::current(), &inner));

    drop(inner_guard);
    assert!(Arc::ptr_eq(
        &ConverterMetaFactory::current(),
        &ConverterMetaFactory::process()
    ));
}
