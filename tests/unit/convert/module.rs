use super::*;
use crate::{
    convert::converter::FnConverter,
    foundation::core::Priority,
    representation::repr::Representation,
};

struct Signal;
struct Volume;

impl DataFamily for Signal {
    type Shape = ();
    const NAME: &'static str = "signal";

    fn create_default(_: &()) -> ReprResult<Box<dyn Representation<Self>>> {
        Ok(Box::new(Ram))
    }
}

impl DataFamily for Volume {
    type Shape = ();
    const NAME: &'static str = "volume";

    fn create_default(_: &()) -> ReprResult<Box<dyn Representation<Self>>> {
        Ok(Box::new(Ram))
    }
}

macro_rules! mock_repr {
    ($name:ident) => {
        #[derive(Debug, Clone, Default)]
        struct $name;

        impl<F: DataFamily<Shape = ()>> Representation<F> for $name {
            fn clone_repr(&self) -> Box<dyn Representation<F>> {
                Box::new(self.clone())
            }

            fn priority(&self) -> Priority {
                Priority::RAM
            }

            fn update(&mut self, _editable: bool, _shape: &()) -> ReprResult<()> {
                Ok(())
            }
        }
    };
}

mock_repr!(Ram);
mock_repr!(Gl);
mock_repr!(Cl);

fn edge<F, S, D>() -> Arc<dyn Converter<F>>
where
    F: DataFamily<Shape = ()>,
    S: Representation<F>,
    D: Representation<F> + Default,
{
    Arc::new(FnConverter::<F, S, D>::new(
        |_, _| Ok(D::default()),
        |_, _, _| Ok(()),
    ))
}

struct TestModule {
    name: &'static str,
    stage: fn(&mut ModuleRegistration),
}

impl BackendModule for TestModule {
    fn name(&self) -> &str {
        self.name
    }

    fn register(&self, registration: &mut ModuleRegistration) -> ReprResult<()> {
        (self.stage)(registration);
        Ok(())
    }
}

fn gl_module() -> TestModule {
    TestModule {
        name: "gl",
        stage: |r| {
            r.converter(edge::<Signal, Ram, Gl>())
                .converter(edge::<Signal, Gl, Ram>());
        },
    }
}

fn cl_module() -> TestModule {
    TestModule {
        name: "cl",
        stage: |r| {
            r.converter(edge::<Signal, Gl, Cl>());
        },
    }
}

fn kind<T: 'static>() -> ReprKind {
    ReprKind::of::<T>()
}

#[test]
fn registration_adds_every_staged_converter() {
    let registry = ConverterMetaFactory::new();
    let handle = registry.register_module(&gl_module()).unwrap();

    assert_eq!(handle.module(), "gl");
    assert_eq!(handle.converter_count(), 2);
    assert_eq!(handle.families(), vec!["signal"]);

    let factory = registry.converter_factory::<Signal>().unwrap();
    assert!(factory.contains(kind::<Ram>(), kind::<Gl>()));
    assert!(factory.contains(kind::<Gl>(), kind::<Ram>()));
}

#[test]
fn unregistration_removes_exactly_what_the_module_added() {
    let registry = ConverterMetaFactory::new();
    let gl = registry.register_module(&gl_module()).unwrap();
    let cl = registry.register_module(&cl_module()).unwrap();

    registry.unregister_module(cl);
    let factory = registry.converter_factory::<Signal>().unwrap();
    assert_eq!(factory.len(), 2);
    assert!(!factory.contains(kind::<Gl>(), kind::<Cl>()));

    registry.unregister_module(gl);
    assert!(registry.converter_factory::<Signal>().is_none());
}

#[test]
fn factory_survives_while_another_module_still_uses_it() {
    let registry = ConverterMetaFactory::new();
    let gl = registry.register_module(&gl_module()).unwrap();
    let cl = registry.register_module(&cl_module()).unwrap();

    registry.unregister_module(gl);
    let factory = registry.converter_factory::<Signal>().unwrap();
    assert_eq!(factory.registered_pairs(), vec![(kind::<Gl>(), kind::<Cl>())]);

    registry.unregister_module(cl);
    // The cl module did not create the factory, so the empty factory stays.
    assert!(registry.converter_factory::<Signal>().unwrap().is_empty());
}

#[test]
fn conflicting_module_registers_nothing() {
    let registry = ConverterMetaFactory::new();
    let _gl = registry.register_module(&gl_module()).unwrap();

    let conflicting = TestModule {
        name: "conflicting",
        stage: |r| {
            r.converter(edge::<Signal, Gl, Cl>())
                .converter(edge::<Volume, Ram, Gl>())
                .converter(edge::<Signal, Ram, Gl>());
        },
    };
    let err = registry.register_module(&conflicting).unwrap_err();
    assert!(matches!(err, ReprError::DuplicateRegistration(_)));

    let factory = registry.converter_factory::<Signal>().unwrap();
    assert_eq!(factory.len(), 2);
    assert!(!factory.contains(kind::<Gl>(), kind::<Cl>()));
    assert!(registry.converter_factory::<Volume>().is_none());
}

#[test]
fn duplicate_within_one_module_is_rejected() {
    let registry = ConverterMetaFactory::new();
    let twice = TestModule {
        name: "twice",
        stage: |r| {
            r.converter(edge::<Signal, Ram, Gl>())
                .converter(edge::<Signal, Ram, Gl>());
        },
    };
    assert!(matches!(
        registry.register_module(&twice),
        Err(ReprError::DuplicateRegistration(_))
    ));
    assert!(registry.converter_factory::<Signal>().is_none());
}

#[test]
fn failing_module_leaves_registry_empty() {
    struct Broken;

    impl BackendModule for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn register(&self, registration: &mut ModuleRegistration) -> ReprResult<()> {
            registration.converter(edge::<Signal, Ram, Gl>());
            Err(ReprError::validation("device not found"))
        }
    }

    let registry = ConverterMetaFactory::new();
    let err = registry.register_module(&Broken).unwrap_err();
    assert!(err.to_string().contains("device not found"));
    assert!(registry.families().is_empty());
}

#[test]
fn one_module_can_serve_several_families() {
    let registry = ConverterMetaFactory::new();
    let both = TestModule {
        name: "both",
        stage: |r| {
            r.converter(edge::<Signal, Ram, Gl>())
                .converter(edge::<Volume, Ram, Gl>())
                .converter(edge::<Volume, Gl, Ram>());
        },
    };
    let handle = registry.register_module(&both).unwrap();
    assert_eq!(handle.converter_count(), 3);
    assert_eq!(registry.families(), vec!["signal", "volume"]);
    assert!(format!("{handle:?}").contains("both"));

    registry.unregister_module(handle);
    assert!(registry.families().is_empty());
}

#[test]
fn staging_groups_by_family() {
    let mut registration = ModuleRegistration::new("staging");
    assert!(registration.is_empty());
    registration
        .converter(edge::<Signal, Ram, Gl>())
        .converter(edge::<Volume, Ram, Gl>())
        .converter(edge::<Signal, Gl, Ram>());
    assert_eq!(registration.module(), "staging");
    assert_eq!(registration.len(), 3);
    assert_eq!(registration.staged.len(), 2);
}
