use super::*;
use crate::{
    convert::converter::FnConverter, foundation::core::Priority,
    representation::repr::Representation,
};

struct Signal;

impl DataFamily for Signal {
    type Shape = ();
    const NAME: &'static str = "signal";

    fn create_default(_: &()) -> ReprResult<Box<dyn Representation<Self>>> {
        Ok(Box::new(Ram(0)))
    }
}

macro_rules! mock_repr {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq)]
        struct $name(i32);

        impl Representation<Signal> for $name {
            fn clone_repr(&self) -> Box<dyn Representation<Signal>> {
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
mock_repr!(Vk);
mock_repr!(Disk);

trait Value {
    fn wrap(v: i32) -> Self;
    fn get(&self) -> i32;
}

macro_rules! value {
    ($($name:ident),*) => {
        $(impl Value for $name {
            fn wrap(v: i32) -> Self {
                Self(v)
            }
            fn get(&self) -> i32 {
                self.0
            }
        })*
    };
}

value!(Ram, Gl, Cl, Vk, Disk);

fn edge<S, D>(cost: u32) -> Arc<dyn Converter<Signal>>
where
    S: Representation<Signal> + Value,
    D: Representation<Signal> + Value,
{
    Arc::new(
        FnConverter::<Signal, S, D>::new(
            |s, _| Ok(D::wrap(s.get() + 1)),
            |s, d, _| {
                *d = D::wrap(s.get() + 1);
                Ok(())
            },
        )
        .with_cost(cost),
    )
}

fn kind<T: 'static>() -> ReprKind {
    ReprKind::of::<T>()
}

fn linked_factory() -> ConverterFactory<Signal> {
    let factory = ConverterFactory::new();
    factory.register_converter(edge::<Ram, Gl>(1)).unwrap();
    factory.register_converter(edge::<Gl, Ram>(1)).unwrap();
    factory.register_converter(edge::<Gl, Cl>(1)).unwrap();
    factory.register_converter(edge::<Cl, Gl>(1)).unwrap();
    factory
}

#[test]
fn ram_reaches_cl_through_gl_in_two_hops() {
    let factory = linked_factory();
    let path = factory.converter_path(kind::<Ram>(), kind::<Cl>()).unwrap();
    assert_eq!(path.len(), 2);
    assert_eq!(path.kinds(), vec![kind::<Ram>(), kind::<Gl>(), kind::<Cl>()]);

    let conv = factory.get_converter(kind::<Ram>(), kind::<Cl>()).unwrap();
    let created = conv.create_from(&Ram(1), &()).unwrap();
    assert_eq!(created.downcast_ref::<Cl>(), Some(&Cl(3)));
}

#[test]
fn path_fails_cleanly_once_gl_cl_is_removed() {
    let factory = linked_factory();
    factory.converter_path(kind::<Ram>(), kind::<Cl>()).unwrap();

    assert!(factory.unregister_converter(kind::<Gl>(), kind::<Cl>()).is_some());
    assert!(factory.unregister_converter(kind::<Cl>(), kind::<Gl>()).is_some());

    let err = factory
        .converter_path(kind::<Ram>(), kind::<Cl>())
        .unwrap_err();
    assert!(matches!(err, ReprError::NoConversionPath { .. }));
    assert!(err.to_string().contains("from Ram to Cl"));
    assert!(factory.get_converter(kind::<Ram>(), kind::<Cl>()).is_err());
}

#[test]
fn negative_lookup_is_forgotten_after_registration() {
    let factory = ConverterFactory::<Signal>::new();
    factory.register_converter(edge::<Ram, Gl>(1)).unwrap();
    assert!(factory.converter_path(kind::<Ram>(), kind::<Cl>()).is_err());

    factory.register_converter(edge::<Gl, Cl>(1)).unwrap();
    assert_eq!(
        factory
            .converter_path(kind::<Ram>(), kind::<Cl>())
            .unwrap()
            .len(),
        2
    );
}

#[test]
fn duplicate_registration_keeps_the_original() {
    let factory = ConverterFactory::<Signal>::new();
    factory.register_converter(edge::<Ram, Gl>(1)).unwrap();

    let err = factory
        .register_converter(edge::<Ram, Gl>(7))
        .unwrap_err();
    assert!(matches!(err, ReprError::DuplicateRegistration(_)));
    assert_eq!(factory.len(), 1);
    assert_eq!(
        factory
            .converter(kind::<Ram>(), kind::<Gl>())
            .unwrap()
            .cost(),
        1
    );
}

#[test]
fn self_conversions_are_rejected() {
    let factory = ConverterFactory::<Signal>::new();
    let err = factory.register_converter(edge::<Ram, Ram>(1)).unwrap_err();
    assert!(matches!(err, ReprError::Validation(_)));
    assert!(factory.is_empty());

    let err = factory
        .converter_path(kind::<Ram>(), kind::<Ram>())
        .unwrap_err();
    assert!(matches!(err, ReprError::Validation(_)));
}

#[test]
fn registered_direct_converter_wins_over_a_cheaper_chain() {
    let factory = linked_factory();
    factory.register_converter(edge::<Ram, Cl>(5)).unwrap();

    let path = factory.converter_path(kind::<Ram>(), kind::<Cl>()).unwrap();
    assert_eq!(path.kinds(), vec![kind::<Ram>(), kind::<Cl>()]);
    assert_eq!(path.cost(), 5);

    let direct = factory.get_converter(kind::<Ram>(), kind::<Cl>()).unwrap();
    assert_eq!(direct.cost(), 5);
}

#[test]
fn cheapest_chain_is_chosen_without_a_direct_converter() {
    let factory = linked_factory();
    factory.register_converter(edge::<Ram, Vk>(5)).unwrap();
    factory.register_converter(edge::<Vk, Cl>(5)).unwrap();

    let path = factory.converter_path(kind::<Ram>(), kind::<Cl>()).unwrap();
    assert_eq!(path.kinds(), vec![kind::<Ram>(), kind::<Gl>(), kind::<Cl>()]);
    assert_eq!(path.cost(), 2);
}

#[test]
fn hop_limit_bounds_the_search() {
    let factory = ConverterFactory::<Signal>::with_opts(FactoryOpts { max_path_hops: 1 });
    factory.register_converter(edge::<Ram, Gl>(1)).unwrap();
    factory.register_converter(edge::<Gl, Cl>(1)).unwrap();

    assert_eq!(factory.opts().max_path_hops, 1);
    assert!(factory.converter_path(kind::<Ram>(), kind::<Gl>()).is_ok());
    assert!(matches!(
        factory.converter_path(kind::<Ram>(), kind::<Cl>()),
        Err(ReprError::NoConversionPath { .. })
    ));
}

#[test]
fn registered_pairs_are_sorted() {
    let factory = linked_factory();
    let pairs = factory.registered_pairs();
    assert_eq!(pairs.len(), 4);
    let mut sorted = pairs.clone();
    sorted.sort();
    assert_eq!(pairs, sorted);
    assert!(factory.contains(kind::<Gl>(), kind::<Cl>()));
    assert!(!factory.contains(kind::<Ram>(), kind::<Cl>()));
}

#[test]
fn costlier_short_route_is_found_when_the_cheap_one_exceeds_the_hop_limit() {
    let factory = ConverterFactory::<Signal>::with_opts(FactoryOpts { max_path_hops: 2 });
    factory.register_converter(edge::<Ram, Gl>(1)).unwrap();
    factory.register_converter(edge::<Gl, Vk>(1)).unwrap();
    factory.register_converter(edge::<Ram, Vk>(5)).unwrap();
    factory.register_converter(edge::<Vk, Disk>(1)).unwrap();

    let path = factory
        .converter_path(kind::<Ram>(), kind::<Disk>())
        .unwrap();
    assert_eq!(path.kinds(), vec![kind::<Ram>(), kind::<Vk>(), kind::<Disk>()]);
    assert_eq!(path.cost(), 6);

    let created = path.create_from(&Ram(0), &()).unwrap();
    assert_eq!(created.downcast_ref::<Disk>(), Some(&Disk(2)));
}
