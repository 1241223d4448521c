use std::{
    any::{Any, TypeId},
    collections::HashSet,
    sync::Arc,
};

use crate::{
    convert::{converter::Converter, meta::ConverterMetaFactory},
    foundation::{
        core::ReprKind,
        error::{ReprError, ReprResult},
    },
    representation::repr::DataFamily,
};

/// A backend (RAM, GL, CL, disk, ...) that contributes converters at init time.
pub trait BackendModule {
    /// Module name used in logs and handles.
    fn name(&self) -> &str;

    /// Stage this module's converters.
    fn register(&self, registration: &mut ModuleRegistration) -> ReprResult<()>;
}

/// Staging area filled by [`BackendModule::register`].
///
/// Nothing becomes visible in the registry until every staged converter has been validated.
pub struct ModuleRegistration {
    module: String,
    staged: Vec<Box<dyn StagedFamily>>,
}

impl ModuleRegistration {
    fn new(module: &str) -> Self {
        Self {
            module: module.to_string(),
            staged: Vec::new(),
        }
    }

    /// Name of the module being registered.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Stage a converter for family `F`.
    pub fn converter<F: DataFamily>(&mut self, converter: Arc<dyn Converter<F>>) -> &mut Self {
        let family = TypeId::of::<F>();
        let existing = self
            .staged
            .iter_mut()
            .find(|s| s.family() == family)
            .and_then(|s| {
                let any: &mut dyn Any = s.as_mut();
                any.downcast_mut::<Staged<F>>()
            });
        match existing {
            Some(staged) => staged.converters.push(converter),
            None => self.staged.push(Box::new(Staged::<F> {
                converters: vec![converter],
            })),
        }
        self
    }

    /// Number of staged converters across all families.
    pub fn len(&self) -> usize {
        self.staged.iter().map(|s| s.len()).sum()
    }

    /// Whether nothing has been staged.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

trait StagedFamily: Any {
    fn family(&self) -> TypeId;
    fn len(&self) -> usize;
    fn validate(&self, registry: &ConverterMetaFactory) -> ReprResult<()>;
    fn commit(self: Box<Self>, registry: &ConverterMetaFactory)
    -> ReprResult<Box<dyn Committed>>;
}

trait Committed: Send + Sync {
    fn family_name(&self) -> &'static str;
    fn len(&self) -> usize;
    fn remove(self: Box<Self>, registry: &ConverterMetaFactory);
}

struct Staged<F: DataFamily> {
    converters: Vec<Arc<dyn Converter<F>>>,
}

impl<F: DataFamily> StagedFamily for Staged<F> {
    fn family(&self) -> TypeId {
        TypeId::of::<F>()
    }

    fn len(&self) -> usize {
        self.converters.len()
    }

    fn validate(&self, registry: &ConverterMetaFactory) -> ReprResult<()> {
        let factory = registry.converter_factory::<F>();
        let mut seen = HashSet::new();
        for conv in &self.converters {
            let key = (conv.source(), conv.destination());
            let taken = factory.as_ref().is_some_and(|f| f.contains(key.0, key.1));
            if !seen.insert(key) || taken {
                return Err(ReprError::duplicate_registration(format!(
                    "{} converter {} -> {}",
                    F::NAME,
                    key.0,
                    key.1
                )));
            }
        }
        Ok(())
    }

    fn commit(
        self: Box<Self>,
        registry: &ConverterMetaFactory,
    ) -> ReprResult<Box<dyn Committed>> {
        let (factory, created_factory) = registry.factory_or_insert::<F>();
        let mut committed = CommittedFamily::<F> {
            pairs: Vec::with_capacity(self.converters.len()),
            created_factory,
            _family: std::marker::PhantomData,
        };
        for conv in self.converters {
            let key = (conv.source(), conv.destination());
            if let Err(err) = factory.register_converter(conv) {
                Box::new(committed).remove(registry);
                return Err(err);
            }
            committed.pairs.push(key);
        }
        Ok(Box::new(committed))
    }
}

struct CommittedFamily<F: DataFamily> {
    pairs: Vec<(ReprKind, ReprKind)>,
    created_factory: bool,
    _family: std::marker::PhantomData<fn() -> F>,
}

impl<F: DataFamily> Committed for CommittedFamily<F> {
    fn family_name(&self) -> &'static str {
        F::NAME
    }

    fn len(&self) -> usize {
        self.pairs.len()
    }

    fn remove(self: Box<Self>, registry: &ConverterMetaFactory) {
        let Some(factory) = registry.converter_factory::<F>() else {
            return;
        };
        for (source, destination) in &self.pairs {
            factory.unregister_converter(*source, *destination);
        }
        if self.created_factory && factory.is_empty() {
            registry.unregister_object::<F>();
        }
    }
}

/// Record of what one module added; pass it back to
/// [`ConverterMetaFactory::unregister_module`] to remove exactly that.
#[must_use = "dropping the handle makes the module impossible to unregister"]
pub struct ModuleHandle {
    module: String,
    committed: Vec<Box<dyn Committed>>,
}

impl ModuleHandle {
    /// Name of the registered module.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Number of converters the module added.
    pub fn converter_count(&self) -> usize {
        self.committed.iter().map(|c| c.len()).sum()
    }

    /// Families the module contributed converters to.
    pub fn families(&self) -> Vec<&'static str> {
        self.committed.iter().map(|c| c.family_name()).collect()
    }
}

impl std::fmt::Debug for ModuleHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleHandle")
            .field("module", &self.module)
            .field("families", &self.families())
            .field("converters", &self.converter_count())
            .finish()
    }
}

impl ConverterMetaFactory {
    /// Register every converter `module` stages, or none of them.
    #[tracing::instrument(skip_all, fields(module = module.name()))]
    pub fn register_module(&self, module: &dyn BackendModule) -> ReprResult<ModuleHandle> {
        let _serial = self.registration.lock();

        let mut registration = ModuleRegistration::new(module.name());
        module.register(&mut registration)?;
        for staged in &registration.staged {
            staged.validate(self)?;
        }

        let mut committed: Vec<Box<dyn Committed>> = Vec::with_capacity(registration.staged.len());
        for staged in registration.staged {
            match staged.commit(self) {
                Ok(done) => committed.push(done),
                Err(err) => {
                    for done in committed.into_iter().rev() {
                        done.remove(self);
                    }
                    tracing::warn!(error = %err, "module registration rolled back");
                    return Err(err);
                }
            }
        }

        let handle = ModuleHandle {
            module: registration.module,
            committed,
        };
        tracing::info!(
            converters = handle.converter_count(),
            families = ?handle.families(),
            "registered module"
        );
        Ok(handle)
    }

    /// Remove exactly what [`Self::register_module`] added for `handle`.
    pub fn unregister_module(&self, handle: ModuleHandle) {
        let _serial = self.registration.lock();
        let ModuleHandle { module, committed } = handle;
        for done in committed.into_iter().rev() {
            done.remove(self);
        }
        tracing::info!(module = %module, "unregistered module");
    }
}

#[cfg(test)]
#[path = "../../tests/unit/convert/module.rs"]
mod tests;
