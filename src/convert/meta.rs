use std::{
    any::{Any, TypeId},
    cell::RefCell,
    collections::HashMap,
    marker::PhantomData,
    sync::{
        Arc, OnceLock,
        atomic::{AtomicU64, Ordering},
    },
};

use parking_lot::{Mutex, RwLock};

use crate::{
    convert::factory::ConverterFactory,
    foundation::error::{ReprError, ReprResult},
    representation::repr::DataFamily,
};

struct FamilyEntry {
    name: &'static str,
    factory: Arc<dyn Any + Send + Sync>,
}

/// Registry of [`ConverterFactory`] instances keyed by data family.
///
/// Owners are normally handed a registry explicitly; [`ConverterMetaFactory::current`] is the
/// boundary accessor for code that has none. Tests isolate themselves with
/// [`ConverterMetaFactory::scoped`].
pub struct ConverterMetaFactory {
    families: RwLock<HashMap<TypeId, FamilyEntry>>,
    // Serializes module registration so validate-then-commit is atomic.
    pub(crate) registration: Mutex<()>,
}

static PROCESS_REGISTRY: OnceLock<Arc<ConverterMetaFactory>> = OnceLock::new();
static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(0);

thread_local! {
    static SCOPED_REGISTRIES: RefCell<Vec<(u64, Arc<ConverterMetaFactory>)>> =
        const { RefCell::new(Vec::new()) };
}

impl Default for ConverterMetaFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ConverterMetaFactory {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            families: RwLock::new(HashMap::new()),
            registration: Mutex::new(()),
        }
    }

    /// The process-wide registry, created empty on first use.
    pub fn process() -> Arc<Self> {
        Arc::clone(PROCESS_REGISTRY.get_or_init(|| Arc::new(Self::new())))
    }

    /// Registry in effect for the calling thread.
    ///
    /// The innermost live [`MetaFactoryScope`] wins; without one this is [`Self::process`].
    pub fn current() -> Arc<Self> {
        SCOPED_REGISTRIES
            .with(|stack| stack.borrow().last().map(|(_, registry)| Arc::clone(registry)))
            .unwrap_or_else(Self::process)
    }

    /// Make `registry` current on this thread until the returned guard is dropped.
    ///
    /// Guards nest. The most recently opened live guard wins; dropping a guard only withdraws
    /// its own registry, even when it is dropped out of order.
    pub fn scoped(registry: Arc<Self>) -> MetaFactoryScope {
        let id = NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed);
        SCOPED_REGISTRIES.with(|stack| stack.borrow_mut().push((id, registry)));
        MetaFactoryScope {
            id,
            _not_send: PhantomData,
        }
    }

    /// Register the converter factory for family `F`.
    pub fn register_object<F: DataFamily>(
        &self,
        factory: Arc<ConverterFactory<F>>,
    ) -> ReprResult<()> {
        let mut families = self.families.write();
        let key = TypeId::of::<F>();
        if families.contains_key(&key) {
            return Err(ReprError::duplicate_registration(format!(
                "converter factory for family {}",
                F::NAME
            )));
        }
        families.insert(
            key,
            FamilyEntry {
                name: F::NAME,
                factory,
            },
        );
        tracing::debug!(family = F::NAME, "registered converter factory");
        Ok(())
    }

    /// Remove and return the factory for family `F`.
    pub fn unregister_object<F: DataFamily>(&self) -> Option<Arc<ConverterFactory<F>>> {
        let entry = self.families.write().remove(&TypeId::of::<F>())?;
        tracing::debug!(family = F::NAME, "unregistered converter factory");
        entry.factory.downcast::<ConverterFactory<F>>().ok()
    }

    /// Factory for family `F`, or `None` when no module registered one.
    pub fn converter_factory<F: DataFamily>(&self) -> Option<Arc<ConverterFactory<F>>> {
        let families = self.families.read();
        let entry = families.get(&TypeId::of::<F>())?;
        Arc::clone(&entry.factory)
            .downcast::<ConverterFactory<F>>()
            .ok()
    }

    /// Factory for family `F`, registering an empty one first when missing.
    ///
    /// The flag is `true` when this call created the factory.
    pub fn factory_or_insert<F: DataFamily>(&self) -> (Arc<ConverterFactory<F>>, bool) {
        let mut families = self.families.write();
        if let Some(existing) = families
            .get(&TypeId::of::<F>())
            .and_then(|e| Arc::clone(&e.factory).downcast::<ConverterFactory<F>>().ok())
        {
            return (existing, false);
        }
        let factory = Arc::new(ConverterFactory::<F>::new());
        families.insert(
            TypeId::of::<F>(),
            FamilyEntry {
                name: F::NAME,
                factory: Arc::clone(&factory) as Arc<dyn Any + Send + Sync>,
            },
        );
        (factory, true)
    }

    /// Names of every family with a registered factory, sorted.
    pub fn families(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.families.read().values().map(|e| e.name).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for ConverterMetaFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConverterMetaFactory")
            .field("families", &self.families())
            .finish()
    }
}

/// Guard returned by [`ConverterMetaFactory::scoped`].
///
/// Bound to the thread that created it.
#[must_use = "the registry is only current while the guard is alive"]
pub struct MetaFactoryScope {
    id: u64,
    _not_send: PhantomData<*const ()>,
}

impl Drop for MetaFactoryScope {
    fn drop(&mut self) {
        SCOPED_REGISTRIES.with(|stack| stack.borrow_mut().retain(|(id, _)| *id != self.id));
    }
}

#[cfg(test)]
#[path = "../../tests/unit/convert/meta.rs"]
mod tests;
