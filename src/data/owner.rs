use std::{
    collections::HashMap,
    fmt,
    ops::{Deref, DerefMut},
    sync::Arc,
};

use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};

use crate::{
    convert::{
        converter::{Converter, ConverterPath},
        meta::ConverterMetaFactory,
    },
    data::{
        report::{CacheReport, EntryReport},
        select::{SourceCandidate, rank_sources},
    },
    foundation::{
        core::ReprKind,
        error::{ReprError, ReprResult},
    },
    representation::repr::{DataFamily, Representation},
};

/// Owner behavior switches.
#[derive(Debug, Clone, Copy)]
pub struct DataOpts {
    /// Keep every intermediate representation of a multi-hop conversion as a valid cache entry.
    pub retain_intermediates: bool,
    /// Try [`Representation::copy_representations_to`] before the converter path when refreshing
    /// a stale representation.
    pub sibling_fast_path: bool,
}

impl Default for DataOpts {
    fn default() -> Self {
        Self {
            retain_intermediates: false,
            sibling_fast_path: true,
        }
    }
}

struct Entry<F: DataFamily> {
    repr: Box<dyn Representation<F>>,
    valid: bool,
}

impl<F: DataFamily> Entry<F> {
    fn usable(&self) -> bool {
        self.valid && self.repr.is_valid()
    }
}

struct RepresentationCache<F: DataFamily> {
    shape: F::Shape,
    entries: HashMap<ReprKind, Entry<F>>,
    last_written: Option<ReprKind>,
}

/// Shared access to a cached representation.
///
/// The owner stays locked while this guard is alive; drop it before touching the same owner
/// again from this thread.
pub struct ReprRef<'a, K>(MappedMutexGuard<'a, K>);

impl<K> Deref for ReprRef<'_, K> {
    type Target = K;

    fn deref(&self) -> &K {
        &self.0
    }
}

/// Exclusive access to the authoritative representation, handed out by
/// [`Data::get_editable_representation`].
pub struct ReprMut<'a, K>(MappedMutexGuard<'a, K>);

impl<K> Deref for ReprMut<'_, K> {
    type Target = K;

    fn deref(&self) -> &K {
        &self.0
    }
}

impl<K> DerefMut for ReprMut<'_, K> {
    fn deref_mut(&mut self) -> &mut K {
        &mut self.0
    }
}

/// Owner of every representation of one logical data object.
///
/// Representations are created lazily on first access, converted from the best valid sibling,
/// and kept consistent with explicit valid/stale flags: read access only ever adds valid
/// entries, editable access leaves exactly one.
///
/// All bookkeeping runs under a per-owner mutex. The guard returned by an access keeps that
/// mutex locked, so concurrent accessors of the same owner are serialized for as long as the
/// caller uses the representation.
pub struct Data<F: DataFamily> {
    label: Option<String>,
    registry: Arc<ConverterMetaFactory>,
    opts: DataOpts,
    cache: Mutex<RepresentationCache<F>>,
}

impl<F: DataFamily> Data<F> {
    /// Empty owner converting through [`ConverterMetaFactory::current`].
    pub fn new(shape: F::Shape) -> Self {
        Self::with_registry(shape, ConverterMetaFactory::current())
    }

    /// Empty owner converting through `registry`.
    pub fn with_registry(shape: F::Shape, registry: Arc<ConverterMetaFactory>) -> Self {
        Self {
            label: None,
            registry,
            opts: DataOpts::default(),
            cache: Mutex::new(RepresentationCache {
                shape,
                entries: HashMap::new(),
                last_written: None,
            }),
        }
    }

    /// Return the owner with different options.
    pub fn with_opts(mut self, opts: DataOpts) -> Self {
        self.opts = opts;
        self
    }

    /// Return the owner with a label used in diagnostics.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Diagnostic label, if set.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Options in effect.
    pub fn opts(&self) -> DataOpts {
        self.opts
    }

    /// Registry this owner resolves converters through.
    pub fn registry(&self) -> &Arc<ConverterMetaFactory> {
        &self.registry
    }

    /// Read access to kind `K`, converting from the best valid sibling when needed.
    ///
    /// Never invalidates other representations. Fails with [`ReprError::NoConversionPath`] when
    /// no registered route reaches `K`.
    #[tracing::instrument(
        level = "debug",
        skip(self),
        fields(family = F::NAME, kind = %ReprKind::of::<K>(), label = self.label.as_deref())
    )]
    pub fn get_representation<K: Representation<F>>(&self) -> ReprResult<ReprRef<'_, K>> {
        let kind = ReprKind::of::<K>();
        let mut cache = self.cache.lock();
        if let Err(err) = cache.ensure_valid(kind, &self.registry, self.opts) {
            self.report_failure(kind, &err);
            return Err(err);
        }
        map_guard(cache, kind).map(ReprRef)
    }

    /// Write access to kind `K`.
    ///
    /// Brings `K` up to date like [`Self::get_representation`], sizes it for the current shape,
    /// records it as last written, and marks every other representation stale.
    #[tracing::instrument(
        level = "debug",
        skip(self),
        fields(family = F::NAME, kind = %ReprKind::of::<K>(), label = self.label.as_deref())
    )]
    pub fn get_editable_representation<K: Representation<F>>(
        &self,
    ) -> ReprResult<ReprMut<'_, K>> {
        let kind = ReprKind::of::<K>();
        let mut cache = self.cache.lock();
        let prepared = cache
            .ensure_valid(kind, &self.registry, self.opts)
            .and_then(|()| cache.make_authoritative(kind, true));
        if let Err(err) = prepared {
            self.report_failure(kind, &err);
            return Err(err);
        }
        map_guard(cache, kind).map(ReprMut)
    }

    /// Whether a representation of kind `K` is cached, valid or not.
    pub fn has_representation<K: Representation<F>>(&self) -> bool {
        self.cache.lock().entries.contains_key(&ReprKind::of::<K>())
    }

    /// Whether any representation is cached.
    pub fn has_representations(&self) -> bool {
        !self.cache.lock().entries.is_empty()
    }

    /// Whether `kind` is cached and flagged valid.
    pub fn is_valid_cached_kind(&self, kind: ReprKind) -> bool {
        self.cache
            .lock()
            .entries
            .get(&kind)
            .is_some_and(|e| e.valid)
    }

    /// Kinds flagged valid, sorted.
    pub fn valid_kinds(&self) -> Vec<ReprKind> {
        let cache = self.cache.lock();
        let mut kinds: Vec<_> = cache
            .entries
            .iter()
            .filter(|(_, e)| e.valid)
            .map(|(k, _)| *k)
            .collect();
        kinds.sort();
        kinds
    }

    /// Every cached kind, sorted.
    pub fn cached_kinds(&self) -> Vec<ReprKind> {
        let mut kinds: Vec<_> = self.cache.lock().entries.keys().copied().collect();
        kinds.sort();
        kinds
    }

    /// Kind that received the most recent write.
    pub fn last_written(&self) -> Option<ReprKind> {
        self.cache.lock().last_written
    }

    /// Install an externally built representation as the authoritative one.
    ///
    /// Replaces a cached representation of the same kind and marks every other kind stale.
    pub fn add_representation(&self, mut repr: Box<dyn Representation<F>>) -> ReprResult<()> {
        let kind = repr.kind();
        let mut cache = self.cache.lock();
        repr.update(false, &cache.shape)?;
        cache.entries.insert(kind, Entry { repr, valid: true });
        cache.mark_only_valid(kind);
        tracing::debug!(family = F::NAME, kind = %kind, "added representation");
        Ok(())
    }

    /// Drop the representation of `kind`, releasing its resources.
    ///
    /// When no valid representation is left the stale ones are dropped too, since nothing could
    /// refresh them.
    pub fn remove_representation(&self, kind: ReprKind) -> bool {
        let mut cache = self.cache.lock();
        let removed = cache.entries.remove(&kind).is_some();
        if removed {
            cache.after_removal();
        }
        removed
    }

    /// Drop every representation except `kind`.
    pub fn remove_other_representations(&self, kind: ReprKind) {
        let mut cache = self.cache.lock();
        cache.entries.retain(|k, _| *k == kind);
        cache.after_removal();
    }

    /// Drop every representation.
    pub fn clear_representations(&self) {
        let mut cache = self.cache.lock();
        cache.entries.clear();
        cache.last_written = None;
    }

    /// Declare `kind` authoritative after it was mutated outside editable access.
    pub fn invalidate_all_other(&self, kind: ReprKind) -> ReprResult<()> {
        self.cache.lock().make_authoritative(kind, false)
    }

    /// Current shape.
    pub fn shape(&self) -> F::Shape {
        self.cache.lock().shape.clone()
    }

    /// Replace the shape; representations resize on their next editable access.
    pub fn set_shape(&self, shape: F::Shape) {
        self.cache.lock().shape = shape;
    }

    /// Snapshot of every cached kind and its state.
    pub fn report(&self) -> CacheReport {
        let cache = self.cache.lock();
        let mut entries: Vec<EntryReport> = cache
            .entries
            .iter()
            .map(|(kind, e)| EntryReport {
                kind: *kind,
                priority: e.repr.priority(),
                valid: e.valid,
                resource_ok: e.repr.is_valid(),
                last_written: cache.last_written == Some(*kind),
            })
            .collect();
        entries.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.kind.cmp(&b.kind)));
        CacheReport {
            family: F::NAME,
            label: self.label.clone(),
            shape: format!("{:?}", cache.shape),
            entries,
        }
    }

    /// One-line human summary.
    pub fn data_info(&self) -> String {
        let report = self.report();
        let valid: Vec<String> = report.valid_kinds().iter().map(|k| k.to_string()).collect();
        format!(
            "{} {}: {} cached, valid [{}]",
            report.family,
            report.shape,
            report.entries.len(),
            valid.join(", ")
        )
    }

    /// Copy this owner's content into `target`.
    ///
    /// Reuses the target's storage through [`Representation::copy_representations_to`] when it
    /// already holds the authoritative kind; otherwise the target is cleared and receives a
    /// clone.
    pub fn copy_representations_into(&self, target: &Data<F>) {
        if std::ptr::eq(self, target) {
            return;
        }
        // Both owners are always locked in address order.
        let (source, mut dest) = if std::ptr::from_ref(self) < std::ptr::from_ref(target) {
            let source = self.cache.lock();
            (source, target.cache.lock())
        } else {
            let dest = target.cache.lock();
            (self.cache.lock(), dest)
        };
        dest.shape = source.shape.clone();

        let Some(kind) = source.authoritative() else {
            dest.entries.clear();
            dest.last_written = None;
            return;
        };
        let Some(entry) = source.entries.get(&kind) else {
            return;
        };

        if target.opts.sibling_fast_path
            && let Some(existing) = dest.entries.get_mut(&kind)
            && entry.repr.copy_representations_to(&mut *existing.repr)
        {
            existing.valid = true;
            dest.mark_only_valid(kind);
            return;
        }

        dest.entries.clear();
        dest.entries.insert(
            kind,
            Entry {
                repr: entry.repr.clone_repr(),
                valid: true,
            },
        );
        dest.last_written = Some(kind);
    }

    fn report_failure(&self, kind: ReprKind, err: &ReprError) {
        tracing::warn!(
            family = F::NAME,
            label = self.label.as_deref().unwrap_or("<unlabeled>"),
            kind = %kind,
            error = %err,
            "representation access failed"
        );
    }
}

impl<F: DataFamily> Clone for Data<F> {
    /// Deep-copies only the authoritative representation.
    fn clone(&self) -> Self {
        let cache = self.cache.lock();
        let mut entries = HashMap::new();
        let mut last_written = None;
        if let Some(kind) = cache.authoritative()
            && let Some(entry) = cache.entries.get(&kind)
        {
            entries.insert(
                kind,
                Entry {
                    repr: entry.repr.clone_repr(),
                    valid: true,
                },
            );
            last_written = Some(kind);
        }
        Self {
            label: self.label.clone(),
            registry: Arc::clone(&self.registry),
            opts: self.opts,
            cache: Mutex::new(RepresentationCache {
                shape: cache.shape.clone(),
                entries,
                last_written,
            }),
        }
    }
}

impl<F: DataFamily> fmt::Debug for Data<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.report();
        f.debug_struct("Data")
            .field("family", &report.family)
            .field("label", &report.label)
            .field("shape", &report.shape)
            .field("valid", &report.valid_kinds())
            .field("stale", &report.stale_kinds())
            .finish()
    }
}

fn map_guard<F: DataFamily, K: Representation<F>>(
    cache: MutexGuard<'_, RepresentationCache<F>>,
    kind: ReprKind,
) -> ReprResult<MappedMutexGuard<'_, K>> {
    let found = cache.entries.get(&kind).map(|e| e.repr.kind());
    MutexGuard::try_map(cache, |c| {
        c.entries
            .get_mut(&kind)
            .and_then(|e| e.repr.downcast_mut::<K>())
    })
    .map_err(|_| match found {
        Some(found) => ReprError::kind_mismatch(kind, found),
        None => ReprError::validation(format!("{kind} vanished from the cache")),
    })
}

impl<F: DataFamily> RepresentationCache<F> {
    fn ensure_default(&mut self) -> ReprResult<()> {
        if !self.entries.is_empty() {
            return Ok(());
        }
        let repr = F::create_default(&self.shape)?;
        let kind = repr.kind();
        tracing::debug!(family = F::NAME, kind = %kind, "created default representation");
        self.entries.insert(kind, Entry { repr, valid: true });
        self.last_written = Some(kind);
        Ok(())
    }

    fn ensure_valid(
        &mut self,
        kind: ReprKind,
        registry: &ConverterMetaFactory,
        opts: DataOpts,
    ) -> ReprResult<()> {
        self.ensure_default()?;

        match self.entries.get(&kind).map(|e| (e.valid, e.repr.is_valid())) {
            Some((true, true)) => return Ok(()),
            Some((_, false)) => self.evict(kind),
            _ => {}
        }

        let ranked = self.ranked_sources();
        let Some(&best) = ranked.first() else {
            return Err(ReprError::resource_unavailable(format!(
                "no usable {} representation to convert into {kind}",
                F::NAME
            )));
        };

        if opts.sibling_fast_path && self.try_sibling_copy(best, kind) {
            tracing::debug!(from = %best, to = %kind, "refreshed through sibling copy");
            return Ok(());
        }

        let factory = registry.converter_factory::<F>();
        let mut first_miss = None;
        for &source in &ranked {
            let path = match factory.as_ref() {
                Some(factory) => factory.converter_path(source, kind),
                None => Err(ReprError::no_conversion_path(source, kind)),
            };
            match path {
                Ok(path) => return self.apply_path(&path, source, opts),
                Err(err @ ReprError::NoConversionPath { .. }) => {
                    first_miss.get_or_insert(err);
                }
                Err(err) => return Err(err),
            }
        }
        Err(first_miss.unwrap_or_else(|| ReprError::no_conversion_path(best, kind)))
    }

    fn apply_path(
        &mut self,
        path: &ConverterPath<F>,
        source: ReprKind,
        opts: DataOpts,
    ) -> ReprResult<()> {
        tracing::debug!(
            family = F::NAME,
            from = %source,
            to = %path.destination(),
            hops = path.len(),
            "converting representation"
        );
        if !opts.retain_intermediates || path.len() == 1 {
            return self.apply_converter(path, source);
        }

        let mut current = source;
        for hop in path.hops() {
            let next = hop.destination();
            if !self.entries.get(&next).is_some_and(Entry::usable) {
                self.apply_converter(&**hop, current)?;
            }
            current = next;
        }
        Ok(())
    }

    /// Create or refresh `converter.destination()` from the cached `source`.
    ///
    /// On error the destination keeps its previous state.
    fn apply_converter(
        &mut self,
        converter: &dyn Converter<F>,
        source: ReprKind,
    ) -> ReprResult<()> {
        let dst = converter.destination();
        if dst == source {
            return Err(ReprError::validation(format!(
                "conversion from {source} to itself"
            )));
        }
        if self.entries.get(&dst).is_some_and(|e| !e.repr.is_valid()) {
            self.evict(dst);
        }

        if self.entries.contains_key(&dst) {
            let [Some(src), Some(target)] = self.entries.get_disjoint_mut([&source, &dst]) else {
                return Err(ReprError::validation(format!("{source} is not cached")));
            };
            converter.update(&*src.repr, &mut *target.repr, &self.shape)?;
            target.valid = true;
        } else {
            let src = self
                .entries
                .get(&source)
                .ok_or_else(|| ReprError::validation(format!("{source} is not cached")))?;
            let created = converter.create_from(&*src.repr, &self.shape)?;
            let found = created.kind();
            if found != dst {
                return Err(ReprError::kind_mismatch(dst, found));
            }
            self.entries.insert(
                dst,
                Entry {
                    repr: created,
                    valid: true,
                },
            );
        }
        Ok(())
    }

    fn try_sibling_copy(&mut self, source: ReprKind, kind: ReprKind) -> bool {
        if source == kind {
            return false;
        }
        let [Some(src), Some(target)] = self.entries.get_disjoint_mut([&source, &kind]) else {
            return false;
        };
        if src.repr.copy_representations_to(&mut *target.repr) {
            target.valid = true;
            return true;
        }
        false
    }

    fn make_authoritative(&mut self, kind: ReprKind, editable: bool) -> ReprResult<()> {
        let entry = self
            .entries
            .get_mut(&kind)
            .ok_or_else(|| ReprError::validation(format!("{kind} is not cached")))?;
        entry.repr.update(editable, &self.shape)?;
        entry.valid = true;
        self.mark_only_valid(kind);
        Ok(())
    }

    fn mark_only_valid(&mut self, kind: ReprKind) {
        for (k, e) in self.entries.iter_mut() {
            e.valid = *k == kind;
        }
        self.last_written = Some(kind);
    }

    fn evict(&mut self, kind: ReprKind) {
        tracing::debug!(
            family = F::NAME,
            kind = %kind,
            "evicting representation whose resource is gone"
        );
        self.entries.remove(&kind);
        if self.last_written == Some(kind) {
            self.last_written = None;
        }
    }

    fn after_removal(&mut self) {
        if !self.entries.values().any(|e| e.valid) {
            self.entries.clear();
            self.last_written = None;
            return;
        }
        if self
            .last_written
            .is_some_and(|k| !self.entries.contains_key(&k))
        {
            self.last_written = self.ranked_sources().first().copied();
        }
    }

    fn ranked_sources(&self) -> Vec<ReprKind> {
        rank_sources(
            self.entries
                .iter()
                .filter(|(_, e)| e.usable())
                .map(|(kind, e)| SourceCandidate {
                    kind: *kind,
                    priority: e.repr.priority(),
                    last_written: self.last_written == Some(*kind),
                }),
        )
    }

    /// Last-written kind when still usable, else the best valid one.
    fn authoritative(&self) -> Option<ReprKind> {
        self.last_written
            .filter(|k| self.entries.get(k).is_some_and(Entry::usable))
            .or_else(|| self.ranked_sources().first().copied())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/data/owner.rs"]
mod tests;
