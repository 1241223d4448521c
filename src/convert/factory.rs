use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use parking_lot::RwLock;

use crate::{
    convert::converter::{Converter, ConverterPath},
    foundation::{
        core::ReprKind,
        error::{ReprError, ReprResult},
    },
    representation::repr::DataFamily,
};

/// Path search configuration.
#[derive(Debug, Clone, Copy)]
pub struct FactoryOpts {
    /// Longest chain of converters the search will consider.
    pub max_path_hops: usize,
}

impl Default for FactoryOpts {
    fn default() -> Self {
        Self { max_path_hops: 8 }
    }
}

type ConverterKey = (ReprKind, ReprKind);

struct FactoryState<F: DataFamily> {
    converters: HashMap<ConverterKey, Arc<dyn Converter<F>>>,
    // Negative results are cached too; cleared on every registration change.
    paths: HashMap<ConverterKey, Option<Arc<ConverterPath<F>>>>,
}

/// Registry of converters for one data family, with multi-hop path search.
///
/// The registry is read-mostly: registration happens at module-init time, lookups happen on
/// every cache miss. Resolved paths are memoized per `(source, destination)` pair.
pub struct ConverterFactory<F: DataFamily> {
    opts: FactoryOpts,
    state: RwLock<FactoryState<F>>,
}

impl<F: DataFamily> Default for ConverterFactory<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: DataFamily> ConverterFactory<F> {
    /// Empty factory with default options.
    pub fn new() -> Self {
        Self::with_opts(FactoryOpts::default())
    }

    /// Empty factory with explicit options.
    pub fn with_opts(opts: FactoryOpts) -> Self {
        Self {
            opts,
            state: RwLock::new(FactoryState {
                converters: HashMap::new(),
                paths: HashMap::new(),
            }),
        }
    }

    /// Options this factory was built with.
    pub fn opts(&self) -> FactoryOpts {
        self.opts
    }

    /// Register a direct converter.
    ///
    /// Fails with [`ReprError::DuplicateRegistration`] when the `(source, destination)` pair is
    /// already taken; the existing converter stays registered.
    pub fn register_converter(&self, converter: Arc<dyn Converter<F>>) -> ReprResult<()> {
        let key = (converter.source(), converter.destination());
        if key.0 == key.1 {
            return Err(ReprError::validation(format!(
                "converter from {} to itself",
                key.0
            )));
        }

        let mut state = self.state.write();
        if state.converters.contains_key(&key) {
            return Err(ReprError::duplicate_registration(format!(
                "{} converter {} -> {}",
                F::NAME,
                key.0,
                key.1
            )));
        }
        state.converters.insert(key, converter);
        state.paths.clear();
        tracing::debug!(family = F::NAME, from = %key.0, to = %key.1, "registered converter");
        Ok(())
    }

    /// Remove the direct converter for `source -> destination`, if present.
    pub fn unregister_converter(
        &self,
        source: ReprKind,
        destination: ReprKind,
    ) -> Option<Arc<dyn Converter<F>>> {
        let mut state = self.state.write();
        let removed = state.converters.remove(&(source, destination));
        if removed.is_some() {
            state.paths.clear();
            tracing::debug!(
                family = F::NAME,
                from = %source,
                to = %destination,
                "unregistered converter"
            );
        }
        removed
    }

    /// Whether a direct converter exists for the pair.
    pub fn contains(&self, source: ReprKind, destination: ReprKind) -> bool {
        self.state
            .read()
            .converters
            .contains_key(&(source, destination))
    }

    /// Direct converter for the pair, without path search.
    pub fn converter(
        &self,
        source: ReprKind,
        destination: ReprKind,
    ) -> Option<Arc<dyn Converter<F>>> {
        self.state
            .read()
            .converters
            .get(&(source, destination))
            .cloned()
    }

    /// Converter for the pair: the direct one when registered, else a synthesized composite.
    pub fn get_converter(
        &self,
        source: ReprKind,
        destination: ReprKind,
    ) -> ReprResult<Arc<dyn Converter<F>>> {
        if let Some(direct) = self.converter(source, destination) {
            return Ok(direct);
        }
        let path: Arc<dyn Converter<F>> = self.converter_path(source, destination)?;
        Ok(path)
    }

    /// Chain of converters from `source` to `destination`.
    ///
    /// A registered direct converter yields a one-hop path regardless of cost; otherwise this is
    /// the cheapest chain within [`FactoryOpts::max_path_hops`]. Fails with
    /// [`ReprError::NoConversionPath`] when the destination is unreachable.
    pub fn converter_path(
        &self,
        source: ReprKind,
        destination: ReprKind,
    ) -> ReprResult<Arc<ConverterPath<F>>> {
        if source == destination {
            return Err(ReprError::validation(format!(
                "conversion from {source} to itself"
            )));
        }
        let key = (source, destination);

        if let Some(cached) = self.state.read().paths.get(&key) {
            return cached
                .clone()
                .ok_or_else(|| ReprError::no_conversion_path(source, destination));
        }

        let mut state = self.state.write();
        // Another writer may have resolved it between the two locks.
        if let Some(cached) = state.paths.get(&key) {
            return cached
                .clone()
                .ok_or_else(|| ReprError::no_conversion_path(source, destination));
        }

        // A registered direct converter is always used as is.
        let hops = match state.converters.get(&key) {
            Some(direct) => Some(vec![Arc::clone(direct)]),
            None => shortest_path(
                &state.converters,
                source,
                destination,
                self.opts.max_path_hops,
            ),
        };
        let resolved = match hops {
            Some(hops) => Some(Arc::new(ConverterPath::new(hops)?)),
            None => None,
        };
        tracing::debug!(
            family = F::NAME,
            from = %source,
            to = %destination,
            hops = resolved.as_ref().map_or(0, |p| p.len()),
            "resolved converter path"
        );
        state.paths.insert(key, resolved.clone());
        resolved.ok_or_else(|| ReprError::no_conversion_path(source, destination))
    }

    /// Every registered `(source, destination)` pair, sorted.
    pub fn registered_pairs(&self) -> Vec<(ReprKind, ReprKind)> {
        let mut pairs: Vec<_> = self.state.read().converters.keys().copied().collect();
        pairs.sort();
        pairs
    }

    /// Number of direct converters.
    pub fn len(&self) -> usize {
        self.state.read().converters.len()
    }

    /// Whether no converter is registered.
    pub fn is_empty(&self) -> bool {
        self.state.read().converters.is_empty()
    }
}

/// Cheapest route from `source` to `destination` using at most `max_hops` converters.
///
/// Relaxes one hop layer at a time, so a costlier but shorter route is still found when the
/// cheapest one would exceed the bound. Ties go to fewer hops, then kind order.
fn shortest_path<F: DataFamily>(
    converters: &HashMap<ConverterKey, Arc<dyn Converter<F>>>,
    source: ReprKind,
    destination: ReprKind,
    max_hops: usize,
) -> Option<Vec<Arc<dyn Converter<F>>>> {
    let mut adjacency: BTreeMap<ReprKind, Vec<&Arc<dyn Converter<F>>>> = BTreeMap::new();
    for ((from, _), conv) in converters {
        adjacency.entry(*from).or_default().push(conv);
    }
    for edges in adjacency.values_mut() {
        edges.sort_by_key(|c| c.destination());
    }

    // layers[h]: cheapest cost of reaching each kind in exactly h hops, and the edge taken.
    let mut layers: Vec<HashMap<ReprKind, (u64, Option<&Arc<dyn Converter<F>>>)>> =
        vec![HashMap::from([(source, (0, None))])];
    let mut best: Option<(u64, usize)> = None;

    for hops in 1..=max_hops {
        let mut frontier: Vec<(ReprKind, u64)> = layers[hops - 1]
            .iter()
            .map(|(kind, (cost, _))| (*kind, *cost))
            .collect();
        frontier.sort();

        let mut next: HashMap<ReprKind, (u64, Option<&Arc<dyn Converter<F>>>)> = HashMap::new();
        for (node, cost) in frontier {
            let Some(edges) = adjacency.get(&node) else {
                continue;
            };
            for edge in edges {
                let to = edge.destination();
                if to == source {
                    continue;
                }
                let candidate = cost + u64::from(edge.cost());
                if next.get(&to).is_none_or(|&(c, _)| candidate < c) {
                    next.insert(to, (candidate, Some(*edge)));
                }
            }
        }
        if next.is_empty() {
            break;
        }
        if let Some(&(cost, _)) = next.get(&destination)
            && best.is_none_or(|(b, _)| cost < b)
        {
            best = Some((cost, hops));
        }
        layers.push(next);
    }

    let (_, hops) = best?;
    let mut chain = Vec::with_capacity(hops);
    let mut cursor = destination;
    for layer in layers[1..=hops].iter().rev() {
        let edge = layer.get(&cursor)?.1?;
        chain.push(Arc::clone(edge));
        cursor = edge.source();
    }
    chain.reverse();
    Some(chain)
}

#[cfg(test)]
#[path = "../../tests/unit/convert/factory.rs"]
mod tests;
