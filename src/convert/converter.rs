use std::{marker::PhantomData, sync::Arc};

use smallvec::SmallVec;

use crate::{
    foundation::{
        core::ReprKind,
        error::{ReprError, ReprResult},
    },
    representation::repr::{DataFamily, Representation, expect_kind, expect_kind_mut},
};

/// A directed edge that produces or refreshes one representation kind from another.
///
/// Converters are stateless with respect to the data they convert and are shared by every owner
/// of their family.
pub trait Converter<F: DataFamily>: Send + Sync {
    /// Kind this converter reads from.
    fn source(&self) -> ReprKind;

    /// Kind this converter produces.
    fn destination(&self) -> ReprKind;

    /// Edge weight used by path search.
    fn cost(&self) -> u32 {
        1
    }

    /// Build a new destination representation from `source`.
    fn create_from(
        &self,
        source: &dyn Representation<F>,
        shape: &F::Shape,
    ) -> ReprResult<Box<dyn Representation<F>>>;

    /// Refresh a previously allocated `destination` in place from `source`.
    fn update(
        &self,
        source: &dyn Representation<F>,
        destination: &mut dyn Representation<F>,
        shape: &F::Shape,
    ) -> ReprResult<()>;
}

type CreateFn<F, S, D> = dyn Fn(&S, &<F as DataFamily>::Shape) -> ReprResult<D> + Send + Sync;
type UpdateFn<F, S, D> =
    dyn Fn(&S, &mut D, &<F as DataFamily>::Shape) -> ReprResult<()> + Send + Sync;

/// Typed converter built from a pair of closures over concrete kinds `S -> D`.
pub struct FnConverter<F: DataFamily, S, D> {
    create: Box<CreateFn<F, S, D>>,
    update: Box<UpdateFn<F, S, D>>,
    cost: u32,
    _kinds: PhantomData<fn() -> (F, S, D)>,
}

impl<F, S, D> FnConverter<F, S, D>
where
    F: DataFamily,
    S: Representation<F>,
    D: Representation<F>,
{
    /// Build a converter from its cold-start and in-place refresh functions.
    pub fn new(
        create: impl Fn(&S, &F::Shape) -> ReprResult<D> + Send + Sync + 'static,
        update: impl Fn(&S, &mut D, &F::Shape) -> ReprResult<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            create: Box::new(create),
            update: Box::new(update),
            cost: 1,
            _kinds: PhantomData,
        }
    }

    /// Override the path-search edge weight.
    pub fn with_cost(mut self, cost: u32) -> Self {
        self.cost = cost;
        self
    }
}

impl<F, S, D> Converter<F> for FnConverter<F, S, D>
where
    F: DataFamily,
    S: Representation<F>,
    D: Representation<F>,
{
    fn source(&self) -> ReprKind {
        ReprKind::of::<S>()
    }

    fn destination(&self) -> ReprKind {
        ReprKind::of::<D>()
    }

    fn cost(&self) -> u32 {
        self.cost
    }

    fn create_from(
        &self,
        source: &dyn Representation<F>,
        shape: &F::Shape,
    ) -> ReprResult<Box<dyn Representation<F>>> {
        let src = expect_kind::<F, S>(source)?;
        let created = (self.create)(src, shape)?;
        Ok(Box::new(created))
    }

    fn update(
        &self,
        source: &dyn Representation<F>,
        destination: &mut dyn Representation<F>,
        shape: &F::Shape,
    ) -> ReprResult<()> {
        let src = expect_kind::<F, S>(source)?;
        let dst = expect_kind_mut::<F, D>(destination)?;
        (self.update)(src, dst, shape)
    }
}

/// Composite converter that applies a chain of converters in sequence.
///
/// Intermediate representations are materialized for the duration of one call and dropped
/// afterwards.
pub struct ConverterPath<F: DataFamily> {
    hops: SmallVec<[Arc<dyn Converter<F>>; 4]>,
}

impl<F: DataFamily> ConverterPath<F> {
    /// Build a path from a non-empty chain whose hops connect end to start.
    pub fn new(hops: impl IntoIterator<Item = Arc<dyn Converter<F>>>) -> ReprResult<Self> {
        let hops: SmallVec<[Arc<dyn Converter<F>>; 4]> = hops.into_iter().collect();
        if hops.is_empty() {
            return Err(ReprError::validation("converter path must not be empty"));
        }
        for pair in hops.windows(2) {
            if pair[0].destination() != pair[1].source() {
                return Err(ReprError::validation(format!(
                    "converter path is broken between {} and {}",
                    pair[0].destination(),
                    pair[1].source()
                )));
            }
        }
        Ok(Self { hops })
    }

    /// Individual converters, in application order.
    pub fn hops(&self) -> &[Arc<dyn Converter<F>>] {
        &self.hops
    }

    /// Number of converters in the chain.
    pub fn len(&self) -> usize {
        self.hops.len()
    }

    /// Always `false`: paths hold at least one hop.
    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    /// Every kind visited, source first.
    pub fn kinds(&self) -> Vec<ReprKind> {
        let mut out = Vec::with_capacity(self.hops.len() + 1);
        out.push(self.source());
        out.extend(self.hops.iter().map(|h| h.destination()));
        out
    }

    fn last(&self) -> &Arc<dyn Converter<F>> {
        &self.hops[self.hops.len() - 1]
    }

    /// Run every hop except the last, returning the final intermediate (if any).
    fn run_prefix(
        &self,
        source: &dyn Representation<F>,
        shape: &F::Shape,
    ) -> ReprResult<Option<Box<dyn Representation<F>>>> {
        let mut current: Option<Box<dyn Representation<F>>> = None;
        for hop in &self.hops[..self.hops.len() - 1] {
            let next = {
                let src = current.as_deref().unwrap_or(source);
                hop.create_from(src, shape)?
            };
            current = Some(next);
        }
        Ok(current)
    }
}

impl<F: DataFamily> Converter<F> for ConverterPath<F> {
    fn source(&self) -> ReprKind {
        self.hops[0].source()
    }

    fn destination(&self) -> ReprKind {
        self.last().destination()
    }

    fn cost(&self) -> u32 {
        self.hops
            .iter()
            .fold(0u32, |acc, h| acc.saturating_add(h.cost()))
    }

    fn create_from(
        &self,
        source: &dyn Representation<F>,
        shape: &F::Shape,
    ) -> ReprResult<Box<dyn Representation<F>>> {
        let intermediate = self.run_prefix(source, shape)?;
        let src = intermediate.as_deref().unwrap_or(source);
        self.last().create_from(src, shape)
    }

    fn update(
        &self,
        source: &dyn Representation<F>,
        destination: &mut dyn Representation<F>,
        shape: &F::Shape,
    ) -> ReprResult<()> {
        let intermediate = self.run_prefix(source, shape)?;
        let src = intermediate.as_deref().unwrap_or(source);
        self.last().update(src, destination, shape)
    }
}

impl<F: DataFamily> std::fmt::Debug for ConverterPath<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConverterPath")
            .field("kinds", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/convert/converter.rs"]
mod tests;
