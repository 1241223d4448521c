use std::{any::Any, fmt};

use crate::foundation::{
    core::{Priority, ReprKind},
    error::{ReprError, ReprResult},
};

/// A logical data family (image, volume, buffer, ...).
///
/// The family is the key under which converters are registered: representations of different
/// families never convert into each other.
pub trait DataFamily: Sized + Send + Sync + 'static {
    /// Shape metadata shared by every representation of one data object.
    type Shape: Clone + PartialEq + fmt::Debug + Send + Sync + 'static;

    /// Human readable family name used in logs and reports.
    const NAME: &'static str;

    /// Build the representation an empty owner starts from.
    fn create_default(shape: &Self::Shape) -> ReprResult<Box<dyn Representation<Self>>>;
}

/// One backend-specific encoding of a data object's content.
///
/// Implementations are leaves: they never reference sibling representations. The owning
/// [`crate::Data`] decides which of them are valid.
pub trait Representation<F: DataFamily>: Any + Send + Sync + fmt::Debug + 'static {
    /// Deep copy that can be mutated independently of `self`.
    fn clone_repr(&self) -> Box<dyn Representation<F>>;

    /// Ranking hint used when choosing a conversion source.
    fn priority(&self) -> Priority;

    /// Returns `false` when an external resource backing this representation is gone.
    fn is_valid(&self) -> bool {
        true
    }

    /// Called when this representation becomes the authoritative one.
    ///
    /// With `editable == true` the representation must be sized for `shape`; it may not assume
    /// the previous shape.
    fn update(&mut self, editable: bool, shape: &F::Shape) -> ReprResult<()>;

    /// Copy content straight into a compatible `target`.
    ///
    /// Returns `false` when the concrete kinds are incompatible; callers then fall back to the
    /// converter path.
    fn copy_representations_to(&self, _target: &mut dyn Representation<F>) -> bool {
        false
    }

    /// Lookup key for this representation's concrete kind.
    fn kind(&self) -> ReprKind {
        ReprKind::of::<Self>()
    }
}

impl<F: DataFamily> dyn Representation<F> {
    /// Borrow as concrete kind `K`.
    pub fn downcast_ref<K: Representation<F>>(&self) -> Option<&K> {
        let any: &dyn Any = self;
        any.downcast_ref::<K>()
    }

    /// Mutably borrow as concrete kind `K`.
    pub fn downcast_mut<K: Representation<F>>(&mut self) -> Option<&mut K> {
        let any: &mut dyn Any = self;
        any.downcast_mut::<K>()
    }

    /// Whether this representation is of concrete kind `K`.
    pub fn is<K: Representation<F>>(&self) -> bool {
        self.kind() == ReprKind::of::<K>()
    }
}

/// Borrow `repr` as `K` or report which kind was found instead.
pub(crate) fn expect_kind<F: DataFamily, K: Representation<F>>(
    repr: &dyn Representation<F>,
) -> ReprResult<&K> {
    let found = repr.kind();
    repr.downcast_ref::<K>()
        .ok_or_else(|| ReprError::kind_mismatch(ReprKind::of::<K>(), found))
}

/// Mutable counterpart of [`expect_kind`].
pub(crate) fn expect_kind_mut<F: DataFamily, K: Representation<F>>(
    repr: &mut dyn Representation<F>,
) -> ReprResult<&mut K> {
    let found = repr.kind();
    repr.downcast_mut::<K>()
        .ok_or_else(|| ReprError::kind_mismatch(ReprKind::of::<K>(), found))
}

#[cfg(test)]
#[path = "../../tests/unit/representation/repr.rs"]
mod tests;
