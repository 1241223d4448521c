//! reprcache is a multi-representation data cache.
//!
//! One logical data object (an image, a buffer, ...) can live in several execution backends at
//! once: host arrays, device textures, device compute buffers, files on disk. A [`Data`] owner
//! holds every encoding of one object, converts between them lazily through registered
//! [`Converter`]s, and keeps them consistent with explicit valid/stale flags.
//!
//! # Pieces
//!
//! 1. **Representation**: one backend encoding, implementing [`Representation`] for a
//!    [`DataFamily`].
//! 2. **Converter**: a directed edge between two representation kinds, registered in the
//!    family's [`ConverterFactory`]; multi-hop routes are found by shortest-path search.
//! 3. **Registry**: [`ConverterMetaFactory`] maps each family to its factory. Backends fill it
//!    through [`BackendModule`]s, atomically.
//! 4. **Owner**: [`Data`] implements read access (never invalidates anything) and editable
//!    access (invalidates every sibling).
//!
//! The [`backends`] module ships simulated GL, CL, and disk backends for images and buffers.
//!
//! # Access contract
//!
//! - Reading kind `K` twice without a write in between converts at most once.
//! - After an editable access to `K`, every other kind is stale until read again.
//! - A failed access leaves the owner unchanged.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod convert;
mod data;
mod foundation;
mod representation;

pub mod backends;

pub use convert::converter::{Converter, ConverterPath, FnConverter};
pub use convert::factory::{ConverterFactory, FactoryOpts};
pub use convert::meta::{ConverterMetaFactory, MetaFactoryScope};
pub use convert::module::{BackendModule, ModuleHandle, ModuleRegistration};
pub use data::owner::{Data, DataOpts, ReprMut, ReprRef};
pub use data::report::{CacheReport, EntryReport};
pub use data::select::{SourceCandidate, rank_sources};
pub use foundation::core::{
    Priority, ReprKind, Sample, SampleFormat, samples_from_le_bytes, samples_to_le_bytes,
};
pub use foundation::error::{ReprError, ReprResult};
pub use representation::repr::{DataFamily, Representation};
