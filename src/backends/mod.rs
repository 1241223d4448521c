//! Simulated execution backends.
//!
//! Host arrays, device textures, device compute buffers, and disk files for two data families
//! (images and linear buffers), plus the [`BackendModule`](crate::BackendModule)s that register
//! their converters. Devices are simulated: they count allocations and transfers and can be
//! "lost" to exercise resource-loss handling.

pub(crate) mod buffer;
pub(crate) mod device;
pub(crate) mod image;
pub(crate) mod modules;

pub use buffer::{BufferCl, BufferFamily, BufferRam, BufferShape};
pub use device::{DeviceBuffer, DeviceContext, DeviceStats};
pub use image::{ImageCl, ImageDisk, ImageFamily, ImageGl, ImageRam, ImageShape};
pub use modules::{ClModule, DiskModule, GlModule};
