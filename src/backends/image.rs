use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::{
    backends::device::{DeviceBuffer, DeviceContext},
    foundation::{
        core::{Priority, Sample, SampleFormat, samples_from_le_bytes, samples_to_le_bytes},
        error::{ReprError, ReprResult},
    },
    representation::repr::{DataFamily, Representation},
};

/// Dimensions and sample format shared by every representation of one image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ImageShape {
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Sample format of the single luminance channel.
    pub format: SampleFormat,
}

impl ImageShape {
    /// Build a shape.
    pub fn new(width: u32, height: u32, format: SampleFormat) -> Self {
        Self {
            width,
            height,
            format,
        }
    }

    /// Number of texels.
    pub fn texel_count(&self) -> usize {
        (self.width as usize).saturating_mul(self.height as usize)
    }

    /// Tightly packed size in bytes.
    pub fn byte_len(&self) -> usize {
        self.texel_count()
            .saturating_mul(self.format.bytes_per_sample())
    }
}

/// Single-channel 2D images.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImageFamily;

impl DataFamily for ImageFamily {
    type Shape = ImageShape;

    const NAME: &'static str = "image";

    fn create_default(shape: &ImageShape) -> ReprResult<Box<dyn Representation<Self>>> {
        Ok(match shape.format {
            SampleFormat::U8 => Box::new(ImageRam::<u8>::new(shape)?),
            SampleFormat::U16 => Box::new(ImageRam::<u16>::new(shape)?),
            SampleFormat::F32 => Box::new(ImageRam::<f32>::new(shape)?),
        })
    }
}

fn ensure_format<T: Sample>(format: SampleFormat, what: &str) -> ReprResult<()> {
    if format == T::FORMAT {
        Ok(())
    } else {
        Err(ReprError::unsupported_format(format!(
            "{what} holds {format} samples, not {}",
            T::FORMAT
        )))
    }
}

/// Host-memory image with samples of type `T`.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageRam<T: Sample> {
    width: u32,
    height: u32,
    texels: Vec<T>,
}

impl<T: Sample> ImageRam<T> {
    /// Zero-filled image of `shape`; fails when `shape` is not in `T`'s format.
    pub fn new(shape: &ImageShape) -> ReprResult<Self> {
        ensure_format::<T>(shape.format, "image shape")?;
        Ok(Self {
            width: shape.width,
            height: shape.height,
            texels: vec![T::default(); shape.texel_count()],
        })
    }

    /// Wrap row-major texels.
    pub fn from_texels(width: u32, height: u32, texels: Vec<T>) -> ReprResult<Self> {
        let expected = (width as usize).saturating_mul(height as usize);
        if texels.len() != expected {
            return Err(ReprError::unsupported_format(format!(
                "{} texels do not fill a {width}x{height} image",
                texels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            texels,
        })
    }

    /// Shape of this image.
    pub fn shape(&self) -> ImageShape {
        ImageShape::new(self.width, self.height, T::FORMAT)
    }

    /// Row-major texels.
    pub fn texels(&self) -> &[T] {
        &self.texels
    }

    /// Mutable row-major texels.
    pub fn texels_mut(&mut self) -> &mut [T] {
        &mut self.texels
    }

    /// Texel at `(x, y)`.
    pub fn get(&self, x: u32, y: u32) -> Option<T> {
        self.index(x, y).map(|i| self.texels[i])
    }

    /// Mutable texel at `(x, y)`.
    pub fn get_mut(&mut self, x: u32, y: u32) -> Option<&mut T> {
        self.index(x, y).map(|i| &mut self.texels[i])
    }

    /// Set every texel to `value`.
    pub fn fill(&mut self, value: T) {
        self.texels.fill(value);
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height).then(|| y as usize * self.width as usize + x as usize)
    }
}

impl<T: Sample> Representation<ImageFamily> for ImageRam<T> {
    fn clone_repr(&self) -> Box<dyn Representation<ImageFamily>> {
        Box::new(self.clone())
    }

    fn priority(&self) -> Priority {
        Priority::RAM
    }

    fn update(&mut self, editable: bool, shape: &ImageShape) -> ReprResult<()> {
        if !editable || self.shape() == *shape {
            return Ok(());
        }
        *self = Self::new(shape)?;
        Ok(())
    }

    fn copy_representations_to(&self, target: &mut dyn Representation<ImageFamily>) -> bool {
        match target.downcast_mut::<Self>() {
            Some(target) => {
                target.clone_from(self);
                true
            }
            None => false,
        }
    }
}

#[derive(Debug)]
struct DeviceImage {
    buffer: DeviceBuffer,
    shape: ImageShape,
}

impl DeviceImage {
    fn upload<T: Sample>(device: &DeviceContext, ram: &ImageRam<T>) -> ReprResult<Self> {
        Ok(Self {
            buffer: device.upload(&samples_to_le_bytes(ram.texels()))?,
            shape: ram.shape(),
        })
    }

    fn upload_from<T: Sample>(&mut self, ram: &ImageRam<T>) -> ReprResult<()> {
        self.buffer.write(&samples_to_le_bytes(ram.texels()))?;
        self.shape = ram.shape();
        Ok(())
    }

    fn read_texels<T: Sample>(&self) -> ReprResult<Vec<T>> {
        ensure_format::<T>(self.shape.format, "device image")?;
        samples_from_le_bytes(&self.buffer.read()?)
    }

    fn download_into<T: Sample>(&self, ram: &mut ImageRam<T>) -> ReprResult<()> {
        let texels = self.read_texels::<T>()?;
        *ram = ImageRam::from_texels(self.shape.width, self.shape.height, texels)?;
        Ok(())
    }

    fn copy_of(device: &DeviceContext, source: &DeviceImage) -> ReprResult<Self> {
        let mut buffer = device.alloc_zeroed(source.buffer.len())?;
        buffer.copy_from(&source.buffer)?;
        Ok(Self {
            buffer,
            shape: source.shape,
        })
    }

    fn copy_from(&mut self, source: &DeviceImage) -> ReprResult<()> {
        self.buffer.copy_from(&source.buffer)?;
        self.shape = source.shape;
        Ok(())
    }

    fn duplicate(&self) -> Self {
        Self {
            buffer: self.buffer.duplicate(),
            shape: self.shape,
        }
    }

    fn reshape(&mut self, shape: &ImageShape) -> ReprResult<()> {
        if self.shape == *shape {
            return Ok(());
        }
        self.buffer = self.buffer.device().alloc_zeroed(shape.byte_len())?;
        self.shape = *shape;
        Ok(())
    }

    // Device-side copy between two images on one device, used by the GL/CL interop fast path.
    fn interop_copy(&self, target: &mut DeviceImage) -> bool {
        self.buffer.device().same_device(target.buffer.device())
            && self.shape == target.shape
            && target.copy_from(self).is_ok()
    }
}

/// Image stored in a device texture.
#[derive(Debug)]
pub struct ImageGl(DeviceImage);

impl ImageGl {
    /// Upload `ram` into a new texture on `device`.
    pub fn from_ram<T: Sample>(device: &DeviceContext, ram: &ImageRam<T>) -> ReprResult<Self> {
        DeviceImage::upload(device, ram).map(Self)
    }

    /// Texture on `device` copied from a compute buffer.
    pub fn from_cl(device: &DeviceContext, cl: &ImageCl) -> ReprResult<Self> {
        DeviceImage::copy_of(device, &cl.0).map(Self)
    }

    /// Re-upload from `ram` in place.
    pub fn upload_from<T: Sample>(&mut self, ram: &ImageRam<T>) -> ReprResult<()> {
        self.0.upload_from(ram)
    }

    /// Refresh in place from a compute buffer.
    pub fn update_from_cl(&mut self, cl: &ImageCl) -> ReprResult<()> {
        self.0.copy_from(&cl.0)
    }

    /// Download into `ram`, resizing it to this texture's shape.
    pub fn download_into<T: Sample>(&self, ram: &mut ImageRam<T>) -> ReprResult<()> {
        self.0.download_into(ram)
    }

    /// Read texels back; fails when `T` is not this texture's format.
    pub fn read_texels<T: Sample>(&self) -> ReprResult<Vec<T>> {
        self.0.read_texels()
    }

    /// Texture shape.
    pub fn shape(&self) -> ImageShape {
        self.0.shape
    }

    /// Device holding the texture.
    pub fn device(&self) -> &DeviceContext {
        self.0.buffer.device()
    }
}

impl Representation<ImageFamily> for ImageGl {
    fn clone_repr(&self) -> Box<dyn Representation<ImageFamily>> {
        Box::new(Self(self.0.duplicate()))
    }

    fn priority(&self) -> Priority {
        Priority::TEXTURE
    }

    fn is_valid(&self) -> bool {
        self.0.buffer.is_available()
    }

    fn update(&mut self, editable: bool, shape: &ImageShape) -> ReprResult<()> {
        if editable {
            self.0.reshape(shape)?;
        }
        Ok(())
    }

    fn copy_representations_to(&self, target: &mut dyn Representation<ImageFamily>) -> bool {
        if let Some(cl) = target.downcast_mut::<ImageCl>() {
            return self.0.interop_copy(&mut cl.0);
        }
        if let Some(gl) = target.downcast_mut::<ImageGl>() {
            return self.0.interop_copy(&mut gl.0);
        }
        false
    }
}

/// Image stored in a device compute buffer.
#[derive(Debug)]
pub struct ImageCl(DeviceImage);

impl ImageCl {
    /// Compute buffer on `device` copied from a texture.
    pub fn from_gl(device: &DeviceContext, gl: &ImageGl) -> ReprResult<Self> {
        DeviceImage::copy_of(device, &gl.0).map(Self)
    }

    /// Refresh in place from a texture.
    pub fn update_from_gl(&mut self, gl: &ImageGl) -> ReprResult<()> {
        self.0.copy_from(&gl.0)
    }

    /// Read texels back; fails when `T` is not this buffer's format.
    pub fn read_texels<T: Sample>(&self) -> ReprResult<Vec<T>> {
        self.0.read_texels()
    }

    /// Buffer shape.
    pub fn shape(&self) -> ImageShape {
        self.0.shape
    }

    /// Device holding the buffer.
    pub fn device(&self) -> &DeviceContext {
        self.0.buffer.device()
    }
}

impl Representation<ImageFamily> for ImageCl {
    fn clone_repr(&self) -> Box<dyn Representation<ImageFamily>> {
        Box::new(Self(self.0.duplicate()))
    }

    fn priority(&self) -> Priority {
        Priority::COMPUTE
    }

    fn is_valid(&self) -> bool {
        self.0.buffer.is_available()
    }

    fn update(&mut self, editable: bool, shape: &ImageShape) -> ReprResult<()> {
        if editable {
            self.0.reshape(shape)?;
        }
        Ok(())
    }

    fn copy_representations_to(&self, target: &mut dyn Representation<ImageFamily>) -> bool {
        if let Some(gl) = target.downcast_mut::<ImageGl>() {
            return self.0.interop_copy(&mut gl.0);
        }
        if let Some(cl) = target.downcast_mut::<ImageCl>() {
            return self.0.interop_copy(&mut cl.0);
        }
        false
    }
}

/// Image file on disk, decoded on demand. Read-only.
#[derive(Clone, Debug)]
pub struct ImageDisk {
    path: PathBuf,
}

impl ImageDisk {
    /// Reference the image file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Shape of the file's pixels when decoded as `format`.
    pub fn probe_shape(&self, format: SampleFormat) -> ReprResult<ImageShape> {
        let (width, height) = image::image_dimensions(&self.path)
            .with_context(|| format!("probe image {}", self.path.display()))?;
        Ok(ImageShape::new(width, height, format))
    }

    /// Decode the file's luminance into a host image of `shape`.
    pub fn decode<T: Sample>(&self, shape: &ImageShape) -> ReprResult<ImageRam<T>> {
        ensure_format::<T>(shape.format, "image shape")?;
        let bytes = std::fs::read(&self.path)
            .with_context(|| format!("read image {}", self.path.display()))?;
        let img = image::load_from_memory(&bytes).context("decode image from memory")?;
        if (img.width(), img.height()) != (shape.width, shape.height) {
            return Err(ReprError::unsupported_format(format!(
                "{} is {}x{}, expected {}x{}",
                self.path.display(),
                img.width(),
                img.height(),
                shape.width,
                shape.height
            )));
        }
        ImageRam::from_texels(img.width(), img.height(), T::luma_from_image(&img))
    }
}

impl Representation<ImageFamily> for ImageDisk {
    fn clone_repr(&self) -> Box<dyn Representation<ImageFamily>> {
        Box::new(self.clone())
    }

    fn priority(&self) -> Priority {
        Priority::DISK
    }

    fn is_valid(&self) -> bool {
        self.path.is_file()
    }

    fn update(&mut self, editable: bool, _shape: &ImageShape) -> ReprResult<()> {
        if editable {
            return Err(ReprError::unsupported_format(format!(
                "{} is a read-only disk image",
                self.path.display()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/backends/image.rs"]
mod tests;
