use crate::{
    backends::device::{DeviceBuffer, DeviceContext},
    foundation::{
        core::{Priority, Sample, SampleFormat, samples_from_le_bytes, samples_to_le_bytes},
        error::{ReprError, ReprResult},
    },
    representation::repr::{DataFamily, Representation},
};

/// Length and sample format of a linear buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct BufferShape {
    /// Number of elements.
    pub len: usize,
    /// Element format.
    pub format: SampleFormat,
}

impl BufferShape {
    /// Build a shape.
    pub fn new(len: usize, format: SampleFormat) -> Self {
        Self { len, format }
    }
}

/// Linear element buffers.
#[derive(Clone, Copy, Debug, Default)]
pub struct BufferFamily;

impl DataFamily for BufferFamily {
    type Shape = BufferShape;

    const NAME: &'static str = "buffer";

    fn create_default(shape: &BufferShape) -> ReprResult<Box<dyn Representation<Self>>> {
        Ok(match shape.format {
            SampleFormat::U8 => Box::new(BufferRam::<u8>::new(shape)?),
            SampleFormat::U16 => Box::new(BufferRam::<u16>::new(shape)?),
            SampleFormat::F32 => Box::new(BufferRam::<f32>::new(shape)?),
        })
    }
}

fn ensure_format<T: Sample>(format: SampleFormat) -> ReprResult<()> {
    if format != T::FORMAT {
        return Err(ReprError::unsupported_format(format!(
            "buffer holds {format} elements, not {}",
            T::FORMAT
        )));
    }
    Ok(())
}

/// Host-memory buffer of `T`.
#[derive(Clone, Debug, PartialEq)]
pub struct BufferRam<T: Sample> {
    data: Vec<T>,
}

impl<T: Sample> BufferRam<T> {
    /// Zero-filled buffer of `shape`.
    pub fn new(shape: &BufferShape) -> ReprResult<Self> {
        ensure_format::<T>(shape.format)?;
        Ok(Self {
            data: vec![T::default(); shape.len],
        })
    }

    /// Wrap existing elements.
    pub fn from_vec(data: Vec<T>) -> Self {
        Self { data }
    }

    /// Shape of this buffer.
    pub fn shape(&self) -> BufferShape {
        BufferShape::new(self.data.len(), T::FORMAT)
    }

    /// Elements.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Mutable elements.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }
}

impl<T: Sample> Representation<BufferFamily> for BufferRam<T> {
    fn clone_repr(&self) -> Box<dyn Representation<BufferFamily>> {
        Box::new(self.clone())
    }

    fn priority(&self) -> Priority {
        Priority::RAM
    }

    // Keeps the common prefix when the length changes.
    fn update(&mut self, editable: bool, shape: &BufferShape) -> ReprResult<()> {
        if editable {
            ensure_format::<T>(shape.format)?;
            self.data.resize(shape.len, T::default());
        }
        Ok(())
    }

    fn copy_representations_to(&self, target: &mut dyn Representation<BufferFamily>) -> bool {
        let Some(target) = target.downcast_mut::<Self>() else {
            return false;
        };
        target.data.clone_from(&self.data);
        true
    }
}

/// Buffer stored in device memory.
#[derive(Debug)]
pub struct BufferCl {
    buffer: DeviceBuffer,
    shape: BufferShape,
}

impl BufferCl {
    /// Upload `ram` into a new device buffer.
    pub fn from_ram<T: Sample>(device: &DeviceContext, ram: &BufferRam<T>) -> ReprResult<Self> {
        Ok(Self {
            buffer: device.upload(&samples_to_le_bytes(ram.as_slice()))?,
            shape: ram.shape(),
        })
    }

    /// Re-upload from `ram` in place.
    pub fn upload_from<T: Sample>(&mut self, ram: &BufferRam<T>) -> ReprResult<()> {
        self.buffer.write(&samples_to_le_bytes(ram.as_slice()))?;
        self.shape = ram.shape();
        Ok(())
    }

    /// Read elements back; fails when `T` is not this buffer's format.
    pub fn read<T: Sample>(&self) -> ReprResult<Vec<T>> {
        ensure_format::<T>(self.shape.format)?;
        samples_from_le_bytes(&self.buffer.read()?)
    }

    /// Buffer shape.
    pub fn shape(&self) -> BufferShape {
        self.shape
    }

    /// Device holding the buffer.
    pub fn device(&self) -> &DeviceContext {
        self.buffer.device()
    }
}

impl Representation<BufferFamily> for BufferCl {
    fn clone_repr(&self) -> Box<dyn Representation<BufferFamily>> {
        Box::new(Self {
            buffer: self.buffer.duplicate(),
            shape: self.shape,
        })
    }

    fn priority(&self) -> Priority {
        Priority::COMPUTE
    }

    fn is_valid(&self) -> bool {
        self.buffer.is_available()
    }

    fn update(&mut self, editable: bool, shape: &BufferShape) -> ReprResult<()> {
        if editable && self.shape != *shape {
            let len = shape.len.saturating_mul(shape.format.bytes_per_sample());
            self.buffer = self.buffer.device().alloc_zeroed(len)?;
            self.shape = *shape;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/backends/buffer.rs"]
mod tests;
