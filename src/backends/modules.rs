use std::sync::Arc;

use crate::{
    backends::{
        buffer::{BufferCl, BufferFamily, BufferRam},
        device::DeviceContext,
        image::{ImageCl, ImageDisk, ImageFamily, ImageGl, ImageRam},
    },
    convert::{
        converter::{Converter, FnConverter},
        module::{BackendModule, ModuleRegistration},
    },
    foundation::{core::Sample, error::ReprResult},
};

/// Texture backend: uploads host images to a device and reads them back.
#[derive(Clone, Debug)]
pub struct GlModule {
    device: DeviceContext,
}

impl GlModule {
    /// Module allocating its textures on `device`.
    pub fn new(device: DeviceContext) -> Self {
        Self { device }
    }
}

impl BackendModule for GlModule {
    fn name(&self) -> &str {
        "gl"
    }

    fn register(&self, registration: &mut ModuleRegistration) -> ReprResult<()> {
        registration
            .converter(ram_to_gl::<u8>(&self.device))
            .converter(gl_to_ram::<u8>())
            .converter(ram_to_gl::<u16>(&self.device))
            .converter(gl_to_ram::<u16>())
            .converter(ram_to_gl::<f32>(&self.device))
            .converter(gl_to_ram::<f32>());
        Ok(())
    }
}

fn ram_to_gl<T: Sample>(device: &DeviceContext) -> Arc<dyn Converter<ImageFamily>> {
    let device = device.clone();
    Arc::new(FnConverter::<ImageFamily, ImageRam<T>, ImageGl>::new(
        move |ram, _| ImageGl::from_ram(&device, ram),
        |ram, gl, _| gl.upload_from(ram),
    ))
}

fn gl_to_ram<T: Sample>() -> Arc<dyn Converter<ImageFamily>> {
    Arc::new(FnConverter::<ImageFamily, ImageGl, ImageRam<T>>::new(
        |gl, shape| {
            let mut ram = ImageRam::<T>::new(shape)?;
            gl.download_into(&mut ram)?;
            Ok(ram)
        },
        |gl, ram, _| gl.download_into(ram),
    ))
}

/// Compute backend: texture interop for images, host transfers for buffers.
#[derive(Clone, Debug)]
pub struct ClModule {
    device: DeviceContext,
}

impl ClModule {
    /// Module allocating its buffers on `device`.
    pub fn new(device: DeviceContext) -> Self {
        Self { device }
    }
}

impl BackendModule for ClModule {
    fn name(&self) -> &str {
        "cl"
    }

    fn register(&self, registration: &mut ModuleRegistration) -> ReprResult<()> {
        let to_cl = self.device.clone();
        let to_gl = self.device.clone();
        registration
            .converter::<ImageFamily>(Arc::new(
                FnConverter::<ImageFamily, ImageGl, ImageCl>::new(
                    move |gl, _| ImageCl::from_gl(&to_cl, gl),
                    |gl, cl, _| cl.update_from_gl(gl),
                ),
            ))
            .converter::<ImageFamily>(Arc::new(
                FnConverter::<ImageFamily, ImageCl, ImageGl>::new(
                    move |cl, _| ImageGl::from_cl(&to_gl, cl),
                    |cl, gl, _| gl.update_from_cl(cl),
                ),
            ))
            .converter(buffer_ram_to_cl::<u8>(&self.device))
            .converter(buffer_cl_to_ram::<u8>())
            .converter(buffer_ram_to_cl::<u16>(&self.device))
            .converter(buffer_cl_to_ram::<u16>())
            .converter(buffer_ram_to_cl::<f32>(&self.device))
            .converter(buffer_cl_to_ram::<f32>());
        Ok(())
    }
}

fn buffer_ram_to_cl<T: Sample>(device: &DeviceContext) -> Arc<dyn Converter<BufferFamily>> {
    let device = device.clone();
    Arc::new(FnConverter::<BufferFamily, BufferRam<T>, BufferCl>::new(
        move |ram, _| BufferCl::from_ram(&device, ram),
        |ram, cl, _| cl.upload_from(ram),
    ))
}

fn buffer_cl_to_ram<T: Sample>() -> Arc<dyn Converter<BufferFamily>> {
    Arc::new(FnConverter::<BufferFamily, BufferCl, BufferRam<T>>::new(
        |cl, _| Ok(BufferRam::from_vec(cl.read::<T>()?)),
        |cl, ram, _| {
            *ram = BufferRam::from_vec(cl.read::<T>()?);
            Ok(())
        },
    ))
}

/// Disk backend: decodes image files into host memory.
#[derive(Clone, Copy, Debug, Default)]
pub struct DiskModule;

impl BackendModule for DiskModule {
    fn name(&self) -> &str {
        "disk"
    }

    fn register(&self, registration: &mut ModuleRegistration) -> ReprResult<()> {
        registration
            .converter(disk_to_ram::<u8>())
            .converter(disk_to_ram::<u16>())
            .converter(disk_to_ram::<f32>());
        Ok(())
    }
}

// Decoding is the most expensive edge in the image graph.
const DISK_DECODE_COST: u32 = 4;

fn disk_to_ram<T: Sample>() -> Arc<dyn Converter<ImageFamily>> {
    Arc::new(
        FnConverter::<ImageFamily, ImageDisk, ImageRam<T>>::new(
            |disk, shape| disk.decode::<T>(shape),
            |disk, ram, shape| {
                *ram = disk.decode::<T>(shape)?;
                Ok(())
            },
        )
        .with_cost(DISK_DECODE_COST),
    )
}

#[cfg(test)]
#[path = "../../tests/unit/backends/modules.rs"]
mod tests;
