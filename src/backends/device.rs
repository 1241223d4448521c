use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use parking_lot::Mutex;

use crate::foundation::error::{ReprError, ReprResult};

/// Allocation and transfer counters for one simulated device.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct DeviceStats {
    /// Buffers currently allocated.
    pub live_allocations: usize,
    /// Bytes currently allocated.
    pub live_bytes: usize,
    /// Buffers allocated since creation.
    pub total_allocations: u64,
    /// Host-to-device writes.
    pub uploads: u64,
    /// Device-to-host reads.
    pub downloads: u64,
    /// Device-to-device copies.
    pub device_copies: u64,
}

struct DeviceState {
    name: String,
    alive: AtomicBool,
    stats: Mutex<DeviceStats>,
}

/// Handle to a simulated execution device (a GL context, a CL queue, ...).
///
/// Cloning shares the device. [`DeviceContext::lose`] simulates a context loss: every buffer
/// allocated on the device stops being available, and new allocations fail.
#[derive(Clone)]
pub struct DeviceContext {
    state: Arc<DeviceState>,
}

impl DeviceContext {
    /// New live device.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            state: Arc::new(DeviceState {
                name: name.into(),
                alive: AtomicBool::new(true),
                stats: Mutex::new(DeviceStats::default()),
            }),
        }
    }

    /// Device name used in diagnostics.
    pub fn name(&self) -> &str {
        &self.state.name
    }

    /// Whether the device can still serve its buffers.
    pub fn is_alive(&self) -> bool {
        self.state.alive.load(Ordering::Acquire)
    }

    /// Simulate losing the device.
    pub fn lose(&self) {
        self.state.alive.store(false, Ordering::Release);
        tracing::warn!(device = %self.state.name, "device lost");
    }

    /// Snapshot of the device counters.
    pub fn stats(&self) -> DeviceStats {
        *self.state.stats.lock()
    }

    /// Whether both handles refer to the same device.
    pub fn same_device(&self, other: &DeviceContext) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    /// Allocate `len` zeroed bytes.
    pub fn alloc_zeroed(&self, len: usize) -> ReprResult<DeviceBuffer> {
        self.ensure_alive()?;
        self.track_alloc(len);
        Ok(DeviceBuffer {
            device: self.clone(),
            bytes: vec![0; len],
        })
    }

    /// Allocate a buffer holding a copy of `bytes`.
    pub fn upload(&self, bytes: &[u8]) -> ReprResult<DeviceBuffer> {
        let mut buffer = self.alloc_zeroed(bytes.len())?;
        buffer.write(bytes)?;
        Ok(buffer)
    }

    fn ensure_alive(&self) -> ReprResult<()> {
        if self.is_alive() {
            Ok(())
        } else {
            Err(ReprError::resource_unavailable(format!(
                "device '{}' is lost",
                self.state.name
            )))
        }
    }

    fn track_alloc(&self, len: usize) {
        let mut stats = self.state.stats.lock();
        stats.live_allocations += 1;
        stats.live_bytes = stats.live_bytes.saturating_add(len);
        stats.total_allocations = stats.total_allocations.saturating_add(1);
    }

    fn track_free(&self, len: usize) {
        let mut stats = self.state.stats.lock();
        stats.live_allocations = stats.live_allocations.saturating_sub(1);
        stats.live_bytes = stats.live_bytes.saturating_sub(len);
    }

    fn track_resize(&self, old: usize, new: usize) {
        let mut stats = self.state.stats.lock();
        stats.live_bytes = stats.live_bytes.saturating_sub(old).saturating_add(new);
    }

    fn bump(&self, counter: impl FnOnce(&mut DeviceStats) -> &mut u64) {
        let mut stats = self.state.stats.lock();
        let slot = counter(&mut stats);
        *slot = slot.saturating_add(1);
    }
}

impl fmt::Debug for DeviceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceContext")
            .field("name", &self.state.name)
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Byte allocation owned by a [`DeviceContext`]; released on drop.
pub struct DeviceBuffer {
    device: DeviceContext,
    bytes: Vec<u8>,
}

impl DeviceBuffer {
    /// Device this buffer lives on.
    pub fn device(&self) -> &DeviceContext {
        &self.device
    }

    /// Size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the buffer holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether the owning device is still alive.
    pub fn is_available(&self) -> bool {
        self.device.is_alive()
    }

    /// Replace the contents with `bytes`, resizing as needed.
    pub fn write(&mut self, bytes: &[u8]) -> ReprResult<()> {
        self.device.ensure_alive()?;
        self.resize(bytes.len());
        self.bytes.copy_from_slice(bytes);
        self.device.bump(|s| &mut s.uploads);
        Ok(())
    }

    /// Read the contents back to the host.
    pub fn read(&self) -> ReprResult<Vec<u8>> {
        self.device.ensure_alive()?;
        self.device.bump(|s| &mut s.downloads);
        Ok(self.bytes.clone())
    }

    /// Copy another buffer's contents without a host round trip.
    pub fn copy_from(&mut self, source: &DeviceBuffer) -> ReprResult<()> {
        source.device.ensure_alive()?;
        self.device.ensure_alive()?;
        self.resize(source.len());
        self.bytes.copy_from_slice(&source.bytes);
        self.device.bump(|s| &mut s.device_copies);
        Ok(())
    }

    /// Independent allocation with the same contents.
    ///
    /// Succeeds on a lost device too; the copy is then unavailable like its source.
    pub fn duplicate(&self) -> DeviceBuffer {
        self.device.track_alloc(self.bytes.len());
        DeviceBuffer {
            device: self.device.clone(),
            bytes: self.bytes.clone(),
        }
    }

    fn resize(&mut self, len: usize) {
        if len != self.bytes.len() {
            self.device.track_resize(self.bytes.len(), len);
            self.bytes.resize(len, 0);
        }
    }
}

impl Drop for DeviceBuffer {
    fn drop(&mut self) {
        self.device.track_free(self.bytes.len());
    }
}

impl fmt::Debug for DeviceBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceBuffer")
            .field("device", &self.device.name())
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/backends/device.rs"]
mod tests;
