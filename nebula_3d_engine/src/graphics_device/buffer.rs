/// Buffer trait and buffer descriptor

use bitflags::bitflags;
use crate::error::Result;

bitflags! {
    /// Buffer usage flags
    ///
    /// A transient backing buffer may combine several usages (e.g. an instancing
    /// buffer is both VERTEX and STORAGE on some pipelines).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const VERTEX = 1 << 0;
        const INDEX = 1 << 1;
        const UNIFORM = 1 << 2;
        const STORAGE = 1 << 3;
        const UNIFORM_TEXEL = 1 << 4;
        const STORAGE_TEXEL = 1 << 5;
        const INDIRECT = 1 << 6;
        const TRANSFER_SRC = 1 << 7;
        const TRANSFER_DST = 1 << 8;
    }
}

/// Memory placement requested for a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryLocation {
    /// Device-local, not mappable
    GpuOnly,
    /// Host-visible and persistently mapped, written every frame by the CPU
    CpuToGpu,
    /// Host-visible readback memory
    GpuToCpu,
}

/// Descriptor for creating a buffer
#[derive(Debug, Clone)]
pub struct BufferDesc {
    /// Size in bytes
    pub size: u64,
    /// Buffer usage
    pub usage: BufferUsage,
    /// Memory placement
    pub location: MemoryLocation,
    /// Debug name (shown by validation layers and logs)
    pub name: String,
}

/// Buffer resource trait
///
/// Implemented by backend-specific buffer types (e.g., VulkanBuffer).
/// The buffer is automatically destroyed when dropped.
pub trait Buffer: Send + Sync {
    /// Size in bytes
    fn size(&self) -> u64;

    /// Usage flags the buffer was created with
    fn usage(&self) -> BufferUsage;

    /// Backend handle (VkBuffer as u64 for Vulkan, counter for the mock device)
    fn raw_handle(&self) -> u64;

    /// Copy data into mapped memory
    ///
    /// # Arguments
    ///
    /// * `offset` - Offset into the buffer in bytes
    /// * `data` - Data to write
    ///
    /// # Errors
    ///
    /// `InvalidResource` if `offset + data.len()` exceeds the buffer size or the
    /// buffer is not host-visible.
    fn update(&self, offset: u64, data: &[u8]) -> Result<()>;

    /// Make CPU writes in `[offset, offset + size)` visible to the device
    ///
    /// No-op on host-coherent memory. The range must already be aligned
    /// to `DeviceLimits::non_coherent_atom_size` (or end at the buffer size).
    fn flush(&self, offset: u64, size: u64) -> Result<()>;

    /// Make device writes in `[offset, offset + size)` visible to the CPU
    fn invalidate(&self, offset: u64, size: u64) -> Result<()>;

    /// Whether the backing memory is host-coherent
    fn is_coherent(&self) -> bool;
}
