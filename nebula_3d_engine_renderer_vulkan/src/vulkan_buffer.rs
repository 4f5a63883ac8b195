/// Buffer - Vulkan implementation of the Buffer trait

use nebula_3d_engine::nebula3d::{Result, Error};
use nebula_3d_engine::nebula3d::device::{Buffer as DeviceBuffer, BufferUsage};
use nebula_3d_engine::engine_err;
use ash::vk::{self, Handle};
use gpu_allocator::vulkan::Allocation;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;

/// Vulkan buffer implementation
///
/// Host-visible buffers stay persistently mapped. Their allocation is padded
/// to `nonCoherentAtomSize` so any atom-aligned flush range stays inside it.
pub struct Buffer {
    /// Shared GPU context (device, allocator, queue)
    ctx: Arc<GpuContext>,
    /// Vulkan buffer
    pub(crate) buffer: vk::Buffer,
    /// GPU memory allocation
    allocation: Option<Allocation>,
    /// Requested size in bytes
    size: u64,
    usage: BufferUsage,
    coherent: bool,
}

impl Buffer {
    pub(crate) fn new(
        ctx: Arc<GpuContext>,
        buffer: vk::Buffer,
        allocation: Allocation,
        size: u64,
        usage: BufferUsage,
    ) -> Self {
        let coherent = allocation
            .memory_properties()
            .contains(vk::MemoryPropertyFlags::HOST_COHERENT);
        Self {
            ctx,
            buffer,
            allocation: Some(allocation),
            size,
            usage,
            coherent,
        }
    }

    fn allocation(&self) -> Result<&Allocation> {
        self.allocation
            .as_ref()
            .ok_or_else(|| engine_err!("nebula3d::vulkan", "Buffer has no GPU allocation"))
    }

    /// Memory range covering `[offset, offset + size)` widened to whole atoms
    fn mapped_range(&self, offset: u64, size: u64) -> Result<vk::MappedMemoryRange<'static>> {
        if offset.checked_add(size).map_or(true, |end| end > self.size) {
            return Err(Error::InvalidResource(format!(
                "range {}+{} exceeds buffer of {} bytes",
                offset, size, self.size
            )));
        }
        let allocation = self.allocation()?;
        let atom = self.ctx.non_coherent_atom_size.max(1);
        let start = allocation.offset() + offset;
        let aligned_start = start / atom * atom;
        let end = (start + size).div_ceil(atom) * atom;
        let end = end.min(allocation.offset() + allocation.size());

        Ok(vk::MappedMemoryRange::default()
            .memory(unsafe { allocation.memory() })
            .offset(aligned_start)
            .size(end - aligned_start))
    }
}

impl DeviceBuffer for Buffer {
    fn size(&self) -> u64 {
        self.size
    }

    fn usage(&self) -> BufferUsage {
        self.usage
    }

    fn raw_handle(&self) -> u64 {
        self.buffer.as_raw()
    }

    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        let end = offset.checked_add(data.len() as u64);
        if end.map_or(true, |end| end > self.size) {
            return Err(Error::InvalidResource(format!(
                "write of {} bytes at offset {} exceeds buffer of {} bytes",
                data.len(), offset, self.size
            )));
        }

        let mapped_ptr = self
            .allocation()?
            .mapped_ptr()
            .ok_or_else(|| Error::InvalidResource("Buffer is not CPU-accessible".to_string()))?
            .as_ptr() as *mut u8;

        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped_ptr.add(offset as usize), data.len());
        }
        Ok(())
    }

    fn flush(&self, offset: u64, size: u64) -> Result<()> {
        if self.coherent || size == 0 {
            return Ok(());
        }
        let range = self.mapped_range(offset, size)?;
        unsafe { self.ctx.device.flush_mapped_memory_ranges(&[range]) }
            .map_err(|e| engine_err!("nebula3d::vulkan", "Failed to flush buffer memory: {:?}", e))
    }

    fn invalidate(&self, offset: u64, size: u64) -> Result<()> {
        if self.coherent || size == 0 {
            return Ok(());
        }
        let range = self.mapped_range(offset, size)?;
        unsafe { self.ctx.device.invalidate_mapped_memory_ranges(&[range]) }
            .map_err(|e| engine_err!("nebula3d::vulkan", "Failed to invalidate buffer memory: {:?}", e))
    }

    fn is_coherent(&self) -> bool {
        self.coherent
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            // Free GPU memory
            if let Some(allocation) = self.allocation.take() {
                // Don't panic if lock fails - we still need to destroy the buffer
                if let Ok(mut allocator) = self.ctx.allocator.lock() {
                    allocator.free(allocation).ok();
                }
            }

            self.ctx.device.destroy_buffer(self.buffer, None);
        }
    }
}
