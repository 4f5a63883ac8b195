/// Transient buffer allocator - grow-only linear sub-allocation of per-frame GPU memory.
///
/// Each allocator serves one usage class and owns a list of host-visible
/// backing buffers. Allocations bump a per-buffer cursor; `reset()` rewinds
/// every cursor once per frame, backing buffers are never freed or shrunk.
///
/// # Example
///
/// ```ignore
/// let mut uniforms = TransientBufferAllocator::new(device, UsageClass::Uniform, 1 << 20, "lane0")?;
/// let alloc = uniforms.allocate(64)?;
/// alloc.write(bytemuck::bytes_of(&world))?;
/// // ... record, then before submission:
/// uniforms.flush()?;
/// ```

use std::sync::Arc;
use crate::error::{Error, Result};
use crate::graphics_device::{
    BindingGroupHandle, Buffer, BufferDesc, BufferUsage, DeviceLimits, GraphicsDevice,
    MemoryLocation,
};
use crate::utils::{align_up, is_power_of_two};

/// Bytes visible through one dynamic offset of a transient uniform group.
///
/// Uniform backing buffers carry this much tail room past their capacity so
/// that the last allocation can still be bound with the full range.
pub const DYNAMIC_UNIFORM_RANGE: u64 = 16 * 1024;

/// Usage class of a transient allocator, selects the offset alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UsageClass {
    Uniform,
    Storage,
    Texel,
    Vertex,
    Index,
    Indirect,
}

impl UsageClass {
    /// Minimum offset alignment the device requires for this class
    pub fn alignment(&self, limits: &DeviceLimits) -> u64 {
        let raw = match self {
            UsageClass::Uniform => limits.min_uniform_buffer_offset_alignment,
            UsageClass::Storage => limits.min_storage_buffer_offset_alignment,
            UsageClass::Texel => limits.min_texel_buffer_offset_alignment,
            UsageClass::Vertex => limits.min_vertex_buffer_offset_alignment,
            UsageClass::Index => limits.min_index_buffer_offset_alignment,
            UsageClass::Indirect => limits.min_indirect_buffer_offset_alignment,
        };
        raw.max(1)
    }

    /// Buffer usage flags of the backing buffers
    pub fn buffer_usage(&self) -> BufferUsage {
        match self {
            UsageClass::Uniform => BufferUsage::UNIFORM,
            UsageClass::Storage => BufferUsage::STORAGE,
            UsageClass::Texel => BufferUsage::UNIFORM_TEXEL | BufferUsage::STORAGE_TEXEL,
            UsageClass::Vertex => BufferUsage::VERTEX,
            UsageClass::Index => BufferUsage::INDEX,
            UsageClass::Indirect => BufferUsage::INDIRECT | BufferUsage::STORAGE,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            UsageClass::Uniform => "uniform",
            UsageClass::Storage => "storage",
            UsageClass::Texel => "texel",
            UsageClass::Vertex => "vertex",
            UsageClass::Index => "index",
            UsageClass::Indirect => "indirect",
        }
    }
}

/// One sub-allocation, valid until the owning allocator is reset
#[derive(Clone)]
pub struct TransientBuffer {
    buffer: Arc<dyn Buffer>,
    offset: u64,
    size: u64,
    binding_group: Option<BindingGroupHandle>,
}

impl TransientBuffer {
    /// Backing buffer the range lives in
    pub fn buffer(&self) -> &Arc<dyn Buffer> {
        &self.buffer
    }

    /// Offset of the range in the backing buffer, aligned for the usage class
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Size requested at allocation
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Dynamic uniform group of the backing buffer (uniform class only)
    pub fn binding_group(&self) -> Option<BindingGroupHandle> {
        self.binding_group
    }

    /// Offset as a dynamic binding offset
    pub fn dynamic_offset(&self) -> Result<u32> {
        u32::try_from(self.offset).map_err(|_| {
            Error::InvalidResource(format!("transient offset {} exceeds u32", self.offset))
        })
    }

    /// Copy `data` to the start of the range
    ///
    /// # Errors
    ///
    /// `InvalidResource` if `data` is larger than the allocation.
    pub fn write(&self, data: &[u8]) -> Result<()> {
        self.write_at(0, data)
    }

    /// Copy `data` at `offset` bytes into the range
    pub fn write_at(&self, offset: u64, data: &[u8]) -> Result<()> {
        let fits = offset
            .checked_add(data.len() as u64)
            .is_some_and(|end| end <= self.size);
        if !fits {
            return Err(Error::InvalidResource(format!(
                "write of {} bytes at {} exceeds transient allocation of {} bytes",
                data.len(), offset, self.size
            )));
        }
        self.buffer.update(self.offset + offset, data)
    }
}

struct BackingBuffer {
    buffer: Arc<dyn Buffer>,
    capacity: u64,
    used: u64,
    binding_group: Option<BindingGroupHandle>,
}

/// Grow-only linear allocator over host-visible backing buffers
pub struct TransientBufferAllocator {
    device: Arc<dyn GraphicsDevice>,
    class: UsageClass,
    nominal_size: u64,
    alignment: u64,
    atom_size: u64,
    backings: Vec<BackingBuffer>,
    name: String,
}

impl TransientBufferAllocator {
    /// Create an allocator; no backing buffer exists until the first allocation
    ///
    /// # Arguments
    ///
    /// * `device` - Device creating the backing buffers
    /// * `class` - Usage class, fixes the alignment read from the device limits
    /// * `nominal_size` - Capacity of each new backing buffer (larger requests get their own size)
    /// * `name` - Debug name prefix of the backing buffers
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        class: UsageClass,
        nominal_size: u64,
        name: &str,
    ) -> Result<Self> {
        let limits = device.limits();
        let alignment = class.alignment(&limits);
        let atom_size = limits.non_coherent_atom_size.max(1);
        if !is_power_of_two(alignment) || !is_power_of_two(atom_size) {
            return Err(Error::InitializationFailed(format!(
                "device reported non power-of-two alignment ({} / atom {})",
                alignment, atom_size
            )));
        }
        if nominal_size == 0 {
            return Err(Error::InitializationFailed(format!(
                "transient allocator '{}' with zero nominal size", name
            )));
        }
        Ok(Self {
            device,
            class,
            nominal_size,
            alignment,
            atom_size,
            backings: Vec::new(),
            name: name.to_string(),
        })
    }

    /// Sub-allocate `size` bytes
    ///
    /// Walks the backing buffers in creation order and takes the first one with
    /// room; creates a new backing buffer when none fits.
    ///
    /// # Errors
    ///
    /// `OutOfMemory` (or any device error) when a new backing buffer cannot be created.
    pub fn allocate(&mut self, size: u64) -> Result<TransientBuffer> {
        if let Some(backing) = self
            .backings
            .iter_mut()
            .find(|b| b.used.checked_add(size).is_some_and(|end| end <= b.capacity))
        {
            return Ok(Self::take(backing, size, self.alignment));
        }

        let backing = self.create_backing(size)?;
        self.backings.push(backing);
        let alignment = self.alignment;
        match self.backings.last_mut() {
            Some(backing) => Ok(Self::take(backing, size, alignment)),
            None => Err(Error::BackendError("transient backing buffer vanished".to_string())),
        }
    }

    fn take(backing: &mut BackingBuffer, size: u64, alignment: u64) -> TransientBuffer {
        let offset = backing.used;
        backing.used += align_up(size, alignment);
        TransientBuffer {
            buffer: Arc::clone(&backing.buffer),
            offset,
            size,
            binding_group: backing.binding_group,
        }
    }

    fn create_backing(&self, size: u64) -> Result<BackingBuffer> {
        let capacity = self.nominal_size.max(size);
        let tail = if self.class == UsageClass::Uniform { DYNAMIC_UNIFORM_RANGE } else { 0 };
        let name = format!("{}_{}_{}", self.name, self.class.name(), self.backings.len());

        let buffer = self
            .device
            .create_buffer(&BufferDesc {
                size: capacity + tail,
                usage: self.class.buffer_usage(),
                location: MemoryLocation::CpuToGpu,
                name: name.clone(),
            })
            .map_err(|e| {
                crate::engine_error!(
                    "nebula3d::frame",
                    "Failed to create transient backing buffer '{}' ({} bytes): {}",
                    name, capacity + tail, e
                );
                e
            })?;

        let binding_group = match self.class {
            UsageClass::Uniform => {
                Some(self.device.create_dynamic_uniform_group(&buffer, DYNAMIC_UNIFORM_RANGE)?)
            }
            _ => None,
        };

        crate::engine_debug!(
            "nebula3d::frame",
            "Created transient {} backing buffer '{}' ({} bytes)",
            self.class.name(), name, capacity
        );

        Ok(BackingBuffer { buffer, capacity, used: 0, binding_group })
    }

    /// Rewind every backing buffer; call once per frame after the slot's fence wait
    pub fn reset(&mut self) {
        for backing in &mut self.backings {
            backing.used = 0;
        }
    }

    /// Flush the written prefix of every used backing buffer
    ///
    /// Each flush covers `align_up(used, non_coherent_atom_size)` bytes,
    /// clamped to the buffer size. Skipped on host-coherent memory.
    pub fn flush(&self) -> Result<()> {
        for backing in self.backings.iter().filter(|b| b.used > 0) {
            if backing.buffer.is_coherent() {
                continue;
            }
            let size = align_up(backing.used, self.atom_size).min(backing.buffer.size());
            backing.buffer.flush(0, size)?;
        }
        Ok(())
    }

    pub fn usage_class(&self) -> UsageClass {
        self.class
    }

    pub fn alignment(&self) -> u64 {
        self.alignment
    }

    /// Number of backing buffers created so far
    pub fn backing_count(&self) -> usize {
        self.backings.len()
    }

    /// Bytes consumed this frame, including alignment padding
    pub fn used_bytes(&self) -> u64 {
        self.backings.iter().map(|b| b.used).sum()
    }

    /// Total capacity of all backing buffers
    pub fn capacity_bytes(&self) -> u64 {
        self.backings.iter().map(|b| b.capacity).sum()
    }
}

#[cfg(test)]
#[path = "transient_buffer_tests.rs"]
mod tests;
